// crates/jobs/src/task.rs
//! The work a job run performs.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::TaskError;

/// Longest diagnostic kept from a failed script's output.
const MAX_OUTPUT_CHARS: usize = 4000;

/// Bytes kept per pipe while the script runs; older output is dropped.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Becomes the `message` of the `completed` status.
    pub summary: String,
}

impl TaskReport {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

/// Body of a background job. Implementations are opaque to the runner: it only
/// looks at success or failure and the accompanying text.
#[async_trait]
pub trait JobTask: Send + Sync {
    async fn run(&self) -> Result<TaskReport, TaskError>;
}

/// Runs an external program to completion, capturing its output.
///
/// Used for the vectorization migration script, which loads historical
/// projects into the vector database and exits non-zero on failure.
#[derive(Debug, Clone)]
pub struct ScriptTask {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ScriptTask {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the script if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl JobTask for ScriptTask {
    async fn run(&self) -> Result<TaskReport, TaskError> {
        let t0 = Instant::now();
        tracing::info!(
            program = %self.program,
            args = ?self.args,
            timeout_ms = self.timeout.as_millis() as u64,
            "script task: spawning"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the run (timeout, shutdown) must not leave the script running.
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| {
            tracing::error!(error = %source, "script task: failed to spawn");
            TaskError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;
        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|source| TaskError::Wait {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                tracing::error!(elapsed_ms = t0.elapsed().as_millis() as u64, "script task: timed out");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "script task: failed to kill timed-out script");
                }
                return Err(TaskError::TimedOut {
                    after: self.timeout,
                    output: combined_output(&stdout.snapshot(), &stderr.snapshot()),
                });
            }
        };

        let stdout = stdout.finish().await;
        let stderr = stderr.finish().await;
        let elapsed = t0.elapsed();

        if !status.success() {
            tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                exit_code = ?status.code(),
                "script task: non-zero exit"
            );
            return Err(TaskError::NonZeroExit {
                code: status.code(),
                output: combined_output(&stdout, &stderr),
            });
        }

        tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "script task: finished");
        let summary = last_line(&stdout)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Completed in {}s", elapsed.as_secs()));
        Ok(TaskReport::new(summary))
    }
}

/// Drains one child pipe into a shared buffer as the output arrives, so
/// whatever was written is still readable when the script is killed.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let mut buf = lock(&buf);
                            buf.extend_from_slice(&chunk[..n]);
                            let excess = buf.len().saturating_sub(MAX_CAPTURE_BYTES);
                            buf.drain(..excess);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "script task: failed reading output");
                            break;
                        }
                    }
                }
            })
        });
        Self { buf, reader }
    }

    fn snapshot(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }

    /// Wait for the pipe to close, then return everything captured.
    async fn finish(mut self) -> String {
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                tracing::warn!(error = %e, "script task: output reader failed");
            }
        }
        self.snapshot()
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    match buf.lock() {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!("Mutex poisoned on script output: {e}");
            e.into_inner()
        }
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|l| !l.is_empty())
}

/// stderr first (usually the reason), then stdout, trimmed to the last
/// `MAX_OUTPUT_CHARS` characters.
fn combined_output(stdout: &str, stderr: &str) -> String {
    let parts: Vec<&str> = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    tail_chars(&parts.join("\n"), MAX_OUTPUT_CHARS)
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let skipped: String = text.chars().skip(count - max).collect();
    format!("...{skipped}")
}
