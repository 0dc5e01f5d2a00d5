// crates/observability/src/lib.rs
//! Tracing setup shared by the proposal-desk binaries.
//!
//! Logs go to stderr in `compact` or `json` format, filtered by `RUST_LOG`.
//! When `LOG_DIR` is set, a JSON copy is also written to a daily rolling file
//! through a non-blocking writer; keep the returned [`LogGuard`] alive for the
//! life of the process so buffered lines are flushed on exit.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Output format of the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging options for one binary.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used as the rolling log file prefix.
    pub service: String,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl LogConfig {
    /// Read `LOG_FORMAT` and `LOG_DIR` from the environment.
    pub fn from_env(service: &str, default_filter: &str) -> Self {
        Self::from_lookup(service, default_filter, |key| std::env::var(key).ok())
    }

    /// Like [`LogConfig::from_env`], with an explicit variable lookup.
    pub fn from_lookup(
        service: &str,
        default_filter: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let format = lookup("LOG_FORMAT")
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        let log_dir = lookup("LOG_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        Self {
            service: service.to_string(),
            format,
            default_filter: default_filter.to_string(),
            log_dir,
        }
    }
}

/// Flushes the file writer when dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> anyhow::Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match config.format {
        LogFormat::Compact => layers.push(fmt::layer().compact().with_writer(std::io::stderr).boxed()),
        LogFormat::Json => layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed()),
    }

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", config.service));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;
    Ok(LogGuard { _file: file_guard })
}
