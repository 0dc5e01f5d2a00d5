// crates/jobs/src/store.rs
//! Holders of the latest `JobStatus` for a task.
//!
//! A store is read concurrently by status queries and written by the
//! `JobRunner` that owns it. Both implementations swap the whole record under
//! a lock, so readers see either the previous record or the new one, never a
//! mix of fields.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use proposal_desk_types::JobStatus;

use crate::error::StoreError;

/// Message recorded when a run was still marked `running` at startup.
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by server restart before the run finished";

/// Latest-record storage for one task's status. No history is kept.
pub trait StatusStore: Send + Sync {
    fn get(&self) -> JobStatus;
    fn set(&self, status: JobStatus);
}

/// Process-local store. Starts from the record passed to [`MemoryStatusStore::new`].
pub struct MemoryStatusStore {
    current: RwLock<JobStatus>,
}

impl MemoryStatusStore {
    pub fn new(initial: JobStatus) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl StatusStore for MemoryStatusStore {
    fn get(&self) -> JobStatus {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job status: {e}");
                e.into_inner().clone()
            }
        }
    }

    fn set(&self, status: JobStatus) {
        match self.current.write() {
            Ok(mut guard) => *guard = status,
            Err(e) => {
                tracing::error!("RwLock poisoned writing job status: {e}");
                *e.into_inner() = status;
            }
        }
    }
}

/// Store that mirrors the record to a JSON file so it survives restarts.
///
/// The in-memory copy is authoritative: a failed file write is logged and the
/// new record is still served to readers.
pub struct FileStatusStore {
    path: PathBuf,
    current: RwLock<JobStatus>,
}

impl FileStatusStore {
    /// Open the store at `path`, loading the persisted record if there is one.
    ///
    /// A missing file starts from `initial`. A file that cannot be parsed is
    /// logged and also starts from `initial`.
    pub fn open(path: impl Into<PathBuf>, initial: JobStatus) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let current = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<JobStatus>(&raw) {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Malformed status file, starting fresh");
                    initial
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => initial,
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, status: &JobStatus) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let bytes = serde_json::to_vec_pretty(status)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StatusStore for FileStatusStore {
    fn get(&self) -> JobStatus {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading job status: {e}");
                e.into_inner().clone()
            }
        }
    }

    fn set(&self, status: JobStatus) {
        // File writes happen under the write lock so the file never lags
        // behind a newer in-memory record.
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("RwLock poisoned writing job status: {e}");
                e.into_inner()
            }
        };
        if let Err(e) = self.persist(&status) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist job status");
        }
        *guard = status;
    }
}

/// Turn a leftover `running` record into an `error`.
///
/// A run that was in flight when the process stopped has an unknown outcome,
/// and leaving it `running` would reject every future trigger. Returns `true`
/// if the record was rewritten.
pub fn recover_interrupted(store: &dyn StatusStore) -> bool {
    let status = store.get();
    if !status.state.is_running() {
        return false;
    }
    tracing::warn!(
        last_run = ?status.last_run,
        "Found a run still marked running at startup, marking it failed"
    );
    store.set(JobStatus::error(status.last_run, INTERRUPTED_MESSAGE));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use proposal_desk_types::JobState;
    use std::sync::Arc;

    #[test]
    fn test_memory_store_get_set() {
        let store = MemoryStatusStore::new(JobStatus::idle("never run"));
        assert_eq!(store.get().state, JobState::Idle);

        let running = JobStatus::running(Utc::now(), "started");
        store.set(running.clone());
        assert_eq!(store.get(), running);
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let store = MemoryStatusStore::new(JobStatus::completed(Some(Utc::now()), "done"));
        let first = store.get();
        for _ in 0..10 {
            assert_eq!(store.get(), first);
        }
    }

    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let store = Arc::new(MemoryStatusStore::new(JobStatus::idle("a")));
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    if i % 2 == 0 {
                        store.set(JobStatus::error(None, "even"));
                    } else {
                        store.set(JobStatus::completed(None, "odd"));
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let s = store.get();
                        match s.state {
                            JobState::Idle => assert_eq!(s.message, "a"),
                            JobState::Error => assert_eq!(s.message, "even"),
                            JobState::Completed => assert_eq!(s.message, "odd"),
                            JobState::Running => panic!("never written"),
                        }
                    }
                })
            })
            .collect();

        writer.join().expect("writer panicked");
        for r in readers {
            r.join().expect("reader panicked");
        }
    }

    #[test]
    fn test_file_store_missing_file_uses_initial() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStatusStore::open(dir.path().join("status.json"), JobStatus::idle("fresh")).unwrap();
        assert_eq!(store.get(), JobStatus::idle("fresh"));
    }

    #[test]
    fn test_file_store_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.json");

        let written = JobStatus::completed(Some(Utc::now()), "Vectorization complete!");
        {
            let store = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
            store.set(written.clone());
        }

        let reopened = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
        assert_eq!(reopened.get(), written);
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_file_store_malformed_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
        assert_eq!(store.get().state, JobState::Idle);
    }

    #[test]
    fn test_recover_interrupted_rewrites_running() {
        let started = Utc::now();
        let store = MemoryStatusStore::new(JobStatus::running(started, "started"));

        assert!(recover_interrupted(&store));
        let status = store.get();
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.last_run, Some(started));
        assert_eq!(status.message, INTERRUPTED_MESSAGE);
    }

    #[test]
    fn test_recover_interrupted_leaves_terminal_states() {
        let store = MemoryStatusStore::new(JobStatus::completed(None, "done"));
        assert!(!recover_interrupted(&store));
        assert_eq!(store.get().state, JobState::Completed);
    }

    #[test]
    fn test_file_store_recovers_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        {
            let store = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
            store.set(JobStatus::running(Utc::now(), "started"));
        }

        let store = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
        assert!(recover_interrupted(&store));

        let persisted = FileStatusStore::open(&path, JobStatus::idle("fresh")).unwrap();
        assert_eq!(persisted.get().state, JobState::Error);
    }
}
