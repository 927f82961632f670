//! Periodic organize runs on a dedicated thread.
//!
//! Each run rescans the root and re-invokes the organize pipeline under
//! the index mutex. Cancellation is cooperative: it wakes the waiting
//! thread and takes effect before the next run, never in the middle of
//! one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TidyError};
use crate::manager::FileSystemIndex;
use crate::types::OperationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleDecision {
    Run,
    Shutdown,
}

#[derive(Debug, Default)]
struct ScheduleSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl ScheduleSignal {
    /// Blocks until `interval` elapses or the schedule is cancelled.
    fn wait_for_run(&self, interval: Duration) -> ScheduleDecision {
        let mut cancelled = self.cancelled.lock();
        match Instant::now().checked_add(interval) {
            Some(deadline) => {
                while !*cancelled {
                    if self.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while !*cancelled {
                    self.condvar.wait(&mut cancelled);
                }
            }
        }

        if *cancelled {
            ScheduleDecision::Shutdown
        } else {
            ScheduleDecision::Run
        }
    }

    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.condvar.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }
}

/// Handle to a running periodic organize task. Dropping it stops the task.
#[derive(Debug)]
pub struct OrganizeScheduler {
    root: PathBuf,
    signal: Arc<ScheduleSignal>,
    runs: Arc<AtomicU64>,
    join_handle: Option<JoinHandle<()>>,
}

impl OrganizeScheduler {
    /// Starts organizing `root` at the index's configured interval.
    pub fn start(index: Arc<Mutex<FileSystemIndex>>, root: PathBuf) -> Result<Self> {
        let interval = index.lock().config().schedule_interval();
        Self::with_interval(index, root, interval)
    }

    pub fn with_interval(
        index: Arc<Mutex<FileSystemIndex>>,
        root: PathBuf,
        interval: Duration,
    ) -> Result<Self> {
        let signal = Arc::new(ScheduleSignal::default());
        let runs = Arc::new(AtomicU64::new(0));

        let signal_for_thread = Arc::clone(&signal);
        let runs_for_thread = Arc::clone(&runs);
        let root_for_thread = root.clone();
        let join_handle = thread::Builder::new()
            .name("tidyfs-organize".to_string())
            .spawn(move || loop {
                match signal_for_thread.wait_for_run(interval) {
                    ScheduleDecision::Shutdown => break,
                    ScheduleDecision::Run => {
                        match run_once(&index, &root_for_thread) {
                            Ok(report) => {
                                tracing::info!(
                                    "scheduled organize of {}: {report}",
                                    root_for_thread.display()
                                );
                            }
                            Err(error) => {
                                tracing::warn!(
                                    "scheduled organize of {} failed: {error}",
                                    root_for_thread.display()
                                );
                            }
                        }
                        runs_for_thread.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .map_err(|error| {
                TidyError::Internal(format!("failed to spawn organize scheduler: {error}"))
            })?;

        tracing::debug!(
            "organize scheduler started for {} every {}s",
            root.display(),
            interval.as_secs()
        );
        Ok(Self {
            root,
            signal,
            runs,
            join_handle: Some(join_handle),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of runs completed so far, failed runs included.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Prevents any further run. A run already in progress finishes.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Cancels and waits for the worker thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.signal.cancel();
        if let Some(handle) = self.join_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("organize scheduler for {} panicked", self.root.display());
            }
        }
    }
}

impl Drop for OrganizeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_once(index: &Mutex<FileSystemIndex>, root: &Path) -> Result<OperationReport> {
    let mut index = index.lock();
    let dir = index.scan(root)?;
    index.organize(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::config::TidyConfig;

    fn shared_index(state: &Path) -> Arc<Mutex<FileSystemIndex>> {
        let config = TidyConfig {
            cache_dir: state.to_path_buf(),
            ..TidyConfig::default()
        };
        Arc::new(Mutex::new(FileSystemIndex::new(config)))
    }

    #[test]
    fn runs_organize_on_each_tick() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        fs::write(data.path().join("report.pdf"), "pdf").expect("write");
        let index = shared_index(state.path());

        let scheduler = OrganizeScheduler::with_interval(
            Arc::clone(&index),
            data.path().to_path_buf(),
            Duration::from_millis(10),
        )
        .expect("start");

        let deadline = Instant::now() + Duration::from_secs(10);
        while scheduler.runs() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.stop();

        assert!(data.path().join("Documents/report.pdf").exists());
        assert!(!data.path().join("report.pdf").exists());
    }

    #[test]
    fn cancel_wakes_the_worker_before_the_first_run() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        fs::write(data.path().join("report.pdf"), "pdf").expect("write");
        let index = shared_index(state.path());

        let scheduler = OrganizeScheduler::with_interval(
            index,
            data.path().to_path_buf(),
            Duration::from_secs(3600),
        )
        .expect("start");
        scheduler.cancel();
        assert!(scheduler.is_cancelled());

        // Would block for the full hour if cancel did not wake the wait.
        let started = Instant::now();
        let runs = scheduler.runs();
        scheduler.stop();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(runs, 0);
        assert!(data.path().join("report.pdf").exists());
    }

    #[test]
    fn drop_stops_the_worker() {
        let data = TempDir::new().expect("tempdir");
        let state = TempDir::new().expect("tempdir");
        let index = shared_index(state.path());

        let scheduler = OrganizeScheduler::start(Arc::clone(&index), data.path().to_path_buf())
            .expect("start");
        drop(scheduler);

        // The worker released its clone of the index.
        assert_eq!(Arc::strong_count(&index), 1);
    }
}
