//! Background retention sweep for idle uploads.
//!
//! Every `interval` the sweeper lists the store and deletes objects that have
//! not been accessed within the retention window. Failures are logged and
//! skipped; the next pass picks up whatever is left.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RetentionConfig;

use super::counter::DownloadCounter;
use super::storage::BlobStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Objects examined.
    pub scanned: usize,
    /// Objects deleted.
    pub deleted: usize,
    /// Entries that could not be read or deleted.
    pub failed: usize,
}

/// Periodic deleter of idle objects.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    store: BlobStore,
    retention: Duration,
    interval: Duration,
    /// Counters to clear for deleted objects.
    counter: Option<Arc<DownloadCounter>>,
}

impl RetentionSweeper {
    /// Create a sweeper with an explicit window and interval.
    pub fn new(store: BlobStore, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
            counter: None,
        }
    }

    /// Clear download counts of the objects this sweeper deletes.
    pub fn with_counter(mut self, counter: Arc<DownloadCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Create a sweeper from configuration.
    pub fn from_config(store: BlobStore, config: &RetentionConfig) -> Self {
        Self::new(store, config.retention(), config.sweep_interval())
    }

    /// Retention window.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Run one pass, treating `now` as the current time.
    ///
    /// An object is deleted when it has been idle for strictly longer than the
    /// retention window.
    pub fn sweep_once(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match self.store.list() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Retention sweep could not list storage");
                report.failed += 1;
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Retention sweep skipped unreadable entry");
                    report.failed += 1;
                    continue;
                }
            };
            report.scanned += 1;

            // A last-access time in the future counts as fresh.
            let idle = now.duration_since(entry.last_access).unwrap_or_default();
            if idle <= self.retention {
                continue;
            }

            match self.store.delete(&entry.id) {
                Ok(true) => {
                    debug!(id = %entry.id, idle_days = idle.as_secs() / 86400, "Deleted idle file");
                    self.forget(&entry.id);
                    report.deleted += 1;
                }
                Ok(false) => {
                    debug!(id = %entry.id, "Idle file already gone");
                    self.forget(&entry.id);
                }
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Failed to delete idle file");
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn forget(&self, id: &str) {
        if let Some(counter) = &self.counter {
            counter.remove(id);
        }
    }

    /// Spawn the periodic sweep.
    ///
    /// The first pass happens one interval after start. Once `cancel` fires
    /// the loop exits; a pass already in progress finishes first, so awaiting
    /// the returned handle guarantees no sweep is still touching the store.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                interval_secs = self.interval.as_secs(),
                retention_days = self.retention.as_secs() / 86400,
                "Retention sweeper started"
            );

            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let sweeper = self.clone();
                match tokio::task::spawn_blocking(move || sweeper.sweep_once(SystemTime::now()))
                    .await
                {
                    Ok(report) if report.deleted > 0 || report.failed > 0 => {
                        info!(
                            scanned = report.scanned,
                            deleted = report.deleted,
                            failed = report.failed,
                            "Retention sweep finished"
                        );
                    }
                    Ok(report) => {
                        debug!(scanned = report.scanned, "Retention sweep: nothing to delete");
                    }
                    Err(e) => {
                        warn!(error = %e, "Retention sweep task failed");
                    }
                }
            }

            info!("Retention sweeper stopped");
        })
    }
}
