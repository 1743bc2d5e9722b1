use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::application::services::{ChunkIndexer, IndexingError};

/// Periodically drops chunks older than the retention window.
pub struct RetentionSweeper {
    indexer: Arc<ChunkIndexer>,
    retention: ChronoDuration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(indexer: Arc<ChunkIndexer>, retention_days: i64) -> Self {
        Self {
            indexer,
            retention: ChronoDuration::days(retention_days.max(1)),
            interval: Duration::from_secs(3600),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64, IndexingError> {
        let cutoff = self.cutoff(now);
        let removed = self.indexer.purge_older_than(cutoff).await?;
        if removed > 0 {
            info!(removed, cutoff = %cutoff, "Expired chunks removed");
        } else {
            debug!(cutoff = %cutoff, "No expired chunks");
        }
        Ok(removed)
    }

    /// Runs until the task is aborted. Failed sweeps are logged and retried
    /// on the next tick.
    pub async fn start(&self) {
        info!(
            retention_days = self.retention.num_days(),
            interval_secs = self.interval.as_secs(),
            "Starting retention sweeper"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once(Utc::now()).await {
                error!(error = %e, "Retention sweep failed");
            }
        }
    }
}
