//! Shared execution context for job drivers.

use std::sync::Arc;

use subflow_models::{JobId, JobProgress, JobUpdate};
use subflow_store::{JobManager, StoreResult};
use subflow_translate::TranslationEngine;

use crate::config::WorkerConfig;

/// Everything a job driver needs: the manager for store access, the worker
/// configuration, and the translation engine.
#[derive(Clone)]
pub struct JobContext {
    pub manager: JobManager,
    pub config: Arc<WorkerConfig>,
    engine: Arc<dyn TranslationEngine>,
}

impl JobContext {
    pub fn new(
        manager: JobManager,
        config: WorkerConfig,
        engine: Arc<dyn TranslationEngine>,
    ) -> Self {
        Self {
            manager,
            config: Arc::new(config),
            engine,
        }
    }

    pub fn translation_engine(&self) -> Arc<dyn TranslationEngine> {
        Arc::clone(&self.engine)
    }

    /// One progress-flush tick: read the document, report whether
    /// cancellation was requested, and if not, write the given progress.
    pub async fn flush_tick(&self, id: &JobId, progress: JobProgress) -> StoreResult<bool> {
        let job = self.manager.get_job(id).await?;
        if job.cancel_requested {
            return Ok(true);
        }
        self.manager
            .update_job(id, &JobUpdate::processing(progress))
            .await?;
        Ok(false)
    }
}

/// Monotonic progress high-water mark.
///
/// FFmpeg restarts its clock on some stream transitions and translation
/// batches report independently; the displayed percentage must never move
/// backwards within one run.
#[derive(Debug, Default)]
pub struct ProgressGauge {
    high_water: u8,
}

impl ProgressGauge {
    pub fn observe(&mut self, percentage: u8) -> u8 {
        self.high_water = self.high_water.max(percentage.min(100));
        self.high_water
    }

    pub fn current(&self) -> u8 {
        self.high_water
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_never_regresses() {
        let mut gauge = ProgressGauge::default();
        assert_eq!(gauge.observe(10), 10);
        assert_eq!(gauge.observe(40), 40);
        assert_eq!(gauge.observe(25), 40);
        assert_eq!(gauge.observe(120), 100);
        assert_eq!(gauge.current(), 100);
    }
}
