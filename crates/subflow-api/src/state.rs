//! Application state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use subflow_store::{JobManager, RedisJobStore};
use subflow_translate::{GeminiEngine, TranslateError, TranslateResult, TranslationEngine};
use subflow_worker::{JobContext, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub manager: JobManager,
    pub worker_ctx: JobContext,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(RedisJobStore::from_env()?);
        store.ping().await?;

        let manager = JobManager::new(store);
        let worker_config = WorkerConfig::from_env();

        let engine: Arc<dyn TranslationEngine> = match GeminiEngine::from_env() {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                warn!("Translation engine unavailable ({}); translate jobs will fail", e);
                Arc::new(DisabledEngine)
            }
        };

        let worker_ctx = JobContext::new(manager.clone(), worker_config, engine);

        Ok(Self {
            config,
            manager,
            worker_ctx,
        })
    }

    /// State wired to explicit components (tests).
    pub fn with_parts(config: ApiConfig, manager: JobManager, worker_ctx: JobContext) -> Self {
        Self {
            config,
            manager,
            worker_ctx,
        }
    }
}

/// Stand-in engine used when no API key is configured; every call fails
/// with the configuration error instead of panicking at startup.
struct DisabledEngine;

#[async_trait]
impl TranslationEngine for DisabledEngine {
    async fn translate_batch(
        &self,
        _texts: &[String],
        _source_lang: &str,
        _target_lang: &str,
    ) -> TranslateResult<String> {
        Err(TranslateError::MissingApiKey)
    }
}
