//! Job store implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, info};

use subflow_models::{Job, JobError, JobId, JobKind, JobProgress, JobStatus, JobUpdate};

use crate::error::{StoreError, StoreResult};

/// Durable key-value persistence for job documents.
///
/// `update` performs a field-level merge, never a document replace:
/// concurrent updates for the same id may interleave, but a progress write
/// can never erase a concurrently-set `output_ref` or `error`. Reads must
/// reflect writes made from any server instance.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job document. Fails if the id already exists.
    async fn create(&self, job: &Job) -> StoreResult<()>;

    /// Fetch a job document by id.
    async fn get(&self, id: &JobId) -> StoreResult<Job>;

    /// Merge the present fields of `update` into the stored document,
    /// bumping `updated_at`. Absent fields are left untouched.
    async fn update(&self, id: &JobId, update: &JobUpdate) -> StoreResult<()>;

    /// List all stored jobs (housekeeping).
    async fn list(&self) -> StoreResult<Vec<Job>>;

    /// Delete a job document.
    async fn delete(&self, id: &JobId) -> StoreResult<()>;
}

// =============================================================================
// Redis implementation
// =============================================================================

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for job hashes
    pub key_prefix: String,
    /// TTL applied to job hashes so retired jobs expire
    pub job_ttl_secs: i64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "subflow:job:".to_string(),
            job_ttl_secs: 7 * 24 * 3600,
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("JOB_KEY_PREFIX")
                .unwrap_or_else(|_| "subflow:job:".to_string()),
            job_ttl_secs: std::env::var("JOB_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7 * 24 * 3600),
        }
    }
}

/// Job store backed by Redis hashes, one hash per job id.
///
/// Each document field maps to one hash field, so `HSET` gives per-field
/// last-writer-wins merge semantics without read-modify-write races.
pub struct RedisJobStore {
    client: redis::Client,
    config: RedisStoreConfig,
}

impl RedisJobStore {
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    /// Check connectivity (readiness probe).
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    fn key(&self, id: &JobId) -> String {
        format!("{}{}", self.config.key_prefix, id)
    }

    fn job_to_fields(job: &Job) -> StoreResult<Vec<(String, String)>> {
        let mut fields = vec![
            ("id".to_string(), job.id.to_string()),
            ("kind".to_string(), job.kind.as_str().to_string()),
            ("status".to_string(), job.status.as_str().to_string()),
            (
                "progress".to_string(),
                serde_json::to_string(&job.progress)?,
            ),
            ("input_ref".to_string(), job.input_ref.clone()),
            (
                "cancel_requested".to_string(),
                bool_field(job.cancel_requested),
            ),
            ("created_at".to_string(), job.created_at.to_rfc3339()),
            ("updated_at".to_string(), job.updated_at.to_rfc3339()),
        ];
        if let Some(ref output_ref) = job.output_ref {
            fields.push(("output_ref".to_string(), output_ref.clone()));
        }
        if let Some(ref error) = job.error {
            fields.push(("error".to_string(), serde_json::to_string(error)?));
        }
        Ok(fields)
    }

    fn update_to_fields(update: &JobUpdate) -> StoreResult<Vec<(String, String)>> {
        let mut fields = Vec::new();
        if let Some(status) = update.status {
            fields.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(ref progress) = update.progress {
            fields.push(("progress".to_string(), serde_json::to_string(progress)?));
        }
        if let Some(ref output_ref) = update.output_ref {
            fields.push(("output_ref".to_string(), output_ref.clone()));
        }
        if let Some(ref error) = update.error {
            fields.push(("error".to_string(), serde_json::to_string(error)?));
        }
        if let Some(cancel_requested) = update.cancel_requested {
            fields.push(("cancel_requested".to_string(), bool_field(cancel_requested)));
        }
        fields.push(("updated_at".to_string(), Utc::now().to_rfc3339()));
        Ok(fields)
    }

    fn fields_to_job(id: &str, map: HashMap<String, String>) -> StoreResult<Job> {
        let get = |field: &str| -> StoreResult<&String> {
            map.get(field)
                .ok_or_else(|| StoreError::corrupt(id, format!("missing field '{}'", field)))
        };

        let kind = JobKind::parse(get("kind")?)
            .ok_or_else(|| StoreError::corrupt(id, "unknown kind"))?;
        let status = JobStatus::parse(get("status")?)
            .ok_or_else(|| StoreError::corrupt(id, "unknown status"))?;
        let progress: JobProgress = serde_json::from_str(get("progress")?)?;
        let error: Option<JobError> = match map.get("error") {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        };
        let created_at = parse_timestamp(id, get("created_at")?)?;
        let updated_at = parse_timestamp(id, get("updated_at")?)?;

        Ok(Job {
            id: JobId::from_string(get("id")?.clone()),
            kind,
            status,
            progress,
            input_ref: get("input_ref")?.clone(),
            output_ref: map.get("output_ref").cloned(),
            error,
            cancel_requested: map
                .get("cancel_requested")
                .map(|v| v == "1")
                .unwrap_or(false),
            created_at,
            updated_at,
        })
    }
}

fn bool_field(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn parse_timestamp(id: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(id, format!("bad timestamp: {}", e)))
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.key(&job.id);

        let exists: bool = conn.exists(&key).await?;
        if exists {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }

        let fields = Self::job_to_fields(job)?;
        conn.hset_multiple::<_, _, _, ()>(&key, &fields).await?;
        conn.expire::<_, ()>(&key, self.config.job_ttl_secs).await?;

        info!(job_id = %job.id, kind = %job.kind, "Created job document");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Job> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.key(id);

        let map: HashMap<String, String> = conn.hgetall(&key).await?;
        if map.is_empty() {
            return Err(StoreError::not_found(id.to_string()));
        }

        Self::fields_to_job(id.as_str(), map)
    }

    async fn update(&self, id: &JobId, update: &JobUpdate) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.key(id);

        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(StoreError::not_found(id.to_string()));
        }

        let fields = Self::update_to_fields(update)?;
        conn.hset_multiple::<_, _, _, ()>(&key, &fields).await?;
        conn.expire::<_, ()>(&key, self.config.job_ttl_secs).await?;

        debug!(job_id = %id, fields = fields.len(), "Merged job update");
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Job>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = format!("{}*", self.config.key_prefix);

        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let mut jobs = Vec::with_capacity(keys.len());
        for key in keys {
            let map: HashMap<String, String> = conn.hgetall(&key).await?;
            if map.is_empty() {
                continue;
            }
            let id = key
                .strip_prefix(&self.config.key_prefix)
                .unwrap_or(&key)
                .to_string();
            jobs.push(Self::fields_to_job(&id, map)?);
        }

        Ok(jobs)
    }

    async fn delete(&self, id: &JobId) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(self.key(id)).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// In-process job store for tests and single-node use.
///
/// Shares merge semantics with the Redis store but offers no cross-instance
/// visibility; production deployments use `RedisJobStore`.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop jobs whose last update is older than `age` (housekeeping).
    pub async fn purge_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.updated_at >= cutoff);
        before - jobs.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.id.as_str()) {
            return Err(StoreError::AlreadyExists(job.id.to_string()));
        }
        jobs.insert(job.id.to_string(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.jobs
            .read()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::not_found(id.to_string()))
    }

    async fn update(&self, id: &JobId, update: &JobUpdate) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        update.apply(job);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Job>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &JobId) -> StoreResult<()> {
        self.jobs.write().await.remove(id.as_str());
        Ok(())
    }
}
