use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::{QueueDocument, QueueError, QueueStore};
use shared_config::AppConfig;

const DEFAULT_KEY_PREFIX: &str = "queue:doctor:";
const DEFAULT_POOL_SIZE: usize = 16;

/// Queue documents stored as JSON strings, one key per doctor.
/// Conditional writes use `WATCH` + `MULTI`/`EXEC`.
pub struct RedisQueueStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisQueueStore {
    pub async fn new(config: &AppConfig) -> Result<Self, QueueError> {
        let redis_url = config.redis_url.clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        Self::connect(&redis_url).await
    }

    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        Self::connect_with_pool_size(redis_url, DEFAULT_POOL_SIZE).await
    }

    pub async fn connect_with_pool_size(redis_url: &str, max_size: usize) -> Result<Self, QueueError> {
        let mut cfg = Config::from_url(redis_url);
        cfg.pool = Some(PoolConfig::new(max_size));
        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            QueueError::StoreUnavailable(format!("Failed to create Redis pool: {}", e))
        })?;

        // Test connection
        let mut conn = pool.get().await.map_err(|e| {
            QueueError::StoreUnavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis queue store initialized successfully");

        Ok(Self {
            pool,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    /// Namespace all keys, e.g. to isolate test runs sharing one server.
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = format!("{}{}", prefix, DEFAULT_KEY_PREFIX);
        self
    }

    pub fn document_key(&self, doctor_id: &str) -> String {
        format!("{}{}", self.key_prefix, doctor_id)
    }

    /// Remove every document under this store's prefix.
    pub async fn clear(&self) -> Result<u64, QueueError> {
        let mut conn = self.get_connection().await?;
        let keys: Vec<String> = conn.keys(format!("{}*", self.key_prefix)).await?;
        let removed = keys.len() as u64;

        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }

        debug!("Cleared {} queue documents", removed);
        Ok(removed)
    }

    async fn get_connection(&self) -> Result<Connection, QueueError> {
        self.pool.get().await.map_err(|e| {
            QueueError::StoreUnavailable(format!("Failed to get Redis connection: {}", e))
        })
    }

    /// Pooled connections are reused, so a WATCH must never outlive the call that set it.
    async fn unwatch(conn: &mut Connection) {
        let result: redis::RedisResult<()> = redis::cmd("UNWATCH").query_async(conn).await;
        if let Err(e) = result {
            warn!("UNWATCH failed: {}", e);
        }
    }

    async fn stored_version(conn: &mut Connection, key: &str) -> Result<u64, QueueError> {
        let raw: Option<String> = conn.get(key).await?;
        match raw.as_deref() {
            Some(data) => Ok(Self::decode(data)?.version),
            None => Ok(0),
        }
    }

    fn decode(raw: &str) -> Result<QueueDocument, QueueError> {
        serde_json::from_str(raw).map_err(|e| {
            QueueError::StoreError(format!("Corrupt queue document: {}", e))
        })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn load(&self, doctor_id: &str) -> Result<Option<QueueDocument>, QueueError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.document_key(doctor_id)).await?;

        raw.as_deref().map(Self::decode).transpose()
    }

    async fn compare_and_swap(&self, document: &QueueDocument, expected_version: u64) -> Result<bool, QueueError> {
        let payload = serde_json::to_string(document)?;
        let mut conn = self.get_connection().await?;
        let key = self.document_key(&document.doctor_id);

        let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut conn).await?;

        let stored_version = match Self::stored_version(&mut conn, &key).await {
            Ok(version) => version,
            Err(e) => {
                Self::unwatch(&mut conn).await;
                return Err(e);
            }
        };

        if stored_version != expected_version {
            Self::unwatch(&mut conn).await;
            debug!(
                "Version mismatch for doctor {}: stored {}, expected {}",
                document.doctor_id, stored_version, expected_version
            );
            return Ok(false);
        }

        // EXEC replies nil when the watched key changed after WATCH.
        let committed: Option<redis::Value> = redis::pipe()
            .atomic()
            .set(&key, payload)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if committed.is_none() {
            debug!("Transaction aborted for doctor {}: key modified concurrently", document.doctor_id);
        }

        Ok(committed.is_some())
    }
}
