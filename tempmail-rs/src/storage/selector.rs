//! Storage backend selection and the memory eviction task

use crate::config::StorageConfig;
use crate::error::{MailError, Result};
use crate::storage::{MailStore, MemoryStore, RedisStore, SqlStore, StorageMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Builds the single mailbox backend for the process and owns its maintenance
pub struct StorageSelector {
    store: Arc<dyn MailStore>,
    mode: StorageMode,
    eviction_interval: Duration,
    eviction_limit: usize,
}

impl StorageSelector {
    /// Construct the backend named by `config.mode`
    ///
    /// # Errors
    /// - [`MailError::Unconfigured`] for an unknown mode or a missing connection parameter
    /// - [`MailError::Unavailable`] if the selected cache/database cannot be reached
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let mode: StorageMode = config.mode.parse()?;

        let store: Arc<dyn MailStore> = match mode {
            StorageMode::Memory => {
                info!("Using in-memory mailbox storage");
                Arc::new(MemoryStore::new())
            }
            StorageMode::Redis => {
                let addr = required(config.redis.addr.as_deref(), "storage.redis.addr")?;
                let store = RedisStore::connect_with(
                    addr,
                    config.redis.password.as_deref(),
                    config.redis.db,
                    config.redis.connect_options(),
                )
                .await?;
                info!("Using Redis mailbox storage at {}, db {}", addr, config.redis.db);
                Arc::new(store)
            }
            StorageMode::Sql => {
                let url = required(config.sql.database_url.as_deref(), "storage.sql.database_url")?;
                let store = SqlStore::connect(url, config.sql.max_connections).await?;
                info!("Using SQL mailbox storage");
                Arc::new(store)
            }
        };

        Ok(Self::with_store(
            store,
            Duration::from_secs(config.memory.eviction_interval_secs),
            config.memory.eviction_limit,
        ))
    }

    /// Wrap an already constructed backend
    pub fn with_store(store: Arc<dyn MailStore>, eviction_interval: Duration, eviction_limit: usize) -> Self {
        let mode = store.mode();
        Self {
            store,
            mode,
            eviction_interval,
            eviction_limit,
        }
    }

    /// Shared handle to the active backend
    pub fn store(&self) -> Arc<dyn MailStore> {
        Arc::clone(&self.store)
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Start the periodic eviction sweep
    ///
    /// Only the memory backend needs one, so other modes return `None`. The
    /// sweep runs once immediately, then on every tick, until the process exits.
    pub fn spawn_eviction_task(&self) -> Option<JoinHandle<()>> {
        if self.mode != StorageMode::Memory {
            info!(
                "Storage mode {} expires mail natively, no eviction task started",
                self.mode
            );
            return None;
        }

        let store = self.store();
        let period = self.eviction_interval.max(Duration::from_millis(1));
        let limit = self.eviction_limit;

        info!(
            "Starting memory eviction task every {:?}, cap {} records",
            period, limit
        );

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                // The first tick completes immediately
                ticker.tick().await;
                run_eviction(store.as_ref(), limit).await;
            }
        }))
    }
}

/// One eviction sweep; failures are logged and retried on the next tick
pub async fn run_eviction(store: &dyn MailStore, limit: usize) {
    match store.evict_oldest(limit).await {
        Ok(0) => debug!("Eviction sweep: nothing to remove"),
        Ok(removed) => match store.count().await {
            Ok(remaining) => info!(
                "Eviction sweep removed {} mails, {} remaining",
                removed, remaining
            ),
            Err(e) => info!("Eviction sweep removed {} mails ({})", removed, e),
        },
        Err(e) => error!("Eviction sweep failed: {}", e),
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MailError::Unconfigured(format!("{} is required for this storage mode", name))),
    }
}
