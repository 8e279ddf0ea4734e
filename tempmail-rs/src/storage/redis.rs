//! Redis-backed mailbox store
//!
//! Each mailbox is a Redis list under `mailbox:<recipient>`. New records are
//! pushed to the head and consumed from the head, so the list is a stack and
//! the newest record comes out first. Every push resets the list's TTL, so
//! idle mailboxes expire on their own while busy ones stay alive.
//!
//! There is no local locking: LPOP is atomic on the server, which is what keeps
//! two consumers from receiving the same record.

use crate::error::{MailError, Result};
use crate::storage::{MailStore, MessageRecord, StorageMode};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

/// Key prefix shared by all mailbox lists
pub const MAILBOX_PREFIX: &str = "mailbox:";

/// Lifetime of a mailbox after its most recent delivery
pub const MAILBOX_TTL: Duration = Duration::from_secs(5 * 60);

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 100;

/// Base delay between reconnect attempts, in milliseconds
const RETRY_FACTOR_MS: u64 = 50;

/// End of a mailbox list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
enum ListEnd {
    Head,
    Tail,
}

/// Where [`RedisStore::store`] pushes
const PUSH_END: ListEnd = ListEnd::Head;

/// Where [`RedisStore::consume_latest`] pops; must equal `PUSH_END` for newest-first
const POP_END: ListEnd = ListEnd::Head;

/// Connection limits; a dead or hung server surfaces as `Unavailable` within these
#[derive(Debug, Clone, Copy)]
pub struct RedisConnectOptions {
    pub connection_timeout: Duration,
    pub response_timeout: Duration,
    pub retries: usize,
}

impl Default for RedisConnectOptions {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(2),
            retries: 1,
        }
    }
}

impl RedisConnectOptions {
    /// Upper bound on how long the initial connect may take
    fn connect_deadline(&self) -> Duration {
        let attempts = self.retries as u32 + 1;
        let backoff = Duration::from_millis(RETRY_FACTOR_MS * 2u64.pow(self.retries.min(16) as u32 + 1));
        self.connection_timeout * attempts + backoff + Duration::from_millis(500)
    }
}

pub struct RedisStore {
    manager: ConnectionManager,
    ttl: Duration,
}

impl RedisStore {
    /// Connect to Redis with the default [`RedisConnectOptions`]
    ///
    /// `addr` is either `host:port` or a full `redis://` URL. When it is a bare
    /// address, `password` and `db` are folded into the connection URL.
    pub async fn connect(addr: &str, password: Option<&str>, db: i64) -> Result<Self> {
        Self::connect_with(addr, password, db, RedisConnectOptions::default()).await
    }

    pub async fn connect_with(
        addr: &str,
        password: Option<&str>,
        db: i64,
        options: RedisConnectOptions,
    ) -> Result<Self> {
        let url = connection_url(addr, password, db)?;
        let client = Client::open(url.as_str())
            .map_err(|e| MailError::Unconfigured(format!("Invalid Redis address: {}", e)))?;

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(options.retries)
            .set_exponent_base(2)
            .set_factor(RETRY_FACTOR_MS)
            .set_connection_timeout(options.connection_timeout)
            .set_response_timeout(options.response_timeout);

        let deadline = options.connect_deadline();
        let manager = tokio::time::timeout(deadline, ConnectionManager::new_with_config(client, config))
            .await
            .map_err(|_| {
                MailError::Unavailable(format!("Redis at {} did not answer within {:?}", addr, deadline))
            })??;

        info!("Connected to Redis at {} (db {})", addr, db);

        Ok(Self {
            manager,
            ttl: MAILBOX_TTL,
        })
    }

    /// Override the mailbox TTL (mainly useful for tests)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn mailbox_key(to: &str) -> String {
        format!("{}{}", MAILBOX_PREFIX, to)
    }

    /// All mailbox keys, walked with SCAN so large keyspaces never block the server
    async fn mailbox_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", MAILBOX_PREFIX);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

fn connection_url(addr: &str, password: Option<&str>, db: i64) -> Result<String> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(MailError::Unconfigured("Redis address is empty".to_string()));
    }
    if addr.starts_with("redis://") || addr.starts_with("rediss://") {
        return Ok(addr.to_string());
    }

    let mut url = url::Url::parse(&format!("redis://{}/{}", addr, db))
        .map_err(|e| MailError::Unconfigured(format!("Invalid Redis address '{}': {}", addr, e)))?;
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| MailError::Unconfigured(format!("Cannot attach password to '{}'", addr)))?;
    }
    Ok(url.to_string())
}

#[async_trait::async_trait]
impl MailStore for RedisStore {
    async fn store(&self, to: &str, record: MessageRecord) -> Result<()> {
        let mut conn = self.manager.clone();
        let key = Self::mailbox_key(to);
        let payload = serde_json::to_string(&record)?;

        // Whole milliseconds, never zero: PEXPIRE 0 would delete the mailbox
        let ttl_ms = self.ttl.as_millis().clamp(1, i64::MAX as u128) as i64;

        let mut pipe = redis::pipe();
        pipe.atomic();
        match PUSH_END {
            ListEnd::Head => pipe.lpush(&key, payload),
            ListEnd::Tail => pipe.rpush(&key, payload),
        };
        let _: () = pipe
            .ignore()
            .pexpire(&key, ttl_ms)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!("Pushed record to {}", key);
        Ok(())
    }

    async fn consume_latest(&self, to: &str) -> Result<Option<MessageRecord>> {
        let mut conn = self.manager.clone();
        let key = Self::mailbox_key(to);

        let payload: Option<String> = match POP_END {
            ListEnd::Head => conn.lpop(&key, None).await?,
            ListEnd::Tail => conn.rpop(&key, None).await?,
        };
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<usize> {
        let mut conn = self.manager.clone();
        let mut total = 0;

        for key in self.mailbox_keys().await? {
            let len: usize = conn.llen(&key).await?;
            total += len;
        }

        Ok(total)
    }

    async fn evict_oldest(&self, _limit: usize) -> Result<usize> {
        // Mailbox TTLs already bound the keyspace
        Ok(0)
    }

    async fn clear_all(&self) -> Result<()> {
        let keys = self.mailbox_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.manager.clone();
        let _: () = conn.del(&keys).await?;

        info!("Cleared {} Redis mailboxes", keys.len());
        Ok(())
    }

    async fn has_mail(&self, to: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let len: usize = conn.llen(Self::mailbox_key(to)).await?;
        Ok(len > 0)
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Redis
    }
}
