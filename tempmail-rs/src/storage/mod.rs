//! Disposable mailbox storage
//!
//! Every backend implements [`MailStore`] with the same semantics:
//! - [`memory`]: in-process map, bounded by a periodic eviction sweep
//! - [`redis`]: Redis lists with a sliding TTL per mailbox
//! - [`sql`]: SQLite table used as a soft-delete log
//!
//! [`selector`] builds exactly one of them from configuration.

pub mod memory;
pub mod redis;
pub mod selector;
pub mod sql;
pub mod types;

pub use memory::MemoryStore;
pub use self::redis::{RedisConnectOptions, RedisStore};
pub use selector::StorageSelector;
pub use sql::SqlStore;
pub use types::{MessageRecord, StorageMode};

use crate::error::Result;

/// Storage contract shared by all mailbox backends
///
/// Per recipient, consumption order is last-in-first-out: `consume_latest`
/// returns the most recently stored record that has not been consumed yet,
/// and never hands the same record to two callers.
#[async_trait::async_trait]
pub trait MailStore: Send + Sync {
    /// Append `record` to the mailbox of `to`
    async fn store(&self, to: &str, record: MessageRecord) -> Result<()>;

    /// Atomically remove and return the latest record for `to`
    async fn consume_latest(&self, to: &str) -> Result<Option<MessageRecord>>;

    /// Number of not-yet-consumed records across all mailboxes
    async fn count(&self) -> Result<usize>;

    /// Remove the globally oldest records until at most `limit` remain
    ///
    /// Backends whose native expiry already bounds their size return `Ok(0)`.
    async fn evict_oldest(&self, limit: usize) -> Result<usize>;

    /// Drop (or mark consumed) every record in every mailbox
    async fn clear_all(&self) -> Result<()>;

    /// True if `to` holds at least one not-yet-consumed record
    async fn has_mail(&self, to: &str) -> Result<bool>;

    fn mode(&self) -> StorageMode;
}
