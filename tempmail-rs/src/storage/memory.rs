//! In-process mailbox store
//!
//! All mailboxes live in one map behind a single `RwLock`. Every mutation,
//! including the read-tail-then-remove of [`MemoryStore::consume_latest`],
//! happens inside one write critical section.

use crate::error::Result;
use crate::storage::{MailStore, MessageRecord, StorageMode};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Initial capacity of a freshly created mailbox
const MAILBOX_CAPACITY: usize = 10;

pub struct MemoryStore {
    mailboxes: RwLock<HashMap<String, Vec<MessageRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Number of recipients with at least one pending record
    pub async fn mailbox_count(&self) -> usize {
        self.mailboxes.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MailStore for MemoryStore {
    async fn store(&self, to: &str, record: MessageRecord) -> Result<()> {
        let mut mailboxes = self.mailboxes.write().await;
        mailboxes
            .entry(to.to_string())
            .or_insert_with(|| Vec::with_capacity(MAILBOX_CAPACITY))
            .push(record);
        Ok(())
    }

    async fn consume_latest(&self, to: &str) -> Result<Option<MessageRecord>> {
        let mut mailboxes = self.mailboxes.write().await;

        let Some(mailbox) = mailboxes.get_mut(to) else {
            return Ok(None);
        };
        let latest = mailbox.pop();
        if mailbox.is_empty() {
            mailboxes.remove(to);
        }

        Ok(latest)
    }

    async fn count(&self) -> Result<usize> {
        let mailboxes = self.mailboxes.read().await;
        Ok(mailboxes.values().map(Vec::len).sum())
    }

    async fn evict_oldest(&self, limit: usize) -> Result<usize> {
        let mut mailboxes = self.mailboxes.write().await;

        let total: usize = mailboxes.values().map(Vec::len).sum();
        if total <= limit {
            return Ok(0);
        }
        let to_remove = total - limit;

        // (received_at, recipient, position in mailbox) for every pending record
        let mut entries: Vec<_> = mailboxes
            .iter()
            .flat_map(|(key, mailbox)| {
                mailbox
                    .iter()
                    .enumerate()
                    .map(move |(pos, record)| (record.received_at, key.as_str(), pos))
            })
            .collect();
        entries.sort_unstable();

        let mut doomed: HashMap<String, HashSet<usize>> = HashMap::new();
        for (_, key, pos) in entries.into_iter().take(to_remove) {
            doomed.entry(key.to_string()).or_default().insert(pos);
        }

        for (key, positions) in doomed {
            if let Some(mailbox) = mailboxes.get_mut(&key) {
                let mut pos = 0;
                mailbox.retain(|_| {
                    let keep = !positions.contains(&pos);
                    pos += 1;
                    keep
                });
                if mailbox.is_empty() {
                    mailboxes.remove(&key);
                }
            }
        }

        debug!("Evicted {} oldest records, {} remain", to_remove, limit);
        Ok(to_remove)
    }

    async fn clear_all(&self) -> Result<()> {
        self.mailboxes.write().await.clear();
        Ok(())
    }

    async fn has_mail(&self, to: &str) -> Result<bool> {
        let mailboxes = self.mailboxes.read().await;
        Ok(mailboxes.get(to).is_some_and(|mailbox| !mailbox.is_empty()))
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Memory
    }
}
