//! tempmail-rs: disposable inbox mail receiver
//!
//! Accepts mail over SMTP for a set of allowed domains and lets a client
//! consume the most recent message of an inbox over HTTP. Each message is
//! handed out once.
//!
//! # Storage
//!
//! Mailboxes live in one of three interchangeable backends behind
//! [`storage::MailStore`]:
//!
//! - **memory**: in-process, bounded by a periodic eviction sweep
//! - **redis**: Redis lists with a sliding 5 minute TTL
//! - **sql**: SQLite soft-delete log
//!
//! # Example
//!
//! ```no_run
//! use tempmail_rs::config::Config;
//! use tempmail_rs::storage::StorageSelector;
//! use tempmail_rs::smtp::SmtpServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let selector = StorageSelector::from_config(&config.storage).await?;
//!     selector.spawn_eviction_task();
//!
//!     let server = SmtpServer::new(&config, selector.store());
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`storage`]: Mailbox storage backends
//! - [`smtp`]: SMTP intake
//! - [`api`]: HTTP read endpoints
//! - [`utils`]: Address validation

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod smtp;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailError, Result};
pub use storage::{MailStore, MessageRecord, StorageMode};
