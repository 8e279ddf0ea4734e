//! Message record and storage mode types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One received email, as handed over by the SMTP intake
///
/// The serialized field names are the wire format of the Redis backend and
/// match mailboxes written by earlier deployments of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from: String,
    pub to: String,
    #[serde(rename = "title")]
    pub subject: String,
    #[serde(rename = "TextContent")]
    pub text_body: String,
    #[serde(rename = "HtmlContent")]
    pub html_body: String,
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        text_body: impl Into<String>,
        html_body: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text_body: text_body.into(),
            html_body: html_body.into(),
            received_at,
        }
    }
}

/// Which backend a [`crate::storage::MailStore`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    Redis,
    Sql,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Memory => "memory",
            StorageMode::Redis => "redis",
            StorageMode::Sql => "sql",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StorageMode {
    type Err = crate::error::MailError;

    /// An empty setting selects the memory backend
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "memory" => Ok(StorageMode::Memory),
            "redis" | "cache" => Ok(StorageMode::Redis),
            "sql" | "sqlite" | "relational" => Ok(StorageMode::Sql),
            other => Err(crate::error::MailError::Unconfigured(format!(
                "unsupported storage mode '{}', expected one of: memory, redis, sql",
                other
            ))),
        }
    }
}
