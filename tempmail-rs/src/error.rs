use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    /// The backing cache or database could not be reached or failed mid-operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Unknown storage mode or a missing connection parameter
    #[error("Storage not configured: {0}")]
    Unconfigured(String),

    /// A stored payload or row could not be decoded
    #[error("Malformed stored message: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SMTP protocol error: {0}")]
    SmtpProtocol(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    /// True for transport failures, which callers must not treat as "no mail"
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MailError::Unavailable(_))
    }
}

impl From<sqlx::Error> for MailError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                MailError::Malformed(err.to_string())
            }
            other => MailError::Unavailable(format!("Database error: {}", other)),
        }
    }
}

impl From<redis::RedisError> for MailError {
    fn from(err: redis::RedisError) -> Self {
        MailError::Unavailable(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        MailError::Malformed(err.to_string())
    }
}

impl From<config::ConfigError> for MailError {
    fn from(err: config::ConfigError) -> Self {
        MailError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
