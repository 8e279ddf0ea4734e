//! Receive-only SMTP intake (RFC 5321 subset)
//!
//! - [`server`]: TCP accept loop, one task per session
//! - [`session`]: SMTP session state machine and message decoding
//! - [`commands`]: SMTP command parsing

pub mod commands;
pub mod server;
pub mod session;

pub use commands::SmtpCommand;
pub use server::SmtpServer;
pub use session::{parse_message, SessionConfig, SmtpSession};
