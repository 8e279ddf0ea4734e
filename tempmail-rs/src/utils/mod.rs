//! Utility modules
//!
//! - [`email`]: Email address validation and the recipient domain allow-list

pub mod email;

pub use email::{is_allowed_domain, validate_email};
