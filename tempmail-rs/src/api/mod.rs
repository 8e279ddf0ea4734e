//! HTTP API for reading disposable inboxes
//!
//! - [`server`]: router and listener
//! - [`handlers`]: request handlers

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
