//! API Server - HTTP server exposing the inbox read endpoints

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState};
use crate::error::Result;
use crate::storage::MailStore;

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(store: Arc<dyn MailStore>, allowed_domains: Vec<String>, addr: String) -> Self {
        let state = Arc::new(AppState {
            store,
            allowed_domains,
        });

        Self { state, addr }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/getAllowedDomains", get(handlers::allowed_domains))
            .route("/getMail/:address", get(handlers::get_mail))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Start the API server
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("API server listening on {}", self.addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
