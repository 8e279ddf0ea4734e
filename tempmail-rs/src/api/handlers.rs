//! API request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::storage::{MailStore, MessageRecord};

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn MailStore>,
    pub allowed_domains: Vec<String>,
}

/// A consumed mail as shown to the inbox owner
///
/// Recipient and receipt time are deliberately left out.
#[derive(Debug, Serialize)]
pub struct MailView {
    pub from: String,
    pub title: String,
    #[serde(rename = "TextContent")]
    pub text_content: String,
    #[serde(rename = "HtmlContent")]
    pub html_content: String,
}

impl From<MessageRecord> for MailView {
    fn from(record: MessageRecord) -> Self {
        Self {
            from: record.from,
            title: record.subject,
            text_content: record.text_body,
            html_content: record.html_body,
        }
    }
}

/// `mail` is `null` when the mailbox is empty
#[derive(Debug, Serialize)]
pub struct MailResponse {
    pub mail: Option<MailView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedDomainsResponse {
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

/// GET /getMail/:address - Consume the most recent mail for an inbox
pub async fn get_mail(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    match state.store.consume_latest(&address).await {
        Ok(mail) => (
            StatusCode::OK,
            Json(MailResponse {
                mail: mail.map(MailView::from),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to fetch mail for {}: {}", address, e);
            let status = if e.is_unavailable() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(ApiError::new("Failed to fetch mail"))).into_response()
        }
    }
}

/// GET /getAllowedDomains - Domains the SMTP intake accepts
pub async fn allowed_domains(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(AllowedDomainsResponse {
        allowed_domains: state.allowed_domains.clone(),
    })
}

/// GET /health - Liveness probe
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        storage: state.store.mode().as_str(),
    })
}
