use crate::config::Config;
use crate::error::Result;
use crate::smtp::session::{SessionConfig, SmtpSession};
use crate::storage::MailStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct SmtpServer {
    listen_addr: String,
    session_config: SessionConfig,
    store: Arc<dyn MailStore>,
}

impl SmtpServer {
    pub fn new(config: &Config, store: Arc<dyn MailStore>) -> Self {
        Self {
            listen_addr: config.smtp.listen_addr.clone(),
            session_config: SessionConfig {
                hostname: config.server.hostname.clone(),
                max_message_size: config.smtp.max_message_size,
                allowed_domains: Arc::new(config.server.allowed_domains.clone()),
            },
            store,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!("SMTP server listening on {}", self.listen_addr);
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    info!("New SMTP connection from {}", addr);

                    let session = SmtpSession::new(self.session_config.clone(), Arc::clone(&self.store));

                    tokio::spawn(async move {
                        if let Err(e) = session.handle(socket).await {
                            error!("Session error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
