use crate::error::{MailError, Result};
use crate::smtp::commands::SmtpCommand;
use crate::storage::{MailStore, MessageRecord};
use crate::utils::{is_allowed_domain, validate_email};
use chrono::Utc;
use mail_parser::{MessageParser, PartType};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Maximum line length in SMTP protocol (RFC 5321)
const MAX_LINE_LENGTH: usize = 1000;

/// Timeout for reading a command line
const COMMAND_TIMEOUT: Duration = Duration::from_secs(300); // 5 minutes

/// Timeout for reading DATA content
const DATA_TIMEOUT: Duration = Duration::from_secs(600); // 10 minutes

/// Maximum number of errors before disconnecting
const MAX_ERRORS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
enum SmtpState {
    Fresh,
    Greeted,
    MailFrom,
    RcptTo,
    Data,
}

/// Settings shared by every session of one server
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub hostname: String,
    pub max_message_size: usize,
    /// Recipient domains accepted by RCPT; empty accepts all
    pub allowed_domains: Arc<Vec<String>>,
}

/// Receive-only SMTP session for disposable inboxes
///
/// Each transaction has exactly one recipient. At the end of DATA the message
/// is decoded and handed to the mailbox store under that recipient.
pub struct SmtpSession {
    state: SmtpState,
    from: Option<String>,
    to: Option<String>,
    data: Vec<u8>,
    config: SessionConfig,
    store: Arc<dyn MailStore>,
    error_count: usize,
}

impl SmtpSession {
    pub fn new(config: SessionConfig, store: Arc<dyn MailStore>) -> Self {
        Self {
            state: SmtpState::Fresh,
            from: None,
            to: None,
            data: Vec::new(),
            config,
            store,
            error_count: 0,
        }
    }

    /// Drive the session to completion on `stream`
    pub async fn handle<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf_reader = BufReader::new(stream);
        buf_reader
            .write_all(format!("220 {} ESMTP Service Ready\r\n", self.config.hostname).as_bytes())
            .await?;

        let mut line = String::new();

        loop {
            // Disconnect abusive clients
            if self.error_count >= MAX_ERRORS {
                warn!("Too many errors, disconnecting");
                buf_reader
                    .write_all(b"421 Too many errors, closing connection\r\n")
                    .await?;
                return Ok(());
            }

            line.clear();

            let n = match timeout(COMMAND_TIMEOUT, buf_reader.read_line(&mut line)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    error!("IO error reading line: {}", e);
                    return Err(e.into());
                }
                Err(_) => {
                    warn!("Command timeout, disconnecting");
                    buf_reader
                        .write_all(b"421 Timeout, closing connection\r\n")
                        .await?;
                    return Ok(());
                }
            };

            if n == 0 {
                debug!("Client disconnected");
                return Ok(());
            }

            if line.len() > MAX_LINE_LENGTH {
                error!("Line too long: {} bytes", line.len());
                buf_reader.write_all(b"500 Line too long\r\n").await?;
                self.error_count += 1;
                continue;
            }

            let line_trimmed = line.trim_end();
            debug!("Received: {}", line_trimmed);

            let cmd = match SmtpCommand::parse(line_trimmed) {
                Ok(cmd) => cmd,
                Err(e) => {
                    error!("Command parse error: {}", e);
                    buf_reader
                        .write_all(b"501 Syntax error in parameters or arguments\r\n")
                        .await?;
                    self.error_count += 1;
                    continue;
                }
            };

            let response = self.handle_command(cmd);
            buf_reader.write_all(response.as_bytes()).await?;

            if response.starts_with("221") {
                return Ok(());
            }
            if response.starts_with('5') {
                self.error_count += 1;
            }

            if self.state == SmtpState::Data {
                let reply = match self.receive_data(&mut buf_reader).await {
                    Ok(()) => match self.deliver().await {
                        Ok(()) => "250 OK: Message accepted\r\n".to_string(),
                        Err(e) => {
                            error!("Failed to store message: {}", e);
                            "451 Requested action aborted: local error in processing\r\n"
                                .to_string()
                        }
                    },
                    Err(MailError::Io(e)) => return Err(MailError::Io(e)),
                    Err(e) => {
                        warn!("Error receiving data: {}", e);
                        self.error_count += 1;
                        format!("554 {}\r\n", e)
                    }
                };
                buf_reader.write_all(reply.as_bytes()).await?;
                self.reset_transaction();
            }
        }
    }

    fn handle_command(&mut self, cmd: SmtpCommand) -> String {
        match (&self.state, cmd) {
            (_, SmtpCommand::Helo(domain)) => {
                info!("HELO from {}", domain);
                self.reset_transaction();
                format!("250 {} Hello {}\r\n", self.config.hostname, domain)
            }
            (_, SmtpCommand::Ehlo(domain)) => {
                info!("EHLO from {}", domain);
                self.reset_transaction();
                format!(
                    "250-{} Hello {}\r\n250-SIZE {}\r\n250 HELP\r\n",
                    self.config.hostname, domain, self.config.max_message_size
                )
            }
            (SmtpState::Greeted, SmtpCommand::MailFrom(from)) => {
                // Null reverse-path is legal for bounces
                if !from.is_empty() {
                    if let Err(e) = validate_email(&from) {
                        return format!("553 {}\r\n", e);
                    }
                }
                debug!("MAIL FROM: {}", from);
                self.from = Some(from);
                self.state = SmtpState::MailFrom;
                "250 OK\r\n".to_string()
            }
            (SmtpState::MailFrom, SmtpCommand::RcptTo(to)) => {
                if let Err(e) = validate_email(&to) {
                    return format!("553 {}\r\n", e);
                }
                if !is_allowed_domain(&to, &self.config.allowed_domains) {
                    warn!("Rejecting recipient outside allowed domains: {}", to);
                    return "550 Relay not permitted\r\n".to_string();
                }
                debug!("RCPT TO: {}", to);
                self.to = Some(to);
                self.state = SmtpState::RcptTo;
                "250 OK\r\n".to_string()
            }
            (SmtpState::RcptTo, SmtpCommand::RcptTo(_)) => {
                "452 Too many recipients (max 1)\r\n".to_string()
            }
            (SmtpState::RcptTo, SmtpCommand::Data) => {
                self.state = SmtpState::Data;
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n".to_string()
            }
            (_, SmtpCommand::Rset) => {
                self.reset_transaction();
                "250 OK\r\n".to_string()
            }
            (_, SmtpCommand::Noop) => "250 OK\r\n".to_string(),
            (_, SmtpCommand::Quit) => {
                format!("221 {} closing connection\r\n", self.config.hostname)
            }
            (_, SmtpCommand::Unknown(cmd)) => {
                warn!("Unknown command: {}", cmd);
                "502 Command not implemented\r\n".to_string()
            }
            _ => "503 Bad sequence of commands\r\n".to_string(),
        }
    }

    /// Collect message content up to the terminating `.` line
    async fn receive_data<S>(&mut self, buf_reader: &mut BufReader<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Bytes, not String: 8-bit bodies need not be valid UTF-8
        let mut line: Vec<u8> = Vec::new();
        let mut too_large = false;

        loop {
            line.clear();

            let n = match timeout(DATA_TIMEOUT, buf_reader.read_until(b'\n', &mut line)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(MailError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "Timeout during DATA",
                    )))
                }
            };

            if n == 0 {
                return Err(MailError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Connection closed during DATA",
                )));
            }

            if line.as_slice() == b".\r\n" || line.as_slice() == b".\n" || line.as_slice() == b"." {
                break;
            }

            // Keep reading to the terminator so the session stays in sync
            if too_large || self.data.len() + line.len() > self.config.max_message_size {
                too_large = true;
                continue;
            }

            // Transparency: a leading dot was doubled by the client
            let content = line.strip_prefix(b".").unwrap_or(&line[..]);
            self.data.extend_from_slice(content);
        }

        if too_large {
            warn!("Message exceeds {} bytes", self.config.max_message_size);
            return Err(MailError::SmtpProtocol(format!(
                "Message too large (max {} bytes)",
                self.config.max_message_size
            )));
        }
        if self.data.is_empty() {
            return Err(MailError::SmtpProtocol("Empty message".to_string()));
        }

        info!("End of DATA received, total size: {} bytes", self.data.len());
        Ok(())
    }

    async fn deliver(&mut self) -> Result<()> {
        let (Some(from), Some(to)) = (self.from.as_deref(), self.to.as_deref()) else {
            return Err(MailError::SmtpProtocol("No sender or recipient".to_string()));
        };

        let record = parse_message(from, to, &self.data)?;
        info!("Storing email from {} to {}", from, to);
        self.store.store(to, record).await
    }

    fn reset_transaction(&mut self) {
        self.from = None;
        self.to = None;
        self.data.clear();
        self.state = SmtpState::Greeted;
    }
}

/// Decode raw message bytes into a [`MessageRecord`] received now
///
/// Missing subject or body parts become empty strings.
pub fn parse_message(from: &str, to: &str, raw: &[u8]) -> Result<MessageRecord> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::SmtpProtocol("Unparseable message".to_string()))?;

    let text_body = message
        .text_part(0)
        .and_then(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    let html_body = message
        .html_part(0)
        .and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
        .unwrap_or_default();

    Ok(MessageRecord::new(
        from,
        to,
        message.subject().unwrap_or_default(),
        text_body,
        html_body,
        Utc::now(),
    ))
}
