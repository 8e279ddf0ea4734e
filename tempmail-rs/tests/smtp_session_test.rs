//! SMTP intake tests over a real loopback socket

use std::sync::Arc;
use tempmail_rs::config::Config;
use tempmail_rs::smtp::SmtpServer;
use tempmail_rs::storage::{MailStore, MemoryStore, MessageRecord, StorageMode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const DOMAIN: &str = "tmp.test";

/// Start a server on an ephemeral port and return its address
async fn start_server(store: Arc<dyn MailStore>, max_message_size: usize) -> std::net::SocketAddr {
    let mut config = Config::default();
    config.server.hostname = "mx.tmp.test".to_string();
    config.server.allowed_domains = vec![DOMAIN.to_string()];
    config.smtp.max_message_size = max_message_size;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SmtpServer::new(&config, store);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    addr
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };
        let greeting = client.read_reply().await;
        assert!(greeting.starts_with("220"), "greeting: {}", greeting);
        client
    }

    /// Read a full (possibly multi-line) reply
    async fn read_reply(&mut self) -> String {
        let mut reply = String::new();
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            reply.push_str(&line);
            if line.len() < 4 || line.as_bytes()[3] != b'-' {
                return reply;
            }
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.writer.write_all(format!("{}\r\n", line).as_bytes()).await.unwrap();
        self.read_reply().await
    }

    async fn send_data(&mut self, body: &str) -> String {
        self.send_data_bytes(body.as_bytes()).await
    }

    async fn send_data_bytes(&mut self, body: &[u8]) -> String {
        self.writer.write_all(body).await.unwrap();
        self.writer.write_all(b"\r\n.\r\n").await.unwrap();
        self.read_reply().await
    }
}

fn message(subject: &str, body: &str) -> String {
    format!(
        "From: sender@example.com\r\nTo: box@{}\r\nSubject: {}\r\n\r\n{}",
        DOMAIN, subject, body
    )
}

#[tokio::test]
async fn test_delivers_to_recipient_mailbox() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    assert!(client.send("EHLO client.example.com").await.starts_with("250"));
    assert!(client.send("MAIL FROM:<sender@example.com>").await.starts_with("250"));
    assert!(client.send("RCPT TO:<box@tmp.test>").await.starts_with("250"));
    assert!(client.send("DATA").await.starts_with("354"));
    assert!(client.send_data(&message("Welcome", "Your code is 42")).await.starts_with("250"));
    assert!(client.send("QUIT").await.starts_with("221"));

    let mail: MessageRecord = store.consume_latest("box@tmp.test").await.unwrap().unwrap();
    assert_eq!(mail.from, "sender@example.com");
    assert_eq!(mail.to, "box@tmp.test");
    assert_eq!(mail.subject, "Welcome");
    assert!(mail.text_body.contains("Your code is 42"));
    assert_eq!(mail.html_body, "");
}

#[tokio::test]
async fn test_two_messages_in_one_session() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("HELO client.example.com").await;
    for subject in ["first", "second"] {
        assert!(client.send("MAIL FROM:<sender@example.com>").await.starts_with("250"));
        assert!(client.send("RCPT TO:<box@tmp.test>").await.starts_with("250"));
        assert!(client.send("DATA").await.starts_with("354"));
        assert!(client.send_data(&message(subject, "body")).await.starts_with("250"));
    }

    assert_eq!(store.count().await.unwrap(), 2);
    assert_eq!(store.consume_latest("box@tmp.test").await.unwrap().unwrap().subject, "second");
}

#[tokio::test]
async fn test_rejects_foreign_domain() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    assert!(client.send("RCPT TO:<box@elsewhere.test>").await.starts_with("550"));
    assert!(client.send("DATA").await.starts_with("503"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_single_recipient_per_transaction() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    assert!(client.send("RCPT TO:<one@tmp.test>").await.starts_with("250"));
    assert!(client.send("RCPT TO:<two@tmp.test>").await.starts_with("452"));
    client.send("DATA").await;
    assert!(client.send_data(&message("only one", "body")).await.starts_with("250"));

    assert!(store.has_mail("one@tmp.test").await.unwrap());
    assert!(!store.has_mail("two@tmp.test").await.unwrap());
}

#[tokio::test]
async fn test_commands_out_of_order() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(store, 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    // MAIL before HELO
    assert!(client.send("MAIL FROM:<sender@example.com>").await.starts_with("503"));
    client.send("HELO client.example.com").await;
    // DATA before RCPT
    client.send("MAIL FROM:<sender@example.com>").await;
    assert!(client.send("DATA").await.starts_with("503"));
    assert!(client.send("NOOP").await.starts_with("250"));
    assert!(client.send("FOO bar").await.starts_with("502"));
}

#[tokio::test]
async fn test_oversized_message_rejected() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 512).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.send("RCPT TO:<box@tmp.test>").await;
    client.send("DATA").await;
    let body = "x".repeat(80);
    let big = (0..20).map(|_| body.as_str()).collect::<Vec<_>>().join("\r\n");
    assert!(client.send_data(&message("big", &big)).await.starts_with("554"));

    // Session is still usable
    assert!(client.send("NOOP").await.starts_with("250"));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dot_unstuffing() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.send("RCPT TO:<box@tmp.test>").await;
    client.send("DATA").await;
    assert!(client.send_data(&message("dots", "..leading dot")).await.starts_with("250"));

    let mail = store.consume_latest("box@tmp.test").await.unwrap().unwrap();
    assert!(mail.text_body.starts_with(".leading dot"));
}

#[tokio::test]
async fn test_eight_bit_body_is_accepted() {
    let store: Arc<dyn MailStore> = Arc::new(MemoryStore::new());
    let addr = start_server(Arc::clone(&store), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.send("RCPT TO:<box@tmp.test>").await;
    client.send("DATA").await;

    let mut raw = format!(
        "From: sender@example.com\r\nTo: box@{}\r\nSubject: latin1\r\n\
         Content-Type: text/plain; charset=iso-8859-1\r\n\
         Content-Transfer-Encoding: 8bit\r\n\r\n",
        DOMAIN
    )
    .into_bytes();
    // "café" in ISO-8859-1 is not valid UTF-8
    raw.extend_from_slice(b"caf\xe9");
    assert!(client.send_data_bytes(&raw).await.starts_with("250"));

    // Session survives and the body is decoded by its charset
    assert!(client.send("NOOP").await.starts_with("250"));
    let mail = store.consume_latest("box@tmp.test").await.unwrap().unwrap();
    assert!(mail.text_body.contains("caf\u{e9}"), "{:?}", mail.text_body);
}

/// A store that is always down
struct DownStore;

#[async_trait::async_trait]
impl MailStore for DownStore {
    async fn store(&self, _to: &str, _record: MessageRecord) -> tempmail_rs::Result<()> {
        Err(tempmail_rs::MailError::Unavailable("connection refused".to_string()))
    }
    async fn consume_latest(&self, _to: &str) -> tempmail_rs::Result<Option<MessageRecord>> {
        Err(tempmail_rs::MailError::Unavailable("connection refused".to_string()))
    }
    async fn count(&self) -> tempmail_rs::Result<usize> {
        Err(tempmail_rs::MailError::Unavailable("connection refused".to_string()))
    }
    async fn evict_oldest(&self, _limit: usize) -> tempmail_rs::Result<usize> {
        Ok(0)
    }
    async fn clear_all(&self) -> tempmail_rs::Result<()> {
        Err(tempmail_rs::MailError::Unavailable("connection refused".to_string()))
    }
    async fn has_mail(&self, _to: &str) -> tempmail_rs::Result<bool> {
        Err(tempmail_rs::MailError::Unavailable("connection refused".to_string()))
    }
    fn mode(&self) -> StorageMode {
        StorageMode::Redis
    }
}

#[tokio::test]
async fn test_store_failure_is_not_accepted() {
    let addr = start_server(Arc::new(DownStore), 256 * 1024).await;
    let mut client = Client::connect(addr).await;

    client.send("EHLO client.example.com").await;
    client.send("MAIL FROM:<sender@example.com>").await;
    client.send("RCPT TO:<box@tmp.test>").await;
    client.send("DATA").await;
    assert!(client.send_data(&message("lost?", "body")).await.starts_with("451"));
}
