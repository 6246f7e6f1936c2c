//! Outbound email over SMTP.
//!
//! The session is driven by hand: greeting, `EHLO`, `STARTTLS` when the
//! server offers it, optional `AUTH LOGIN`, `MAIL FROM`, `RCPT TO`, `DATA`,
//! `QUIT`. Command builders are pure functions so the wire format can be
//! checked without a server. Credentials are only sent over TLS unless
//! `allow_plaintext_auth` is set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

use tasklane_core::task::Task;

use crate::error::{AdapterError, Result};

pub const DEFAULT_SMTP_PORT: u16 = 587;
const SENDER_NAME: &str = "Task Manager";
const EHLO_DOMAIN: &str = "tasklane.local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Open a session, greet and authenticate, then hang up.
    async fn verify_connection(&self) -> bool;

    /// Envelope sender used for outgoing messages.
    fn sender(&self) -> &str;
}

// ---------------------------------------------------------------------------
// SMTP command builders
// ---------------------------------------------------------------------------

pub fn smtp_ehlo_command(domain: &str) -> String {
    format!("EHLO {domain}\r\n")
}

pub fn smtp_auth_login_command() -> String {
    "AUTH LOGIN\r\n".to_string()
}

pub fn smtp_base64_encode(input: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(input)
}

pub fn smtp_mail_from_command(from: &str) -> String {
    format!("MAIL FROM:<{from}>\r\n")
}

pub fn smtp_rcpt_to_command(to: &str) -> String {
    format!("RCPT TO:<{to}>\r\n")
}

pub fn smtp_starttls_command() -> String {
    "STARTTLS\r\n".to_string()
}

pub fn smtp_data_command() -> String {
    "DATA\r\n".to_string()
}

pub fn smtp_quit_command() -> String {
    "QUIT\r\n".to_string()
}

/// Normalise line endings to CRLF and escape lines that start with a dot.
pub fn dot_stuff(body: &str) -> String {
    body.replace("\r\n", "\n")
        .split('\n')
        .map(|line| {
            if line.starts_with('.') {
                format!(".{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Single-line header value: runs of control characters (CR and LF
/// included) collapse to one space, and non-ASCII values become an RFC 2047
/// encoded-word.
fn encode_header(value: &str) -> String {
    let mut line = String::with_capacity(value.len());
    let mut in_control = false;
    for c in value.chars() {
        if c.is_control() {
            if !in_control {
                line.push(' ');
            }
            in_control = true;
        } else {
            line.push(c);
            in_control = false;
        }
    }
    let line = line.trim();
    if line.is_ascii() {
        line.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", smtp_base64_encode(line))
    }
}

/// Build the full `DATA` payload: headers, a `multipart/alternative` body with
/// text and HTML parts, and the terminating `.` line.
pub fn smtp_message_data(message: &EmailMessage, boundary: &str, date: &str) -> String {
    let body = format!(
        "--{boundary}\r\n\
         Content-Type: text/plain; charset=UTF-8\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         \r\n\
         {text}\r\n\
         --{boundary}\r\n\
         Content-Type: text/html; charset=UTF-8\r\n\
         Content-Transfer-Encoding: 8bit\r\n\
         \r\n\
         {html}\r\n\
         --{boundary}--",
        text = message.text.trim(),
        html = message.html.trim(),
    );
    format!(
        "From: {SENDER_NAME} <{from}>\r\n\
         To: {to}\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/alternative; boundary=\"{boundary}\"\r\n\
         \r\n\
         {body}\r\n\
         .\r\n",
        from = message.from,
        to = message.to,
        subject = encode_header(&message.subject),
        body = dot_stuff(&body),
    )
}

/// Parse the status code from the first line of a reply.
fn reply_status(lines: &[String]) -> u16 {
    lines
        .first()
        .and_then(|l| l.get(..3))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0)
}

/// Read one SMTP reply (possibly multi-line) until the final status line.
async fn smtp_read_response<R>(reader: &mut R, timeout: Duration) -> Result<(u16, Vec<String>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let mut line = String::new();
        match tokio::time::timeout_at(deadline, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(_)) => {
                let trimmed = line.trim_end().to_string();
                debug!(smtp_line = %trimmed, "SMTP response line");
                // "NNN-text" continues, "NNN text" ends the reply.
                let last = trimmed.as_bytes().get(3).copied() != Some(b'-');
                lines.push(trimmed);
                if last {
                    break;
                }
            }
            Ok(Err(e)) => return Err(AdapterError::Smtp(format!("read error: {e}"))),
            Err(_) => {
                return Err(AdapterError::Timeout(format!(
                    "SMTP reply after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    if lines.is_empty() {
        return Err(AdapterError::Smtp("connection closed by server".into()));
    }
    Ok((reply_status(&lines), lines))
}

// ---------------------------------------------------------------------------
// Message templates
// ---------------------------------------------------------------------------

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn reminder_message(from: &str, to: &str, task: &Task) -> EmailMessage {
    let description = task.description.as_deref().unwrap_or("No description");
    let status = task.status.as_str();
    let status_color = if task.status == tasklane_core::task::TaskStatus::Pending {
        "#f59e0b"
    } else {
        "#10b981"
    };

    let text = format!(
        "Hello,\n\n\
         This is a reminder about your task:\n\n\
         Title: {title}\n\
         Description: {description}\n\
         Status: {status}\n\n\
         Please complete this task at your earliest convenience.\n\n\
         Best regards,\n\
         Task Manager System\n",
        title = task.title,
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #667eea;">Task Reminder</h2>
  <p>Hello,</p>
  <p>This is a reminder about your task:</p>
  <div style="background: #f5f5f5; padding: 15px; border-radius: 5px; margin: 20px 0;">
    <p><strong>Title:</strong> {title}</p>
    <p><strong>Description:</strong> {description}</p>
    <p><strong>Status:</strong> <span style="color: {status_color};">{status}</span></p>
  </div>
  <p>Please complete this task at your earliest convenience.</p>
  <p style="color: #666; font-size: 12px; margin-top: 30px;">Best regards,<br>Task Manager System</p>
</div>"#,
        title = html_escape(&task.title),
        description = html_escape(description),
    );

    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("Reminder: {}", task.title),
        text,
        html,
    }
}

pub fn test_message(from: &str, to: &str) -> EmailMessage {
    EmailMessage {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Test Email from Task Manager".into(),
        text: "This is a test email to verify email service configuration.".into(),
        html: "<p>This is a test email to verify email service configuration.</p>".into(),
    }
}

// ---------------------------------------------------------------------------
// SMTP mailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Envelope sender. Falls back to `username` when empty.
    pub from: String,
    pub timeout: Duration,
    /// Send `AUTH LOGIN` even when the session could not be upgraded to TLS.
    pub allow_plaintext_auth: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            from: String::new(),
            timeout: Duration::from_secs(30),
            allow_plaintext_auth: false,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        if self.from.is_empty() {
            self.from = username.clone();
        }
        self.username = Some(username);
        self.password = Some(password.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

/// Byte stream under a session, plain TCP or TLS.
trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// rustls client config trusting the Mozilla root set.
fn tls_connector() -> Result<TlsConnector> {
    let roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| AdapterError::Smtp(format!("TLS setup: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Whether an `EHLO` reply lists `extension` as a keyword.
fn advertises(ehlo: &[String], extension: &str) -> bool {
    ehlo.iter().any(|line| {
        line.get(4..)
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|keyword| keyword.eq_ignore_ascii_case(extension))
    })
}

struct SmtpSession {
    stream: BufReader<Box<dyn Transport>>,
    timeout: Duration,
    tls: bool,
}

impl SmtpSession {
    /// Connect and consume the server greeting.
    async fn open(config: &SmtpConfig) -> Result<Self> {
        let addr = (config.host.as_str(), config.port);
        let tcp = tokio::time::timeout(config.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| AdapterError::Timeout(format!("connect to {}:{}", config.host, config.port)))?
            .map_err(|e| AdapterError::Network(format!("connect to {}:{}: {e}", config.host, config.port)))?;
        let mut session = Self {
            stream: BufReader::new(Box::new(tcp) as Box<dyn Transport>),
            timeout: config.timeout,
            tls: false,
        };

        let (status, lines) = smtp_read_response(&mut session.stream, session.timeout).await?;
        if status / 100 != 2 {
            return Err(AdapterError::Smtp(format!(
                "server rejected connection: {}",
                lines.join("; ")
            )));
        }
        Ok(session)
    }

    /// Send `cmd` and require a reply in the same hundred-range as `expected`.
    async fn exchange(&mut self, cmd: &str, expected: u16) -> Result<Vec<String>> {
        self.stream
            .write_all(cmd.as_bytes())
            .await
            .map_err(|e| AdapterError::Smtp(format!("write error: {e}")))?;
        let (status, lines) = smtp_read_response(&mut self.stream, self.timeout).await?;
        if status / 100 != expected / 100 {
            return Err(AdapterError::Smtp(format!(
                "expected {}xx, got {status}: {}",
                expected / 100,
                lines.join("; ")
            )));
        }
        Ok(lines)
    }

    async fn command(&mut self, cmd: &str, expected: u16) -> Result<()> {
        self.exchange(cmd, expected).await.map(drop)
    }

    /// Upgrade the connection after a `220` reply to `STARTTLS`. Anything
    /// buffered from the plain-text phase is dropped.
    async fn start_tls(self, host: &str) -> Result<Self> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|e| AdapterError::Smtp(format!("invalid server name '{host}': {e}")))?;
        let plain = self.stream.into_inner();
        let tls = tokio::time::timeout(self.timeout, tls_connector()?.connect(server_name, plain))
            .await
            .map_err(|_| AdapterError::Timeout(format!("TLS handshake with {host}")))?
            .map_err(|e| AdapterError::Smtp(format!("TLS handshake with {host}: {e}")))?;
        debug!(host, "SMTP session upgraded to TLS");
        Ok(Self {
            stream: BufReader::new(Box::new(tls) as Box<dyn Transport>),
            timeout: self.timeout,
            tls: true,
        })
    }

    /// `EHLO`, `STARTTLS` when offered, then `AUTH LOGIN` when credentials are
    /// configured.
    async fn greet(mut self, config: &SmtpConfig) -> Result<Self> {
        let ehlo = smtp_ehlo_command(EHLO_DOMAIN);
        let capabilities = self.exchange(&ehlo, 250).await?;
        if advertises(&capabilities, "STARTTLS") {
            self.command(&smtp_starttls_command(), 220).await?;
            self = self.start_tls(&config.host).await?;
            self.command(&ehlo, 250).await?;
        }

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            if !self.tls && !config.allow_plaintext_auth {
                return Err(AdapterError::Smtp(format!(
                    "{} does not offer STARTTLS; refusing to send credentials in plain text",
                    config.host
                )));
            }
            self.command(&smtp_auth_login_command(), 334).await?;
            self.command(&format!("{}\r\n", smtp_base64_encode(user)), 334)
                .await?;
            self.command(&format!("{}\r\n", smtp_base64_encode(pass)), 235)
                .await?;
        }
        Ok(self)
    }

    async fn quit(mut self) {
        // The message is already accepted; a failed goodbye changes nothing.
        if let Err(e) = self.command(&smtp_quit_command(), 221).await {
            debug!(error = %e, "SMTP QUIT not acknowledged");
        }
    }
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(host = %self.config.host, to = %message.to, subject = %message.subject, "sending email");

        let mut session = SmtpSession::open(&self.config).await?.greet(&self.config).await?;
        session
            .command(&smtp_mail_from_command(&message.from), 250)
            .await?;
        session
            .command(&smtp_rcpt_to_command(&message.to), 250)
            .await?;
        session.command(&smtp_data_command(), 354).await?;

        let boundary = format!("tasklane-{}", uuid::Uuid::new_v4().simple());
        let date = chrono::Utc::now().to_rfc2822();
        session
            .command(&smtp_message_data(message, &boundary, &date), 250)
            .await?;
        session.quit().await;
        Ok(())
    }

    async fn verify_connection(&self) -> bool {
        let result = async {
            let session = SmtpSession::open(&self.config).await?.greet(&self.config).await?;
            session.quit().await;
            Ok::<_, AdapterError>(())
        }
        .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(host = %self.config.host, error = %e, "email service verification failed");
                false
            }
        }
    }

    fn sender(&self) -> &str {
        &self.config.from
    }
}
