//! credstore-mail: temp-mailbox retrieval client
//!
//! Talks to a mail.chatgpt.org.uk-style temporary mailbox service:
//! generate a throwaway address, then poll its inbox for a verification
//! code. The storage layer persists the credentials this client
//! produces but never depends on it.

pub mod codes;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use credstore_core::MailCredentials;

pub use codes::extract_verification_code;

const DEFAULT_BASE_URL: &str = "https://mail.chatgpt.org.uk";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const REGISTER_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {reason}")]
    Unexpected { reason: String },

    #[error("no mailbox registered")]
    NotRegistered,

    #[error("mailbox registration failed after {attempts} attempts")]
    RegistrationFailed { attempts: usize },
}

/// Client configuration. `Default` targets the public service with TLS
/// verification on and no domain filter.
#[derive(Debug, Clone)]
pub struct TempMailConfig {
    pub base_url: String,
    pub proxy: Option<String>,
    pub verify_ssl: bool,
    pub api_key: Option<String>,
    /// Only accept generated addresses under this domain.
    pub domain: Option<String>,
}

impl Default for TempMailConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            verify_ssl: true,
            api_key: None,
            domain: None,
        }
    }
}

/// Temp-mailbox client.
pub struct TempMailClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    domain_filter: Option<String>,
    verify_ssl: bool,
    address: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Deserialize)]
struct GeneratedAddress {
    email: String,
}

#[derive(Deserialize)]
struct Inbox {
    #[serde(default)]
    emails: Vec<InboxMessage>,
}

/// One message as the service reports it. The body can arrive under any
/// of several field names depending on service version.
#[derive(Debug, Clone, Deserialize)]
pub struct InboxMessage {
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "time")]
    pub date: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html_content: Option<String>,
}

impl InboxMessage {
    /// First non-empty body field.
    pub fn body(&self) -> Option<&str> {
        [&self.content, &self.body, &self.text, &self.html_content]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|value| !value.is_empty())
    }

    fn received_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.date.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl TempMailClient {
    pub fn new(config: TempMailConfig) -> Result<Self, MailError> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            domain_filter: config
                .domain
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            verify_ssl: config.verify_ssl,
            address: None,
        })
    }

    /// The registered address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Adopt an existing address instead of generating one.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = Some(address.into());
    }

    /// Credentials for persisting this mailbox on an account record.
    pub fn credentials(&self) -> MailCredentials {
        MailCredentials::TempMail {
            address: self.address.clone(),
            base_url: Some(self.base_url.clone()),
            api_key: self.api_key.clone(),
            domain: self.domain_filter.clone(),
            verify_ssl: Some(self.verify_ssl),
        }
    }

    /// Generate a throwaway address, retrying until one passes the
    /// domain filter or the attempts run out.
    pub async fn register(&mut self) -> Result<String, MailError> {
        let url = format!("{}/api/generate-email", self.base_url);
        for attempt in 1..=REGISTER_ATTEMPTS {
            match self.generate_once(&url).await {
                Ok(email) => {
                    if self.passes_domain_filter(&email) {
                        info!(email = %email, "generated mailbox");
                        self.address = Some(email.clone());
                        return Ok(email);
                    }
                    info!(email = %email, "skipping address outside domain filter");
                }
                Err(err) => {
                    warn!(attempt, error = %err, "mailbox generation failed");
                }
            }
            if attempt < REGISTER_ATTEMPTS {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        Err(MailError::RegistrationFailed {
            attempts: REGISTER_ATTEMPTS,
        })
    }

    fn passes_domain_filter(&self, email: &str) -> bool {
        match &self.domain_filter {
            Some(domain) => {
                email.ends_with(&format!("@{domain}")) || email.ends_with(&format!(".{domain}"))
            }
            None => true,
        }
    }

    async fn generate_once(&self, url: &str) -> Result<String, MailError> {
        let envelope: Envelope<GeneratedAddress> = self
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        match envelope.data {
            Some(data) if envelope.success => Ok(data.email),
            _ => Err(MailError::Unexpected {
                reason: "generate-email reported failure".to_string(),
            }),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::REFERER, format!("{}/", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }

    /// Inbox listing for the registered address.
    pub async fn list_messages(&self) -> Result<Vec<InboxMessage>, MailError> {
        let address = self.address.as_deref().ok_or(MailError::NotRegistered)?;
        let url = format!("{}/api/emails", self.base_url);
        let envelope: Envelope<Inbox> = self
            .get(&url)
            .query(&[("email", address)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        match envelope.data {
            Some(inbox) if envelope.success => Ok(inbox.emails),
            _ => Err(MailError::Unexpected {
                reason: "inbox listing reported failure".to_string(),
            }),
        }
    }

    /// Scan the inbox once for a verification code.
    ///
    /// Messages older than `since` are skipped (messages with no
    /// parsable date are kept); subjects are checked before bodies.
    pub async fn fetch_verification_code(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<String>, MailError> {
        let messages = self.list_messages().await?;
        if messages.is_empty() {
            info!("inbox is empty");
            return Ok(None);
        }
        for message in &messages {
            if let (Some(since), Some(received)) = (since, message.received_at()) {
                if received < since {
                    continue;
                }
            }
            if let Some(code) = codes::extract_verification_code(&message.subject) {
                info!("verification code found in subject");
                return Ok(Some(code));
            }
            if let Some(body) = message.body() {
                if let Some(code) = codes::extract_verification_code(body) {
                    info!("verification code found in body");
                    return Ok(Some(code));
                }
            }
        }
        Ok(None)
    }

    /// Poll the inbox until a code appears or `timeout` elapses.
    /// Transient fetch failures are logged and polling continues.
    pub async fn poll_for_code(
        &self,
        timeout: Duration,
        interval: Duration,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<String>, MailError> {
        let interval_secs = interval.as_secs().max(1);
        let rounds = (timeout.as_secs() / interval_secs).max(1);
        for round in 1..=rounds {
            match self.fetch_verification_code(since).await {
                Ok(Some(code)) => return Ok(Some(code)),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "inbox poll failed"),
            }
            if round < rounds {
                info!(
                    waited_secs = round * interval_secs,
                    timeout_secs = timeout.as_secs(),
                    "waiting for verification code"
                );
                tokio::time::sleep(interval).await;
            }
        }
        warn!("verification code polling timed out");
        Ok(None)
    }
}
