//! Account records and mail-provider credentials.
//!
//! The persisted layout is a single `accounts` row with a sparse bag of
//! `mail_*` columns; in memory the bag is a tagged union over provider
//! kind. `MailColumns` is the bridge between the two representations.

use serde::{Deserialize, Serialize};

/// One externally-registered session/credential bundle.
///
/// `id` is assigned by the caller and immutable once created; writes are
/// idempotent upserts keyed on it. `created_at`/`updated_at` are assigned
/// by the database and never round-trip through this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub secure_c_ses: String,
    #[serde(default)]
    pub host_c_oses: Option<String>,
    pub csesidx: String,
    pub config_id: String,
    /// Caller-formatted timestamp; not parsed by the storage layer.
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub mail: Option<MailCredentials>,
}

impl Account {
    /// Flatten the mail credentials into the persisted column layout.
    /// An account without mail credentials yields all-NULL columns.
    pub fn mail_columns(&self) -> MailColumns {
        self.mail
            .as_ref()
            .map(MailCredentials::to_columns)
            .unwrap_or_default()
    }
}

/// The sparse `mail_*` column layout shared by every provider.
/// Field order matches the `accounts` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailColumns {
    pub provider: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub refresh_token: Option<String>,
    pub tenant: Option<String>,
    pub base_url: Option<String>,
    pub jwt_token: Option<String>,
    pub verify_ssl: Option<bool>,
    pub domain: Option<String>,
    pub api_key: Option<String>,
}

impl MailColumns {
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.address.is_none()
            && self.password.is_none()
            && self.client_id.is_none()
            && self.refresh_token.is_none()
            && self.tenant.is_none()
            && self.base_url.is_none()
            && self.jwt_token.is_none()
            && self.verify_ssl.is_none()
            && self.domain.is_none()
            && self.api_key.is_none()
    }
}

/// Canonical provider names as stored in `mail_provider`.
pub const PROVIDER_IMAP: &str = "imap";
pub const PROVIDER_OUTLOOK: &str = "outlook";
pub const PROVIDER_GPTMAIL: &str = "gptmail";
pub const PROVIDER_MAILTM: &str = "mailtm";

/// Mail-retrieval credentials, tagged by provider kind.
///
/// Each variant models exactly the columns its provider populates; rows
/// whose shape doesn't match a known provider are carried through
/// untouched as `Other`, so reading and re-writing a row never loses
/// fields this layer doesn't understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MailCredentials {
    /// Plain mailbox polled over IMAP.
    Imap {
        address: String,
        password: Option<String>,
        verify_ssl: Option<bool>,
    },
    /// OAuth2 mailbox (client/refresh-token pair, Microsoft-style tenant).
    OAuth {
        address: String,
        client_id: String,
        refresh_token: String,
        tenant: Option<String>,
        password: Option<String>,
        base_url: Option<String>,
    },
    /// Throwaway mailbox handed out by a temp-mail service.
    TempMail {
        address: Option<String>,
        base_url: Option<String>,
        api_key: Option<String>,
        domain: Option<String>,
        verify_ssl: Option<bool>,
    },
    /// Token-authenticated REST mailbox.
    Jwt {
        address: Option<String>,
        base_url: Option<String>,
        jwt_token: String,
    },
    /// Provider this layer doesn't model.
    Other(MailColumns),
}

impl MailCredentials {
    /// Classify a persisted column bag. Returns `None` when every column
    /// is NULL (the account has no mail credentials at all).
    pub fn from_columns(cols: MailColumns) -> Option<Self> {
        if cols.is_empty() {
            return None;
        }
        let provider = cols.provider.clone().unwrap_or_default();
        Some(match provider.as_str() {
            PROVIDER_IMAP if cols.address.is_some() => {
                let MailColumns {
                    address,
                    password,
                    verify_ssl,
                    ..
                } = cols;
                Self::Imap {
                    address: address.unwrap_or_default(),
                    password,
                    verify_ssl,
                }
            }
            PROVIDER_OUTLOOK
                if cols.address.is_some()
                    && cols.client_id.is_some()
                    && cols.refresh_token.is_some() =>
            {
                let MailColumns {
                    address,
                    password,
                    client_id,
                    refresh_token,
                    tenant,
                    base_url,
                    ..
                } = cols;
                Self::OAuth {
                    address: address.unwrap_or_default(),
                    client_id: client_id.unwrap_or_default(),
                    refresh_token: refresh_token.unwrap_or_default(),
                    tenant,
                    password,
                    base_url,
                }
            }
            PROVIDER_GPTMAIL => {
                let MailColumns {
                    address,
                    base_url,
                    api_key,
                    domain,
                    verify_ssl,
                    ..
                } = cols;
                Self::TempMail {
                    address,
                    base_url,
                    api_key,
                    domain,
                    verify_ssl,
                }
            }
            PROVIDER_MAILTM if cols.jwt_token.is_some() => {
                let MailColumns {
                    address,
                    base_url,
                    jwt_token,
                    ..
                } = cols;
                Self::Jwt {
                    address,
                    base_url,
                    jwt_token: jwt_token.unwrap_or_default(),
                }
            }
            _ => Self::Other(cols),
        })
    }

    /// Flatten back into the persisted column layout.
    pub fn to_columns(&self) -> MailColumns {
        match self {
            Self::Imap {
                address,
                password,
                verify_ssl,
            } => MailColumns {
                provider: Some(PROVIDER_IMAP.to_string()),
                address: Some(address.clone()),
                password: password.clone(),
                verify_ssl: *verify_ssl,
                ..MailColumns::default()
            },
            Self::OAuth {
                address,
                client_id,
                refresh_token,
                tenant,
                password,
                base_url,
            } => MailColumns {
                provider: Some(PROVIDER_OUTLOOK.to_string()),
                address: Some(address.clone()),
                password: password.clone(),
                client_id: Some(client_id.clone()),
                refresh_token: Some(refresh_token.clone()),
                tenant: tenant.clone(),
                base_url: base_url.clone(),
                ..MailColumns::default()
            },
            Self::TempMail {
                address,
                base_url,
                api_key,
                domain,
                verify_ssl,
            } => MailColumns {
                provider: Some(PROVIDER_GPTMAIL.to_string()),
                address: address.clone(),
                base_url: base_url.clone(),
                api_key: api_key.clone(),
                domain: domain.clone(),
                verify_ssl: *verify_ssl,
                ..MailColumns::default()
            },
            Self::Jwt {
                address,
                base_url,
                jwt_token,
            } => MailColumns {
                provider: Some(PROVIDER_MAILTM.to_string()),
                address: address.clone(),
                base_url: base_url.clone(),
                jwt_token: Some(jwt_token.clone()),
                ..MailColumns::default()
            },
            Self::Other(cols) => cols.clone(),
        }
    }

    /// Provider name as persisted in `mail_provider`.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Imap { .. } => Some(PROVIDER_IMAP),
            Self::OAuth { .. } => Some(PROVIDER_OUTLOOK),
            Self::TempMail { .. } => Some(PROVIDER_GPTMAIL),
            Self::Jwt { .. } => Some(PROVIDER_MAILTM),
            Self::Other(cols) => cols.provider.as_deref(),
        }
    }
}
