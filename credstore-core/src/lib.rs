//! credstore-core: domain types and configuration
//!
//! Holds the account record, the provider-tagged mail credential union,
//! and the environment-driven configuration shared by the storage layer.

pub mod account;
pub mod config;

pub use account::{Account, MailColumns, MailCredentials};
pub use config::{database_url, is_enabled, PoolConfig};
