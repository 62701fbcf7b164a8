//! credstore-pg: PostgreSQL persistence and concurrency bridging
//!
//! # Design Principles
//!
//! - One process-wide pool (min 1 / max 10) behind double-checked lazy
//!   initialization; schema bootstrap runs before the pool is published
//! - One background worker pumps every bridged operation; a synchronous
//!   caller blocks only its own thread
//! - Full-set reconciliation executes in a single transaction
//! - Failures become `false`/`None` sentinels at the facade boundary,
//!   logged there and nowhere deeper

pub mod bridge;
pub mod error;
pub mod facade;
pub mod pool;
pub mod repos;
pub mod schema;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{StoreError, StoreResult};
pub use facade::{
    accounts_updated_at_sync, delete_account_sync, delete_accounts_sync, is_enabled,
    load_accounts_sync, load_settings_sync, load_stats_sync, save_account_sync,
    save_accounts_sync, save_settings_sync, save_stats_sync,
};
pub use repos::{AccountRepo, KvRepo};
