//! Synchronous call surface.
//!
//! Every operation checks the enablement signal first, routes the
//! underlying asynchronous operation through the execution bridge, and
//! converts failures into sentinels at this boundary: `false`/`None`
//! mean "the operation did not take effect", not "nothing happened".
//! Failures are logged here, once, with operation context (never with
//! credential values); retry policy belongs to the caller.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use credstore_core::{config, Account};

use crate::bridge::run_sync;
use crate::pool::get_pool;
use crate::repos::{AccountRepo, KvRepo};

const SETTINGS_KEY: &str = "settings";
const STATS_KEY: &str = "stats";

/// True when the PostgreSQL backend is configured.
pub fn is_enabled() -> bool {
    config::is_enabled()
}

/// Load every account, oldest first.
///
/// `None` means the store is disabled or the read failed; callers fall
/// back to their file-based source rather than treating it as an error.
pub fn load_accounts_sync() -> Option<Vec<Account>> {
    if !config::is_enabled() {
        return None;
    }
    match run_sync(async {
        let pool = get_pool().await?;
        AccountRepo::new(pool).load_all().await
    }) {
        Ok(accounts) => {
            tracing::info!(count = accounts.len(), "loaded accounts from database");
            Some(accounts)
        }
        Err(err) => {
            tracing::error!(error = %err, "account load failed");
            None
        }
    }
}

/// Reconcile the accounts table against `accounts` in one transaction.
/// On `false` the persisted state is unchanged.
pub fn save_accounts_sync(accounts: &[Account]) -> bool {
    if !config::is_enabled() {
        return false;
    }
    let targets = accounts.to_vec();
    let count = targets.len();
    match run_sync(async move {
        let pool = get_pool().await?;
        AccountRepo::new(pool).sync_all(&targets).await
    }) {
        Ok(()) => {
            tracing::info!(count, "saved accounts to database");
            true
        }
        Err(err) => {
            tracing::error!(error = %err, "account sync failed");
            false
        }
    }
}

/// Upsert a single account without touching any other row.
/// Returns false for records without an id.
pub fn save_account_sync(account: &Account) -> bool {
    if !config::is_enabled() {
        return false;
    }
    if account.id.is_empty() {
        tracing::warn!("refusing to save an account without an id");
        return false;
    }
    let id = account.id.clone();
    let record = account.clone();
    match run_sync(async move {
        let pool = get_pool().await?;
        AccountRepo::new(pool).save(&record).await
    }) {
        Ok(()) => {
            tracing::info!(id = %id, "saved account to database");
            true
        }
        Err(err) => {
            tracing::error!(id = %id, error = %err, "account save failed");
            false
        }
    }
}

/// Delete one account by id. Deleting an unknown id is a no-op success.
pub fn delete_account_sync(id: &str) -> bool {
    if !config::is_enabled() {
        return false;
    }
    let id = id.to_string();
    let logged = id.clone();
    match run_sync(async move {
        let pool = get_pool().await?;
        AccountRepo::new(pool).delete(&id).await
    }) {
        Ok(()) => {
            tracing::info!(id = %logged, "deleted account from database");
            true
        }
        Err(err) => {
            tracing::error!(id = %logged, error = %err, "account delete failed");
            false
        }
    }
}

/// Delete many accounts by id. An empty list is a no-op success.
pub fn delete_accounts_sync(ids: &[String]) -> bool {
    if !config::is_enabled() {
        return false;
    }
    if ids.is_empty() {
        return true;
    }
    let ids = ids.to_vec();
    let count = ids.len();
    match run_sync(async move {
        let pool = get_pool().await?;
        AccountRepo::new(pool).delete_many(&ids).await
    }) {
        Ok(()) => {
            tracing::info!(count, "deleted accounts from database");
            true
        }
        Err(err) => {
            tracing::error!(error = %err, "account delete failed");
            false
        }
    }
}

/// Most recent `updated_at` across all accounts, or `None` when the
/// store is disabled, empty, or unreadable. Lets callers decide whether
/// a reload is needed without fetching the whole table.
pub fn accounts_updated_at_sync() -> Option<DateTime<Utc>> {
    if !config::is_enabled() {
        return None;
    }
    match run_sync(async {
        let pool = get_pool().await?;
        AccountRepo::new(pool).last_updated().await
    }) {
        Ok(timestamp) => timestamp,
        Err(err) => {
            tracing::error!(error = %err, "accounts last-updated read failed");
            None
        }
    }
}

/// Stored settings document, or `None` for disabled/missing/unreadable.
pub fn load_settings_sync() -> Option<JsonValue> {
    load_document(SETTINGS_KEY)
}

/// Replace the settings document.
pub fn save_settings_sync(settings: &JsonValue) -> bool {
    let saved = save_document(SETTINGS_KEY, settings);
    if saved {
        tracing::info!("settings saved to database");
    }
    saved
}

/// Stored statistics document, or `None` for disabled/missing/unreadable.
pub fn load_stats_sync() -> Option<JsonValue> {
    load_document(STATS_KEY)
}

/// Replace the statistics document.
pub fn save_stats_sync(stats: &JsonValue) -> bool {
    save_document(STATS_KEY, stats)
}

fn load_document(key: &'static str) -> Option<JsonValue> {
    if !config::is_enabled() {
        return None;
    }
    match run_sync(async move {
        let pool = get_pool().await?;
        KvRepo::new(pool).get(key).await
    }) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(key, error = %err, "kv read failed");
            None
        }
    }
}

fn save_document(key: &'static str, value: &JsonValue) -> bool {
    if !config::is_enabled() {
        return false;
    }
    let value = value.clone();
    match run_sync(async move {
        let pool = get_pool().await?;
        KvRepo::new(pool).set(key, &value).await
    }) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(key, error = %err, "kv write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::lock_env;
    use serde_json::json;

    // With no DATABASE_URL the facade must short-circuit without ever
    // touching the bridge or attempting a connection.
    #[test]
    fn disabled_store_short_circuits_every_operation() {
        let _lock = lock_env();
        let saved_url = std::env::var("DATABASE_URL").ok();
        std::env::remove_var("DATABASE_URL");

        assert!(!is_enabled());
        assert_eq!(load_accounts_sync(), None);
        assert_eq!(accounts_updated_at_sync(), None);
        assert_eq!(load_settings_sync(), None);
        assert_eq!(load_stats_sync(), None);
        assert!(!save_accounts_sync(&[]));
        assert!(!delete_account_sync("any"));
        assert!(!delete_accounts_sync(&["any".to_string()]));
        assert!(!save_settings_sync(&json!({})));
        assert!(!save_stats_sync(&json!({})));

        if let Some(url) = saved_url {
            std::env::set_var("DATABASE_URL", url);
        }
    }

    #[test]
    fn disabled_store_rejects_record_saves() {
        let _lock = lock_env();
        let saved_url = std::env::var("DATABASE_URL").ok();
        std::env::remove_var("DATABASE_URL");

        let account = Account {
            id: "facade-test".to_string(),
            secure_c_ses: "ses".to_string(),
            host_c_oses: None,
            csesidx: "idx".to_string(),
            config_id: "cfg".to_string(),
            expires_at: None,
            disabled: false,
            mail: None,
        };
        assert!(!save_account_sync(&account));

        if let Some(url) = saved_url {
            std::env::set_var("DATABASE_URL", url);
        }
    }

    #[test]
    fn empty_delete_list_is_a_noop_success_when_enabled() {
        // The empty-list check precedes any database work, so it can be
        // exercised with a dummy connection string.
        let _lock = lock_env();
        let saved_url = std::env::var("DATABASE_URL").ok();
        std::env::set_var("DATABASE_URL", "postgres://localhost/credstore-test");

        assert!(delete_accounts_sync(&[]));

        match saved_url {
            Some(url) => std::env::set_var("DATABASE_URL", url),
            None => std::env::remove_var("DATABASE_URL"),
        }
    }
}
