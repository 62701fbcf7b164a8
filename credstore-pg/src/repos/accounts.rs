//! Account repository.
//!
//! Single-row operations plus the full-set reconciliation used when a
//! caller wants the persisted table to exactly match an in-memory
//! collection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use credstore_core::{Account, MailColumns, MailCredentials};

use crate::error::StoreError;

/// Upsert for the caller-visible columns; `created_at` keeps its insert
/// value and `updated_at` refreshes on every write.
const UPSERT_SQL: &str = r#"
INSERT INTO accounts (
    id, secure_c_ses, host_c_oses, csesidx, config_id,
    expires_at, disabled, mail_provider, mail_address, mail_password,
    mail_client_id, mail_refresh_token, mail_tenant, mail_base_url,
    mail_jwt_token, mail_verify_ssl, mail_domain, mail_api_key
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
ON CONFLICT (id) DO UPDATE SET
    secure_c_ses = EXCLUDED.secure_c_ses,
    host_c_oses = EXCLUDED.host_c_oses,
    csesidx = EXCLUDED.csesidx,
    config_id = EXCLUDED.config_id,
    expires_at = EXCLUDED.expires_at,
    disabled = EXCLUDED.disabled,
    mail_provider = EXCLUDED.mail_provider,
    mail_address = EXCLUDED.mail_address,
    mail_password = EXCLUDED.mail_password,
    mail_client_id = EXCLUDED.mail_client_id,
    mail_refresh_token = EXCLUDED.mail_refresh_token,
    mail_tenant = EXCLUDED.mail_tenant,
    mail_base_url = EXCLUDED.mail_base_url,
    mail_jwt_token = EXCLUDED.mail_jwt_token,
    mail_verify_ssl = EXCLUDED.mail_verify_ssl,
    mail_domain = EXCLUDED.mail_domain,
    mail_api_key = EXCLUDED.mail_api_key,
    updated_at = NOW()
"#;

const SELECT_SQL: &str = r#"
SELECT id, secure_c_ses, host_c_oses, csesidx, config_id,
       expires_at, disabled, mail_provider, mail_address, mail_password,
       mail_client_id, mail_refresh_token, mail_tenant, mail_base_url,
       mail_jwt_token, mail_verify_ssl, mail_domain, mail_api_key
FROM accounts
ORDER BY created_at
"#;

/// Account repository
pub struct AccountRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All persisted accounts, oldest first.
    pub async fn load_all(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(SELECT_SQL)
            .fetch_all(self.pool)
            .await
            .map_err(|source| StoreError::operation("load accounts", source))?;
        Ok(rows.iter().map(account_from_row).collect())
    }

    /// Most recent `updated_at` across the table; `None` when empty.
    /// Lets callers detect staleness without reading every row.
    pub async fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        sqlx::query_scalar("SELECT MAX(updated_at) FROM accounts")
            .fetch_one(self.pool)
            .await
            .map_err(|source| StoreError::operation("accounts last-updated", source))
    }

    /// Upsert one account keyed on `id`; no other row is touched.
    pub async fn save(&self, account: &Account) -> Result<(), StoreError> {
        if account.id.is_empty() {
            return Err(StoreError::config("account has no id"));
        }
        bind_account(sqlx::query(UPSERT_SQL), account)
            .execute(self.pool)
            .await
            .map_err(|source| StoreError::operation("save account", source))?;
        Ok(())
    }

    /// Delete one account; deleting an unknown id is a no-op.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|source| StoreError::operation("delete account", source))?;
        Ok(())
    }

    /// Delete many accounts by id; an empty list issues no statement.
    pub async fn delete_many(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("DELETE FROM accounts WHERE id = ANY($1)")
            .bind(ids)
            .execute(self.pool)
            .await
            .map_err(|source| StoreError::operation("delete accounts", source))?;
        Ok(())
    }

    /// Make the persisted table exactly match `targets`, atomically.
    ///
    /// Rows whose id is absent from `targets` are deleted in one batch;
    /// every target with a non-empty id is upserted in the order given,
    /// so later duplicates overwrite earlier ones. Records without an id
    /// are skipped: not persisted, not counted for deletion. The whole
    /// reconciliation commits or none of it does; an empty target set
    /// against a populated table is a full wipe.
    pub async fn sync_all(&self, targets: &[Account]) -> Result<(), StoreError> {
        let op = "sync accounts";
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| StoreError::operation(op, source))?;

        let existing: Vec<String> = sqlx::query_scalar("SELECT id FROM accounts")
            .fetch_all(&mut *tx)
            .await
            .map_err(|source| StoreError::operation(op, source))?;

        let target_ids: HashSet<&str> = targets
            .iter()
            .filter(|account| !account.id.is_empty())
            .map(|account| account.id.as_str())
            .collect();
        let to_delete: Vec<String> = existing
            .into_iter()
            .filter(|id| !target_ids.contains(id.as_str()))
            .collect();

        if !to_delete.is_empty() {
            sqlx::query("DELETE FROM accounts WHERE id = ANY($1)")
                .bind(&to_delete)
                .execute(&mut *tx)
                .await
                .map_err(|source| StoreError::operation(op, source))?;
        }

        for account in targets {
            if account.id.is_empty() {
                continue;
            }
            bind_account(sqlx::query(UPSERT_SQL), account)
                .execute(&mut *tx)
                .await
                .map_err(|source| StoreError::operation(op, source))?;
        }

        tx.commit()
            .await
            .map_err(|source| StoreError::operation(op, source))?;
        Ok(())
    }
}

fn bind_account<'q>(
    query: Query<'q, Postgres, PgArguments>,
    account: &Account,
) -> Query<'q, Postgres, PgArguments> {
    let mail = account.mail_columns();
    query
        .bind(account.id.clone())
        .bind(account.secure_c_ses.clone())
        .bind(account.host_c_oses.clone())
        .bind(account.csesidx.clone())
        .bind(account.config_id.clone())
        .bind(account.expires_at.clone())
        .bind(account.disabled)
        .bind(mail.provider)
        .bind(mail.address)
        .bind(mail.password)
        .bind(mail.client_id)
        .bind(mail.refresh_token)
        .bind(mail.tenant)
        .bind(mail.base_url)
        .bind(mail.jwt_token)
        .bind(mail.verify_ssl)
        .bind(mail.domain)
        .bind(mail.api_key)
}

fn account_from_row(row: &PgRow) -> Account {
    let mail = MailColumns {
        provider: row.get("mail_provider"),
        address: row.get("mail_address"),
        password: row.get("mail_password"),
        client_id: row.get("mail_client_id"),
        refresh_token: row.get("mail_refresh_token"),
        tenant: row.get("mail_tenant"),
        base_url: row.get("mail_base_url"),
        jwt_token: row.get("mail_jwt_token"),
        verify_ssl: row.get("mail_verify_ssl"),
        domain: row.get("mail_domain"),
        api_key: row.get("mail_api_key"),
    };
    Account {
        id: row.get("id"),
        secure_c_ses: row.get("secure_c_ses"),
        host_c_oses: row.get("host_c_oses"),
        csesidx: row.get("csesidx"),
        config_id: row.get("config_id"),
        expires_at: row.get("expires_at"),
        disabled: row.get("disabled"),
        mail: MailCredentials::from_columns(mail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credstore_core::MailCredentials;

    // Integration tests require a real (scratch) database: sync_all
    // reconciles the whole accounts table, so these tests take a shared
    // lock and wipe it between scenarios.
    // Run with: DATABASE_URL=postgres://... cargo test -p credstore-pg -- --ignored

    static TABLE_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    async fn test_pool() -> &'static PgPool {
        crate::pool::get_pool().await.expect("pool creation failed")
    }

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            secure_c_ses: format!("ses-{id}"),
            host_c_oses: None,
            csesidx: format!("idx-{id}"),
            config_id: "cfg-default".to_string(),
            expires_at: None,
            disabled: false,
            mail: Some(MailCredentials::TempMail {
                address: Some(format!("{id}@mail.chatgpt.org.uk")),
                base_url: Some("https://mail.chatgpt.org.uk".to_string()),
                api_key: None,
                domain: None,
                verify_ssl: Some(true),
            }),
        }
    }

    async fn persisted_ids(repo: &AccountRepo<'_>) -> Vec<String> {
        let mut ids: Vec<String> = repo
            .load_all()
            .await
            .expect("load failed")
            .into_iter()
            .map(|a| a.id)
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn save_is_an_idempotent_upsert() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);
        repo.sync_all(&[]).await.expect("wipe failed");

        let mut record = account("upsert-1");
        repo.save(&record).await.expect("first save failed");
        let first = repo.last_updated().await.expect("ts read failed");

        record.config_id = "cfg-changed".to_string();
        repo.save(&record).await.expect("second save failed");
        let second = repo.last_updated().await.expect("ts read failed");

        let accounts = repo.load_all().await.expect("load failed");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].config_id, "cfg-changed");
        assert!(second >= first, "updated_at must advance monotonically");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn save_rejects_a_record_without_id() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);
        let result = repo.save(&account("")).await;
        assert!(matches!(result, Err(StoreError::Config { .. })));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn sync_makes_the_table_match_the_target_set() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("a"), account("b"), account("c")])
            .await
            .expect("seed failed");
        repo.sync_all(&[account("b"), account("c"), account("d")])
            .await
            .expect("sync failed");

        assert_eq!(persisted_ids(&repo).await, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn sync_skips_records_without_id() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("kept"), account("")])
            .await
            .expect("sync failed");

        assert_eq!(persisted_ids(&repo).await, vec!["kept"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn empty_target_set_wipes_the_table() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("x"), account("y")])
            .await
            .expect("seed failed");
        repo.sync_all(&[]).await.expect("wipe failed");

        assert!(persisted_ids(&repo).await.is_empty());
        assert_eq!(repo.last_updated().await.expect("ts read failed"), None);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_ids_in_target_set_last_write_wins() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        let mut first = account("dup");
        first.config_id = "cfg-first".to_string();
        let mut second = account("dup");
        second.config_id = "cfg-second".to_string();
        repo.sync_all(&[first, second]).await.expect("sync failed");

        let accounts = repo.load_all().await.expect("load failed");
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].config_id, "cfg-second");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn failed_sync_rolls_back_completely() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("stable-1"), account("stable-2")])
            .await
            .expect("seed failed");

        // Induce a mid-transaction constraint violation.
        sqlx::query("ALTER TABLE accounts DROP CONSTRAINT IF EXISTS accounts_reject_poison")
            .execute(pool)
            .await
            .expect("constraint reset failed");
        sqlx::query("ALTER TABLE accounts ADD CONSTRAINT accounts_reject_poison CHECK (id <> 'poison')")
            .execute(pool)
            .await
            .expect("constraint add failed");

        let result = repo
            .sync_all(&[account("stable-1"), account("poison")])
            .await;
        assert!(matches!(result, Err(StoreError::Operation { .. })));

        sqlx::query("ALTER TABLE accounts DROP CONSTRAINT accounts_reject_poison")
            .execute(pool)
            .await
            .expect("constraint drop failed");

        // The deletion of stable-2 must have rolled back with the rest.
        assert_eq!(persisted_ids(&repo).await, vec!["stable-1", "stable-2"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn deletes_are_noops_for_unknown_or_empty_input() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("only")]).await.expect("seed failed");

        repo.delete("never-existed").await.expect("delete failed");
        repo.delete_many(&[]).await.expect("empty delete failed");

        assert_eq!(persisted_ids(&repo).await, vec!["only"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn delete_many_removes_each_listed_row() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);

        repo.sync_all(&[account("d1"), account("d2"), account("d3")])
            .await
            .expect("seed failed");
        repo.delete_many(&["d1".to_string(), "d3".to_string()])
            .await
            .expect("delete failed");

        assert_eq!(persisted_ids(&repo).await, vec!["d2"]);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn load_all_returns_oldest_first_with_credentials_intact() {
        let _lock = TABLE_LOCK.lock().await;
        let pool = test_pool().await;
        let repo = AccountRepo::new(pool);
        repo.sync_all(&[]).await.expect("wipe failed");

        repo.save(&account("older")).await.expect("save failed");
        repo.save(&account("newer")).await.expect("save failed");

        let accounts = repo.load_all().await.expect("load failed");
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
        assert!(matches!(
            accounts[0].mail,
            Some(MailCredentials::TempMail { .. })
        ));
    }
}
