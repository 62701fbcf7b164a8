//! Idempotent schema bootstrap.
//!
//! Runs before the pool is published, so any code that can see the pool
//! can assume the schema exists. Every statement is "create if not
//! exists", safe under concurrent bootstrap from independent processes.

use sqlx::PgPool;

/// Create the kv_store and accounts tables plus their indexes.
pub async fn bootstrap(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            secure_c_ses TEXT NOT NULL,
            host_c_oses TEXT,
            csesidx TEXT NOT NULL,
            config_id TEXT NOT NULL,
            expires_at TEXT,
            disabled BOOLEAN NOT NULL DEFAULT FALSE,
            mail_provider TEXT,
            mail_address TEXT,
            mail_password TEXT,
            mail_client_id TEXT,
            mail_refresh_token TEXT,
            mail_tenant TEXT,
            mail_base_url TEXT,
            mail_jwt_token TEXT,
            mail_verify_ssl BOOLEAN,
            mail_domain TEXT,
            mail_api_key TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_disabled ON accounts(disabled)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_expires_at ON accounts(expires_at)")
        .execute(pool)
        .await?;

    tracing::info!("database schema bootstrapped");
    Ok(())
}
