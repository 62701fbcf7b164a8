//! Key-value document store.
//!
//! Backs the "settings" and "stats" singletons: one JSONB document per
//! key, full-replace writes, `updated_at` refreshed on every write.

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::error::StoreError;

/// Key-value repository
pub struct KvRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> KvRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the document stored under `key`, or `None` if no row exists.
    ///
    /// Legacy rows written as JSON-encoded strings are unwrapped into the
    /// document they encode.
    pub async fn get(&self, key: &str) -> Result<Option<JsonValue>, StoreError> {
        let value: Option<JsonValue> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool)
                .await
                .map_err(|source| StoreError::operation("kv get", source))?;
        Ok(value.map(unwrap_double_encoded))
    }

    /// Replace the document stored under `key`. No partial merge: the
    /// stored value is always the whole document given.
    pub async fn set(&self, key: &str, value: &JsonValue) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await
        .map_err(|source| StoreError::operation("kv set", source))?;
        Ok(())
    }
}

fn unwrap_double_encoded(value: JsonValue) -> JsonValue {
    if let JsonValue::String(raw) = &value {
        if let Ok(inner) = serde_json::from_str(raw) {
            return inner;
        }
    }
    value
}
