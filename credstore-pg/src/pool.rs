//! Process-wide connection pool with double-checked lazy initialization.
//!
//! The pool is created at most once per process lifetime and torn down
//! only at exit. Construction failures are never cached: until a pool
//! has been published, every call retries from scratch.

use once_cell::sync::OnceCell;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tokio::sync::Mutex;

use credstore_core::{config, PoolConfig};

use crate::error::StoreError;
use crate::schema;

/// Owns the singleton pool.
///
/// Fast path is a lock-free read of the published reference; the mutex
/// guards construction only, so concurrent first-callers build exactly
/// one pool and the lock never serializes normal operation.
pub struct PoolManager {
    pool: OnceCell<PgPool>,
    init: Mutex<()>,
}

impl PoolManager {
    pub const fn new() -> Self {
        Self {
            pool: OnceCell::new(),
            init: Mutex::const_new(()),
        }
    }

    pub async fn get(&self) -> Result<&PgPool, StoreError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let _guard = self.init.lock().await;
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }
        let pool = Self::build().await?;
        tracing::info!("postgres pool initialized");
        Ok(self.pool.get_or_init(|| pool))
    }

    /// Connect and bootstrap. The schema runs before the pool is
    /// published, so every observer of a non-null pool can assume the
    /// tables exist.
    async fn build() -> Result<PgPool, StoreError> {
        let url = config::database_url()
            .ok_or_else(|| StoreError::config("DATABASE_URL is not set"))?;
        let sizing = PoolConfig::from_env();

        let options: PgConnectOptions = url.parse().map_err(StoreError::unavailable)?;
        let options = options.options([(
            "statement_timeout",
            sizing.command_timeout.as_millis().to_string(),
        )]);

        let pool = PgPoolOptions::new()
            .min_connections(sizing.min_size.min(sizing.max_size))
            .max_connections(sizing.max_size)
            .acquire_timeout(sizing.command_timeout)
            .connect_with(options)
            .await
            .map_err(StoreError::unavailable)?;

        schema::bootstrap(&pool)
            .await
            .map_err(StoreError::unavailable)?;

        Ok(pool)
    }
}

static MANAGER: PoolManager = PoolManager::new();

/// The singleton pool, created on first call.
pub async fn get_pool() -> Result<&'static PgPool, StoreError> {
    MANAGER.get().await
}
