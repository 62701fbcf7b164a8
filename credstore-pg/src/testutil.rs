//! Shared helpers for tests that touch process-global state.

use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Tests that read or mutate `DATABASE_URL` take this lock so the
/// enablement signal can't change under a running assertion.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
