//! Repository implementations for database access
//!
//! Each repository borrows the shared pool and follows these patterns:
//! - Handles conflicts via ON CONFLICT (no check-then-insert)
//! - Transactions for multi-step operations
//! - Scoped connection acquisition: connections return to the pool even
//!   on failure

pub mod accounts;
pub mod kv;

pub use accounts::AccountRepo;
pub use kv::KvRepo;
