//! SQLite storage layer for epicsync.
//!
//! This module provides the mirror store using SQLite with:
//! - WAL mode so queries never block on an in-flight sync
//! - Transaction discipline for atomic reconciliation commits
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`migrations`] - Embedded schema migrations
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::{MirrorDiff, MirrorEntry, MutationContext, SqliteStorage};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Store handle shared by the engine, the query service and the HTTP layer.
///
/// Guards must be dropped before any `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Wrap a store for sharing.
#[must_use]
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Lock the shared store.
///
/// A poisoned lock is recovered: every write runs inside its own
/// transaction, so a panic mid-write leaves no partial state behind.
pub fn lock(storage: &SharedStorage) -> MutexGuard<'_, SqliteStorage> {
    storage.lock().unwrap_or_else(PoisonError::into_inner)
}
