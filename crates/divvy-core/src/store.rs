//! The `DirectoryStore` trait.
//!
//! Implemented by storage backends (e.g. `divvy-store-sqlite`). Higher
//! layers depend on this abstraction, not on any concrete backend; the
//! evaluation pipeline itself takes snapshots by value and never touches
//! the store directly.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{credential::Credential, subscriber::Subscriber};

/// Result of a versioned write.
///
/// A stale write is a domain outcome, not a backend failure: the caller
/// refetches, reapplies, and retries, or gives up and reports the conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome<T> {
  /// The write was accepted; the stored record carries its new version.
  Stored(T),
  /// The writer's version no longer matches what is stored.
  Conflict { current_version: i64 },
}

impl<T> UpsertOutcome<T> {
  pub fn is_stored(&self) -> bool { matches!(self, Self::Stored(_)) }

  pub fn stored(self) -> Option<T> {
    match self {
      Self::Stored(record) => Some(record),
      Self::Conflict { .. } => None,
    }
  }
}

/// Abstraction over a divvy directory backend.
///
/// Lists return full snapshots: soft-deleted subscribers and invisible
/// credentials included, since excluding them is the resolver's job.
/// Upserts check the record's `version` against storage; version 0 claims
/// the record is new. All methods return `Send` futures so the trait works
/// under multi-threaded async runtimes.
pub trait DirectoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Snapshots ─────────────────────────────────────────────────────────

  fn list_subscribers(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;

  fn list_credentials(
    &self,
  ) -> impl Future<Output = Result<Vec<Credential>, Self::Error>> + Send + '_;

  // ── Point reads ───────────────────────────────────────────────────────

  fn get_subscriber<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + 'a;

  fn get_credential(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + '_;

  // ── Versioned writes ──────────────────────────────────────────────────

  /// Insert or update, gated on `record.version`. On success the returned
  /// record carries the incremented version.
  fn upsert_subscriber(
    &self,
    record: Subscriber,
  ) -> impl Future<Output = Result<UpsertOutcome<Subscriber>, Self::Error>> + Send + '_;

  fn upsert_credential(
    &self,
    record: Credential,
  ) -> impl Future<Output = Result<UpsertOutcome<Credential>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// The explicit hard delete. Returns whether a row existed.
  fn purge_subscriber<'a>(
    &'a self,
    phone: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Heartbeat write. Bypasses the version check: it is monotonic and
  /// conflict-free by construction. Returns whether the row existed.
  fn touch_last_seen<'a>(
    &'a self,
    phone: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
