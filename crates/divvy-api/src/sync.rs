//! Directory fingerprint — the pull-based change signal.
//!
//! A SHA-256 over the sorted (key, version, last-seen) tuples of both
//! tables. Any committed write changes the fingerprint: normal writes bump
//! the version, heartbeats move the hashed last-seen stamp. A client
//! polling `/sync` knows when to refetch and recompute. It is advisory;
//! clients may also refetch on their own schedule.

use std::sync::Arc;

use axum::{Json, extract::State};
use divvy_core::{credential::Credential, store::DirectoryStore, subscriber::Subscriber};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Compute the fingerprint for a snapshot pair.
///
/// Stable: same records in any order → same fingerprint.
pub fn fingerprint(subscribers: &[Subscriber], credentials: &[Credential]) -> String {
  // Heartbeat writes bypass the version counter, so the last-seen stamp is
  // hashed alongside it; zero stands in for "never" and for credentials.
  let mut entries: Vec<(String, i64, i64)> = subscribers
    .iter()
    .map(|s| {
      (
        format!("s:{}", s.phone),
        s.version,
        s.last_seen_at.map_or(0, |at| at.timestamp_micros()),
      )
    })
    .chain(
      credentials
        .iter()
        .map(|c| (format!("c:{}", c.credential_id), c.version, 0)),
    )
    .collect();
  entries.sort();

  let mut hasher = Sha256::new();
  for (key, version, last_seen) in &entries {
    hasher.update(key.as_bytes());
    hasher.update([0]);
    hasher.update(version.to_le_bytes());
    hasher.update(last_seen.to_le_bytes());
  }
  hex::encode(hasher.finalize())
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
  pub fingerprint: String,
}

/// `GET /sync`
pub async fn fingerprint_handler<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<SyncResponse>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subscribers = store
    .list_subscribers()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  let credentials = store
    .list_credentials()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(SyncResponse {
    fingerprint: fingerprint(&subscribers, &credentials),
  }))
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  fn subscriber(phone: &str, version: i64) -> Subscriber {
    let mut s = Subscriber::new(phone, "test").unwrap();
    s.version = version;
    s
  }

  #[test]
  fn insertion_order_does_not_matter() {
    let a = subscriber("111", 1);
    let b = subscriber("222", 4);
    assert_eq!(
      fingerprint(&[a.clone(), b.clone()], &[]),
      fingerprint(&[b, a], &[])
    );
  }

  #[test]
  fn any_version_bump_changes_the_fingerprint() {
    let before = fingerprint(&[subscriber("111", 1)], &[]);
    let after = fingerprint(&[subscriber("111", 2)], &[]);
    assert_ne!(before, after);
  }

  #[test]
  fn heartbeat_moves_the_fingerprint_without_a_version_bump() {
    let mut s = subscriber("111", 1);
    let before = fingerprint(&[s.clone()], &[]);
    s.last_seen_at = Some(Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap());
    let after = fingerprint(&[s.clone()], &[]);
    assert_ne!(before, after);

    // A later heartbeat moves it again.
    s.last_seen_at = Some(Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 1).unwrap());
    assert_ne!(after, fingerprint(&[s], &[]));
  }

  #[test]
  fn credentials_and_subscribers_are_both_covered() {
    let cred = Credential::new("Viki", "a@pool.example", "pw").unwrap();
    let empty = fingerprint(&[], &[]);
    let with_cred = fingerprint(&[], &[cred]);
    assert_ne!(empty, with_cred);
  }
}
