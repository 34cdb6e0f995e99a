//! Rank-modulo credential assignment.
//!
//! The mapping from subscriber to credential is never stored. Both sides are
//! sorted deterministically (credentials by publish date, subscribers by
//! phone number) and each subscriber takes `pool[rank % pool_size]`. Any two
//! clients computing over the same snapshot agree without coordination. The
//! accepted cost is a global reshuffle when membership changes.

use serde::{Deserialize, Serialize};

use crate::{credential::Credential, subscriber::Subscriber};

/// Loose service-name match: case-insensitive substring containment in
/// either direction, so "Viki" entitles against "Viki Pass" and vice versa.
pub fn service_matches(a: &str, b: &str) -> bool {
  let a = a.trim().to_lowercase();
  let b = b.trim().to_lowercase();
  !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

// ─── Pool construction ───────────────────────────────────────────────────────

/// The ordered credential pool for a service: visible, non-demo, matching
/// credentials sorted by publish date (oldest first, login breaks ties so
/// the order is total).
pub fn build_pool<'a>(credentials: &'a [Credential], service: &str) -> Vec<&'a Credential> {
  let mut pool: Vec<&Credential> = credentials
    .iter()
    .filter(|c| c.visible)
    .filter(|c| !c.login.to_lowercase().contains("demo"))
    .filter(|c| service_matches(&c.service, service))
    .collect();
  pool.sort_by(|a, b| {
    a.published_at
      .cmp(&b.published_at)
      .then_with(|| a.login.cmp(&b.login))
  });
  pool
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// All non-deleted subscribers entitled to a service, sorted by phone
/// number. A subscriber's index here is their rank.
pub fn rank_subscribers<'a>(subscribers: &'a [Subscriber], service: &str) -> Vec<&'a Subscriber> {
  let mut ranked: Vec<&Subscriber> = subscribers
    .iter()
    .filter(|s| !s.deleted)
    .filter(|s| {
      s.subscriptions
        .iter()
        .any(|sub| service_matches(&sub.service, service))
    })
    .collect();
  ranked.sort_by(|a, b| a.phone.cmp(&b.phone));
  ranked
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// The outcome of one assignment computation.
///
/// An empty pool is a normal result, not an error; callers render it as a
/// provisioning placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Assignment {
  Assigned {
    credential: Credential,
    rank:       usize,
    pool_index: usize,
    pool_size:  usize,
  },
  NoCredential,
}

impl Assignment {
  pub fn credential(&self) -> Option<&Credential> {
    match self {
      Self::Assigned { credential, .. } => Some(credential),
      Self::NoCredential => None,
    }
  }
}

/// Computes the credential assigned to `phone` for `service`.
///
/// A requester missing from the ranked list (membership changed under them)
/// falls back to rank 0 rather than failing.
pub fn resolve(
  subscribers: &[Subscriber],
  credentials: &[Credential],
  service: &str,
  phone: &str,
) -> Assignment {
  let pool = build_pool(credentials, service);
  if pool.is_empty() {
    return Assignment::NoCredential;
  }

  let ranked = rank_subscribers(subscribers, service);
  let rank = ranked
    .iter()
    .position(|s| s.phone == phone)
    .unwrap_or(0);
  let pool_index = rank % pool.len();

  Assignment::Assigned {
    credential: pool[pool_index].clone(),
    rank,
    pool_index,
    pool_size: pool.len(),
  }
}

/// Inverse mapping: every ranked subscriber whose assignment lands on
/// `credential`. Empty when the credential is not in its own service's pool
/// (hidden, demo login, or unknown).
pub fn roster<'a>(
  subscribers: &'a [Subscriber],
  credentials: &[Credential],
  credential: &Credential,
) -> Vec<&'a Subscriber> {
  let pool = build_pool(credentials, &credential.service);
  let Some(index) = pool
    .iter()
    .position(|c| c.credential_id == credential.credential_id)
  else {
    return Vec::new();
  };

  rank_subscribers(subscribers, &credential.service)
    .into_iter()
    .enumerate()
    .filter(|(rank, _)| rank % pool.len() == index)
    .map(|(_, s)| s)
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::subscriber::Subscription;

  fn credential(service: &str, login: &str, day: u32) -> Credential {
    let mut c = Credential::new(service, login, "pw").unwrap();
    c.published_at = Utc.with_ymd_and_hms(2026, 8, day, 0, 0, 0).unwrap();
    c
  }

  fn subscriber(phone: &str, service: &str) -> Subscriber {
    let mut s = Subscriber::new(phone, "test").unwrap();
    s.subscriptions =
      vec![Subscription::new(service, "2026-08-01", true, 1).unwrap()];
    s
  }

  // ── Matching ─────────────────────────────────────────────────────────────

  #[test]
  fn matching_is_case_insensitive_and_bidirectional() {
    assert!(service_matches("Viki Pass", "viki"));
    assert!(service_matches("viki", "Viki Pass"));
    assert!(service_matches("KOCOWA+", "kocowa"));
    assert!(!service_matches("Viki", "Netflix"));
    assert!(!service_matches("", "Viki"));
    assert!(!service_matches("Viki", "  "));
  }

  // ── Pool ─────────────────────────────────────────────────────────────────

  #[test]
  fn pool_is_oldest_first() {
    let creds = vec![
      credential("Viki", "b@pool.example", 5),
      credential("Viki", "a@pool.example", 1),
    ];
    let pool = build_pool(&creds, "viki");
    assert_eq!(pool.len(), 2);
    assert_eq!(pool[0].login, "a@pool.example");
  }

  #[test]
  fn hidden_demo_and_foreign_credentials_stay_out() {
    let mut hidden = credential("Viki", "hidden@pool.example", 1);
    hidden.visible = false;
    let creds = vec![
      hidden,
      credential("Viki", "demo-account@pool.example", 2),
      credential("Netflix", "other@pool.example", 3),
      credential("Viki", "real@pool.example", 4),
    ];
    let pool = build_pool(&creds, "viki");
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].login, "real@pool.example");
  }

  #[test]
  fn simultaneous_publishes_order_by_login() {
    let creds = vec![
      credential("Viki", "b@pool.example", 1),
      credential("Viki", "a@pool.example", 1),
    ];
    let pool = build_pool(&creds, "viki");
    assert_eq!(pool[0].login, "a@pool.example");
  }

  // ── Ranking ──────────────────────────────────────────────────────────────

  #[test]
  fn rank_orders_by_phone_and_skips_deleted() {
    let mut gone = subscriber("222", "Viki");
    gone.deleted = true;
    let subs = vec![subscriber("333", "Viki"), gone, subscriber("111", "Viki")];
    let ranked = rank_subscribers(&subs, "viki");
    let phones: Vec<&str> = ranked.iter().map(|s| s.phone.as_str()).collect();
    assert_eq!(phones, vec!["111", "333"]);
  }

  // ── Resolution ───────────────────────────────────────────────────────────

  #[test]
  fn four_subscribers_across_two_credentials_alternate() {
    let subs: Vec<Subscriber> = ["111", "222", "333", "444"]
      .iter()
      .map(|p| subscriber(p, "Viki"))
      .collect();
    let creds = vec![
      credential("Viki", "first@pool.example", 1),
      credential("Viki", "second@pool.example", 5),
    ];

    let logins: Vec<String> = subs
      .iter()
      .map(|s| {
        resolve(&subs, &creds, "Viki", &s.phone)
          .credential()
          .unwrap()
          .login
          .clone()
      })
      .collect();
    assert_eq!(
      logins,
      vec![
        "first@pool.example",
        "second@pool.example",
        "first@pool.example",
        "second@pool.example"
      ]
    );
  }

  #[test]
  fn distribution_never_skews_past_one() {
    let subs: Vec<Subscriber> = (0..11)
      .map(|i| subscriber(&format!("{i:03}"), "Viki"))
      .collect();
    let creds: Vec<Credential> = (1..=3)
      .map(|d| credential("Viki", &format!("c{d}@pool.example"), d))
      .collect();

    let mut counts = [0usize; 3];
    for s in &subs {
      match resolve(&subs, &creds, "Viki", &s.phone) {
        Assignment::Assigned { pool_index, .. } => counts[pool_index] += 1,
        Assignment::NoCredential => panic!("pool is non-empty"),
      }
    }
    // 11 over 3: every index gets floor or ceil of the average.
    assert_eq!(counts.iter().sum::<usize>(), 11);
    assert!(counts.iter().all(|&c| c == 3 || c == 4), "{counts:?}");
  }

  #[test]
  fn resolution_is_deterministic_under_input_shuffling() {
    let subs: Vec<Subscriber> = ["222", "111", "444", "333"]
      .iter()
      .map(|p| subscriber(p, "Viki"))
      .collect();
    let creds = vec![
      credential("Viki", "second@pool.example", 5),
      credential("Viki", "first@pool.example", 1),
    ];

    let mut reversed_subs = subs.clone();
    reversed_subs.reverse();
    let mut reversed_creds = creds.clone();
    reversed_creds.reverse();

    for s in &subs {
      assert_eq!(
        resolve(&subs, &creds, "Viki", &s.phone),
        resolve(&reversed_subs, &reversed_creds, "Viki", &s.phone)
      );
    }
  }

  #[test]
  fn empty_pool_yields_no_credential() {
    let subs = vec![subscriber("111", "Viki")];
    assert_eq!(resolve(&subs, &[], "Viki", "111"), Assignment::NoCredential);
  }

  #[test]
  fn unranked_requester_falls_back_to_the_first_slot() {
    let subs = vec![subscriber("111", "Viki"), subscriber("222", "Viki")];
    let creds = vec![
      credential("Viki", "first@pool.example", 1),
      credential("Viki", "second@pool.example", 5),
    ];
    match resolve(&subs, &creds, "Viki", "999") {
      Assignment::Assigned { pool_index, rank, .. } => {
        assert_eq!(rank, 0);
        assert_eq!(pool_index, 0);
      }
      Assignment::NoCredential => panic!("pool is non-empty"),
    }
  }

  // ── Roster ───────────────────────────────────────────────────────────────

  #[test]
  fn roster_inverts_the_assignment() {
    let subs: Vec<Subscriber> = ["111", "222", "333", "444", "555"]
      .iter()
      .map(|p| subscriber(p, "Viki"))
      .collect();
    let creds = vec![
      credential("Viki", "first@pool.example", 1),
      credential("Viki", "second@pool.example", 5),
    ];

    let first = roster(&subs, &creds, &creds[0]);
    let phones: Vec<&str> = first.iter().map(|s| s.phone.as_str()).collect();
    assert_eq!(phones, vec!["111", "333", "555"]);

    let second = roster(&subs, &creds, &creds[1]);
    assert_eq!(second.len(), 2);
  }

  #[test]
  fn roster_of_a_pooled_out_credential_is_empty() {
    let subs = vec![subscriber("111", "Viki")];
    let mut hidden = credential("Viki", "hidden@pool.example", 1);
    hidden.visible = false;
    let creds = vec![hidden.clone(), credential("Viki", "real@pool.example", 2)];
    assert!(roster(&subs, &creds, &hidden).is_empty());
  }
}
