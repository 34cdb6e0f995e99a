//! Derived read models — never stored, always recomputed.
//!
//! The dashboard view is what a subscriber (or an admin card) sees: every
//! subscription's access evaluation plus the credential grant, with secrets
//! withheld while blocked and a provisioning marker while the pool is
//! empty. Directory filters and suffix lookup serve the admin list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  access::{self, AccessEvaluation, AccessState},
  assign::{self, Assignment},
  credential::Credential,
  subscriber::Subscriber,
};

// ─── Grant ───────────────────────────────────────────────────────────────────

/// What a subscription surfaces in place of raw credential fields.
///
/// `Withheld` and `Provisioning` deliberately carry no secret material, so a
/// renderer cannot leak what it does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "grant", rename_all = "snake_case")]
pub enum CredentialGrant {
  Granted { login: String, secret: String },
  /// Access state is blocked; a credential exists but is not shown.
  Withheld,
  /// The service has no usable credential yet.
  Provisioning,
}

/// One subscription's line on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionView {
  pub evaluation: AccessEvaluation,
  pub grant:      CredentialGrant,
}

/// The full derived view for one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
  pub phone:         String,
  pub name:          String,
  pub debtor:        bool,
  pub deleted:       bool,
  pub last_seen_at:  Option<DateTime<Utc>>,
  /// When this view was computed; independent fetches compare on it.
  pub as_of:         DateTime<Utc>,
  pub subscriptions: Vec<SubscriptionView>,
}

/// Computes the dashboard for one subscriber against full snapshots.
///
/// The whole subscriber list is required because the requester's rank
/// depends on their peers.
pub fn dashboard(
  subscriber: &Subscriber,
  subscribers: &[Subscriber],
  credentials: &[Credential],
  as_of: DateTime<Utc>,
) -> DashboardView {
  let today = as_of.date_naive();
  let subscriptions = subscriber
    .subscriptions
    .iter()
    .map(|sub| {
      let evaluation = access::evaluate(
        sub,
        subscriber.debtor,
        subscriber.override_expiration,
        today,
      );
      let grant = if evaluation.state.is_blocked() {
        CredentialGrant::Withheld
      } else {
        match assign::resolve(subscribers, credentials, &sub.service, &subscriber.phone) {
          Assignment::Assigned { credential, .. } => CredentialGrant::Granted {
            login:  credential.login,
            secret: credential.secret,
          },
          Assignment::NoCredential => CredentialGrant::Provisioning,
        }
      };
      SubscriptionView { evaluation, grant }
    })
    .collect();

  DashboardView {
    phone: subscriber.phone.clone(),
    name: subscriber.name.clone(),
    debtor: subscriber.debtor,
    deleted: subscriber.deleted,
    last_seen_at: subscriber.last_seen_at,
    as_of,
    subscriptions,
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Derived admin directory filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryFilter {
  #[default]
  All,
  Debtors,
  Expiring,
  Blocked,
  Unpaid,
}

/// Filters the directory. Soft-deleted subscribers are skipped unless
/// explicitly requested; the state filters are evaluated fresh per call.
pub fn filter_directory<'a>(
  subscribers: &'a [Subscriber],
  filter: DirectoryFilter,
  include_deleted: bool,
  as_of: DateTime<Utc>,
) -> Vec<&'a Subscriber> {
  let today = as_of.date_naive();
  subscribers
    .iter()
    .filter(|s| include_deleted || !s.deleted)
    .filter(|s| match filter {
      DirectoryFilter::All => true,
      DirectoryFilter::Debtors => s.debtor,
      DirectoryFilter::Expiring => access::evaluate_all(s, today)
        .iter()
        .any(|e| e.state == AccessState::ExpiringSoon),
      DirectoryFilter::Blocked => access::evaluate_all(s, today)
        .iter()
        .any(|e| e.state == AccessState::Blocked),
      DirectoryFilter::Unpaid => s.subscriptions.iter().any(|sub| !sub.paid),
    })
    .collect()
}

/// True when the digits of `phone` end with `digits` (formatting characters
/// in the stored phone are ignored).
pub fn phone_suffix_matches(phone: &str, digits: &str) -> bool {
  if digits.is_empty() {
    return false;
  }
  let stripped: String = phone.chars().filter(char::is_ascii_digit).collect();
  stripped.ends_with(digits)
}

/// The "last digits" login flow: dashboards for every non-deleted
/// subscriber whose phone ends with `digits`.
pub fn lookup_by_suffix(
  subscribers: &[Subscriber],
  credentials: &[Credential],
  digits: &str,
  as_of: DateTime<Utc>,
) -> Vec<DashboardView> {
  subscribers
    .iter()
    .filter(|s| !s.deleted && phone_suffix_matches(&s.phone, digits))
    .map(|s| dashboard(s, subscribers, credentials, as_of))
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::subscriber::Subscription;

  fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
  }

  fn subscriber(phone: &str, start: &str, paid: bool) -> Subscriber {
    let mut s = Subscriber::new(phone, "test").unwrap();
    s.subscriptions = vec![Subscription::new("Viki", start, paid, 1).unwrap()];
    s
  }

  fn credential(login: &str) -> Credential {
    let mut c = Credential::new("Viki", login, "hunter2").unwrap();
    c.published_at = Utc.with_ymd_and_hms(2026, 8, 29, 0, 0, 0).unwrap();
    c
  }

  // ── Grants ───────────────────────────────────────────────────────────────

  #[test]
  fn live_subscription_gets_the_real_credential() {
    let subs = vec![subscriber("111", "2026-08-20", true)];
    let creds = vec![credential("viki01@pool.example")];
    let view = dashboard(&subs[0], &subs, &creds, as_of());
    assert_eq!(view.subscriptions.len(), 1);
    assert_eq!(
      view.subscriptions[0].grant,
      CredentialGrant::Granted {
        login:  "viki01@pool.example".into(),
        secret: "hunter2".into(),
      }
    );
  }

  #[test]
  fn blocked_subscription_withholds_the_secret() {
    // Unpaid and expired: blocked immediately.
    let subs = vec![subscriber("111", "2026-06-01", false)];
    let creds = vec![credential("viki01@pool.example")];
    let view = dashboard(&subs[0], &subs, &creds, as_of());
    assert_eq!(view.subscriptions[0].evaluation.state, AccessState::Blocked);
    assert_eq!(view.subscriptions[0].grant, CredentialGrant::Withheld);
  }

  #[test]
  fn empty_pool_reads_as_provisioning() {
    let subs = vec![subscriber("111", "2026-08-20", true)];
    let view = dashboard(&subs[0], &subs, &[], as_of());
    assert_eq!(view.subscriptions[0].grant, CredentialGrant::Provisioning);
  }

  // ── Filters ──────────────────────────────────────────────────────────────

  #[test]
  fn filters_partition_the_directory() {
    let mut debtor = subscriber("111", "2026-08-20", true);
    debtor.debtor = true;
    let unpaid_live = subscriber("222", "2026-08-20", false);
    let blocked = subscriber("333", "2026-06-01", false);
    let mut deleted = subscriber("444", "2026-08-20", true);
    deleted.deleted = true;
    let subs = vec![debtor, unpaid_live, blocked, deleted];

    let all = filter_directory(&subs, DirectoryFilter::All, false, as_of());
    assert_eq!(all.len(), 3);

    let with_deleted = filter_directory(&subs, DirectoryFilter::All, true, as_of());
    assert_eq!(with_deleted.len(), 4);

    let debtors = filter_directory(&subs, DirectoryFilter::Debtors, false, as_of());
    assert_eq!(debtors.len(), 1);
    assert_eq!(debtors[0].phone, "111");

    let blocked = filter_directory(&subs, DirectoryFilter::Blocked, false, as_of());
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].phone, "333");

    let unpaid = filter_directory(&subs, DirectoryFilter::Unpaid, false, as_of());
    let phones: Vec<&str> = unpaid.iter().map(|s| s.phone.as_str()).collect();
    assert_eq!(phones, vec!["222", "333"]);
  }

  #[test]
  fn expiring_filter_uses_the_warning_window() {
    // Expires 2026-08-31: one day out.
    let soon = subscriber("111", "2026-07-31", true);
    let later = subscriber("222", "2026-08-25", true);
    let subs = vec![soon, later];
    let expiring = filter_directory(&subs, DirectoryFilter::Expiring, false, as_of());
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].phone, "111");
  }

  // ── Lookup ───────────────────────────────────────────────────────────────

  #[test]
  fn suffix_lookup_ignores_phone_formatting() {
    assert!(phone_suffix_matches("+55 11 99999-0000", "90000"));
    assert!(!phone_suffix_matches("5511999990000", "1234"));
    assert!(!phone_suffix_matches("5511999990000", ""));
  }

  #[test]
  fn lookup_returns_dashboards_for_matches_only() {
    let subs = vec![
      subscriber("5511999990000", "2026-08-20", true),
      subscriber("5511888880000", "2026-08-20", true),
      subscriber("5511777791234", "2026-08-20", true),
    ];
    let found = lookup_by_suffix(&subs, &[], "0000", as_of());
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|v| v.phone.ends_with("0000")));
  }
}
