//! Subscriber records and their service entitlements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, assign::service_matches};

/// One service entitlement held by a subscriber.
///
/// The start date is kept as the ISO 8601 text it arrived with. It is parsed
/// at evaluation time; a value that fails to parse degrades to the evaluation
/// day and is flagged, never treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub service: String,
  pub start:   String,
  pub paid:    bool,
  /// Entitlement length in calendar months. Always at least one.
  pub months:  u32,
}

impl Subscription {
  pub fn new(
    service: impl Into<String>,
    start: impl Into<String>,
    paid: bool,
    months: u32,
  ) -> Result<Self> {
    let sub = Subscription {
      service: service.into().trim().to_string(),
      start: start.into().trim().to_string(),
      paid,
      months,
    };
    sub.validate()?;
    Ok(sub)
  }

  /// Checks the record invariants without consuming the value, so callers
  /// can vet deserialized input before storing it.
  pub fn validate(&self) -> Result<()> {
    if self.service.trim().is_empty() {
      return Err(Error::EmptyService);
    }
    if self.months < 1 {
      return Err(Error::ZeroMonths);
    }
    Ok(())
  }

  /// Canonical single-entry form: `<service>|<start>|<0|1>|<months>`.
  pub fn canonical(&self) -> String {
    format!(
      "{}|{}|{}|{}",
      self.service,
      self.start,
      if self.paid { "1" } else { "0" },
      self.months
    )
  }
}

/// Joins subscriptions into the `;`-separated field used at rest.
pub fn encode_subscriptions(subs: &[Subscription]) -> String {
  subs
    .iter()
    .map(Subscription::canonical)
    .collect::<Vec<_>>()
    .join(";")
}

/// A person sharing the credential pools.
///
/// The phone number is the identity: opaque text, compared and sorted
/// lexicographically. Deleted subscribers stay on disk with `deleted` set
/// until an explicit purge removes the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
  pub phone:               String,
  pub name:                String,
  pub subscriptions:       Vec<Subscription>,
  /// Known outstanding debt. Combined with an expired term this blocks
  /// access; on its own it only marks the directory entry.
  pub debtor:              bool,
  /// Manual switch that exempts every subscription from time-based
  /// blocking.
  pub override_expiration: bool,
  pub deleted:             bool,
  pub created_at:          DateTime<Utc>,
  pub last_seen_at:        Option<DateTime<Utc>>,
  /// Write-conflict counter. 0 means "not yet stored"; every accepted
  /// write increments it.
  pub version:             i64,
}

impl Subscriber {
  /// Builds a fresh, never-stored subscriber with no entitlements.
  pub fn new(phone: impl Into<String>, name: impl Into<String>) -> Result<Self> {
    let phone = phone.into().trim().to_string();
    if phone.is_empty() {
      return Err(Error::EmptyPhone);
    }
    Ok(Subscriber {
      phone,
      name: name.into().trim().to_string(),
      subscriptions: Vec::new(),
      debtor: false,
      override_expiration: false,
      deleted: false,
      created_at: Utc::now(),
      last_seen_at: None,
      version: 0,
    })
  }

  /// First subscription matching `service`, if any.
  pub fn subscription_mut(&mut self, service: &str) -> Option<&mut Subscription> {
    self
      .subscriptions
      .iter_mut()
      .find(|sub| service_matches(&sub.service, service))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonical_encodes_all_four_fields() {
    let sub = Subscription::new("Viki", "2026-01-15", true, 3).unwrap();
    assert_eq!(sub.canonical(), "Viki|2026-01-15|1|3");

    let unpaid = Subscription::new("Netflix", "2026-02-01", false, 1).unwrap();
    assert_eq!(unpaid.canonical(), "Netflix|2026-02-01|0|1");
  }

  #[test]
  fn encode_joins_with_semicolons() {
    let subs = vec![
      Subscription::new("Viki", "2026-01-15", true, 1).unwrap(),
      Subscription::new("Kocowa+", "2026-02-01", false, 2).unwrap(),
    ];
    assert_eq!(
      encode_subscriptions(&subs),
      "Viki|2026-01-15|1|1;Kocowa+|2026-02-01|0|2"
    );
    assert_eq!(encode_subscriptions(&[]), "");
  }

  #[test]
  fn construction_rejects_blank_identifiers() {
    assert!(matches!(
      Subscription::new("  ", "2026-01-01", false, 1),
      Err(Error::EmptyService)
    ));
    assert!(matches!(
      Subscription::new("Viki", "2026-01-01", false, 0),
      Err(Error::ZeroMonths)
    ));
    assert!(matches!(Subscriber::new("  ", "Ana"), Err(Error::EmptyPhone)));
  }

  #[test]
  fn new_subscriber_starts_unstored() {
    let sub = Subscriber::new(" 5511999990000 ", "Ana").unwrap();
    assert_eq!(sub.phone, "5511999990000");
    assert_eq!(sub.version, 0);
    assert!(!sub.deleted);
    assert!(sub.subscriptions.is_empty());
  }

  #[test]
  fn subscription_mut_matches_loosely() {
    let mut sub = Subscriber::new("5511999990000", "Ana").unwrap();
    sub.subscriptions = vec![
      Subscription::new("Viki Pass", "2026-01-01", false, 1).unwrap(),
      Subscription::new("Netflix", "2026-01-01", false, 1).unwrap(),
    ];
    assert!(sub.subscription_mut("viki").is_some());
    assert!(sub.subscription_mut("Disney").is_none());
  }
}
