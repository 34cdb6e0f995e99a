//! Directory statistics for the admin overview.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  access::{self, AccessState},
  assign::service_matches,
  subscriber::{Subscriber, Subscription},
};

/// Counts over the non-deleted directory plus expected monthly revenue.
/// Money is integer cents throughout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
  pub subscribers:            usize,
  pub active:                 usize,
  pub debtors:                usize,
  pub with_blocked:           usize,
  pub with_expiring:          usize,
  pub unpaid_subscriptions:   usize,
  pub expected_revenue_cents: u64,
}

/// Price of one subscription: multi-month terms at a flat bundle rate,
/// "viki"-matched services above the base price, everything else at base.
pub fn price_cents(subscription: &Subscription) -> u64 {
  if subscription.months > 1 {
    5000
  } else if service_matches(&subscription.service, "viki") {
    2000
  } else {
    1500
  }
}

/// Computes the directory stats for `today`. Soft-deleted subscribers
/// contribute nothing, revenue included.
pub fn directory_stats(subscribers: &[Subscriber], today: NaiveDate) -> DirectoryStats {
  let mut stats = DirectoryStats {
    subscribers: 0,
    active: 0,
    debtors: 0,
    with_blocked: 0,
    with_expiring: 0,
    unpaid_subscriptions: 0,
    expected_revenue_cents: 0,
  };

  for subscriber in subscribers.iter().filter(|s| !s.deleted) {
    stats.subscribers += 1;
    if subscriber.debtor {
      stats.debtors += 1;
    }

    let evaluations = access::evaluate_all(subscriber, today);
    let any_blocked = evaluations.iter().any(|e| e.state == AccessState::Blocked);
    if any_blocked {
      stats.with_blocked += 1;
    } else if !evaluations.is_empty() {
      stats.active += 1;
    }
    if evaluations
      .iter()
      .any(|e| e.state == AccessState::ExpiringSoon)
    {
      stats.with_expiring += 1;
    }

    for subscription in &subscriber.subscriptions {
      if !subscription.paid {
        stats.unpaid_subscriptions += 1;
      }
      stats.expected_revenue_cents += price_cents(subscription);
    }
  }

  stats
}
