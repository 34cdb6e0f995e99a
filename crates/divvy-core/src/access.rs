//! Time-based access classification.
//!
//! Evaluates one subscription against an explicit evaluation day and the
//! subscriber's global flags. Everything here is a pure function of its
//! arguments, computed fresh on every read.

use chrono::{DateTime, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::subscriber::{Subscriber, Subscription};

/// Days past expiry a paid subscription keeps access before blocking.
pub const GRACE_DAYS: i64 = 3;

/// Days before expiry at which a subscription starts warning.
pub const EXPIRING_WINDOW_DAYS: i64 = 5;

// ─── State ───────────────────────────────────────────────────────────────────

/// The access state of one subscription, computed at read time.
///
/// Exactly one applies; the blocking checks win over the warning ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
  Active,
  ExpiringSoon,
  GracePeriod,
  Blocked,
}

impl AccessState {
  pub fn is_blocked(&self) -> bool { matches!(self, Self::Blocked) }
}

/// One subscription's full evaluation for a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvaluation {
  pub service:          String,
  /// Start date actually used; equals the evaluation day when the stored
  /// text failed to parse.
  pub start:            NaiveDate,
  pub expires_on:       NaiveDate,
  /// Whole days until expiry. 0 means "expires today", negative means past.
  pub days_remaining:   i64,
  pub paid:             bool,
  pub state:            AccessState,
  /// Set when the stored start date could not be parsed and the evaluation
  /// day was substituted. Diagnostic only; never fatal.
  pub date_was_invalid: bool,
}

// ─── Date handling ───────────────────────────────────────────────────────────

/// Parses a stored start-date text: a plain ISO date, or the date part of an
/// RFC 3339 timestamp. `None` when neither form fits.
pub fn parse_start(text: &str) -> Option<NaiveDate> {
  let text = text.trim();
  if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
    return Some(date);
  }
  DateTime::parse_from_rfc3339(text)
    .ok()
    .map(|dt| dt.date_naive())
}

/// Calendar-month expiry. Month overflow advances the year; a day of month
/// past the end of the target month clamps to its last day.
pub fn expiry_date(start: NaiveDate, months: u32) -> NaiveDate {
  start
    .checked_add_months(Months::new(months))
    .unwrap_or(NaiveDate::MAX)
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Evaluates one subscription for `today`, applying the subscriber-level
/// debtor and override flags.
///
/// Classification priority: `Blocked` first (more than [`GRACE_DAYS`] past
/// expiry, or expired while unpaid, or expired while the subscriber is a
/// debtor), then `GracePeriod`, then `ExpiringSoon`, then `Active`. The
/// override flag skips the blocking checks entirely.
pub fn evaluate(
  subscription: &Subscription,
  debtor: bool,
  override_expiration: bool,
  today: NaiveDate,
) -> AccessEvaluation {
  let (start, date_was_invalid) = match parse_start(&subscription.start) {
    Some(date) => (date, false),
    None => (today, true),
  };
  let expires_on = expiry_date(start, subscription.months);
  let days_remaining = (expires_on - today).num_days();
  let expired = days_remaining < 0;

  let blocked = !override_expiration
    && (days_remaining < -GRACE_DAYS
      || (!subscription.paid && expired)
      || (debtor && expired));

  let state = if blocked {
    AccessState::Blocked
  } else if (-GRACE_DAYS..0).contains(&days_remaining) {
    AccessState::GracePeriod
  } else if (0..=EXPIRING_WINDOW_DAYS).contains(&days_remaining) {
    AccessState::ExpiringSoon
  } else {
    AccessState::Active
  };

  AccessEvaluation {
    service: subscription.service.clone(),
    start,
    expires_on,
    days_remaining,
    paid: subscription.paid,
    state,
    date_was_invalid,
  }
}

/// Evaluates every subscription a subscriber holds.
pub fn evaluate_all(subscriber: &Subscriber, today: NaiveDate) -> Vec<AccessEvaluation> {
  subscriber
    .subscriptions
    .iter()
    .map(|sub| {
      evaluate(
        sub,
        subscriber.debtor,
        subscriber.override_expiration,
        today,
      )
    })
    .collect()
}

// ─── Mutations ───────────────────────────────────────────────────────────────

/// Renews a subscription in place: the new term starts at the later of today
/// and the current expiry, keeps the duration, and marks it paid. An
/// unreadable current start renews from today.
pub fn renew(subscription: &mut Subscription, today: NaiveDate) {
  let new_start = match parse_start(&subscription.start) {
    Some(start) => expiry_date(start, subscription.months).max(today),
    None => today,
  };
  subscription.start = new_start.format("%Y-%m-%d").to_string();
  subscription.paid = true;
}

/// Marks a subscription paid without touching its dates.
pub fn mark_paid(subscription: &mut Subscription) { subscription.paid = true; }
