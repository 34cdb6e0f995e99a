//! Credential pool health.
//!
//! Read-only operational report for administrators: how old each credential
//! is, how many subscribers the resolver currently lands on it, and whether
//! either number crossed its service's limit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  assign::{build_pool, rank_subscribers, service_matches},
  credential::Credential,
  subscriber::Subscriber,
};

/// Capacity sentinel for services that tolerate any number of concurrent
/// users. Never treated as a real limit.
pub const UNBOUNDED: u32 = 9999;

// ─── Service tables ──────────────────────────────────────────────────────────

/// Days a credential stays usable before the service forces a refresh.
pub fn expiry_threshold_days(service: &str) -> i64 {
  if service_matches(service, "viki") {
    14
  } else if service_matches(service, "kocowa") {
    25
  } else {
    30
  }
}

/// Maximum concurrent users per credential, [`UNBOUNDED`] when the service
/// does not enforce one.
pub fn capacity(service: &str) -> u32 {
  for (name, limit) in [
    ("viki", 6),
    ("kocowa", 7),
    ("iqiyi", 15),
    ("wetv", UNBOUNDED),
    ("dramabox", UNBOUNDED),
    ("youku", UNBOUNDED),
  ] {
    if service_matches(service, name) {
      return limit;
    }
  }
  10
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Health of one credential. Age problems outrank crowding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
  Healthy,
  Expired,
  Overcrowded,
}

/// One row of the admin health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRow {
  pub credential_id:  uuid::Uuid,
  pub service:        String,
  pub login:          String,
  pub visible:        bool,
  pub days_active:    i64,
  pub threshold_days: i64,
  pub usage_count:    usize,
  pub capacity:       u32,
  pub state:          HealthState,
}

/// Classifies one credential given its age and current usage.
pub fn classify(days_active: i64, threshold_days: i64, usage_count: usize, cap: u32) -> HealthState {
  if days_active >= threshold_days {
    HealthState::Expired
  } else if cap != UNBOUNDED && usage_count >= cap as usize {
    HealthState::Overcrowded
  } else {
    HealthState::Healthy
  }
}

/// Builds the full health report for `today`, one row per credential.
///
/// Usage is the roster size: the pool and ranking are computed per service
/// and tallied by pool index, exactly what each subscriber's own resolution
/// would produce. Credentials outside their pool (hidden or demo) report
/// zero usage but are still listed so operators see them.
pub fn health_report(
  subscribers: &[Subscriber],
  credentials: &[Credential],
  today: NaiveDate,
) -> Vec<HealthRow> {
  credentials
    .iter()
    .map(|cred| {
      let pool = build_pool(credentials, &cred.service);
      let usage_count = pool
        .iter()
        .position(|c| c.credential_id == cred.credential_id)
        .map(|index| {
          rank_subscribers(subscribers, &cred.service)
            .iter()
            .enumerate()
            .filter(|(rank, _)| rank % pool.len() == index)
            .count()
        })
        .unwrap_or(0);

      let days_active = (today - cred.published_at.date_naive()).num_days();
      let threshold_days = expiry_threshold_days(&cred.service);
      let cap = capacity(&cred.service);

      HealthRow {
        credential_id: cred.credential_id,
        service: cred.service.clone(),
        login: cred.login.clone(),
        visible: cred.visible,
        days_active,
        threshold_days,
        usage_count,
        capacity: cap,
        state: classify(days_active, threshold_days, usage_count, cap),
      }
    })
    .collect()
}
