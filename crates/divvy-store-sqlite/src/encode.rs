//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings, and
//! the subscription list the `;`-joined canonical pipe encoding. Decoding
//! the subscription column goes through the total normalizer, so a mangled
//! column degrades to fewer entries instead of a failed read.

use chrono::{DateTime, Utc};
use divvy_core::{
  credential::Credential,
  normalize::decode_subscriptions,
  subscriber::{Subscriber, encode_subscriptions},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subscribers` row.
pub struct RawSubscriber {
  pub phone:               String,
  pub name:                String,
  pub subscriptions:       String,
  pub debtor:              bool,
  pub override_expiration: bool,
  pub deleted:             bool,
  pub created_at:          String,
  pub last_seen_at:        Option<String>,
  pub version:             i64,
}

impl RawSubscriber {
  pub fn into_subscriber(self) -> Result<Subscriber> {
    Ok(Subscriber {
      phone:               self.phone,
      name:                self.name,
      subscriptions:       decode_subscriptions(&self.subscriptions),
      debtor:              self.debtor,
      override_expiration: self.override_expiration,
      deleted:             self.deleted,
      created_at:          decode_dt(&self.created_at)?,
      last_seen_at:        self.last_seen_at.as_deref().map(decode_dt).transpose()?,
      version:             self.version,
    })
  }
}

pub fn encode_subscriber_subscriptions(record: &Subscriber) -> String {
  encode_subscriptions(&record.subscriptions)
}

/// Raw strings read directly from a `credentials` row.
pub struct RawCredential {
  pub credential_id: String,
  pub service:       String,
  pub login:         String,
  pub secret:        String,
  pub published_at:  String,
  pub visible:       bool,
  pub version:       i64,
}

impl RawCredential {
  pub fn into_credential(self) -> Result<Credential> {
    Ok(Credential {
      credential_id: decode_uuid(&self.credential_id)?,
      service:       self.service,
      login:         self.login,
      secret:        self.secret,
      published_at:  decode_dt(&self.published_at)?,
      visible:       self.visible,
      version:       self.version,
    })
  }
}
