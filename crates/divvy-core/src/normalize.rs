//! Subscription-field normalization.
//!
//! Subscription data arrives in several historical shapes: a list of
//! canonical entries, one delimited container string, or shorthand left by
//! hand-editing. [`normalize`] flattens all of them into ordered
//! [`Subscription`] records. It is total (any input yields a well-formed
//! list) and idempotent (canonical output passes through unchanged).

use serde::{Deserialize, Serialize};

use crate::subscriber::Subscription;

/// A subscription field as found in the wild: either an explicit list of
/// entries or one container string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSubscriptions {
  List(Vec<String>),
  Text(String),
}

/// Flattens a raw subscription field into ordered records.
///
/// List input is already split: each element is one entry and is never
/// re-split, so service names containing a delimiter character survive a
/// round trip. Text input is split on the highest-priority delimiter
/// present: `;`, then `,`, then `+`.
///
/// `container_months` is the fallback duration for entries that do not
/// carry their own; absent that, one month.
pub fn normalize(raw: &RawSubscriptions, container_months: Option<u32>) -> Vec<Subscription> {
  let default_months = container_months.filter(|&m| m >= 1).unwrap_or(1);
  let entries: Vec<&str> = match raw {
    RawSubscriptions::List(items) => items.iter().map(String::as_str).collect(),
    RawSubscriptions::Text(text) => split_container(text),
  };
  entries
    .into_iter()
    .filter_map(|entry| parse_entry(entry, default_months))
    .collect()
}

/// Decodes the `;`-separated at-rest encoding back into records.
pub fn decode_subscriptions(field: &str) -> Vec<Subscription> {
  normalize(&RawSubscriptions::Text(field.to_string()), None)
}

/// Strips the optional `{...}` container wrapper and splits on the
/// highest-priority delimiter present.
fn split_container(text: &str) -> Vec<&str> {
  let text = text.trim();
  let text = text.strip_prefix('{').unwrap_or(text);
  let text = text.strip_suffix('}').unwrap_or(text);
  if text.contains(';') {
    text.split(';').collect()
  } else if text.contains(',') {
    text.split(',').collect()
  } else if text.contains('+') {
    // Legacy delimiter. A name like "Kocowa+" splits here too; the stray
    // tail becomes a `|...` fragment and is dropped below.
    text.split('+').collect()
  } else if text.is_empty() {
    Vec::new()
  } else {
    vec![text]
  }
}

/// Trims an entry and removes one layer of surrounding quotes.
fn clean_entry(entry: &str) -> &str {
  let entry = entry.trim();
  let unquoted = entry
    .strip_prefix('"')
    .and_then(|e| e.strip_suffix('"'))
    .or_else(|| entry.strip_prefix('\'').and_then(|e| e.strip_suffix('\'')));
  unquoted.unwrap_or(entry).trim()
}

/// Parses one `service|start|paid|months` entry.
///
/// Every field but the service is optional: paid defaults to unpaid, months
/// to the container default. Unusable entries (empty, the literal `null`,
/// or a fragment starting with `|`) yield `None`.
fn parse_entry(entry: &str, default_months: u32) -> Option<Subscription> {
  let entry = clean_entry(entry);
  if entry.is_empty() || entry.eq_ignore_ascii_case("null") || entry.starts_with('|') {
    return None;
  }

  let mut fields = entry.split('|');
  let service = fields.next()?.trim();
  if service.is_empty() {
    return None;
  }
  let start = fields.next().unwrap_or("").trim().to_string();
  let paid = fields.next().map(str::trim) == Some("1");
  let months = fields
    .next()
    .and_then(|m| m.trim().parse::<u32>().ok())
    .filter(|&m| m >= 1)
    .unwrap_or(default_months);

  Some(Subscription {
    service: service.to_string(),
    start,
    paid,
    months,
  })
}
