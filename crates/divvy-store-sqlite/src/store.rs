//! [`SqliteStore`] — the SQLite implementation of [`DirectoryStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use divvy_core::{
  credential::Credential,
  store::{DirectoryStore, UpsertOutcome},
  subscriber::Subscriber,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawCredential, RawSubscriber, encode_dt, encode_subscriber_subscriptions, encode_uuid,
  },
  schema::SCHEMA,
};

const SUBSCRIBER_COLUMNS: &str = "phone, name, subscriptions, debtor, \
   override_expiration, deleted, created_at, last_seen_at, version";

const CREDENTIAL_COLUMNS: &str =
  "credential_id, service, login, secret, published_at, visible, version";

fn subscriber_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubscriber> {
  Ok(RawSubscriber {
    phone:               row.get(0)?,
    name:                row.get(1)?,
    subscriptions:       row.get(2)?,
    debtor:              row.get(3)?,
    override_expiration: row.get(4)?,
    deleted:             row.get(5)?,
    created_at:          row.get(6)?,
    last_seen_at:        row.get(7)?,
    version:             row.get(8)?,
  })
}

fn credential_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCredential> {
  Ok(RawCredential {
    credential_id: row.get(0)?,
    service:       row.get(1)?,
    login:         row.get(2)?,
    secret:        row.get(3)?,
    published_at:  row.get(4)?,
    visible:       row.get(5)?,
    version:       row.get(6)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A divvy directory backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. The
/// version check and the write of each upsert run inside one connection
/// call, so concurrent writers serialize on the connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for SqliteStore {
  type Error = Error;

  // ── Snapshots ─────────────────────────────────────────────────────────────

  async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
    let raws: Vec<RawSubscriber> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers"))?;
        let rows = stmt
          .query_map([], subscriber_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawSubscriber::into_subscriber)
      .collect()
  }

  async fn list_credentials(&self) -> Result<Vec<Credential>> {
    let raws: Vec<RawCredential> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials"))?;
        let rows = stmt
          .query_map([], credential_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawCredential::into_credential)
      .collect()
  }

  // ── Point reads ───────────────────────────────────────────────────────────

  async fn get_subscriber(&self, phone: &str) -> Result<Option<Subscriber>> {
    let phone = phone.to_owned();
    let raw: Option<RawSubscriber> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE phone = ?1"),
              rusqlite::params![phone],
              subscriber_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscriber::into_subscriber).transpose()
  }

  async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawCredential> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE credential_id = ?1"
              ),
              rusqlite::params![id_str],
              credential_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCredential::into_credential).transpose()
  }

  // ── Versioned writes ──────────────────────────────────────────────────────

  async fn upsert_subscriber(&self, record: Subscriber) -> Result<UpsertOutcome<Subscriber>> {
    let phone         = record.phone.clone();
    let name          = record.name.clone();
    let subs_str      = encode_subscriber_subscriptions(&record);
    let debtor        = record.debtor;
    let override_exp  = record.override_expiration;
    let deleted       = record.deleted;
    let created_str   = encode_dt(record.created_at);
    let last_seen_str = record.last_seen_at.map(encode_dt);
    let claimed       = record.version;

    // Inner Ok carries the accepted version, inner Err the stored one.
    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let stored: Option<i64> = conn
          .query_row(
            "SELECT version FROM subscribers WHERE phone = ?1",
            rusqlite::params![phone],
            |r| r.get(0),
          )
          .optional()?;

        match stored {
          None if claimed == 0 => {
            conn.execute(
              "INSERT INTO subscribers (phone, name, subscriptions, debtor,
                 override_expiration, deleted, created_at, last_seen_at, version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
              rusqlite::params![
                phone, name, subs_str, debtor, override_exp, deleted,
                created_str, last_seen_str,
              ],
            )?;
            Ok(Ok(1))
          }
          Some(current) if current == claimed => {
            conn.execute(
              "UPDATE subscribers
               SET name = ?2, subscriptions = ?3, debtor = ?4,
                   override_expiration = ?5, deleted = ?6, created_at = ?7,
                   last_seen_at = ?8, version = ?9
               WHERE phone = ?1",
              rusqlite::params![
                phone, name, subs_str, debtor, override_exp, deleted,
                created_str, last_seen_str, current + 1,
              ],
            )?;
            Ok(Ok(current + 1))
          }
          // Stale claim, or a claimed-new record that already exists, or a
          // claimed-existing record that vanished.
          stored => Ok(Err(stored.unwrap_or(0))),
        }
      })
      .await?;

    Ok(match outcome {
      Ok(version) => UpsertOutcome::Stored(Subscriber { version, ..record }),
      Err(current_version) => UpsertOutcome::Conflict { current_version },
    })
  }

  async fn upsert_credential(&self, record: Credential) -> Result<UpsertOutcome<Credential>> {
    let id_str        = encode_uuid(record.credential_id);
    let service       = record.service.clone();
    let login         = record.login.clone();
    let secret        = record.secret.clone();
    let published_str = encode_dt(record.published_at);
    let visible       = record.visible;
    let claimed       = record.version;

    let outcome: std::result::Result<i64, i64> = self
      .conn
      .call(move |conn| {
        let stored: Option<i64> = conn
          .query_row(
            "SELECT version FROM credentials WHERE credential_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;

        match stored {
          None if claimed == 0 => {
            conn.execute(
              "INSERT INTO credentials (credential_id, service, login, secret,
                 published_at, visible, version)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
              rusqlite::params![id_str, service, login, secret, published_str, visible],
            )?;
            Ok(Ok(1))
          }
          Some(current) if current == claimed => {
            conn.execute(
              "UPDATE credentials
               SET service = ?2, login = ?3, secret = ?4, published_at = ?5,
                   visible = ?6, version = ?7
               WHERE credential_id = ?1",
              rusqlite::params![
                id_str, service, login, secret, published_str, visible, current + 1,
              ],
            )?;
            Ok(Ok(current + 1))
          }
          stored => Ok(Err(stored.unwrap_or(0))),
        }
      })
      .await?;

    Ok(match outcome {
      Ok(version) => UpsertOutcome::Stored(Credential { version, ..record }),
      Err(current_version) => UpsertOutcome::Conflict { current_version },
    })
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn purge_subscriber(&self, phone: &str) -> Result<bool> {
    let phone = phone.to_owned();
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM subscribers WHERE phone = ?1",
          rusqlite::params![phone],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn touch_last_seen(&self, phone: &str, at: DateTime<Utc>) -> Result<bool> {
    let phone = phone.to_owned();
    let at_str = encode_dt(at);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscribers SET last_seen_at = ?2 WHERE phone = ?1",
          rusqlite::params![phone, at_str],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}
