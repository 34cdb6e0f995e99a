//! Handlers for `/subscribers` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/subscribers` | Optional `?filter=debtors\|expiring\|blocked\|unpaid`, `?include_deleted=true` |
//! | `POST`   | `/subscribers` | Register; raw subscription field accepted |
//! | `GET`    | `/subscribers/:phone` | 404 if not found |
//! | `PUT`    | `/subscribers/:phone` | Full update, version-checked; 409 on conflict |
//! | `DELETE` | `/subscribers/:phone` | Soft delete; `?purge=true` hard-deletes |
//! | `POST`   | `/subscribers/:phone/restore` | Clear the soft-delete flag |
//! | `POST`   | `/subscribers/:phone/renew` | Body: `{"service":"..."}` |
//! | `POST`   | `/subscribers/:phone/paid` | Body: `{"service":"..."}` |
//! | `POST`   | `/subscribers/:phone/seen` | Heartbeat |
//!
//! The read-modify-write endpoints refetch and reapply on a version
//! conflict a bounded number of times before surfacing 409.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use divvy_core::{
  access,
  normalize::{RawSubscriptions, normalize},
  store::{DirectoryStore, UpsertOutcome},
  subscriber::Subscriber,
  view::{DirectoryFilter, filter_directory},
};
use serde::Deserialize;

use crate::error::ApiError;

/// Attempts per read-modify-write operation before giving up with 409.
const MAX_WRITE_ATTEMPTS: usize = 3;

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
  ApiError::Store(Box::new(e))
}

/// Refetch → mutate → upsert, retrying while other writers win the race.
async fn modify<S, F>(store: &S, phone: &str, mut apply: F) -> Result<Subscriber, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
  F: FnMut(&mut Subscriber) -> Result<(), ApiError>,
{
  let mut last_version = 0;
  for _ in 0..MAX_WRITE_ATTEMPTS {
    let mut record = store
      .get_subscriber(phone)
      .await
      .map_err(store_err)?
      .ok_or_else(|| ApiError::NotFound(format!("subscriber {phone} not found")))?;
    apply(&mut record)?;

    match store.upsert_subscriber(record).await.map_err(store_err)? {
      UpsertOutcome::Stored(stored) => return Ok(stored),
      UpsertOutcome::Conflict { current_version } => {
        tracing::warn!(phone, current_version, "subscriber write conflict, retrying");
        last_version = current_version;
      }
    }
  }
  Err(ApiError::Conflict { current_version: last_version })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub filter:          DirectoryFilter,
  #[serde(default)]
  pub include_deleted: bool,
}

/// `GET /subscribers[?filter=...][&include_deleted=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Subscriber>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let all = store.list_subscribers().await.map_err(store_err)?;
  let filtered = filter_directory(&all, params.filter, params.include_deleted, Utc::now())
    .into_iter()
    .cloned()
    .collect();
  Ok(Json(filtered))
}

// ─── Register ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /subscribers`. The subscription field takes
/// any historical encoding; it is normalized before storage.
#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub phone:               String,
  pub name:                String,
  pub subscriptions:       Option<RawSubscriptions>,
  /// Container-level duration default for entries without their own.
  pub months:              Option<u32>,
  #[serde(default)]
  pub debtor:              bool,
  #[serde(default)]
  pub override_expiration: bool,
}

/// `POST /subscribers`
pub async fn register<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut record = Subscriber::new(body.phone, body.name)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  if let Some(raw) = &body.subscriptions {
    record.subscriptions = normalize(raw, body.months);
  }
  record.debtor = body.debtor;
  record.override_expiration = body.override_expiration;

  match store.upsert_subscriber(record).await.map_err(store_err)? {
    UpsertOutcome::Stored(stored) => Ok((StatusCode::CREATED, Json(stored))),
    UpsertOutcome::Conflict { current_version } => {
      Err(ApiError::Conflict { current_version })
    }
  }
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subscribers/:phone`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let record = store
    .get_subscriber(&phone)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("subscriber {phone} not found")))?;
  Ok(Json(record))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /subscribers/:phone` — full record with the version the writer read.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Json(record): Json<Subscriber>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if record.phone != phone {
    return Err(ApiError::BadRequest(format!(
      "body phone {:?} does not match path {phone:?}",
      record.phone
    )));
  }
  for subscription in &record.subscriptions {
    subscription
      .validate()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  }

  match store.upsert_subscriber(record).await.map_err(store_err)? {
    UpsertOutcome::Stored(stored) => Ok(Json(stored)),
    UpsertOutcome::Conflict { current_version } => {
      Err(ApiError::Conflict { current_version })
    }
  }
}

// ─── Delete / restore ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  #[serde(default)]
  pub purge: bool,
}

/// `DELETE /subscribers/:phone[?purge=true]`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if params.purge {
    let existed = store.purge_subscriber(&phone).await.map_err(store_err)?;
    if !existed {
      return Err(ApiError::NotFound(format!("subscriber {phone} not found")));
    }
    tracing::info!(phone, "subscriber purged");
    return Ok(StatusCode::NO_CONTENT);
  }

  modify(store.as_ref(), &phone, |record| {
    record.deleted = true;
    Ok(())
  })
  .await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /subscribers/:phone/restore`
pub async fn restore<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stored = modify(store.as_ref(), &phone, |record| {
    record.deleted = false;
    Ok(())
  })
  .await?;
  Ok(Json(stored))
}

// ─── Renew / mark paid ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ServiceBody {
  pub service: String,
}

/// `POST /subscribers/:phone/renew` — smart renewal of one service.
pub async fn renew<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Json(body): Json<ServiceBody>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let today = Utc::now().date_naive();
  let stored = modify(store.as_ref(), &phone, |record| {
    let subscription = record.subscription_mut(&body.service).ok_or_else(|| {
      ApiError::NotFound(format!("no {} subscription on {phone}", body.service))
    })?;
    access::renew(subscription, today);
    Ok(())
  })
  .await?;
  tracing::info!(phone, service = %body.service, "subscription renewed");
  Ok(Json(stored))
}

/// `POST /subscribers/:phone/paid`
pub async fn mark_paid<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
  Json(body): Json<ServiceBody>,
) -> Result<Json<Subscriber>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stored = modify(store.as_ref(), &phone, |record| {
    let subscription = record.subscription_mut(&body.service).ok_or_else(|| {
      ApiError::NotFound(format!("no {} subscription on {phone}", body.service))
    })?;
    access::mark_paid(subscription);
    Ok(())
  })
  .await?;
  Ok(Json(stored))
}

// ─── Heartbeat ────────────────────────────────────────────────────────────────

/// `POST /subscribers/:phone/seen`
pub async fn seen<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let existed = store
    .touch_last_seen(&phone, Utc::now())
    .await
    .map_err(store_err)?;
  if !existed {
    return Err(ApiError::NotFound(format!("subscriber {phone} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
