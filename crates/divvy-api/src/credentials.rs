//! Handlers for `/credentials` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/credentials` | Optional `?service=` substring filter |
//! | `POST` | `/credentials` | Returns 201 + stored record |
//! | `GET`  | `/credentials/:id` | 404 if not found |
//! | `PUT`  | `/credentials/:id` | Full update, version-checked; 409 on conflict |
//! | `GET`  | `/credentials/:id/members` | Roster: subscribers currently assigned here |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use divvy_core::{
  assign::{self, service_matches},
  credential::Credential,
  store::{DirectoryStore, UpsertOutcome},
  subscriber::Subscriber,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
  ApiError::Store(Box::new(e))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub service: Option<String>,
}

/// `GET /credentials[?service=<name>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Credential>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut credentials = store.list_credentials().await.map_err(store_err)?;
  if let Some(service) = &params.service {
    credentials.retain(|c| service_matches(&c.service, service));
  }
  Ok(Json(credentials))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /credentials`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub service:      String,
  pub login:        String,
  pub secret:       String,
  /// Defaults to now; editable because it orders the pool.
  pub published_at: Option<DateTime<Utc>>,
  pub visible:      Option<bool>,
}

/// `POST /credentials`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut record = Credential::new(body.service, body.login, body.secret)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
  if let Some(published_at) = body.published_at {
    record.published_at = published_at;
  }
  if let Some(visible) = body.visible {
    record.visible = visible;
  }

  match store.upsert_credential(record).await.map_err(store_err)? {
    UpsertOutcome::Stored(stored) => {
      tracing::info!(service = %stored.service, login = %stored.login, "credential created");
      Ok((StatusCode::CREATED, Json(stored)))
    }
    UpsertOutcome::Conflict { current_version } => {
      Err(ApiError::Conflict { current_version })
    }
  }
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /credentials/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Credential>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let record = store
    .get_credential(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("credential {id} not found")))?;
  Ok(Json(record))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /credentials/:id` — full record with the version the writer read.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(record): Json<Credential>,
) -> Result<Json<Credential>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  if record.credential_id != id {
    return Err(ApiError::BadRequest(format!(
      "body id {} does not match path {id}",
      record.credential_id
    )));
  }

  match store.upsert_credential(record).await.map_err(store_err)? {
    UpsertOutcome::Stored(stored) => Ok(Json(stored)),
    UpsertOutcome::Conflict { current_version } => {
      Err(ApiError::Conflict { current_version })
    }
  }
}

// ─── Roster ───────────────────────────────────────────────────────────────────

/// `GET /credentials/:id/members` — who the resolver currently lands here.
pub async fn members<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Subscriber>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let credential = store
    .get_credential(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("credential {id} not found")))?;

  let subscribers = store.list_subscribers().await.map_err(store_err)?;
  let credentials = store.list_credentials().await.map_err(store_err)?;

  let roster = assign::roster(&subscribers, &credentials, &credential)
    .into_iter()
    .cloned()
    .collect();
  Ok(Json(roster))
}
