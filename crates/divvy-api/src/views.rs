//! Derived read endpoints: dashboards, suffix lookup, health, stats.
//!
//! Nothing here is cached. Every request refetches both snapshots and
//! recomputes, which is the sync contract: a client that wants fresher
//! answers simply asks again.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::Utc;
use divvy_core::{
  health::{HealthRow, health_report},
  stats::{DirectoryStats, directory_stats},
  store::DirectoryStore,
  view::{DashboardView, lookup_by_suffix},
};
use serde::Deserialize;

use crate::error::ApiError;

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> ApiError {
  ApiError::Store(Box::new(e))
}

/// `GET /subscribers/:phone/dashboard`
pub async fn dashboard<S>(
  State(store): State<Arc<S>>,
  Path(phone): Path<String>,
) -> Result<Json<DashboardView>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subscribers = store.list_subscribers().await.map_err(store_err)?;
  let credentials = store.list_credentials().await.map_err(store_err)?;

  let subscriber = subscribers
    .iter()
    .find(|s| s.phone == phone)
    .ok_or_else(|| ApiError::NotFound(format!("subscriber {phone} not found")))?;

  Ok(Json(divvy_core::view::dashboard(
    subscriber,
    &subscribers,
    &credentials,
    Utc::now(),
  )))
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  pub digits: String,
}

/// `GET /lookup?digits=NNNN` — the "last digits" login flow.
pub async fn lookup<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<LookupParams>,
) -> Result<Json<Vec<DashboardView>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let digits = params.digits.trim();
  if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
    return Err(ApiError::BadRequest("digits must be a non-empty digit string".into()));
  }

  let subscribers = store.list_subscribers().await.map_err(store_err)?;
  let credentials = store.list_credentials().await.map_err(store_err)?;
  Ok(Json(lookup_by_suffix(&subscribers, &credentials, digits, Utc::now())))
}

/// `GET /health` — the per-credential health report.
pub async fn health<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<HealthRow>>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subscribers = store.list_subscribers().await.map_err(store_err)?;
  let credentials = store.list_credentials().await.map_err(store_err)?;
  Ok(Json(health_report(
    &subscribers,
    &credentials,
    Utc::now().date_naive(),
  )))
}

/// `GET /stats` — directory counts and expected revenue.
pub async fn stats<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<DirectoryStats>, ApiError>
where
  S: DirectoryStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let subscribers = store.list_subscribers().await.map_err(store_err)?;
  Ok(Json(directory_stats(&subscribers, Utc::now().date_naive())))
}
