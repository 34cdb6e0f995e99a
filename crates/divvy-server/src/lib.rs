//! HTTP server assembly for divvy.
//!
//! Wires the JSON API router to a concrete store, guards it with Basic
//! auth, and adds request tracing. The binary in `main.rs` handles config
//! loading and startup.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use divvy_core::store::DirectoryStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state for router assembly.
#[derive(Clone)]
pub struct AppState<S: DirectoryStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router: `/api/…` behind Basic auth, traced.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .nest("/api", divvy_api::api_router(state.store.clone()))
    .layer(middleware::from_fn_with_state(
      state.auth.clone(),
      auth::require_auth,
    ))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::{Days, Utc};
  use divvy_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:               "127.0.0.1".to_string(),
        port:               7070,
        store_path:         PathBuf::from(":memory:"),
        auth_username:      "admin".to_string(),
        auth_password_hash: hash.clone(),
      }),
      auth:   Arc::new(AuthConfig {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn auth_header() -> String {
    format!("Basic {}", B64.encode("admin:secret"))
  }

  async fn send(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::AUTHORIZATION, auth_header());
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = router(state)
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn days_ago(n: u64) -> String {
    (Utc::now().date_naive() - Days::new(n))
      .format("%Y-%m-%d")
      .to_string()
  }

  async fn register(state: &AppState<SqliteStore>, phone: &str, subscriptions: &str) {
    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/subscribers",
      Some(json!({ "phone": phone, "name": "Ana", "subscriptions": subscriptions })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  async fn add_credential(state: &AppState<SqliteStore>, service: &str, login: &str) {
    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/credentials",
      Some(json!({ "service": service, "login": login, "secret": "hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  // ── Auth ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn api_rejects_missing_credentials() {
    let state = make_state("secret").await;
    let resp = router(state)
      .oneshot(
        Request::builder()
          .method("GET")
          .uri("/api/subscribers")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  // ── Subscriber lifecycle ─────────────────────────────────────────────────

  #[tokio::test]
  async fn register_normalizes_and_stores() {
    let state = make_state("secret").await;
    register(&state, "5511999990000", "Viki|2026-08-01|1|1;Netflix").await;

    let (status, body) =
      send(state, "GET", "/api/subscribers/5511999990000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["subscriptions"].as_array().unwrap().len(), 2);
    assert_eq!(body["subscriptions"][1]["service"], "Netflix");
    assert_eq!(body["subscriptions"][1]["paid"], false);
  }

  #[tokio::test]
  async fn stale_put_surfaces_409() {
    let state = make_state("secret").await;
    register(&state, "111", "Viki").await;

    let (_, mut record) = send(state.clone(), "GET", "/api/subscribers/111", None).await;
    record["name"] = json!("Ana Maria");

    // First writer wins.
    let (status, _) = send(
      state.clone(),
      "PUT",
      "/api/subscribers/111",
      Some(record.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Same version again: stale.
    let (status, body) =
      send(state, "PUT", "/api/subscribers/111", Some(record)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("conflict"));
  }

  #[tokio::test]
  async fn soft_delete_hides_restore_recovers() {
    let state = make_state("secret").await;
    register(&state, "111", "Viki").await;

    let (status, _) = send(state.clone(), "DELETE", "/api/subscribers/111", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send(state.clone(), "GET", "/api/subscribers", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
    let (_, with_deleted) = send(
      state.clone(),
      "GET",
      "/api/subscribers?include_deleted=true",
      None,
    )
    .await;
    assert_eq!(with_deleted.as_array().unwrap().len(), 1);

    let (status, body) =
      send(state.clone(), "POST", "/api/subscribers/111/restore", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);

    let (status, _) = send(
      state.clone(),
      "DELETE",
      "/api/subscribers/111?purge=true",
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(state, "GET", "/api/subscribers/111", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn renewal_pays_and_extends() {
    let state = make_state("secret").await;
    let start = days_ago(10);
    register(&state, "111", &format!("Viki|{start}|0|1")).await;

    let (status, body) = send(
      state,
      "POST",
      "/api/subscribers/111/renew",
      Some(json!({ "service": "viki" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sub = &body["subscriptions"][0];
    assert_eq!(sub["paid"], true);
    // Live term: the new start is the old expiry, not today.
    assert_ne!(sub["start"], json!(days_ago(0)));
  }

  // ── Dashboard rendering ──────────────────────────────────────────────────

  #[tokio::test]
  async fn dashboard_grants_masks_and_provisions() {
    let state = make_state("secret").await;
    // Viki: live and pooled. Netflix: unpaid + expired → blocked.
    // Kocowa: live but no credential → provisioning.
    let viki_start = days_ago(2);
    let netflix_start = days_ago(60);
    register(
      &state,
      "111",
      &format!("Viki|{viki_start}|1|1;Netflix|{netflix_start}|0|1;Kocowa|{viki_start}|1|1"),
    )
    .await;
    add_credential(&state, "Viki", "viki01@pool.example").await;

    let (status, body) =
      send(state, "GET", "/api/subscribers/111/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let subs = body["subscriptions"].as_array().unwrap();
    assert_eq!(subs.len(), 3);

    assert_eq!(subs[0]["grant"]["grant"], "granted");
    assert_eq!(subs[0]["grant"]["login"], "viki01@pool.example");
    assert_eq!(subs[0]["grant"]["secret"], "hunter2");

    assert_eq!(subs[1]["evaluation"]["state"], "blocked");
    assert_eq!(subs[1]["grant"]["grant"], "withheld");
    assert!(subs[1]["grant"]["secret"].is_null());

    assert_eq!(subs[2]["grant"]["grant"], "provisioning");
  }

  #[tokio::test]
  async fn lookup_validates_and_finds_by_suffix() {
    let state = make_state("secret").await;
    register(&state, "5511999990000", "Viki").await;
    register(&state, "5511888881234", "Viki").await;

    let (status, _) = send(state.clone(), "GET", "/api/lookup?digits=12ab", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(state, "GET", "/api/lookup?digits=1234", None).await;
    assert_eq!(status, StatusCode::OK);
    let found = body.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["phone"], "5511888881234");
  }

  // ── Reports ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_report_flags_an_old_viki_credential() {
    let state = make_state("secret").await;
    let published = (Utc::now() - chrono::Duration::days(20)).to_rfc3339();
    let (status, _) = send(
      state.clone(),
      "POST",
      "/api/credentials",
      Some(json!({
        "service": "Viki",
        "login": "old@pool.example",
        "secret": "pw",
        "published_at": published,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(state, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["state"], "expired");
    assert_eq!(rows[0]["days_active"], 20);
  }

  #[tokio::test]
  async fn roster_lists_assigned_subscribers() {
    let state = make_state("secret").await;
    register(&state, "111", "Viki").await;
    register(&state, "222", "Viki").await;
    add_credential(&state, "Viki", "only@pool.example").await;

    let (_, creds) = send(state.clone(), "GET", "/api/credentials", None).await;
    let id = creds[0]["credential_id"].as_str().unwrap().to_string();

    let (status, body) =
      send(state, "GET", &format!("/api/credentials/{id}/members"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn stats_count_the_directory() {
    let state = make_state("secret").await;
    register(&state, "111", "Viki|2026-08-01|1|1").await;

    let (status, body) = send(state, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscribers"], 1);
    assert_eq!(body["expected_revenue_cents"], 2000);
  }

  #[tokio::test]
  async fn sync_fingerprint_tracks_writes() {
    let state = make_state("secret").await;

    let (_, before) = send(state.clone(), "GET", "/api/sync", None).await;
    register(&state, "111", "Viki").await;
    let (_, after) = send(state.clone(), "GET", "/api/sync", None).await;
    assert_ne!(before["fingerprint"], after["fingerprint"]);

    // No writes in between: stable.
    let (_, again) = send(state, "GET", "/api/sync", None).await;
    assert_eq!(after["fingerprint"], again["fingerprint"]);
  }

  #[tokio::test]
  async fn heartbeat_moves_the_sync_fingerprint() {
    let state = make_state("secret").await;
    register(&state, "111", "Viki").await;

    let (_, before) = send(state.clone(), "GET", "/api/sync", None).await;
    let (status, _) =
      send(state.clone(), "POST", "/api/subscribers/111/seen", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The heartbeat skipped the version counter but pollers still see it.
    let (_, after) = send(state, "GET", "/api/sync", None).await;
    assert_ne!(before["fingerprint"], after["fingerprint"]);
  }
}
