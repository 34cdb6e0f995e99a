//! Async HTTP client wrapping the divvy JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use divvy_core::{
  health::HealthRow, stats::DirectoryStats, subscriber::Subscriber, view::DashboardView,
};
use reqwest::Client;
use serde::Deserialize;

/// Connection settings for the divvy API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

#[derive(Deserialize)]
struct SyncResponse {
  fingerprint: String,
}

/// Async HTTP client for the divvy JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  /// `GET /api/subscribers`
  pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
    let resp = self
      .auth(self.client.get(self.url("/subscribers")))
      .send()
      .await
      .context("GET /subscribers failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /subscribers → {}", resp.status()));
    }
    resp.json().await.context("deserialising subscribers")
  }

  /// `GET /api/subscribers/{phone}/dashboard`
  pub async fn dashboard(&self, phone: &str) -> Result<DashboardView> {
    let resp = self
      .auth(
        self
          .client
          .get(self.url(&format!("/subscribers/{phone}/dashboard"))),
      )
      .send()
      .await
      .context("GET dashboard failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET dashboard → {}", resp.status()));
    }
    resp.json().await.context("deserialising dashboard")
  }

  /// `GET /api/health`
  pub async fn health(&self) -> Result<Vec<HealthRow>> {
    let resp = self
      .auth(self.client.get(self.url("/health")))
      .send()
      .await
      .context("GET /health failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /health → {}", resp.status()));
    }
    resp.json().await.context("deserialising health report")
  }

  /// `GET /api/stats`
  pub async fn stats(&self) -> Result<DirectoryStats> {
    let resp = self
      .auth(self.client.get(self.url("/stats")))
      .send()
      .await
      .context("GET /stats failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /stats → {}", resp.status()));
    }
    resp.json().await.context("deserialising stats")
  }

  /// `GET /api/sync` — the change fingerprint.
  pub async fn sync_fingerprint(&self) -> Result<String> {
    let resp = self
      .auth(self.client.get(self.url("/sync")))
      .send()
      .await
      .context("GET /sync failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /sync → {}", resp.status()));
    }
    let body: SyncResponse = resp.json().await.context("deserialising sync")?;
    Ok(body.fingerprint)
  }
}
