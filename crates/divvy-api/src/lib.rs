//! JSON REST API for divvy.
//!
//! Exposes an axum [`Router`] backed by any
//! [`divvy_core::store::DirectoryStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", divvy_api::api_router(store.clone()))
//! ```

pub mod credentials;
pub mod error;
pub mod subscribers;
pub mod sync;
pub mod views;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use divvy_core::store::DirectoryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DirectoryStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Subscribers
    .route(
      "/subscribers",
      get(subscribers::list::<S>).post(subscribers::register::<S>),
    )
    .route(
      "/subscribers/{phone}",
      get(subscribers::get_one::<S>)
        .put(subscribers::update::<S>)
        .delete(subscribers::delete::<S>),
    )
    .route("/subscribers/{phone}/restore", post(subscribers::restore::<S>))
    .route("/subscribers/{phone}/renew", post(subscribers::renew::<S>))
    .route("/subscribers/{phone}/paid", post(subscribers::mark_paid::<S>))
    .route("/subscribers/{phone}/seen", post(subscribers::seen::<S>))
    .route("/subscribers/{phone}/dashboard", get(views::dashboard::<S>))
    // Lookup
    .route("/lookup", get(views::lookup::<S>))
    // Credentials
    .route(
      "/credentials",
      get(credentials::list::<S>).post(credentials::create::<S>),
    )
    .route(
      "/credentials/{id}",
      get(credentials::get_one::<S>).put(credentials::update::<S>),
    )
    .route("/credentials/{id}/members", get(credentials::members::<S>))
    // Derived reports
    .route("/health", get(views::health::<S>))
    .route("/stats", get(views::stats::<S>))
    .route("/sync", get(sync::fingerprint_handler::<S>))
    .with_state(store)
}
