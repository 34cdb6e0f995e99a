//! Error types for `divvy-core`.

use thiserror::Error;

/// Errors produced by record construction and validation.
///
/// The evaluation pipeline itself is total: normalization, access
/// classification, and assignment never fail. Errors exist only at the
/// edges, where records are first built from outside input.
#[derive(Debug, Error)]
pub enum Error {
  #[error("phone number must not be empty")]
  EmptyPhone,

  #[error("service name must not be empty")]
  EmptyService,

  #[error("credential login must not be empty")]
  EmptyLogin,

  #[error("subscription duration must be at least one month")]
  ZeroMonths,
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;
