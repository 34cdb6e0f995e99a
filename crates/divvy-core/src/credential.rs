//! Shared streaming-account credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// One shared account for a streaming service.
///
/// `published_at` orders the pool (oldest first) and drives the age half of
/// the health report, so operators may edit it. Visibility pulls an account
/// out of rotation without deleting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
  pub credential_id: Uuid,
  pub service:       String,
  pub login:         String,
  pub secret:        String,
  pub published_at:  DateTime<Utc>,
  pub visible:       bool,
  /// Write-conflict counter, same contract as on subscribers.
  pub version:       i64,
}

impl Credential {
  /// Builds a fresh, never-stored credential, visible and published now.
  pub fn new(
    service: impl Into<String>,
    login: impl Into<String>,
    secret: impl Into<String>,
  ) -> Result<Self> {
    let service = service.into().trim().to_string();
    if service.is_empty() {
      return Err(Error::EmptyService);
    }
    let login = login.into().trim().to_string();
    if login.is_empty() {
      return Err(Error::EmptyLogin);
    }
    Ok(Credential {
      credential_id: Uuid::new_v4(),
      service,
      login,
      secret: secret.into(),
      published_at: Utc::now(),
      visible: true,
      version: 0,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_credentials_enter_rotation_immediately() {
    let cred = Credential::new("Viki", "viki01@pool.example", "hunter2").unwrap();
    assert!(cred.visible);
    assert_eq!(cred.version, 0);
    assert!(!cred.credential_id.is_nil());
  }

  #[test]
  fn construction_rejects_blank_identifiers() {
    assert!(matches!(
      Credential::new("", "a@b.example", "pw"),
      Err(Error::EmptyService)
    ));
    assert!(matches!(
      Credential::new("Viki", "   ", "pw"),
      Err(Error::EmptyLogin)
    ));
  }
}
