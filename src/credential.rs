//! Bearer/refresh credential and its on-disk token record.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current access credential. The transport replaces the token fields in
/// place whenever a refresh succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_type: String,
}

/// Token fields returned by the refresh endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Structured token record as stored in a token file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Credential {
    /// Credential from a bare access token (a "test token" in Raindrop terms).
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            client_id: None,
            client_secret: None,
            token_type: "Bearer".to_string(),
        }
    }

    pub fn with_refresh(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// True only when an expiry is known and has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Replace the token fields with a refresh grant. A grant without a new
    /// refresh token keeps the old one; a grant without a lifetime, or with
    /// one too large to represent, clears the expiry.
    pub fn apply_grant(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.access_token = grant.access_token;
        if let Some(refresh) = grant.refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.expires_at = grant
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        if let Some(kind) = grant.token_type {
            self.token_type = normalize_token_type(&kind);
        }
    }

    pub fn from_record(record: TokenRecord) -> Self {
        Self {
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at: record.expires_at,
            client_id: None,
            client_secret: None,
            token_type: record
                .token_type
                .map(|t| normalize_token_type(&t))
                .unwrap_or_else(|| "Bearer".to_string()),
        }
    }

    pub fn to_record(&self) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            token_type: Some(self.token_type.clone()),
        }
    }
}

// Servers send "bearer"; the header wants "Bearer".
fn normalize_token_type(kind: &str) -> String {
    if kind.eq_ignore_ascii_case("bearer") {
        "Bearer".to_string()
    } else {
        kind.to_string()
    }
}

/// Load a token record from disk.
pub fn load_token_file(path: &Path) -> Result<TokenRecord> {
    let data = std::fs::read_to_string(path)?;
    let record: TokenRecord = serde_json::from_str(&data)?;
    if record.access_token.trim().is_empty() {
        return Err(Error::Config(format!(
            "token file {} has an empty access_token",
            path.display()
        )));
    }
    Ok(record)
}

/// Persist a token record, creating parent directories as needed.
pub fn save_token_file(path: &Path, record: &TokenRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(record)?;
    std::fs::write(path, data)?;
    Ok(())
}
