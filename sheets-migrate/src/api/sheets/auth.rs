//! Google service-account authentication
//!
//! Signs an RS256 assertion with the account's private key, exchanges it at
//! the token endpoint and keeps the access token until shortly before it
//! expires.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertions are valid for one hour, the maximum Google accepts
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const EXPIRY_SLACK_SECS: i64 = 60;

/// The fields of a service-account key file this client needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid service account file {}", path.display()))
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SLACK_SECS) < self.expires_at
    }
}

pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scope: String,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, http: Client) -> Self {
        Self {
            key,
            scope: SHEETS_READONLY_SCOPE.to_string(),
            http,
            token: Mutex::new(None),
        }
    }

    fn claims(&self, now: DateTime<Utc>) -> Claims<'_> {
        let iat = now.timestamp();
        Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM")?;
        encode(&Header::new(Algorithm::RS256), &self.claims(now), &key)
            .context("Failed to sign service account assertion")
    }

    /// A bearer token for the Sheets API, fetched or reused
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        debug!("Requesting access token for {}", self.key.client_email);
        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Token endpoint returned {}: {}", status, body);
        }
        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let fresh = CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        };
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    #[cfg(test)]
    async fn seed_token(&self, value: &str, expires_at: DateTime<Utc>) {
        *self.token.lock().await = Some(CachedToken {
            value: value.to_string(),
            expires_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ServiceAccountKey {
        serde_json::from_str(
            r#"{"client_email": "importer@project.iam.gserviceaccount.com", "private_key": "not a key"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_key_defaults_token_uri() {
        assert_eq!(key().token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_claims() {
        let auth = ServiceAccountAuth::new(key(), Client::new());
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let claims = auth.claims(now);
        assert_eq!(claims.iss, "importer@project.iam.gserviceaccount.com");
        assert_eq!(claims.scope, SHEETS_READONLY_SCOPE);
        assert_eq!(claims.aud, DEFAULT_TOKEN_URI);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn test_cached_token_reused_until_slack() {
        let auth = ServiceAccountAuth::new(key(), Client::new());
        auth.seed_token("cached", Utc::now() + Duration::minutes(30))
            .await;
        assert_eq!(auth.access_token().await.unwrap(), "cached");

        // Close to expiry the token is refreshed, which fails on the bogus key
        auth.seed_token("stale", Utc::now() + Duration::seconds(30))
            .await;
        let err = auth.access_token().await.unwrap_err();
        assert!(err.to_string().contains("RSA PEM"));
    }
}
