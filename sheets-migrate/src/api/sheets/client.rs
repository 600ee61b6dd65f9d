use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::auth::{ServiceAccountAuth, ServiceAccountKey};
use crate::migration::types::SheetRow;
use crate::source::SheetSource;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

enum Credentials {
    ServiceAccount(ServiceAccountAuth),
    /// Pre-issued access token, e.g. from `gcloud auth print-access-token`
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads whole sheets through the `spreadsheets.values.get` endpoint
pub struct SheetsClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl SheetsClient {
    fn http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")
    }

    pub fn from_service_account(key: ServiceAccountKey) -> Result<Self> {
        let http = Self::http_client()?;
        Ok(Self {
            credentials: Credentials::ServiceAccount(ServiceAccountAuth::new(key, http.clone())),
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_bearer_token(token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Self::http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::Bearer(token.into()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, sheet_id: &str, sheet_name: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(sheet_id),
            urlencoding::encode(sheet_name)
        )
    }

    async fn bearer(&self) -> Result<String> {
        match &self.credentials {
            Credentials::ServiceAccount(auth) => auth.access_token().await,
            Credentials::Bearer(token) => Ok(token.clone()),
        }
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetSource for SheetsClient {
    async fn get_rows(&self, sheet_id: &str, sheet_name: &str) -> Result<Vec<SheetRow>> {
        let token = self
            .bearer()
            .await
            .context("Failed to authenticate with Google")?;
        let url = self.values_url(sheet_id, sheet_name);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch sheet '{}'", sheet_name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Sheets API returned {} for '{}': {}", status, sheet_name, body);
        }

        let range: ValueRange = response
            .json()
            .await
            .with_context(|| format!("Invalid Sheets API response for '{}'", sheet_name))?;
        info!("Fetched {} rows from sheet '{}'", range.values.len(), sheet_name);

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}
