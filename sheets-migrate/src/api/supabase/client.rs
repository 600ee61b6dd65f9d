use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response};

use crate::api::query::{Filter, Query};
use crate::store::{Row, Store, StoreError, Table};

/// Store backed by a Supabase project's REST endpoint (`/rest/v1`).
///
/// Authenticates with the service-role key, sent both as `apikey` and as a
/// bearer token.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status.as_u16(), body));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_postgrest).collect()
}

#[async_trait]
impl Store for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(&query.filters));
        debug!("GET {} {:?}", query.table, params);

        let response = self
            .request(Method::GET, query.table)
            .query(&params)
            .send()
            .await?;
        Self::read_rows(response).await
    }

    async fn upsert(
        &self,
        table: Table,
        rows: &[Row],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Row>, StoreError> {
        let mut request = self.request(Method::POST, table).json(rows);
        request = match on_conflict {
            Some(key) => request
                .query(&[("on_conflict", key)])
                .header("Prefer", "resolution=merge-duplicates,return=representation"),
            None => request.header("Prefer", "return=representation"),
        };
        debug!("POST {} ({} rows, on_conflict={:?})", table, rows.len(), on_conflict);

        let response = request.send().await?;
        Self::read_rows(response).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        // PostgREST refuses unfiltered deletes; never send one
        if filters.is_empty() {
            return Err(StoreError::InvalidData(format!(
                "refusing to delete from {} without filters",
                table
            )));
        }
        debug!("DELETE {} {:?}", table, filter_params(filters));

        let response = self
            .request(Method::DELETE, table)
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(Self::read_rows(response).await?.len())
    }
}
