//! Wires configured collaborators into an `Importer`

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::info;

use crate::api::resilience::{RetryConfig, RetryPolicy};
use crate::api::sheets::{ServiceAccountKey, SheetsClient};
use crate::api::supabase::SupabaseClient;
use crate::cache::Cache;
use crate::config::{
    Config, SERVICE_ACCOUNT_ENV, SUPABASE_KEY_ENV, SUPABASE_URL_ENV, SourceKind, StoreKind,
};
use crate::migration::{Importer, ImporterSettings};
use crate::source::{SheetSource, XlsxSource};
use crate::store::{MemoryStore, SqliteStore, Store};

pub fn build_source(config: &Config) -> Result<Arc<dyn SheetSource>> {
    let source = &config.source;
    match source.kind {
        SourceKind::Google => {
            let client = if let Some(path) = &source.service_account_file {
                SheetsClient::from_service_account(ServiceAccountKey::from_file(path)?)?
            } else if let Some(token) = &source.access_token {
                SheetsClient::with_bearer_token(token.clone())?
            } else {
                bail!(
                    "Google source needs source.service_account_file or {}",
                    SERVICE_ACCOUNT_ENV
                );
            };
            Ok(Arc::new(client))
        }
        SourceKind::Xlsx => Ok(Arc::new(match &source.xlsx_root {
            Some(root) => XlsxSource::with_root(root),
            None => XlsxSource::new(),
        })),
    }
}

pub async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store = &config.store;
    match store.kind {
        StoreKind::Supabase => {
            let url = store
                .url
                .as_deref()
                .with_context(|| format!("Supabase store needs store.url or {}", SUPABASE_URL_ENV))?;
            let key = store.service_key.as_deref().with_context(|| {
                format!("Supabase store needs store.service_key or {}", SUPABASE_KEY_ENV)
            })?;
            info!("Using Supabase store at {}", url);
            Ok(Arc::new(SupabaseClient::new(url, key)?))
        }
        StoreKind::Sqlite => {
            info!("Using SQLite store at {}", store.database_url);
            let sqlite = SqliteStore::connect(&store.database_url)
                .await
                .context("Failed to open SQLite store")?;
            Ok(Arc::new(sqlite))
        }
        StoreKind::Memory => {
            info!("Using in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub async fn build_importer(config: &Config, cache: Option<Arc<dyn Cache>>) -> Result<Importer> {
    let settings = ImporterSettings {
        orders_sheet: config.source.orders_sheet.clone(),
        customers_sheet: config.source.customers_sheet.clone(),
        timezone: config.source.timezone()?,
        result_ttl: config.cache.ttl(),
    };

    let mut importer = Importer::new(build_source(config)?, build_store(config).await?)
        .with_retry(RetryPolicy::new(RetryConfig::from(&config.retry)))
        .with_settings(settings);
    if let Some(cache) = cache {
        importer = importer.with_cache(cache);
    }
    Ok(importer)
}
