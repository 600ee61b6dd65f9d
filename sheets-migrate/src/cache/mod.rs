//! Key/value cache seam
//!
//! Callers keep serialized summaries here (e.g. the last migration result)
//! and the importer invalidates list keys after writing.

mod memory;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryCache;

/// Invalidated after every non-dry run
pub const ORDERS_KEY: &str = "orders";
pub const CUSTOMERS_KEY: &str = "customers";
/// Holds the JSON of the most recent migration result
pub const LAST_RESULT_KEY: &str = "migration:last";

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`; `ttl` of None keeps it until deleted
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
