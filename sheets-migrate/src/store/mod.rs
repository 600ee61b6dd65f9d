//! Relational store abstraction
//!
//! The importer only needs `select`, `upsert` and `delete` on four tables.
//! Backends: Supabase PostgREST (`api::supabase`), SQLite and in-memory.

mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::api::query::{Filter, Query};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A table row as column -> JSON value
pub type Row = Map<String, Value>;

/// Tables the migration touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Customers,
    Orders,
    OrderItems,
    Products,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Customers => "customers",
            Table::Orders => "orders",
            Table::OrderItems => "order_items",
            Table::Products => "products",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching every filter of the query
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Insert rows, or update the existing row sharing the `on_conflict`
    /// column value. Returns the stored rows including their `id`.
    async fn upsert(
        &self,
        table: Table,
        rows: &[Row],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Delete rows matching every filter; returns the number deleted
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError>;
}

/// Read an integer column, accepting integral floats
pub(crate) fn row_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
