//! Core Operation types for mutating store calls

use log::debug;
use serde_json::Value;

use crate::api::query::Filter;
use crate::api::resilience::RetryPolicy;
use crate::store::{Row, Store, StoreError, Table};

/// A single mutating call against the store
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert rows, updating the existing row on a key conflict
    Upsert {
        table: Table,
        /// Identity column (e.g. "phone", "google_sheet_id"); None inserts
        on_conflict: Option<String>,
        rows: Vec<Row>,
    },
    /// Delete every row matching all filters
    Delete { table: Table, filters: Vec<Filter> },
}

/// Result of executing an Operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// Rows returned by an upsert
    pub rows: Vec<Row>,
    /// Rows written or deleted
    pub affected: usize,
}

impl Operation {
    /// Create a new Upsert operation keyed on `key_field`
    pub fn upsert(table: Table, key_field: impl Into<String>, rows: Vec<Row>) -> Self {
        Self::Upsert {
            table,
            on_conflict: Some(key_field.into()),
            rows,
        }
    }

    /// Create a plain insert
    pub fn insert(table: Table, rows: Vec<Row>) -> Self {
        Self::Upsert {
            table,
            on_conflict: None,
            rows,
        }
    }

    /// Create a new Delete operation
    pub fn delete(table: Table, filters: Vec<Filter>) -> Self {
        Self::Delete { table, filters }
    }

    /// Get the operation type as a string
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Upsert {
                on_conflict: Some(_),
                ..
            } => "upsert",
            Self::Upsert { .. } => "insert",
            Self::Delete { .. } => "delete",
        }
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Upsert {
                table,
                on_conflict,
                rows,
            } => {
                let key = on_conflict
                    .as_deref()
                    .and_then(|k| rows.first().and_then(|r| r.get(k)).map(|v| (k, v)));
                match key {
                    Some((k, v)) => format!(
                        "{} {} row(s) into {} ({} = {})",
                        self.operation_type(),
                        rows.len(),
                        table,
                        k,
                        display_value(v)
                    ),
                    None => format!("{} {} row(s) into {}", self.operation_type(), rows.len(), table),
                }
            }
            Self::Delete { table, filters } => {
                let conditions: Vec<String> = filters
                    .iter()
                    .map(|f| {
                        let (col, expr) = f.to_postgrest();
                        format!("{}={}", col, expr)
                    })
                    .collect();
                format!("delete from {} where {}", table, conditions.join(" and "))
            }
        }
    }

    /// Result of a dry run: nothing stored, nothing affected
    pub fn skip(self) -> OperationResult {
        OperationResult {
            rows: Vec::new(),
            affected: 0,
        }
    }

    /// Execute this operation against the store, retrying transient failures
    pub async fn execute(
        self,
        store: &dyn Store,
        retry: &RetryPolicy,
    ) -> Result<OperationResult, StoreError> {
        let label = self.describe();
        debug!("Executing: {}", label);

        let (rows, affected) = match &self {
            Self::Upsert {
                table,
                on_conflict,
                rows,
            } => {
                let stored = retry
                    .execute(&label, || store.upsert(*table, rows, on_conflict.as_deref()))
                    .await?;
                let affected = stored.len();
                (stored, affected)
            }
            Self::Delete { table, filters } => {
                let deleted = retry
                    .execute(&label, || store.delete(*table, filters))
                    .await?;
                (Vec::new(), deleted)
            }
        };

        Ok(OperationResult {
            rows,
            affected,
        })
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl OperationResult {
    /// `id` of the first stored row
    pub fn first_id(&self) -> Option<i64> {
        self.rows.first().and_then(|r| crate::store::row_i64(r, "id"))
    }
}
