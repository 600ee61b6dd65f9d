//! Query building for store reads and deletes
//!
//! Filters render to PostgREST parameters for Supabase, to SQL for SQLite,
//! and evaluate directly against rows for the in-memory store.

use serde_json::Value;

use crate::store::{Row, Table};

/// A single column predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// column = value
    Eq(String, Value),
    /// column IS NOT NULL
    NotNull(String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Filter::NotNull(column.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::NotNull(c) => c,
        }
    }

    /// PostgREST query parameter, e.g. ("phone", "eq.0912345678")
    pub fn to_postgrest(&self) -> (String, String) {
        let value = match self {
            Filter::Eq(_, v) => format!("eq.{}", plain_value(v)),
            Filter::NotNull(_) => "not.is.null".to_string(),
        };
        (self.column().to_string(), value)
    }

    /// Evaluate against a row; a missing column reads as null
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, v) => values_equal(cell, v),
            Filter::NotNull(_) => !cell.is_null(),
        }
    }
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON equality where numbers compare by value (1 == 1.0)
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// A read against one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}
