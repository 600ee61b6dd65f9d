//! SQLite store
//!
//! Local target for offline runs and integration tests. The schema is
//! embedded from `migrations/` and applied on connect.

use std::str::FromStr;

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, QueryBuilder, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};

use super::{Row, Store, StoreError, Table};
use crate::api::query::{Filter, Query};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid identifier regex"));

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        // An in-memory database lives as long as its single connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {}", e)))?;

        debug!("Connected to SQLite store at {}", url);
        Ok(Self { pool })
    }
}

fn check_identifier(column: &str) -> Result<&str, StoreError> {
    if IDENTIFIER.is_match(column) {
        Ok(column)
    } else {
        Err(StoreError::InvalidData(format!(
            "invalid column name '{}'",
            column
        )))
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => builder.push("NULL"),
        Value::Bool(b) => builder.push_bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.push_bind(i),
            None => builder.push_bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => builder.push_bind(s.clone()),
        other => builder.push_bind(other.to_string()),
    };
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &[Filter]) -> Result<(), StoreError> {
    for (idx, filter) in filters.iter().enumerate() {
        builder.push(if idx == 0 { " WHERE " } else { " AND " });
        let column = check_identifier(filter.column())?;
        match filter {
            Filter::Eq(_, value) if value.is_null() => {
                builder.push(column).push(" IS NULL");
            }
            Filter::Eq(_, value) => {
                builder.push(column).push(" = ");
                push_value(builder, value);
            }
            Filter::NotNull(_) => {
                builder.push(column).push(" IS NOT NULL");
            }
        }
    }
    Ok(())
}

fn decode_row(row: &SqliteRow) -> Result<Row, StoreError> {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" | "NUMERIC" => Value::from(row.try_get::<f64, _>(idx)?),
                _ => Value::from(row.try_get::<String, _>(idx)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn upsert_statement<'a>(
    table: Table,
    row: &'a Row,
    on_conflict: Option<&str>,
) -> Result<QueryBuilder<'a, Sqlite>, StoreError> {
    let columns = row
        .keys()
        .map(|c| check_identifier(c))
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(StoreError::InvalidData(format!(
            "empty row for {}",
            table
        )));
    }

    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", table));
    builder.push(columns.join(", ")).push(") VALUES (");
    for (i, value) in row.values().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, value);
    }
    builder.push(")");

    if let Some(key) = on_conflict.filter(|k| row.contains_key(*k)) {
        let key = check_identifier(key)?;
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != key && **c != "id")
            .map(|c| format!("{0} = excluded.{0}", c))
            .collect();
        let set = if updates.is_empty() {
            format!("{0} = excluded.{0}", key)
        } else {
            updates.join(", ")
        };
        builder.push(format!(" ON CONFLICT({}) DO UPDATE SET {}", key, set));
    }
    builder.push(" RETURNING *");
    Ok(builder)
}

#[async_trait]
impl Store for SqliteStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut builder = QueryBuilder::new(format!("SELECT * FROM {}", query.table));
        push_filters(&mut builder, &query.filters)?;
        builder.push(" ORDER BY id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn upsert(
        &self,
        table: Table,
        rows: &[Row],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Row>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let mut builder = upsert_statement(table, row, on_conflict)?;
            let returned = builder.build().fetch_one(&mut *tx).await?;
            stored.push(decode_row(&returned)?);
        }
        tx.commit().await?;
        Ok(stored)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        let mut builder = QueryBuilder::new(format!("DELETE FROM {}", table));
        push_filters(&mut builder, filters)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }
}
