//! In-memory store
//!
//! Keeps tables in a mutex-guarded map with sequential ids. Counts every
//! mutating call and can be told to fail specific calls, which makes it the
//! backend for dry-run previews and for the importer tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{Row, Store, StoreError, Table};
use crate::api::query::{Filter, Query, values_equal};

/// Which store method a failure rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Select,
    Upsert,
    Delete,
}

#[derive(Debug, Clone)]
struct FailureRule {
    table: Table,
    kind: CallKind,
    /// Only calls touching a row (or filter) with this column value
    when: Option<(String, Value)>,
    /// None fails forever
    remaining: Option<usize>,
    transient: bool,
}

impl FailureRule {
    fn applies(&self, table: Table, kind: CallKind, rows: &[Row], filters: &[Filter]) -> bool {
        if self.table != table || self.kind != kind || self.remaining == Some(0) {
            return false;
        }
        match &self.when {
            None => true,
            Some((column, value)) => {
                rows.iter()
                    .any(|r| r.get(column).is_some_and(|v| values_equal(v, value)))
                    || filters.iter().any(|f| match f {
                        Filter::Eq(c, v) => c == column && values_equal(v, value),
                        _ => false,
                    })
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<Table, Vec<Row>>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failures: Mutex<Vec<FailureRule>>,
    mutation_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows directly, bypassing counters and failure rules
    pub fn seed(&self, table: Table, rows: Vec<Row>) {
        let mut tables = self.lock_tables();
        for row in rows {
            Self::insert_row(&mut tables, table, row);
        }
    }

    /// Snapshot of a table
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock_tables()
            .rows
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of upsert/delete calls received, failed ones included
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Permanently fail calls that touch `column = value`
    pub fn fail_when(&self, table: Table, kind: CallKind, column: &str, value: impl Into<Value>) {
        self.push_rule(FailureRule {
            table,
            kind,
            when: Some((column.to_string(), value.into())),
            remaining: None,
            transient: false,
        });
    }

    /// Fail the next `times` calls of this kind
    pub fn fail_times(&self, table: Table, kind: CallKind, times: usize, transient: bool) {
        self.push_rule(FailureRule {
            table,
            kind,
            when: None,
            remaining: Some(times),
            transient,
        });
    }

    fn push_rule(&self, rule: FailureRule) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(rule);
        }
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failure(
        &self,
        table: Table,
        kind: CallKind,
        rows: &[Row],
        filters: &[Filter],
    ) -> Result<(), StoreError> {
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(rule) = failures
            .iter_mut()
            .find(|r| r.applies(table, kind, rows, filters))
        else {
            return Ok(());
        };

        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        let message = format!("injected {:?} failure on {}", kind, table);
        if rule.transient {
            Err(StoreError::Unavailable(message))
        } else {
            Err(StoreError::Rejected {
                status: 500,
                message,
            })
        }
    }

    fn insert_row(tables: &mut Tables, table: Table, mut row: Row) -> Row {
        if !row.contains_key("id") {
            tables.next_id += 1;
            row.insert("id".to_string(), Value::from(tables.next_id));
        }
        tables.rows.entry(table).or_default().push(row.clone());
        row
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.check_failure(query.table, CallKind::Select, &[], &query.filters)?;
        let tables = self.lock_tables();
        Ok(tables
            .rows
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(
        &self,
        table: Table,
        rows: &[Row],
        on_conflict: Option<&str>,
    ) -> Result<Vec<Row>, StoreError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(table, CallKind::Upsert, rows, &[])?;

        let mut tables = self.lock_tables();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let position = on_conflict.and_then(|key| {
                let value = row.get(key)?;
                tables
                    .rows
                    .get(&table)?
                    .iter()
                    .position(|r| r.get(key).is_some_and(|v| values_equal(v, value)))
            });

            let existing = match (position, tables.rows.get_mut(&table)) {
                (Some(idx), Some(rows)) => rows.get_mut(idx),
                _ => None,
            };
            match existing {
                Some(current) => {
                    for (column, value) in row {
                        if column != "id" {
                            current.insert(column.clone(), value.clone());
                        }
                    }
                    stored.push(current.clone());
                }
                None => stored.push(Self::insert_row(&mut tables, table, row.clone())),
            }
        }
        Ok(stored)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(table, CallKind::Delete, &[], filters)?;

        let mut tables = self.lock_tables();
        let Some(rows) = tables.rows.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filters.iter().all(|f| f.matches(r)));
        Ok(before - rows.len())
    }
}
