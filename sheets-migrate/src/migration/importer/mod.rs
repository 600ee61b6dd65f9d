//! Reconciling importer
//!
//! One run reads the orders sheet (required) and the customers sheet
//! (best-effort), upserts customers by phone, deletes orders whose source
//! row disappeared, then upserts the remaining orders by `google_sheet_id`
//! and replaces their items. Rows are processed one at a time; a failing row
//! is recorded in the result and the run moves on.

mod customers;
mod orders;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use log::{info, warn};

use super::error::MigrationError;
use super::parse::ParseContext;
use super::types::{MigrationOptions, MigrationResult, PassStats, SheetRow};
use crate::api::operations::{Operation, OperationResult};
use crate::api::query::Query;
use crate::api::resilience::RetryPolicy;
use crate::cache::{CUSTOMERS_KEY, Cache, LAST_RESULT_KEY, ORDERS_KEY};
use crate::notify::{Change, Entity, LogNotifier, SourceNotifier};
use crate::source::SheetSource;
use crate::store::{Row, Store, StoreError};

pub const DEFAULT_ORDERS_SHEET: &str = "訂單";
pub const DEFAULT_CUSTOMERS_SHEET: &str = "客戶";

#[derive(Debug, Clone)]
pub struct ImporterSettings {
    pub orders_sheet: String,
    pub customers_sheet: String,
    /// Zone naive sheet timestamps are read in
    pub timezone: Tz,
    /// How long the last result stays readable from the cache
    pub result_ttl: Option<Duration>,
}

impl Default for ImporterSettings {
    fn default() -> Self {
        Self {
            orders_sheet: DEFAULT_ORDERS_SHEET.to_string(),
            customers_sheet: DEFAULT_CUSTOMERS_SHEET.to_string(),
            timezone: chrono_tz::Asia::Taipei,
            result_ttl: Some(Duration::from_secs(3600)),
        }
    }
}

/// Output of one pass: its counters plus the changes to report afterwards
#[derive(Debug, Default)]
struct PassOutcome {
    stats: PassStats,
    changes: Vec<(Entity, Change)>,
}

/// Per-run state shared by the passes
struct RunContext<'a> {
    store: &'a dyn Store,
    retry: &'a RetryPolicy,
    options: MigrationOptions,
    parse: ParseContext,
}

impl RunContext<'_> {
    /// Execute a mutating operation, or only log it during a dry run
    async fn apply(&self, op: Operation) -> Result<OperationResult, StoreError> {
        if self.options.dry_run {
            info!("[dry run] would {}", op.describe());
            return Ok(op.skip());
        }
        op.execute(self.store, self.retry).await
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let label = format!("select from {}", query.table);
        self.retry
            .execute(&label, || self.store.select(query))
            .await
    }

    async fn exists(&self, query: &Query) -> Result<bool, StoreError> {
        Ok(!self.select(query).await?.is_empty())
    }
}

/// Data rows after the header, numbered from 1
fn data_rows(rows: &[SheetRow]) -> impl Iterator<Item = (i64, &SheetRow)> {
    rows.iter()
        .skip(1)
        .enumerate()
        .map(|(idx, row)| (idx as i64 + 1, row))
}

pub struct Importer {
    source: Arc<dyn SheetSource>,
    store: Arc<dyn Store>,
    cache: Option<Arc<dyn Cache>>,
    notifier: Arc<dyn SourceNotifier>,
    retry: RetryPolicy,
    settings: ImporterSettings,
}

impl Importer {
    pub fn new(source: Arc<dyn SheetSource>, store: Arc<dyn Store>) -> Self {
        Self {
            source,
            store,
            cache: None,
            notifier: Arc::new(LogNotifier),
            retry: RetryPolicy::default(),
            settings: ImporterSettings::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SourceNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_settings(mut self, settings: ImporterSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ImporterSettings {
        &self.settings
    }

    /// Run one migration of `sheet_id`.
    ///
    /// Only an empty sheet id or a failed orders-sheet fetch is returned as
    /// an error; per-row failures end up in `stats.errors`.
    pub async fn run(
        &self,
        sheet_id: &str,
        options: MigrationOptions,
    ) -> Result<MigrationResult, MigrationError> {
        let sheet_id = sheet_id.trim();
        if sheet_id.is_empty() {
            return Err(MigrationError::InvalidSheetId);
        }
        info!(
            "Starting migration of {} (dry_run={}, skip_existing={})",
            sheet_id, options.dry_run, options.skip_existing
        );

        let order_rows = self
            .source
            .get_rows(sheet_id, &self.settings.orders_sheet)
            .await
            .map_err(|e| MigrationError::from_source(&self.settings.orders_sheet, e))?;
        let customer_rows = match self
            .source
            .get_rows(sheet_id, &self.settings.customers_sheet)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "Skipping customers: failed to read sheet '{}': {:#}",
                    self.settings.customers_sheet, e
                );
                Vec::new()
            }
        };

        let ctx = RunContext {
            store: self.store.as_ref(),
            retry: &self.retry,
            options,
            parse: ParseContext::new(Utc::now(), self.settings.timezone),
        };

        let customers = customers::import_customers(&ctx, &customer_rows).await;
        let orders = orders::import_orders(&ctx, &order_rows).await;

        let stats = customers.stats.merge(orders.stats);
        let result = MigrationResult::from_stats(stats.into(), options.dry_run);
        info!(
            "{}: {} orders, {} customers, {} items, {} deleted",
            result.message,
            result.stats.orders_processed,
            result.stats.customers_processed,
            result.stats.products_processed,
            result.stats.orders_deleted
        );

        if !options.dry_run {
            self.invalidate_cache().await;
            let changes = customers.changes.iter().chain(orders.changes.iter());
            for (entity, change) in changes {
                if let Err(e) = self.notifier.notify_source_of_change(*entity, change).await {
                    warn!("Failed to notify source of {:?}: {:#}", change, e);
                }
            }
        }
        self.remember(&result).await;

        Ok(result)
    }

    async fn invalidate_cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        for key in [ORDERS_KEY, CUSTOMERS_KEY] {
            if let Err(e) = cache.delete(key).await {
                warn!("Failed to invalidate cache key '{}': {:#}", key, e);
            }
        }
    }

    async fn remember(&self, result: &MigrationResult) {
        let Some(cache) = &self.cache else {
            return;
        };
        let stored = match serde_json::to_string(result) {
            Ok(json) => cache.set(LAST_RESULT_KEY, json, self.settings.result_ttl).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            warn!("Failed to cache migration result: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::source::MemorySource;
    use crate::store::memory::CallKind;
    use crate::store::{MemoryStore, Table, row_i64};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const SHEET: &str = "sheet-1";

    const ORDER_HEADER: [&str; 13] = [
        "時間", "姓名", "電話", "品項", "總額", "取貨方式", "地址", "取貨日期", "取貨時間",
        "付款方式", "備註", "訂單狀態", "付款狀態",
    ];

    fn order_row(name: &str, phone: &str, items: &str, total: &str) -> Vec<String> {
        let mut row = vec![String::new(); 13];
        row[0] = "2024/3/1 下午 2:30:00".to_string();
        row[1] = name.to_string();
        row[2] = phone.to_string();
        row[3] = items.to_string();
        row[4] = total.to_string();
        row[7] = "2024-03-05".to_string();
        row
    }

    fn header() -> Vec<String> {
        ORDER_HEADER.iter().map(|s| s.to_string()).collect()
    }

    fn three_row_sheet() -> Vec<Vec<String>> {
        vec![
            header(),
            order_row("王小明", "0912-345-678", "原味蘿蔔糕 x 2, 芋頭粿 x1 350", "1050"),
            order_row("  ", "0922000000", "芋頭粿 x1", "350"),
            order_row("陳美麗", "0933111222", "芋頭粿 x2", "700"),
        ]
    }

    fn customers_sheet() -> Vec<Vec<&'static str>> {
        vec![
            vec!["姓名", "電話", "地址", "取貨方式"],
            vec!["王小明", "0912-345-678", "台北市", "宅配"],
            vec!["", "0900000000", "", ""],
            vec!["陳美麗", "0933 111 222", "新北市", "自取"],
        ]
    }

    struct Fixture {
        source: Arc<MemorySource>,
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
        notifier: Arc<RecordingNotifier>,
        importer: Importer,
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<(Entity, Change)>>,
        fail: bool,
    }

    #[async_trait]
    impl SourceNotifier for RecordingNotifier {
        async fn notify_source_of_change(
            &self,
            entity: Entity,
            change: &Change,
        ) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((entity, change.clone()));
            if self.fail {
                Err(anyhow!("sheet is read-only"))
            } else {
                Ok(())
            }
        }
    }

    fn fixture_with(notifier: RecordingNotifier) -> Fixture {
        let source = Arc::new(MemorySource::new());
        source.set_sheet(SHEET, DEFAULT_ORDERS_SHEET, three_row_sheet());
        source.set_sheet(SHEET, DEFAULT_CUSTOMERS_SHEET, customers_sheet());

        let store = Arc::new(MemoryStore::new());
        store.seed(
            Table::Products,
            vec![
                json!({"name": "原味蘿蔔糕", "price": 350})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ],
        );
        let cache = Arc::new(MemoryCache::new());
        let notifier = Arc::new(notifier);

        let importer = Importer::new(source.clone(), store.clone())
            .with_cache(cache.clone())
            .with_notifier(notifier.clone());
        Fixture {
            source,
            store,
            cache,
            notifier,
            importer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default())
    }

    fn sheet_ids(store: &MemoryStore) -> Vec<i64> {
        let mut ids: Vec<i64> = store
            .rows(Table::Orders)
            .iter()
            .filter_map(|r| row_i64(r, "google_sheet_id"))
            .collect();
        ids.sort();
        ids
    }

    fn items_of(store: &MemoryStore, order_id: i64) -> Vec<Row> {
        store
            .rows(Table::OrderItems)
            .into_iter()
            .filter(|r| row_i64(r, "order_id") == Some(order_id))
            .collect()
    }

    fn order_id_for(store: &MemoryStore, google_sheet_id: i64) -> i64 {
        store
            .rows(Table::Orders)
            .iter()
            .find(|r| row_i64(r, "google_sheet_id") == Some(google_sheet_id))
            .and_then(|r| row_i64(r, "id"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_three_row_end_to_end() {
        let f = fixture();
        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert!(result.success, "{:?}", result.stats.errors);
        assert_eq!(result.message, "Migration completed");
        assert_eq!(result.stats.orders_processed, 2);
        assert_eq!(result.stats.customers_processed, 2);
        assert_eq!(result.stats.products_processed, 3);
        assert_eq!(result.stats.orders_deleted, 0);
        assert_eq!(sheet_ids(&f.store), vec![1, 3]);

        let orders = f.store.rows(Table::Orders);
        let first = orders
            .iter()
            .find(|r| r["google_sheet_id"] == 1)
            .unwrap();
        assert_eq!(first["order_number"], "ORD-001");
        assert_eq!(first["customer_phone"], "0912345678");
        assert_eq!(first["status"], "訂單確認中");
        assert_eq!(first["payment_status"], "未收費");
        assert_eq!(first["due_date"], "2024-03-05");

        let items = items_of(&f.store, order_id_for(&f.store, 1));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["product_name"], "原味蘿蔔糕");
        assert_eq!(items[0]["quantity"], 2);
        assert_eq!(items[0]["unit_price"], 350.0);
        assert_eq!(items[1]["product_name"], "芋頭粿");
        assert_eq!(items[1]["total_price"], 350.0);

        let customers = f.store.rows(Table::Customers);
        assert_eq!(customers.len(), 2);
        assert!(customers.iter().any(|c| c["phone"] == "0933111222"));
    }

    #[tokio::test]
    async fn test_rerun_with_skip_existing_writes_nothing_new() {
        let f = fixture();
        let options = MigrationOptions {
            dry_run: false,
            skip_existing: true,
        };

        let first = f.importer.run(SHEET, options).await.unwrap();
        assert_eq!(first.stats.orders_processed, 2);
        let orders_before = f.store.rows(Table::Orders);
        let items_before = f.store.rows(Table::OrderItems);
        let customers_before = f.store.rows(Table::Customers);

        let second = f.importer.run(SHEET, options).await.unwrap();
        assert!(second.success);
        assert_eq!(second.stats.orders_processed, 0);
        assert_eq!(second.stats.customers_processed, 0);
        assert_eq!(second.stats.orders_deleted, 0);
        assert_eq!(f.store.rows(Table::Orders), orders_before);
        assert_eq!(f.store.rows(Table::OrderItems), items_before);
        assert_eq!(f.store.rows(Table::Customers), customers_before);
    }

    #[tokio::test]
    async fn test_rerun_without_skip_replaces_items() {
        let f = fixture();
        f.importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        let order_id = order_id_for(&f.store, 3);

        let mut rows = three_row_sheet();
        rows[3] = order_row("陳美麗", "0933111222", "芋頭粿 x3, 年糕 x1 100", "1150");
        f.source.set_sheet(SHEET, DEFAULT_ORDERS_SHEET, rows);
        f.importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(order_id_for(&f.store, 3), order_id);
        assert_eq!(f.store.rows(Table::Orders).len(), 2);
        let items = items_of(&f.store, order_id);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["quantity"], 3);
        assert_eq!(items[0]["unit_price"], 350.0);
    }

    #[tokio::test]
    async fn test_removed_row_is_deleted_once() {
        let f = fixture();
        f.importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        let deleted_id = order_id_for(&f.store, 3);

        let mut rows = three_row_sheet();
        rows.truncate(3);
        f.source.set_sheet(SHEET, DEFAULT_ORDERS_SHEET, rows);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.stats.orders_deleted, 1);
        assert_eq!(sheet_ids(&f.store), vec![1]);
        assert!(items_of(&f.store, deleted_id).is_empty());

        let again = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert_eq!(again.stats.orders_deleted, 0);
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_others() {
        let f = fixture();
        f.importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        let kept_id = order_id_for(&f.store, 1);
        let removed_id = order_id_for(&f.store, 3);

        f.source.set_sheet(SHEET, DEFAULT_ORDERS_SHEET, vec![header()]);
        f.store
            .fail_when(Table::Orders, CallKind::Delete, "id", kept_id);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.stats.orders_deleted, 1);
        assert_eq!(result.stats.errors.len(), 1);
        assert!(result.stats.errors[0].starts_with("Delete order 1: "));
        assert_eq!(sheet_ids(&f.store), vec![1]);
        assert!(items_of(&f.store, removed_id).is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_skips_deletions_only() {
        let f = fixture();
        f.store.fail_times(Table::Orders, CallKind::Select, 1, false);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(result.stats.orders_deleted, 0);
        assert_eq!(result.stats.orders_processed, 2);
        assert_eq!(result.stats.errors.len(), 1);
        assert!(
            result.stats.errors[0].starts_with("Delete orders: failed to list existing orders: ")
        );
        assert_eq!(sheet_ids(&f.store), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_vanished_orders() {
        let f = fixture();
        f.importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        let mut rows = three_row_sheet();
        rows.truncate(3);
        f.source.set_sheet(SHEET, DEFAULT_ORDERS_SHEET, rows);
        let calls_before = f.store.mutation_calls();

        let result = f
            .importer
            .run(
                SHEET,
                MigrationOptions {
                    dry_run: true,
                    skip_existing: false,
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.stats.orders_deleted, 0);
        assert_eq!(f.store.mutation_calls(), calls_before);
        assert_eq!(sheet_ids(&f.store), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_writes() {
        let f = fixture();
        let result = f
            .importer
            .run(
                SHEET,
                MigrationOptions {
                    dry_run: true,
                    skip_existing: false,
                },
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.message, "Dry run completed");
        assert_eq!(result.stats.orders_processed, 2);
        assert_eq!(result.stats.customers_processed, 2);
        assert_eq!(result.stats.products_processed, 3);
        assert_eq!(f.store.mutation_calls(), 0);
        assert!(f.store.rows(Table::Orders).is_empty());
        assert!(f.notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_row_does_not_stop_the_pass() {
        let f = fixture();
        f.store
            .fail_when(Table::Orders, CallKind::Upsert, "google_sheet_id", 1);
        f.store
            .fail_when(Table::Customers, CallKind::Upsert, "phone", "0912345678");

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.message, "Migration completed with 2 errors");
        assert_eq!(result.stats.orders_processed, 1);
        assert_eq!(result.stats.customers_processed, 1);
        assert_eq!(sheet_ids(&f.store), vec![3]);
        assert!(result.stats.errors.iter().any(|e| e.starts_with("Order row 1: ")));
        assert!(
            result
                .stats
                .errors
                .iter()
                .any(|e| e.starts_with("Customer row 1 (0912345678): "))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let f = fixture();
        f.store.fail_times(Table::Orders, CallKind::Upsert, 2, true);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.stats.errors);
        assert_eq!(sheet_ids(&f.store), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_become_row_errors() {
        let f = fixture();
        f.store.fail_times(Table::Orders, CallKind::Upsert, 3, true);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.stats.errors.len(), 1);
        assert!(result.stats.errors[0].starts_with("Order row 1: store unavailable"));
        assert_eq!(sheet_ids(&f.store), vec![3]);
    }

    #[tokio::test]
    async fn test_fatal_errors() {
        let f = fixture();
        assert!(matches!(
            f.importer.run("  ", MigrationOptions::default()).await,
            Err(MigrationError::InvalidSheetId)
        ));

        f.source.remove_sheet(SHEET, DEFAULT_ORDERS_SHEET);
        let err = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Source { .. }));
        assert_eq!(f.store.mutation_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_customers_sheet_is_not_fatal() {
        let f = fixture();
        f.source.remove_sheet(SHEET, DEFAULT_CUSTOMERS_SHEET);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.stats.customers_processed, 0);
        assert_eq!(result.stats.orders_processed, 2);
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_to_apportioning() {
        let f = fixture();
        f.store.fail_times(Table::Products, CallKind::Select, 1, false);

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();
        assert!(result.success);

        // 1050 total minus the priced 350, over 2 unpriced units
        let items = items_of(&f.store, order_id_for(&f.store, 1));
        assert_eq!(items[0]["unit_price"], 350.0);
    }

    #[tokio::test]
    async fn test_cache_and_notifications_after_write() {
        let f = fixture_with(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        f.cache
            .set(ORDERS_KEY, "[]".to_string(), None)
            .await
            .unwrap();

        let result = f
            .importer
            .run(SHEET, MigrationOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(f.cache.get(ORDERS_KEY).await.unwrap(), None);
        let last = f.cache.get(LAST_RESULT_KEY).await.unwrap().unwrap();
        let cached: MigrationResult = serde_json::from_str(&last).unwrap();
        assert_eq!(cached, result);

        let seen = f.notifier.seen.lock().unwrap();
        let orders: Vec<i64> = seen
            .iter()
            .filter_map(|(entity, change)| match (entity, change) {
                (Entity::Order, Change::Imported { row, .. }) => Some(*row),
                _ => None,
            })
            .collect();
        assert_eq!(orders, vec![1, 3]);
    }
}
