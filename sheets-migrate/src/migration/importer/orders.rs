use std::collections::HashSet;

use log::{debug, info, warn};

use super::{PassOutcome, RunContext, data_rows};
use crate::api::operations::Operation;
use crate::api::query::{Filter, Query};
use crate::migration::parse::{Catalog, is_blank_row, parse_items_string, parse_order_row};
use crate::migration::types::{Order, PassStats, SheetRow};
use crate::notify::{Change, Entity};
use crate::store::{StoreError, Table, row_i64};

/// A parsed order together with its source row number
struct SourceOrder {
    row: i64,
    order: Order,
}

fn parse_orders(ctx: &RunContext<'_>, rows: &[SheetRow]) -> Vec<SourceOrder> {
    data_rows(rows)
        .filter(|(_, row)| !is_blank_row(row))
        .filter_map(|(row, cells)| {
            let parsed = parse_order_row(row, cells, &ctx.parse);
            if parsed.is_none() {
                debug!("Order row {} has no customer name, skipping", row);
            }
            parsed.map(|order| SourceOrder { row, order })
        })
        .collect()
}

/// Delete one order, its items first
async fn delete_order(ctx: &RunContext<'_>, order_id: i64) -> Result<(), StoreError> {
    let items = ctx
        .apply(Operation::delete(
            Table::OrderItems,
            vec![Filter::eq("order_id", order_id)],
        ))
        .await?;
    ctx.apply(Operation::delete(Table::Orders, vec![Filter::eq("id", order_id)]))
        .await?;
    debug!("Removed order {} with {} item(s)", order_id, items.affected);
    Ok(())
}

/// Remove stored orders whose source row no longer exists
async fn delete_vanished(ctx: &RunContext<'_>, present: &HashSet<i64>, outcome: &mut PassOutcome) {
    let query = Query::table(Table::Orders).filter(Filter::not_null("google_sheet_id"));
    let existing = match ctx.select(&query).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Failed to list existing orders: {}", e);
            outcome
                .stats
                .errors
                .push(format!("Delete orders: failed to list existing orders: {}", e));
            return;
        }
    };

    for stored in existing {
        let Some(google_sheet_id) = row_i64(&stored, "google_sheet_id") else {
            continue;
        };
        if present.contains(&google_sheet_id) {
            continue;
        }

        let result = match row_i64(&stored, "id") {
            Some(order_id) => delete_order(ctx, order_id).await,
            None => Err(StoreError::InvalidData("stored order has no id".to_string())),
        };
        match result {
            Ok(()) => {
                info!("Deleted order for removed sheet row {}", google_sheet_id);
                outcome.stats.orders_deleted += 1;
                outcome.changes.push((
                    Entity::Order,
                    Change::Deleted {
                        row: google_sheet_id,
                    },
                ));
            }
            Err(e) => {
                warn!("Delete order {} failed: {}", google_sheet_id, e);
                outcome
                    .stats
                    .errors
                    .push(format!("Delete order {}: {}", google_sheet_id, e));
            }
        }
    }
}

/// Product prices for item backfill; an unreadable catalog is treated as empty
async fn load_catalog(ctx: &RunContext<'_>) -> Catalog {
    match ctx.select(&Query::table(Table::Products)).await {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| {
                let name = row.get("name")?.as_str()?;
                let price = row.get("price")?.as_f64()?;
                Some((name.to_string(), price))
            })
            .collect(),
        Err(e) => {
            warn!("Failed to load product catalog, prices will be apportioned: {}", e);
            Catalog::new()
        }
    }
}

enum Written {
    /// Order upserted with this many items; id is None in dry runs
    Upserted { order_id: Option<i64>, items: usize },
    Skipped,
}

async fn write_order(
    ctx: &RunContext<'_>,
    catalog: &Catalog,
    order: &Order,
) -> Result<Written, StoreError> {
    if ctx.options.skip_existing {
        let query = Query::table(Table::Orders)
            .filter(Filter::eq("google_sheet_id", order.google_sheet_id));
        if ctx.exists(&query).await? {
            debug!("Order {} already exists, skipping", order.order_number);
            return Ok(Written::Skipped);
        }
    }

    let items = parse_items_string(&order.items_text, catalog, order.total_amount);
    let result = ctx
        .apply(Operation::upsert(
            Table::Orders,
            "google_sheet_id",
            vec![order.to_row()],
        ))
        .await?;

    if ctx.options.dry_run {
        for item in &items {
            info!(
                "[dry run] would add {} x{} @ {} to {}",
                item.product_name, item.quantity, item.unit_price, order.order_number
            );
        }
        return Ok(Written::Upserted {
            order_id: None,
            items: items.len(),
        });
    }

    let order_id = result
        .first_id()
        .ok_or_else(|| StoreError::InvalidData("upsert returned no order id".to_string()))?;

    // Items are replaced wholesale on every import
    ctx.apply(Operation::delete(
        Table::OrderItems,
        vec![Filter::eq("order_id", order_id)],
    ))
    .await?;
    let count = items.len();
    if count > 0 {
        let rows = items
            .into_iter()
            .map(|item| item.owned_by(order_id).to_row())
            .collect();
        ctx.apply(Operation::insert(Table::OrderItems, rows)).await?;
    }

    Ok(Written::Upserted {
        order_id: Some(order_id),
        items: count,
    })
}

/// Reconcile the orders sheet: delete vanished orders (not in dry runs), then
/// upsert every named row and replace its items
pub(super) async fn import_orders(ctx: &RunContext<'_>, rows: &[SheetRow]) -> PassOutcome {
    let mut outcome = PassOutcome::default();
    let orders = parse_orders(ctx, rows);

    if !ctx.options.dry_run {
        if rows.is_empty() {
            warn!("Orders sheet returned no rows at all, skipping deletions");
        } else {
            let present: HashSet<i64> = orders.iter().map(|o| o.order.google_sheet_id).collect();
            delete_vanished(ctx, &present, &mut outcome).await;
        }
    }

    let catalog = load_catalog(ctx).await;
    debug!("Loaded {} catalog prices", catalog.len());

    for SourceOrder { row, order } in &orders {
        match write_order(ctx, &catalog, order).await {
            Ok(Written::Upserted { order_id, items }) => {
                record_written(&mut outcome.stats, items);
                if let Some(record_id) = order_id {
                    outcome
                        .changes
                        .push((Entity::Order, Change::Imported { row: *row, record_id }));
                }
            }
            Ok(Written::Skipped) => {}
            Err(e) => {
                warn!("Order row {} failed: {}", row, e);
                outcome.stats.errors.push(format!("Order row {}: {}", row, e));
            }
        }
    }

    outcome
}

fn record_written(stats: &mut PassStats, items: usize) {
    stats.orders_processed += 1;
    stats.products_processed += items;
}
