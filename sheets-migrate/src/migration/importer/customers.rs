use log::{debug, warn};

use super::{PassOutcome, RunContext, data_rows};
use crate::api::operations::Operation;
use crate::api::query::{Filter, Query};
use crate::migration::parse::{build_header_map, is_blank_row, parse_customer_row};
use crate::migration::types::{Customer, Field, SheetRow};
use crate::notify::{Change, Entity};
use crate::store::{StoreError, Table};

enum Written {
    Upserted(Option<i64>),
    Skipped,
}

async fn write_customer(ctx: &RunContext<'_>, customer: &Customer) -> Result<Written, StoreError> {
    if ctx.options.skip_existing {
        let query = Query::table(Table::Customers).filter(Filter::eq("phone", customer.phone.as_str()));
        if ctx.exists(&query).await? {
            debug!("Customer {} already exists, skipping", customer.phone);
            return Ok(Written::Skipped);
        }
    }

    let op = Operation::upsert(Table::Customers, "phone", vec![customer.to_row()]);
    let result = ctx.apply(op).await?;
    Ok(Written::Upserted(result.first_id()))
}

/// Upsert every parsable customer row, keyed on the normalized phone
pub(super) async fn import_customers(ctx: &RunContext<'_>, rows: &[SheetRow]) -> PassOutcome {
    let mut outcome = PassOutcome::default();
    let Some(header_row) = rows.first() else {
        return outcome;
    };

    let header = build_header_map(header_row);
    if !header.contains(Field::Name) || !header.contains(Field::Phone) {
        warn!("Customers sheet has no name or phone column; no customers imported");
        return outcome;
    }

    for (n, row) in data_rows(rows) {
        if is_blank_row(row) {
            continue;
        }
        let Some(customer) = parse_customer_row(row, &header, &ctx.parse) else {
            debug!("Customer row {} has no name or phone, skipping", n);
            continue;
        };

        match write_customer(ctx, &customer).await {
            Ok(Written::Upserted(id)) => {
                outcome.stats.customers_processed += 1;
                if let Some(record_id) = id {
                    outcome
                        .changes
                        .push((Entity::Customer, Change::Imported { row: n, record_id }));
                }
            }
            Ok(Written::Skipped) => {}
            Err(e) => {
                warn!("Customer row {} failed: {}", n, e);
                outcome
                    .stats
                    .errors
                    .push(format!("Customer row {} ({}): {}", n, customer.phone, e));
            }
        }
    }

    outcome
}
