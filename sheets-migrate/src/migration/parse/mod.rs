//! Row parser: raw spreadsheet rows into typed records
//!
//! Everything here is pure: no I/O and no shared state. Customers are read
//! through a header map, orders through fixed column positions.

mod customer;
mod header;
mod items;
mod order;
pub mod text;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub use customer::parse_customer_row;
pub use header::build_header_map;
pub use items::{Catalog, parse_items_string};
pub use order::{OrderColumn, parse_order_row};
pub use text::{normalize_phone, parse_amount};

/// Values fixed for the duration of one import run
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    /// Fallback for unparsable timestamps
    pub now: DateTime<Utc>,
    /// Zone naive sheet timestamps are read in
    pub timezone: Tz,
}

impl ParseContext {
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self { now, timezone }
    }

    pub(crate) fn timestamp_or_now(&self, raw: &str) -> DateTime<Utc> {
        text::parse_datetime(raw, self.timezone).unwrap_or(self.now)
    }
}

/// A row is blank when every cell is empty after trimming
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}
