//! Types shared by the row parser and the importer

mod header;
mod record;
mod result;

pub use header::{Field, HeaderMap};
pub use record::{Customer, Order, OrderItem, SheetRow};
pub(crate) use record::round_money;
pub use result::{MigrationOptions, MigrationResult, MigrationStats, PassStats};
