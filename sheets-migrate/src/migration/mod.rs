//! Sheet-to-table migration
//!
//! `parse` turns raw rows into records, `importer` reconciles them against
//! the store.

mod error;
pub mod importer;
pub mod parse;
pub mod types;

pub use error::MigrationError;
pub use importer::{Importer, ImporterSettings};
pub use types::{MigrationOptions, MigrationResult, MigrationStats};
