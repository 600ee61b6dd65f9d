//! Where raw sheet rows come from
//!
//! The importer only sees `SheetSource`. Google Sheets lives in
//! `api::sheets`; local workbooks and fixtures live here.

pub mod memory;
pub mod xlsx;

use anyhow::Result;
use async_trait::async_trait;

use crate::migration::types::SheetRow;

pub use memory::MemorySource;
pub use xlsx::XlsxSource;

#[async_trait]
pub trait SheetSource: Send + Sync {
    /// All rows of one sheet, header row included, as untrimmed strings.
    ///
    /// Fails on network, credential or lookup errors; an existing but empty
    /// sheet yields an empty vector.
    async fn get_rows(&self, sheet_id: &str, sheet_name: &str) -> Result<Vec<SheetRow>>;
}
