use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::SheetSource;
use crate::migration::types::SheetRow;

/// Sheets held in memory, keyed by (sheet id, sheet name)
#[derive(Debug, Default)]
pub struct MemorySource {
    sheets: RwLock<HashMap<(String, String), Vec<SheetRow>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of one sheet
    pub fn set_sheet<R, C>(&self, sheet_id: &str, sheet_name: &str, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows: Vec<SheetRow> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        let mut sheets = self
            .sheets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sheets.insert((sheet_id.to_string(), sheet_name.to_string()), rows);
    }

    pub fn remove_sheet(&self, sheet_id: &str, sheet_name: &str) {
        let mut sheets = self
            .sheets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sheets.remove(&(sheet_id.to_string(), sheet_name.to_string()));
    }
}

#[async_trait]
impl SheetSource for MemorySource {
    async fn get_rows(&self, sheet_id: &str, sheet_name: &str) -> Result<Vec<SheetRow>> {
        let sheets = self
            .sheets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sheets
            .get(&(sheet_id.to_string(), sheet_name.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("Sheet '{}' not found in {}", sheet_name, sheet_id))
    }
}
