//! Local `.xlsx` workbooks as a sheet source
//!
//! The sheet id is the workbook path, resolved against an optional root
//! directory. Useful for offline runs against an exported copy of the sheet.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::NaiveTime;
use log::info;

use super::SheetSource;
use crate::migration::types::SheetRow;

#[derive(Debug, Clone, Default)]
pub struct XlsxSource {
    root: Option<PathBuf>,
}

impl XlsxSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sheet ids against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, sheet_id: &str) -> PathBuf {
        match &self.root {
            Some(root) if Path::new(sheet_id).is_relative() => root.join(sheet_id),
            _ => PathBuf::from(sheet_id),
        }
    }
}

/// Render a cell the way the Sheets API formats values
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == NaiveTime::MIN => naive.format("%Y-%m-%d").to_string(),
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn read_sheet(path: &Path, sheet_name: &str) -> Result<Vec<SheetRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;
    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

    // Ranges start at the first used cell; pad back to absolute A1 positions
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<SheetRow> = vec![Vec::new(); row_offset];
    for cells in range.rows() {
        let mut row = vec![String::new(); col_offset];
        row.extend(cells.iter().map(cell_to_string));
        while row.last().is_some_and(|c| c.is_empty()) {
            row.pop();
        }
        rows.push(row);
    }
    Ok(rows)
}

#[async_trait]
impl SheetSource for XlsxSource {
    async fn get_rows(&self, sheet_id: &str, sheet_name: &str) -> Result<Vec<SheetRow>> {
        let path = self.resolve(sheet_id);
        let name = sheet_name.to_string();
        let rows = tokio::task::spawn_blocking(move || read_sheet(&path, &name))
            .await
            .context("Workbook reader task failed")??;

        info!("Read {} rows from sheet '{}'", rows.len(), sheet_name);
        Ok(rows)
    }
}
