use thiserror::Error;

/// Failures that abort a whole migration run.
///
/// Everything else (bad rows, failed writes) is collected into
/// `MigrationStats::errors` and the run continues.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("sheet id is required")]
    InvalidSheetId,

    #[error("failed to read sheet '{sheet}': {message}")]
    Source { sheet: String, message: String },
}

impl MigrationError {
    pub(crate) fn from_source(sheet: &str, err: anyhow::Error) -> Self {
        MigrationError::Source {
            sheet: sheet.to_string(),
            message: format!("{:#}", err),
        }
    }
}
