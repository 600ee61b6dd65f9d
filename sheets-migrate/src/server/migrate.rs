use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use log::info;
use serde::Deserialize;

use super::error::ApiError;
use super::state::AppState;
use crate::cache::LAST_RESULT_KEY;
use crate::migration::{MigrationOptions, MigrationResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateRequest {
    #[serde(default)]
    pub sheet_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub skip_existing: bool,
}

/// `POST /api/migrate`
pub async fn run_migration(
    State(state): State<AppState>,
    payload: Result<Json<MigrateRequest>, JsonRejection>,
) -> Result<Json<MigrationResult>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let sheet_id = request
        .sheet_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("sheetId is required".to_string()))?;

    info!("Migration requested for {} (dry_run={})", sheet_id, request.dry_run);
    let options = MigrationOptions {
        dry_run: request.dry_run,
        skip_existing: request.skip_existing,
    };
    let result = state.importer.run(sheet_id, options).await?;
    Ok(Json(result))
}

/// `GET /api/migrate/last`
pub async fn last_result(State(state): State<AppState>) -> Result<Json<MigrationResult>, ApiError> {
    let cached = state
        .cache
        .get(LAST_RESULT_KEY)
        .await?
        .ok_or_else(|| ApiError::NotFound("No migration result available".to_string()))?;
    let result = serde_json::from_str(&cached)
        .map_err(|e| ApiError::Internal(format!("Corrupt cached result: {}", e)))?;
    Ok(Json(result))
}
