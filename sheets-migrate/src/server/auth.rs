use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use log::warn;

use super::error::ApiError;
use super::state::AppState;

/// Reject requests without `Authorization: Bearer <api token>`
pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match token {
        Some(token) if constant_time_eq(token.as_bytes(), state.api_token.as_bytes()) => {
            Ok(next.run(req).await)
        }
        _ => {
            warn!("Rejected unauthenticated request to {}", req.uri().path());
            Err(ApiError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
