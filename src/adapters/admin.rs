use {
    crate::{AppState, adapters::api_errors::ApiError, services::reconciliation::RunStats},
    axum::{Json, extract::State, http::HeaderMap},
    sha2::{Digest, Sha256},
};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// `POST /admin/reconcile`: runs one reconciliation pass and returns its counters.
pub async fn reconcile_now_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RunStats>, ApiError> {
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let authorized = state
        .admin_token
        .as_ref()
        .is_some_and(|expected| tokens_match(presented, expected.reveal()));
    if !authorized {
        return Err(ApiError::unauthorized());
    }

    tracing::info!("on-demand reconciliation requested");
    let stats = state.reconciler.run().await?;
    Ok(Json(stats))
}

/// Compares digests so the time taken does not depend on where the inputs differ.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
