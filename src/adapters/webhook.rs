use {
    crate::{AppState, adapters::api_errors::ApiError, domain::error::PipelineError},
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::HeaderMap,
    },
    serde_json::{Value, json},
};

/// `POST /webhooks/{gateway}`. Answers 2xx for every parseable delivery,
/// including ignored, duplicate and unmatched ones, so gateways stop retrying.
#[tracing::instrument(name = "webhook", skip_all, fields(gateway = %gateway))]
pub async fn gateway_webhook_handler(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let Some(config) = state.gateways.get(&gateway) else {
        tracing::warn!(%gateway, "webhook for unknown gateway");
        return Err(PipelineError::NotFound(format!("gateway {gateway}")).into());
    };

    let signature = headers
        .get(config.signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    let outcome = state.ingestor.ingest(&config, &body, signature).await?;
    Ok(Json(json!({ "status": outcome.as_str() })))
}
