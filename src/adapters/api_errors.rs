use crate::domain::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype so the HTTP mapping lives in the adapter layer, not the domain.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self(PipelineError::Unauthorized("missing or wrong admin token".into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::WebhookSignature(msg) => {
                tracing::warn!("rejected unauthenticated request: {msg}");
                (
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "invalid signature".to_string(),
                )
            }
            PipelineError::Unauthorized(msg) => {
                tracing::warn!("rejected admin request: {msg}");
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            PipelineError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            PipelineError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{what} not found"),
            ),
            PipelineError::OwnerNotFound(id) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("account {id} not found"),
            ),
            PipelineError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "invalid_state", msg.clone())
            }
            PipelineError::AlreadyCredited(reference) => (
                StatusCode::CONFLICT,
                "invalid_state",
                format!("reference {reference} already credited"),
            ),
            PipelineError::CurrencyMismatch { .. } => (
                StatusCode::CONFLICT,
                "currency_mismatch",
                self.0.to_string(),
            ),
            other => {
                tracing::error!("internal error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::domain::money::Currency, axum::body::to_bytes};

    async fn body_of(err: ApiError) -> serde_json::Value {
        let bytes = to_bytes(err.into_response().into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn status_of(err: PipelineError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            status_of(PipelineError::WebhookSignature("bad".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(PipelineError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PipelineError::NotFound("gateway".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PipelineError::InvalidState("done".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PipelineError::CurrencyMismatch {
                account: Currency::Usd,
                credit: Currency::Ngn,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PipelineError::Database(sqlx::Error::RowNotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn admin_rejection_is_not_reported_as_a_signature_failure() {
        let body = body_of(ApiError::unauthorized()).await;
        assert_eq!(body["error_code"], "unauthorized");
        assert_eq!(body["message"], "missing or wrong admin token");

        let body = body_of(ApiError(PipelineError::WebhookSignature("mismatch".into()))).await;
        assert_eq!(body["message"], "invalid signature");
    }
}
