pub mod adapters;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod infra;
pub mod services;

use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    config::Secret,
    gateway::GatewayRegistry,
    services::{ingestion::DepositIngestor, reconciliation::Reconciler},
    std::{sync::Arc, time::Duration},
    tower_http::timeout::TimeoutLayer,
};

/// Gateway payloads are small; anything bigger is refused before parsing.
pub const MAX_BODY_BYTES: usize = 64 * 1024;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub gateways: Arc<GatewayRegistry>,
    pub ingestor: DepositIngestor,
    pub reconciler: Reconciler,
    pub admin_token: Option<Secret<String>>,
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/webhooks/{gateway}",
            post(adapters::webhook::gateway_webhook_handler),
        );

    if state.admin_token.is_some() {
        app = app.route(
            "/admin/reconcile",
            post(adapters::admin::reconcile_now_handler),
        );
    }

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
