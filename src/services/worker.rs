use {
    crate::infra::sqlite::deposit_repo,
    crate::services::reconciliation::Reconciler,
    chrono::Utc,
    sqlx::SqlitePool,
    std::time::Duration,
    tokio::sync::watch,
};

/// Run reconciliation every `interval` until shutdown.
pub async fn run_reconciliation_loop(
    reconciler: Reconciler,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval = ?interval, "reconciliation loop started");

    loop {
        match reconciler.run().await {
            Ok(stats) if stats.errors > 0 => {
                tracing::warn!(errors = stats.errors, scanned = stats.orders_scanned, "reconciliation run had failures")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "reconciliation run failed"),
        }

        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("reconciliation loop shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Periodically delete expired pending payments and consumed-reference markers.
pub async fn run_sweeper(pool: SqlitePool, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("expiry sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("expiry sweeper shutting down");
                return;
            }
            _ = tokio::time::sleep(Duration::from_secs(60)) => {}
        }

        match deposit_repo::sweep_expired(&pool, Utc::now().timestamp()).await {
            Ok((0, 0)) => {}
            Ok((pending, consumed)) => {
                tracing::info!(pending, consumed, "swept expired payment records")
            }
            Err(e) => tracing::error!(error = %e, "sweeper error"),
        }
    }
}
