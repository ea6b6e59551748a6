use {
    panel_ledger::{
        AppState,
        adapters::{
            notifier::{ChannelNotifier, HttpSink, LogSink, NotificationSink},
            provider_client::SmmProviderClient,
        },
        config::Config,
        infra::sqlite,
        services::{
            ingestion::DepositIngestor,
            reconciliation::{ReconcileSettings, Reconciler},
            worker,
        },
    },
    std::{process::ExitCode, sync::Arc},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        gateways = ?config.gateways.names().collect::<Vec<_>>(),
        "configuration loaded"
    );

    let pool = sqlite::connect(&config.database_url, 10).await?;

    let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink)];
    if let Some(url) = &config.notify_webhook_url {
        sinks.push(Box::new(HttpSink::new(url.clone())?));
    }
    let (notifier, notifier_task) = ChannelNotifier::spawn(sinks);
    let notifier = Arc::new(notifier);

    let provider = Arc::new(SmmProviderClient::new(config.provider.clone())?);
    let reconciler = Reconciler::new(
        pool.clone(),
        provider,
        notifier.clone(),
        ReconcileSettings {
            concurrency: config.reconcile_concurrency,
            ..ReconcileSettings::default()
        },
    );
    let ingestor = DepositIngestor::new(
        pool.clone(),
        notifier.clone(),
        config.consumed_reference_ttl,
    )
    .with_pending_ttl(config.pending_payment_ttl);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconcile_task = tokio::spawn(worker::run_reconciliation_loop(
        reconciler.clone(),
        config.reconcile_interval,
        shutdown_rx.clone(),
    ));
    let sweeper_task = tokio::spawn(worker::run_sweeper(pool.clone(), shutdown_rx));

    let state = AppState {
        pool: pool.clone(),
        gateways: Arc::new(config.gateways.clone()),
        ingestor,
        reconciler,
        admin_token: config.admin_token.clone(),
    };
    let app = panel_ledger::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(reconcile_task, sweeper_task);
    drop(notifier);
    let _ = notifier_task.await;
    pool.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
