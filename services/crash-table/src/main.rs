use anyhow::{Context, Result};
use clap::Parser;
use crash_table::http::{self, AppState};
use crash_table::{build_config, Args, Ledger, RoundContext, RoundRegistry, SystemClock, TracingSink};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args).context("invalid configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let ledger = Arc::new(
        Ledger::open(&config.data_dir)
            .await
            .with_context(|| format!("failed to open ledger in {}", config.data_dir.display()))?,
    );
    let compactor = ledger.spawn_compactor(config.snapshot_interval);

    let registry = Arc::new(RoundRegistry::new(RoundContext {
        ledger: ledger.clone(),
        clock: Arc::new(SystemClock),
        sink: Arc::new(TracingSink),
        timing: config.timing,
    }));
    let app = http::router(AppState {
        registry: registry.clone(),
        start_balance: config.start_balance,
    });

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, data_dir = %config.data_dir.display(), "crash table listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    info!(channels = registry.channels().len(), "shutting down");
    registry.stop_all().await;
    compactor.abort();
    if let Err(err) = ledger.snapshot().await {
        warn!(?err, "final ledger snapshot failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
