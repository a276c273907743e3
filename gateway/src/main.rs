mod config;

use clap::Parser;
use config::Config;
use registry::{Command, PostgresTenantStore, TenantRegistry};
use relay::{AppState, Forwarder, app};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gateway", about = "Multi-tenant analytics event forwarding gateway")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum GatewayError {
    #[error("tenant backing store: {0}")]
    Store(#[from] registry::StoreError),

    #[error("registry: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Keep the guard alive for the lifetime of the process so buffered
    // events are flushed on exit.
    let _sentry_guard = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics) = &config.metrics
        && let Err(err) =
            shared::metrics::install_statsd(&metrics.statsd_host, metrics.statsd_port, "gateway")
    {
        tracing::warn!(%err, "could not install statsd recorder, metrics disabled");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "gateway exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), GatewayError> {
    // The store connection is fatal at startup: there is no degraded
    // serve-without-registry mode.
    let store = Arc::new(PostgresTenantStore::connect(&config.database).await?);
    tracing::info!(
        host = %config.database.host,
        database = %config.database.name,
        "connected to tenant backing store"
    );

    let registry = TenantRegistry::new(store.clone());
    let tenants = registry.refresh().await?;
    tracing::info!(tenants, "initial tenant snapshot loaded");

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
    let refresh_interval = config.registry.refresh_interval_secs.map(Duration::from_secs);
    let worker = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run_worker(cmd_rx, refresh_interval).await })
    };

    let forwarder = Arc::new(Forwarder::new(registry.clone(), config.forwarder));
    let router = app(AppState {
        forwarder,
        registry,
    });

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    let _ = cmd_tx.send(Command::Shutdown).await;
    let _ = worker.await;
    store.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}
