use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sleepfhir::api::rest::RestApi;
use sleepfhir::config::{load_config, DEFAULT_CONFIG_PATH};
use sleepfhir::fhir::BundleAssembler;
use sleepfhir::storage::SqliteStore;
use sleepfhir::SleepService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sleepfhir=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SLEEPFHIR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;

    tracing::info!("Starting sleepfhir with database: {}", config.storage.path);

    let store = SqliteStore::open(&config.storage.path)?;
    let assembler = BundleAssembler::new(config.coding.component_codes());
    let service = Arc::new(SleepService::new(Arc::new(store), assembler));
    let api = RestApi::new(service);

    let addr = config.api.socket_addr()?;
    tracing::info!("Starting server on {}", addr);

    // Create a channel for shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (_, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            tracing::info!("Shutting down server...");
        })?;

    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    tracing::info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    server_handle.await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
