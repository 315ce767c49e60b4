//! Ferropath HTTP server
//!
//! Address autocomplete, geocoding, nearest-node lookup and shortest paths
//! over a street network, served as JSON.
//!
//! # Example
//!
//! ```ignore
//! use ferropath::{Cli, FerropathServer};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Cli::parse().settings().unwrap();
//!     let server = FerropathServer::new(settings).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{Cli, ConfigError, Settings, StorageLocation};
pub use error::{ApiError, ServerError};
pub use state::AppState;
pub use telemetry::init_logging;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use ferropath_core::loading::FileDataSource;
use ferropath_core::store::SqliteStore;
use ferropath_core::{AppContext, InitializationGuard};
use tokio::net::TcpListener;
use tracing::info;

/// Ferropath HTTP server
pub struct FerropathServer {
    state: Arc<AppState>,
    router: Router,
    listen_addr: SocketAddr,
}

impl FerropathServer {
    /// Opens the store and ingests the data files into empty relations.
    ///
    /// Blocks until ingestion is done; call it from a blocking context.
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        let store = match settings.storage.location() {
            StorageLocation::Memory => SqliteStore::open_in_memory()?,
            StorageLocation::File(path) => SqliteStore::open(path, settings.storage.pool_size)?,
        };
        let context = AppContext::new(store, settings.context_config())?;

        let source = FileDataSource::new(settings.data_source_config()?)?;
        let report = InitializationGuard::new(&context).ensure_initialized(&source)?;
        info!(
            addresses = ?report.addresses,
            edges = report.network.as_ref().map(|network| network.edges),
            "Store ready"
        );

        let state = Arc::new(AppState::new(context, &settings.server));
        let router = routes::build_router(Arc::clone(&state));

        Ok(Self {
            state,
            router,
            listen_addr: settings.server.listen_addr,
        })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Get the router for testing
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.listen_addr).await?;
        info!(addr = %self.listen_addr, "Ferropath server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Ferropath server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
}
