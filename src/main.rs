//! Ferropath server binary
//!
//! Run with: `cargo run -- --help`

use clap::Parser;
use ferropath::{Cli, FerropathServer, init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = cli.settings()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %settings.server.listen_addr,
        database = %settings.storage.database,
        "Starting Ferropath server"
    );

    // Ingestion is synchronous and may take a while on a cold store
    let server = tokio::task::spawn_blocking(move || FerropathServer::new(settings)).await??;
    server.run().await?;
    Ok(())
}
