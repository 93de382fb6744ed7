//! paygate-node CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use paygate_node::{NodeBuilder, RelayMode};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments and merge them over the config file
    let config = Cli::parse().into_config()?;

    // Initialize tracing from the merged log level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(&config.log_level)?)
        .init();

    info!("paygate-node v{}", env!("CARGO_PKG_VERSION"));
    if config.relay.mode == RelayMode::Paid {
        warn!("Paid mode needs a payments manager and chain client supplied by an embedding application");
    }

    // Build and run the node
    let mut node = NodeBuilder::new(config).build().await?;

    // Run until shutdown
    node.run().await?;

    info!("Goodbye!");
    Ok(())
}
