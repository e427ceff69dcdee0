//! webcore sample server.
//!
//! ```text
//! CLI flags → config file (optional) → logging
//!     → Application::bootstrap (plugins, components, routes)
//!     → signal handler → Runtime::run
//! ```

mod demo;

use std::path::PathBuf;

use clap::Parser;
use webcore::config::{load_config, RuntimeConfig};
use webcore::lifecycle::signals;
use webcore::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "webcore", version, about = "Serve the webcore sample application")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the listening host.
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    logging::init(&config.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webcore starting");

    let runtime = demo::application(config).bootstrap()?;
    tracing::info!(
        host = %runtime.host(),
        port = runtime.port(),
        routes = runtime.router().routes().len(),
        "Configuration loaded"
    );

    signals::spawn_signal_handler(runtime.shutdown_handle());
    runtime.run().await?;

    Ok(())
}
