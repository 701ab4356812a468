//! The DocuLite server daemon.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use doculite_engine::Engine;
use doculite_server::{Server, ServerConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Single-file document database speaking the MongoDB wire protocol.
#[derive(Parser)]
#[command(name = "doculited")]
#[command(about = "DocuLite server daemon", long_about = None)]
struct Cli {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:27017")]
    listen: SocketAddr,

    /// Data file path.
    #[arg(short, long, default_value = "doculite.json")]
    file: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doculite=info".parse().expect("valid filter")),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let engine = Engine::open(&cli.file)
        .with_context(|| format!("failed to open data file {}", cli.file.display()))?;
    let server = Server::new(ServerConfig::new(cli.listen), engine)
        .with_context(|| format!("failed to start server on {}", cli.listen))?;

    server.run()?;
    Ok(())
}
