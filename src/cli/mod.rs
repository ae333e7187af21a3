use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::application::LedgerService;
use crate::http;

/// Moneta - HTTP ledger service
#[derive(Parser, Debug)]
#[command(name = "moneta")]
#[command(about = "Accounts, deposits, withdrawals, transfers and statements over HTTP")]
#[command(version)]
pub struct Cli {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:moneta.db")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Enable verbose output (ignored when RUST_LOG is set)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Open the store, serve until shutdown, then close the store.
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        let service = Arc::new(LedgerService::init(&self.database_url).await?);
        tracing::debug!(database_url = %self.database_url, "database ready");

        let served = http::serve(service.clone(), self.listen_addr()).await;
        service.close().await;
        served
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
