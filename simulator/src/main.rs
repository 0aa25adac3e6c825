use anyhow::Context;
use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Duration,
};
use tracing::{info, Level};
use werewolf_simulator::{Api, Simulator, SimulatorConfig};
use werewolf_types::Address;

#[derive(Parser, Debug)]
#[command(author, version, about = "Local werewolf ledger node")]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Address the game contract is deployed at.
    #[arg(long, default_value = "0x5ea1ed")]
    contract: String,

    /// Delay before an accepted transaction is reported final.
    #[arg(long, default_value_t = 500)]
    finality_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    let level = Level::from_str(&args.log_level)
        .with_context(|| format!("invalid log level {}", args.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = SimulatorConfig {
        contract: Address::new(args.contract),
        finality: Duration::from_millis(args.finality_ms),
    };
    let simulator = Arc::new(Simulator::new(config));
    info!(
        contract = %simulator.config().contract,
        finality = ?simulator.config().finality,
        "simulator configured"
    );
    let app = Api::new(simulator).router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}
