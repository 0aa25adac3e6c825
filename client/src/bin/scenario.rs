//! Plays the reference werewolf round against a running ledger node.

use anyhow::{Context, Result};
use clap::Parser;
use std::str::FromStr;
use tracing::{info, Level};
use werewolf_client::{scenario, Client, Config, GameOrchestrator, RetryExecutor};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the reference werewolf scenario")]
struct Args {
    /// Path to the YAML configuration
    #[arg(short, long)]
    config: String,

    /// Game identifier to create
    #[arg(long, default_value = "1")]
    game_id: u64,

    /// Ledger node base URL (overrides the configuration)
    #[arg(short, long)]
    url: Option<String>,

    /// Validate the configuration and print the steps without submitting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Could not load config file {}", args.config))?;
    config
        .apply_env()
        .context("Invalid environment override")?;
    if let Some(url) = args.url {
        config.base_url = url;
    }
    config.validate()?;

    let level = Level::from_str(&config.log_level)
        .with_context(|| format!("Invalid log level {}", config.log_level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let abi = config.load_abi().context("Could not load contract description")?;
    let (registry, book) = config.registry()?;
    let steps = scenario::reference(&book)?;

    if args.dry_run {
        for (index, step) in steps.iter().enumerate() {
            let actor = step
                .actor
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "any".to_string());
            println!("{:>2}. {} ({} as {actor})", index + 1, step.label, step.action.kind());
        }
        return Ok(());
    }

    let client = Client::new(&config.base_url)?
        .with_poll_interval(config.poll_interval())
        .with_confirmation_timeout(config.confirmation_timeout());
    let executor = RetryExecutor::new(config.classifier(), config.retry.policy());
    let mut orchestrator = GameOrchestrator::new(
        client,
        registry,
        config.contract_address.clone(),
        &abi,
        executor,
    )?;

    info!(
        url = %config.base_url,
        contract = %config.contract_address,
        functions = abi.functions().count(),
        game_id = args.game_id,
        steps = steps.len(),
        "starting scenario"
    );
    let report = scenario::run(&mut orchestrator, args.game_id, &steps, config.step_delay())
        .await
        .context("Scenario failed")?;
    let phase = orchestrator.sync_phase(args.game_id).await?;
    info!(
        confirmed = report.confirmed,
        sentinels = report.sentinels,
        %phase,
        "scenario finished"
    );
    Ok(())
}
