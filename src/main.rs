//! zspread - Pairs Trading Decision Engine
//!
//! Standardizes the hedge-adjusted spread between two co-integrated
//! instruments once per trading day and trades the reversion.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use zspread::adapters::cli::{CliApp, Command, ReplayCmd, RunCmd};
use zspread::adapters::replay::{PaperExecution, ReplayFeed, SimAccount};
use zspread::adapters::scheduler::DailyTrigger;
use zspread::config::{load_config, Config};
use zspread::domain::ledger::TradeLedger;
use zspread::engine::coordinator::DailyTriggerCoordinator;
use zspread::engine::cycle::{DecisionCycle, PairSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (overrides go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Replay(cmd) => replay_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };

    fmt().with_env_filter(filter).init();
    Ok(())
}

/// Build the coordinator and its collaborators from loaded config.
fn build_coordinator(
    config: &Config,
) -> Result<(Arc<DailyTriggerCoordinator>, Arc<ReplayFeed>)> {
    let settings = PairSettings::try_from(config).context("invalid pair settings")?;

    let dump_path = shellexpand::tilde(&config.replay.dump_file).to_string();
    let feed = Arc::new(
        ReplayFeed::load(&dump_path)
            .with_context(|| format!("failed to load replay dump {}", dump_path))?,
    );
    let account = Arc::new(SimAccount::new(config.account.paper_buying_power));
    let execution = Arc::new(PaperExecution::new(feed.clone(), config.replay.slippage_bps));

    let ledger = if config.ledger.path.is_empty() {
        None
    } else {
        let path = shellexpand::tilde(&config.ledger.path).to_string();
        Some(TradeLedger::new(path))
    };

    let cycle = Arc::new(DecisionCycle::new(
        settings,
        feed.clone(),
        account,
        execution,
        ledger,
    ));
    let coordinator = Arc::new(DailyTriggerCoordinator::new(
        cycle,
        config.engine.retry_after_failure,
    ));
    Ok((coordinator, feed))
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting zspread engine...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;

    if !config.engine.coordinator {
        // Non-coordinator instances never act on triggers; running one as a
        // process would silently do nothing, so refuse loudly.
        anyhow::bail!(
            "this instance is not the designated coordinator; set engine.coordinator = true"
        );
    }

    let fire_time = config.fire_time().context("invalid fire_time")?;
    let (coordinator, _feed) = build_coordinator(&config)?;

    tracing::info!(
        pair = %format!("{}/{}", config.pair.symbol_a, config.pair.symbol_b),
        hedge_ratio = config.pair.hedge_ratio,
        entry = config.pair.entry_threshold,
        exit = config.pair.exit_threshold,
        %fire_time,
        "engine configured"
    );

    let trigger = DailyTrigger::new(coordinator, fire_time);

    // Setup Ctrl+C handler
    let stopper = trigger.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        stopper.stop().await;
    });

    trigger.run().await;
    tracing::info!("zspread stopped");
    Ok(())
}

async fn replay_command(cmd: ReplayCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let (coordinator, feed) = build_coordinator(&config)?;

    tracing::info!(days = feed.total_days(), "replaying dump");

    let mut day = Some(feed.current_day());
    let mut fired = 0usize;
    while let Some(trading_day) = day {
        let outcome = coordinator.fire(trading_day).await;
        tracing::info!(%trading_day, ?outcome, "replay day complete");
        fired += 1;
        day = feed.advance();
    }

    println!("Replayed {} trading days", fired);
    if let Some(last) = coordinator.last_processed_day() {
        println!("Last processed day: {}", last);
    }
    if !config.ledger.path.is_empty() {
        println!("Trade ledger: {}", config.ledger.path);
    }
    Ok(())
}
