//! Headless poker table host.
//!
//! Spins up tables managed by a `TableManager`, keeps them busy with house
//! autoplayers and writes every hand and shuffle commitment to append-only
//! JSON lines files.

mod autoplay;
mod config;
mod history;
mod logging;
mod metrics;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Error};
use pico_args::Arguments;
use poker_table::{
    TableManager, TableServices,
    security::LogRiskScorer,
};
use tracing::{error, info};

use crate::{
    autoplay::{Autoplayer, HOUSE_USER_ID_BASE},
    config::HostConfig,
    history::HistoryFiles,
    metrics::{MeteredHistory, MeteredRiskScorer},
};

const HELP: &str = "\
Run a headless poker table host

USAGE:
  pp_server [OPTIONS]

OPTIONS:
  --tables       N          Number of tables to host      [default: env HOST_TABLES or 1]
  --history-dir  PATH       Hand history/audit directory  [default: env HOST_HISTORY_DIR or ./history]
  --metrics      IP:PORT    Prometheus scrape address     [default: env HOST_METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help                Print help information

ENVIRONMENT:
  HOST_AUTOPLAYERS          House players per table (default 4)
  HOST_AUTOPLAY_STYLE       passive | standard | aggressive
  TABLE_SMALL_BLIND         Small blind (default 10)
  TABLE_BIG_BLIND           Big blind (default 20)
  TABLE_RAKE_BPS            Rake in basis points of the main pot (default 0)
  RUST_LOG                  Log filter (default info)
  (See .env.example for all configuration options)
";

/// How often table gauges are refreshed.
const GAUGE_INTERVAL: Duration = Duration::from_secs(5);

struct Args {
    num_tables: Option<usize>,
    history_dir: Option<PathBuf>,
    metrics: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        num_tables: pargs.opt_value_from_str("--tables")?,
        history_dir: pargs.opt_value_from_str("--history-dir")?,
        metrics: pargs.opt_value_from_str("--metrics")?,
    };

    logging::init();

    let config = HostConfig::from_env(args.num_tables, args.history_dir, args.metrics)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{addr}/metrics");
    }

    let files = HistoryFiles::open(&config.history_dir)
        .await
        .with_context(|| format!("opening history files in {}", config.history_dir.display()))?;
    info!("Writing hand history to {}", config.history_dir.display());

    let manager = Arc::new(TableManager::new());
    let mut players = Vec::new();
    for index in 1..=config.num_tables {
        let services = TableServices::default()
            .with_hand_history(Arc::new(MeteredHistory::new(files.hands.clone())))
            .with_shuffle_audit(files.shuffle_audit.clone())
            .with_risk_scorer(Arc::new(MeteredRiskScorer::new(Arc::new(LogRiskScorer))));
        let table = manager
            .create_table_with(config.table_config(index), services)
            .await
            .with_context(|| format!("creating table {index}"))?;

        for seat in 0..config.autoplay.players {
            let user_id = HOUSE_USER_ID_BASE + (index * 100 + seat) as i64;
            let player = Autoplayer::new(
                Arc::clone(&table),
                user_id,
                config.autoplay.temperament,
                Duration::from_millis(config.autoplay.think_time_ms),
            );
            players.push(player.spawn());
        }
    }

    for table in manager.list_tables().await {
        info!(
            "  - {} (ID: {}) - {}/{} players, blinds: {}",
            table.name, table.id, table.player_count, table.max_players, table.blinds
        );
    }
    info!(
        "Hosting {} table(s) with {} {} autoplayer(s) each. Press Ctrl+C to stop.",
        manager.active_table_count().await,
        config.autoplay.players,
        config.autoplay.temperament
    );

    let gauges = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let mut ticker = tokio::time::interval(GAUGE_INTERVAL);
            loop {
                ticker.tick().await;
                let tables = manager.list_tables().await;
                metrics::active_tables(tables.len());
                for table in &tables {
                    metrics::table_state(table);
                    if table.halted {
                        error!("Table {} is halted", table.id);
                    }
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("installing Ctrl+C handler")?;
    info!("Shutting down...");

    gauges.abort();
    for player in &players {
        player.abort();
    }
    // Hands in progress are refunded and outbound records flushed.
    manager.close_all().await;
    info!("All tables closed");

    Ok(())
}
