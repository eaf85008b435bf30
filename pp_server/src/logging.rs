//! Structured logging configuration.
//!
//! The table library logs through the `log` facade. The subscriber installed
//! here also captures those records, so one `RUST_LOG` filter covers both.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,poker_table::game=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var. Hand-by-hand
/// engine chatter is kept at `warn` unless asked for.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a hand summary with structured fields
pub fn log_hand_completed(table_id: i64, hand_number: u64, pot: u64, rake: u64, showdown: bool) {
    tracing::info!(
        table_id = table_id,
        hand_number = hand_number,
        pot = pot,
        rake = rake,
        showdown = showdown,
        "Hand completed"
    );
}
