//! Prometheus metrics for monitoring hosted tables.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring
//! systems.
//!
//! # Metrics Categories
//!
//! - **Game Metrics**: Active tables, seated players, hands played, pot sizes, rake
//! - **Risk Metrics**: Risk signals by kind and severity
//! - **Health Metrics**: Halted tables

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;
use poker_table::{
    game::seats::SeatRelease,
    security::{RiskScorer, RiskSignal},
    table::{HandHistorySink, HandResult, SinkResult, TableMetadata},
};
use std::{net::SocketAddr, sync::Arc};

use crate::logging;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Set current active tables count.
pub fn active_tables(count: usize) {
    metrics::gauge!("active_tables").set(count as f64);
}

/// Refresh the per-table gauges.
pub fn table_state(table: &TableMetadata) {
    let id = table.id.to_string();
    metrics::gauge!("table_seated_players", "table" => id.clone()).set(table.player_count as f64);
    metrics::gauge!("table_halted", "table" => id).set(if table.halted { 1.0 } else { 0.0 });
}

/// Increment hands played counter.
pub fn hands_played_total(table_id: i64, showdown: bool) {
    metrics::counter!("hands_played_total",
        "table" => table_id.to_string(),
        "showdown" => showdown.to_string()
    )
    .increment(1);
}

/// Record pot size distribution.
pub fn pot_size_chips(size: u64) {
    metrics::histogram!("pot_size_chips").record(size as f64);
}

pub fn rake_collected_chips(table_id: i64, rake: u64) {
    metrics::counter!("rake_collected_chips", "table" => table_id.to_string()).increment(rake);
}

pub fn seats_released_total() {
    metrics::counter!("seats_released_total").increment(1);
}

// ============================================================================
// Risk Metrics
// ============================================================================

pub fn risk_signals_total(signal: &RiskSignal) {
    metrics::counter!("risk_signals_total",
        "kind" => signal.kind.to_string(),
        "severity" => signal.severity.to_string()
    )
    .increment(1);
}

/// Hand history sink that counts what passes through before handing it on.
pub struct MeteredHistory {
    inner: Arc<dyn HandHistorySink>,
}

impl MeteredHistory {
    pub fn new(inner: Arc<dyn HandHistorySink>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl HandHistorySink for MeteredHistory {
    async fn record_hand(&self, result: Arc<HandResult>) -> SinkResult {
        let pot = result.total_contributed();
        hands_played_total(result.table_id, result.showdown);
        pot_size_chips(pot);
        rake_collected_chips(result.table_id, result.rake);
        logging::log_hand_completed(
            result.table_id,
            result.hand_number,
            pot,
            result.rake,
            result.showdown,
        );
        self.inner.record_hand(result).await
    }

    async fn seat_released(&self, release: SeatRelease) -> SinkResult {
        seats_released_total();
        self.inner.seat_released(release).await
    }
}

/// Risk scorer that counts signals before handing them on.
pub struct MeteredRiskScorer {
    inner: Arc<dyn RiskScorer>,
}

impl MeteredRiskScorer {
    pub fn new(inner: Arc<dyn RiskScorer>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RiskScorer for MeteredRiskScorer {
    async fn score(&self, signal: RiskSignal) {
        risk_signals_total(&signal);
        self.inner.score(signal).await;
    }
}
