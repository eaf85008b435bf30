//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    constants::{
        DEFAULT_BIG_BLIND, DEFAULT_BUY_IN_MAX, DEFAULT_BUY_IN_MIN, DEFAULT_SMALL_BLIND, MAX_PLAYERS,
    },
    entities::{Blinds, Chips},
    errors::{TableError, TableResult},
    pot::RakeConfig,
};

/// Table identifier
pub type TableId = i64;

/// Table configuration
///
/// Fixed for the lifetime of a table. Only the first eight fields are
/// required; the rest have working defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub table_id: TableId,

    /// Table name, used in logs
    pub name: String,

    /// Seated players needed before a hand starts (default: 2)
    pub min_players: usize,

    /// Number of seats (default: 10, at most 23)
    pub max_players: usize,

    pub small_blind: Chips,

    pub big_blind: Chips,

    pub buy_in_min: Chips,

    pub buy_in_max: Chips,

    /// Time a seat has to act before the table acts for it
    pub action_timeout_ms: u64,

    /// Timer tick driving timeouts and hand transitions
    pub tick_interval_ms: u64,

    /// Bound of the request queue
    pub queue_capacity: usize,

    /// How long a finished hand stays visible before the next one starts
    pub showdown_delay_ms: u64,

    /// Consecutive timeouts before a seat is sat out
    pub max_missed_actions: u32,

    /// How long a disconnected seat is held before it is forfeited
    pub disconnect_grace_ms: u64,

    /// Seat new players at a random empty seat instead of the lowest
    pub randomize_seats: bool,

    pub rake: RakeConfig,

    /// Bets adding more than this multiple of the pot are reported
    pub extreme_bet_pot_ratio: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_id: 1,
            name: "Default Table".to_string(),
            min_players: 2,
            max_players: 10,
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            buy_in_min: DEFAULT_BUY_IN_MIN,
            buy_in_max: DEFAULT_BUY_IN_MAX,
            action_timeout_ms: 30_000,
            tick_interval_ms: 100,
            queue_capacity: 100,
            showdown_delay_ms: 2_000,
            max_missed_actions: 2,
            disconnect_grace_ms: 60_000,
            randomize_seats: false,
            rake: RakeConfig::default(),
            extreme_bet_pot_ratio: 5,
        }
    }
}

impl TableConfig {
    /// Validate configuration
    pub fn validate(&self) -> TableResult<()> {
        let invalid = |reason: &str| -> TableResult<()> {
            Err(TableError::InvalidConfig(reason.to_string()))
        };

        if self.small_blind == 0 {
            return invalid("Small blind must be positive");
        }

        if self.big_blind <= self.small_blind {
            return invalid("Big blind must be greater than small blind");
        }

        if self.max_players < 2 || self.max_players > MAX_PLAYERS {
            return invalid("Max players must be between 2 and 23");
        }

        if self.min_players < 2 || self.min_players > self.max_players {
            return invalid("Min players must be between 2 and max players");
        }

        if self.buy_in_min == 0 || self.buy_in_max < self.buy_in_min {
            return invalid("Buy-in bounds must be positive and ordered");
        }

        if self.action_timeout_ms == 0 || self.tick_interval_ms == 0 {
            return invalid("Action timeout and tick interval must be positive");
        }

        if self.queue_capacity == 0 {
            return invalid("Queue capacity must be positive");
        }

        if self.rake.rate_bps > crate::game::pot::BASIS_POINTS {
            return invalid("Rake rate can't exceed 100%");
        }

        Ok(())
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.small_blind,
            big: self.big_blind,
        }
    }

    #[must_use]
    pub fn buy_in_bounds(&self) -> (Chips, Chips) {
        (self.buy_in_min, self.buy_in_max)
    }

    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn showdown_delay(&self) -> Duration {
        Duration::from_millis(self.showdown_delay_ms)
    }

    #[must_use]
    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }
}
