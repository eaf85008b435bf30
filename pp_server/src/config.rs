//! Host configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use poker_table::{
    MAX_PLAYERS, TableConfig,
    game::pot::{BASIS_POINTS, RakeConfig},
    table::TableId,
};
use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use crate::autoplay::Temperament;

/// Complete host configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Number of tables to create on startup
    pub num_tables: usize,
    /// Directory holding the hand history and shuffle audit files
    pub history_dir: PathBuf,
    /// Prometheus scrape address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
    /// Table defaults configuration
    pub table_defaults: TableDefaultsConfig,
    /// House autoplayers seated at every table
    pub autoplay: AutoplayConfig,
}

/// Default table configuration
#[derive(Debug, Clone)]
pub struct TableDefaultsConfig {
    /// Maximum players per table
    pub max_players: usize,
    /// Players needed to deal a hand
    pub min_players: usize,
    /// Small blind amount
    pub small_blind: u64,
    /// Big blind amount
    pub big_blind: u64,
    /// Minimum buy-in (in big blinds)
    pub min_buy_in_bb: u64,
    /// Maximum buy-in (in big blinds)
    pub max_buy_in_bb: u64,
    pub action_timeout_ms: u64,
    pub showdown_delay_ms: u64,
    /// Rake in basis points of the main pot
    pub rake_bps: u32,
    /// Rake cap per hand, zero for none
    pub rake_cap: u64,
    pub randomize_seats: bool,
}

#[derive(Debug, Clone)]
pub struct AutoplayConfig {
    /// Autoplayers per table
    pub players: usize,
    pub temperament: Temperament,
    /// Base thinking time before each action
    pub think_time_ms: u64,
}

impl HostConfig {
    /// Load configuration from environment variables
    ///
    /// CLI overrides win over the environment, which wins over defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but can't be parsed
    pub fn from_env(
        num_tables_override: Option<usize>,
        history_dir_override: Option<PathBuf>,
        metrics_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let num_tables = match num_tables_override {
            Some(n) => n,
            None => parse_env_or("HOST_TABLES", 1)?,
        };

        let history_dir = match history_dir_override {
            Some(dir) => dir,
            None => std::env::var("HOST_HISTORY_DIR")
                .map_or_else(|_| PathBuf::from("history"), PathBuf::from),
        };

        let metrics_bind = match metrics_override {
            Some(addr) => Some(addr),
            None => parse_env_opt("HOST_METRICS_BIND")?,
        };

        let table_defaults = TableDefaultsConfig {
            max_players: parse_env_or("TABLE_MAX_PLAYERS", 9)?,
            min_players: parse_env_or("TABLE_MIN_PLAYERS", 2)?,
            small_blind: parse_env_or("TABLE_SMALL_BLIND", 10)?,
            big_blind: parse_env_or("TABLE_BIG_BLIND", 20)?,
            min_buy_in_bb: parse_env_or("TABLE_MIN_BUY_IN_BB", 50)?,
            max_buy_in_bb: parse_env_or("TABLE_MAX_BUY_IN_BB", 200)?,
            action_timeout_ms: parse_env_or("TABLE_ACTION_TIMEOUT_MS", 30_000)?,
            showdown_delay_ms: parse_env_or("TABLE_SHOWDOWN_DELAY_MS", 2_000)?,
            rake_bps: parse_env_or("TABLE_RAKE_BPS", 0)?,
            rake_cap: parse_env_or("TABLE_RAKE_CAP", 0)?,
            randomize_seats: parse_env_or("TABLE_RANDOMIZE_SEATS", true)?,
        };

        let autoplay = AutoplayConfig {
            players: parse_env_or("HOST_AUTOPLAYERS", 4)?,
            temperament: parse_env_or("HOST_AUTOPLAY_STYLE", Temperament::Standard)?,
            think_time_ms: parse_env_or("HOST_AUTOPLAY_THINK_MS", 400)?,
        };

        Ok(HostConfig {
            num_tables,
            history_dir,
            metrics_bind,
            table_defaults,
            autoplay,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let defaults = &self.table_defaults;

        if self.num_tables == 0 {
            return Err(ConfigError::invalid("HOST_TABLES", "Must be at least 1"));
        }

        if defaults.max_players < 2 || defaults.max_players > MAX_PLAYERS {
            return Err(ConfigError::invalid(
                "TABLE_MAX_PLAYERS",
                format!("Must be between 2 and {MAX_PLAYERS} (max players with 52-card deck)"),
            ));
        }

        if defaults.min_buy_in_bb == 0 {
            return Err(ConfigError::invalid("TABLE_MIN_BUY_IN_BB", "Must be greater than 0"));
        }

        if defaults.max_buy_in_bb < defaults.min_buy_in_bb {
            return Err(ConfigError::invalid(
                "TABLE_MAX_BUY_IN_BB",
                format!(
                    "Must be at least the min buy-in ({})",
                    defaults.min_buy_in_bb
                ),
            ));
        }

        if defaults.rake_bps > BASIS_POINTS {
            return Err(ConfigError::invalid(
                "TABLE_RAKE_BPS",
                format!("Must be at most {BASIS_POINTS}"),
            ));
        }

        if self.autoplay.players > defaults.max_players {
            return Err(ConfigError::invalid(
                "HOST_AUTOPLAYERS",
                format!("Cannot exceed max players ({})", defaults.max_players),
            ));
        }

        // Blinds, timeouts and seat counts are checked by the table itself.
        self.table_config(1).validate()?;
        Ok(())
    }

    /// Table config for the `index`th hosted table (1-based).
    #[must_use]
    pub fn table_config(&self, index: usize) -> TableConfig {
        let defaults = &self.table_defaults;
        TableConfig {
            table_id: index as TableId,
            name: format!("Table {index}"),
            min_players: defaults.min_players,
            max_players: defaults.max_players,
            small_blind: defaults.small_blind,
            big_blind: defaults.big_blind,
            buy_in_min: defaults.min_buy_in_bb.saturating_mul(defaults.big_blind),
            buy_in_max: defaults.max_buy_in_bb.saturating_mul(defaults.big_blind),
            action_timeout_ms: defaults.action_timeout_ms,
            showdown_delay_ms: defaults.showdown_delay_ms,
            randomize_seats: defaults.randomize_seats,
            rake: RakeConfig {
                rate_bps: defaults.rake_bps,
                cap: (defaults.rake_cap > 0).then_some(defaults.rake_cap),
                no_flop_no_drop: true,
            },
            ..TableConfig::default()
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error(transparent)]
    Table(#[from] poker_table::TableError),
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_env_opt(key)?.unwrap_or(default))
}

fn parse_env_opt<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("can't parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}
