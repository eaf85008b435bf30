//! Security module providing risk signals and seat randomization.
//!
//! The table never decides whether a player is cheating. It reports what it
//! observed and leaves scoring to an external pipeline:
//! - **Action timing**: how long each decision took, fast ones flagged higher
//! - **Forced actions**: check/fold applied by the table after a timeout
//! - **Seat co-occurrence**: which identities were dealt into the same hand
//! - **Extreme bet sizing**: bets far out of proportion to the pot
//! - **Fold to aggression**: folds facing a bet, naming the aggressor
//!
//! ## Seat Randomization
//!
//! Tables can seat new players at a random empty seat so nobody can pick the
//! seat next to a partner.
//!
//! ## Example
//!
//! ```
//! use poker_table::security::{RiskSignal, SignalKind};
//! use poker_table::game::entities::ActionKind;
//! use std::time::Duration;
//!
//! let signal = RiskSignal::action_timing(1, None, 42, ActionKind::Raise, Duration::from_millis(40));
//! assert_eq!(signal.kind, SignalKind::ActionTiming);
//! ```

pub mod risk_signals;
pub mod seat_randomizer;

pub use risk_signals::{
    FAST_ACTION_THRESHOLD, LogRiskScorer, RiskScorer, RiskSignal, RiskSignalEmitter, Severity,
    SignalKind,
};
pub use seat_randomizer::SeatRandomizer;
