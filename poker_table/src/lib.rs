//! # Poker Table
//!
//! A real-time Texas Hold'em table engine. Each table is a single
//! serialized actor that seats players, runs hands from blinds to showdown,
//! enforces betting rules and side pots, and publishes immutable snapshots
//! after every change.
//!
//! ## Architecture
//!
//! A table moves through a small set of phases:
//!
//! - **Waiting**: fewer than `min_players` seats can be dealt in
//! - **Preflop**: blinds posted, two hole cards dealt, first betting round
//! - **Flop/Turn/River**: community cards revealed, one betting round each
//! - **Showdown**: pots awarded, result visible for `showdown_delay`
//!
//! Once a hand is over the table goes back to `Waiting` and deals the next
//! hand as soon as enough players are ready.
//!
//! ## Core Modules
//!
//! - [`game`]: Hand lifecycle engine, betting rules, pots, deck and evaluator
//! - [`table`]: Async actor, public table handle, snapshots and collaborators
//! - [`security`]: Risk signals and seat randomization
//!
//! ## Example
//!
//! ```
//! use poker_table::game::functional::{eval, argmax};
//! use poker_table::game::entities::{Card, Suit};
//!
//! let royal = eval(&[
//!     Card(14, Suit::Heart),
//!     Card(13, Suit::Heart),
//!     Card(12, Suit::Heart),
//!     Card(11, Suit::Heart),
//!     Card(10, Suit::Heart),
//! ])
//! .unwrap();
//! let boat = eval(&[
//!     Card(9, Suit::Club),
//!     Card(9, Suit::Spade),
//!     Card(9, Suit::Heart),
//!     Card(4, Suit::Club),
//!     Card(4, Suit::Diamond),
//! ])
//! .unwrap();
//! assert_eq!(argmax(&[boat, royal]), vec![1]);
//! ```

/// Core game logic, entities, and the hand lifecycle engine.
pub mod game;
pub use game::{
    TableEngine, TableError, TableResult,
    constants::{self, MAX_PLAYERS},
    entities::{self, ActionKind, ActionRequest, Chips, Phase, UserId, Username},
    functional,
};

/// Risk signals and seat randomization.
pub mod security;

/// Table actor, handle, snapshots and multi-table registry.
pub mod table;
pub use table::{Table, TableConfig, TableManager, TableServices, TableSnapshot};
