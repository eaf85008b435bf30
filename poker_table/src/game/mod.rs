//! Poker game engine - hand lifecycle and poker logic.
//!
//! This module provides the single-table game implementation including:
//! - Seat roster, dealer button and blind positions
//! - Betting-round rules with all-in and short-raise handling
//! - Main and side pot layering, odd-chip distribution and rake
//! - Seeded, committed deck shuffles
//! - Hand evaluation
//! - `TableEngine`, which ties these together into a hand lifecycle

pub mod betting;
pub mod constants;
pub mod deck;
pub mod entities;
pub mod errors;
pub mod functional;
pub mod pot;
pub mod seats;
pub mod state_machine;

pub use errors::{TableError, TableResult};
pub use state_machine::{EngineEvent, TableEngine};
