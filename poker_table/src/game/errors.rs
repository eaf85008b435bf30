//! Error types for table operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::Chips;

/// Errors that can occur during table operations.
///
/// Capacity and validation errors leave the table untouched. Only
/// `InvariantViolation` is fatal, and only to the table that raised it.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum TableError {
    #[error("table is full")]
    TableFull,
    #[error("buy-in ${amount} outside ${min}..=${max}")]
    InvalidBuyIn { amount: Chips, min: Chips, max: Chips },
    #[error("seat not found")]
    SeatNotFound,
    #[error("not your turn")]
    NotYourTurn,
    #[error("no action expected right now")]
    NoActionExpected,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("hand in progress")]
    HandInProgress,
    #[error("request queue closed")]
    QueueClosed,
    #[error("request queue full")]
    QueueFull,
    #[error("invalid table config: {0}")]
    InvalidConfig(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl TableError {
    pub(crate) fn invalid_action(reason: impl Into<String>) -> Self {
        Self::InvalidAction(reason.into())
    }

    /// Whether the error stops the table actor.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

pub type TableResult<T> = Result<T, TableError>;
