//! Immutable views of a table, published after every committed transition,
//! and the per-hand result records handed to persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use uuid::Uuid;

use super::config::TableId;
use crate::game::{
    entities::{ActionKind, Blinds, Card, Chips, HandValue, Phase, SeatIndex, UserId, Username},
    errors::TableError,
    pot::PotTier,
    seats::SeatStatus,
};

/// An action the table refused, reported after the fact.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActionRejection {
    pub user_id: UserId,
    pub kind: ActionKind,
    pub error: TableError,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SeatSnapshot {
    pub index: SeatIndex,
    pub user_id: Option<UserId>,
    pub username: Option<Username>,
    pub status: SeatStatus,
    pub stack: Chips,
    pub street_bet: Chips,
    pub contribution: Chips,
    pub dealt_in: bool,
    pub connected: bool,
    pub connection: u64,
    /// Empty unless this view may see them.
    pub hole_cards: Vec<Card>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub table_id: TableId,
    pub name: String,
    pub blinds: Blinds,
    pub buy_in_min: Chips,
    pub buy_in_max: Chips,
    pub min_players: usize,
    pub max_players: usize,
    /// Bumped on every publish.
    pub version: u64,
    pub phase: Phase,
    pub hand_number: u64,
    pub hand_id: Option<Uuid>,
    pub seats: Vec<SeatSnapshot>,
    pub button: Option<SeatIndex>,
    pub small_blind_seat: Option<SeatIndex>,
    pub big_blind_seat: Option<SeatIndex>,
    pub to_act: Option<SeatIndex>,
    pub action_deadline: Option<DateTime<Utc>>,
    pub pots: Vec<PotTier>,
    pub board: Vec<Card>,
    pub deck_remaining: usize,
    pub current_bet: Chips,
    pub min_raise_to: Chips,
    /// Most recent rejections, oldest first.
    pub recent_rejections: Vec<ActionRejection>,
    pub last_hand: Option<Arc<HandResult>>,
    /// Set when the table stopped on an internal error.
    pub halted: Option<String>,
}

impl TableSnapshot {
    #[must_use]
    pub fn seat_of(&self, user_id: UserId) -> Option<&SeatSnapshot> {
        self.seats.iter().find(|seat| seat.user_id == Some(user_id))
    }

    #[must_use]
    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().filter(|seat| seat.user_id.is_some()).count()
    }

    #[must_use]
    pub fn pot_total(&self) -> Chips {
        self.pots.iter().map(|pot| pot.amount).sum()
    }

    /// The snapshot as `user_id` may see it: everyone else's hole cards
    /// are hidden.
    #[must_use]
    pub fn view_for(&self, user_id: UserId) -> Self {
        let mut view = self.clone();
        for seat in &mut view.seats {
            if seat.user_id != Some(user_id) {
                seat.hole_cards.clear();
            }
        }
        view
    }

    /// The snapshot with every seat's hole cards hidden.
    #[must_use]
    pub fn public_view(&self) -> Self {
        let mut view = self.clone();
        for seat in &mut view.seats {
            seat.hole_cards.clear();
        }
        view
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Payout {
    pub seat: SeatIndex,
    pub user_id: UserId,
    pub amount: Chips,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PotAward {
    /// Amount paid out, after rake.
    pub amount: Chips,
    pub rake: Chips,
    pub eligible: BTreeSet<SeatIndex>,
    pub winners: Vec<Payout>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RevealedHand {
    pub seat: SeatIndex,
    pub user_id: UserId,
    pub cards: Vec<Card>,
    pub value: HandValue,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatContribution {
    pub seat: SeatIndex,
    pub user_id: UserId,
    pub amount: Chips,
}

/// Everything that happened to the chips in one hand.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandResult {
    pub table_id: TableId,
    pub hand_id: Uuid,
    pub hand_number: u64,
    pub board: Vec<Card>,
    pub pots: Vec<PotAward>,
    pub rake: Chips,
    /// Hands shown at showdown. Empty when the hand was won uncontested.
    pub revealed: Vec<RevealedHand>,
    pub contributions: Vec<SeatContribution>,
    pub commitment: String,
    /// Hex seed the deck was shuffled from, checkable against `commitment`.
    pub deck_seed: String,
    pub showdown: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HandResult {
    #[must_use]
    pub fn total_contributed(&self) -> Chips {
        self.contributions.iter().map(|c| c.amount).sum()
    }

    #[must_use]
    pub fn total_distributed(&self) -> Chips {
        self.pots.iter().map(|pot| pot.amount).sum()
    }

    /// Chips won by `user_id` across every pot.
    #[must_use]
    pub fn winnings_for(&self, user_id: UserId) -> Chips {
        self.pots
            .iter()
            .flat_map(|pot| &pot.winners)
            .filter(|payout| payout.user_id == user_id)
            .map(|payout| payout.amount)
            .sum()
    }
}
