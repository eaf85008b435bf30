//! Seat roster, dealer button and blind positions.
//!
//! Occupancy and connectivity are tracked separately: a disconnected seat
//! keeps its stack and index, and the same identity joining again is a
//! reconnect rather than a second seat.

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::entities::{Card, Chips, SeatIndex, UserId, Username};
use super::errors::{TableError, TableResult};
use crate::security::SeatRandomizer;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    #[default]
    Empty,
    SittingOut,
    Active,
    Folded,
    AllIn,
    Disconnected,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Occupant {
    pub user_id: UserId,
    pub username: Username,
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub index: SeatIndex,
    pub occupant: Option<Occupant>,
    pub stack: Chips,
    /// Chips put in on the current street.
    pub street_bet: Chips,
    /// Chips put in over the whole hand.
    pub contribution: Chips,
    pub status: SeatStatus,
    pub hole_cards: Vec<Card>,
    /// Dealt into the current hand.
    pub dealt_in: bool,
    pub connected: bool,
    /// Bumped on every reconnect so stale transport links can be told apart.
    pub connection: u64,
    /// Consecutive actions forced by timeouts.
    pub missed_actions: u32,
    /// Left during a hand; freed once the hand is over.
    pub leave_pending: bool,
    pub disconnected_since: Option<Instant>,
}

impl Seat {
    fn new(index: SeatIndex) -> Self {
        Self {
            index,
            occupant: None,
            stack: 0,
            street_bet: 0,
            contribution: 0,
            status: SeatStatus::Empty,
            hole_cards: Vec::new(),
            dealt_in: false,
            connected: false,
            connection: 0,
            missed_actions: 0,
            leave_pending: false,
            disconnected_since: None,
        }
    }

    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.occupant.as_ref().map(|o| o.user_id)
    }

    /// Still contesting the current hand.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.dealt_in && matches!(self.status, SeatStatus::Active | SeatStatus::AllIn)
    }

    /// Still able to make betting decisions this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.dealt_in && self.status == SeatStatus::Active && self.stack > 0
    }

    /// Ready to be dealt into the next hand.
    #[must_use]
    pub fn can_be_dealt(&self) -> bool {
        self.is_occupied() && self.status == SeatStatus::Active && self.stack > 0 && !self.leave_pending
    }

    /// Move up to `chips` from the stack into the pot. Returns what was
    /// actually moved; an emptied stack puts the seat all-in.
    pub fn commit(&mut self, chips: Chips) -> Chips {
        let moved = chips.min(self.stack);
        self.stack -= moved;
        self.street_bet += moved;
        self.contribution += moved;
        if self.stack == 0 && self.dealt_in && self.status == SeatStatus::Active {
            self.status = SeatStatus::AllIn;
        }
        moved
    }

    /// Clear per-hand state. Status is left to the caller.
    pub fn reset_hand(&mut self) {
        self.street_bet = 0;
        self.contribution = 0;
        self.hole_cards.clear();
        self.dealt_in = false;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinOutcome {
    Seated(SeatIndex),
    Reconnected(SeatIndex),
}

impl JoinOutcome {
    #[must_use]
    pub fn seat(self) -> SeatIndex {
        match self {
            Self::Seated(seat) | Self::Reconnected(seat) => seat,
        }
    }
}

/// A freed seat and the chips its occupant takes with them.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatRelease {
    pub seat: SeatIndex,
    pub user_id: UserId,
    pub username: Username,
    pub stack: Chips,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LeaveOutcome {
    Released(SeatRelease),
    /// Seat is in the current hand and is freed when the hand completes.
    Deferred(SeatIndex),
}

#[derive(Debug)]
pub struct SeatManager {
    seats: Vec<Seat>,
    button: Option<SeatIndex>,
    randomizer: Option<SeatRandomizer>,
}

impl SeatManager {
    #[must_use]
    pub fn new(max_players: usize, randomize_seats: bool) -> Self {
        Self {
            seats: (0..max_players).map(Seat::new).collect(),
            button: None,
            randomizer: randomize_seats.then(SeatRandomizer::new),
        }
    }

    #[must_use]
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seats_mut(&mut self) -> &mut [Seat] {
        &mut self.seats
    }

    #[must_use]
    pub fn seat(&self, idx: SeatIndex) -> Option<&Seat> {
        self.seats.get(idx)
    }

    pub fn seat_mut(&mut self, idx: SeatIndex) -> Option<&mut Seat> {
        self.seats.get_mut(idx)
    }

    #[must_use]
    pub fn button(&self) -> Option<SeatIndex> {
        self.button
    }

    #[must_use]
    pub fn find(&self, user_id: UserId) -> Option<SeatIndex> {
        self.seats
            .iter()
            .position(|seat| seat.user_id() == Some(user_id))
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|seat| seat.is_occupied()).count()
    }

    /// Seat a player, or reconnect them if they already hold a seat.
    ///
    /// Reconnects skip the capacity and buy-in checks. A reconnecting
    /// player who was sitting out with chips is dealt in again from the
    /// next hand.
    pub fn join(
        &mut self,
        user_id: UserId,
        username: Username,
        buy_in: Chips,
        buy_in_bounds: (Chips, Chips),
    ) -> TableResult<JoinOutcome> {
        if let Some(idx) = self.find(user_id) {
            let seat = &mut self.seats[idx];
            seat.connected = true;
            seat.connection += 1;
            seat.disconnected_since = None;
            seat.missed_actions = 0;
            seat.leave_pending = false;
            if !seat.dealt_in && matches!(seat.status, SeatStatus::SittingOut | SeatStatus::Disconnected) {
                seat.status = if seat.stack > 0 {
                    SeatStatus::Active
                } else {
                    SeatStatus::SittingOut
                };
            }
            debug!("{user_id} reconnected to seat {idx} (connection {})", seat.connection);
            return Ok(JoinOutcome::Reconnected(idx));
        }

        let occupied: Vec<SeatIndex> = self
            .seats
            .iter()
            .filter(|seat| seat.is_occupied())
            .map(|seat| seat.index)
            .collect();
        let max_seats = self.seats.len();
        let idx = match self.randomizer.as_mut() {
            Some(randomizer) => randomizer.find_random_seat(&occupied, max_seats),
            None => (0..max_seats).find(|idx| !occupied.contains(idx)),
        }
        .ok_or(TableError::TableFull)?;

        let (min, max) = buy_in_bounds;
        if !(min..=max).contains(&buy_in) {
            return Err(TableError::InvalidBuyIn {
                amount: buy_in,
                min,
                max,
            });
        }

        let seat = &mut self.seats[idx];
        *seat = Seat::new(idx);
        seat.occupant = Some(Occupant { user_id, username });
        seat.stack = buy_in;
        seat.status = SeatStatus::Active;
        seat.connected = true;
        seat.connection = 1;
        Ok(JoinOutcome::Seated(idx))
    }

    /// Free the player's seat, or defer it when they're in the current hand.
    pub fn leave(&mut self, user_id: UserId) -> TableResult<LeaveOutcome> {
        let idx = self.find(user_id).ok_or(TableError::SeatNotFound)?;
        if self.seats[idx].dealt_in {
            self.seats[idx].leave_pending = true;
            return Ok(LeaveOutcome::Deferred(idx));
        }
        self.release(idx)
            .map(LeaveOutcome::Released)
            .ok_or(TableError::SeatNotFound)
    }

    /// Empty a seat. If it held the button, the button moves back to the
    /// previous occupied seat.
    pub fn release(&mut self, idx: SeatIndex) -> Option<SeatRelease> {
        let seat = self.seats.get_mut(idx)?;
        let occupant = seat.occupant.take()?;
        let release = SeatRelease {
            seat: idx,
            user_id: occupant.user_id,
            username: occupant.username,
            stack: seat.stack,
        };
        *seat = Seat::new(idx);

        if self.button == Some(idx) {
            self.button = self.prev_seat(idx, Seat::is_occupied);
        }
        Some(release)
    }

    /// Transport lost the player. Seats outside the current hand are marked
    /// disconnected right away; seats in it play on until the hand ends.
    pub fn disconnect(&mut self, user_id: UserId, now: Instant) -> TableResult<SeatIndex> {
        let idx = self.find(user_id).ok_or(TableError::SeatNotFound)?;
        let seat = &mut self.seats[idx];
        seat.connected = false;
        seat.disconnected_since.get_or_insert(now);
        if !seat.dealt_in {
            seat.status = SeatStatus::Disconnected;
        }
        Ok(idx)
    }

    /// Add chips between hands. The resulting stack may not exceed `max`.
    pub fn top_up(&mut self, user_id: UserId, amount: Chips, max: Chips) -> TableResult<Chips> {
        let idx = self.find(user_id).ok_or(TableError::SeatNotFound)?;
        let seat = &mut self.seats[idx];
        let headroom = max.saturating_sub(seat.stack);
        if amount == 0 || amount > headroom {
            return Err(TableError::InvalidBuyIn {
                amount,
                min: 1,
                max: headroom,
            });
        }
        seat.stack += amount;
        if seat.status == SeatStatus::SittingOut && seat.connected {
            seat.status = SeatStatus::Active;
        }
        Ok(seat.stack)
    }

    /// First seat strictly after `from`, walking clockwise, that satisfies
    /// `pred`. May come back around to `from` itself.
    pub fn next_seat(&self, from: SeatIndex, pred: impl Fn(&Seat) -> bool) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n)
            .map(|offset| (from + offset) % n)
            .find(|&idx| pred(&self.seats[idx]))
    }

    fn prev_seat(&self, from: SeatIndex, pred: impl Fn(&Seat) -> bool) -> Option<SeatIndex> {
        let n = self.seats.len();
        (1..=n)
            .map(|offset| (from + n - offset) % n)
            .find(|&idx| pred(&self.seats[idx]))
    }

    /// Advance the button to the next occupied seat. A no-op with fewer
    /// than two occupied seats.
    pub fn rotate_dealer_button(&mut self) -> Option<SeatIndex> {
        self.rotate_button_among(Seat::is_occupied)
    }

    /// Advance the button to the next seat satisfying `eligible`. A no-op
    /// with fewer than two such seats.
    pub fn rotate_button_among(&mut self, eligible: impl Fn(&Seat) -> bool) -> Option<SeatIndex> {
        let count = self.seats.iter().filter(|seat| eligible(seat)).count();
        if count < 2 {
            return self.button;
        }
        let from = self.button.unwrap_or(self.seats.len() - 1);
        self.button = self.next_seat(from, eligible);
        self.button
    }

    /// Small and big blind seats among the seats dealt in. Heads-up the
    /// button posts the small blind.
    #[must_use]
    pub fn blind_seats(&self) -> Option<(SeatIndex, SeatIndex)> {
        let button = self.button?;
        let dealt = |seat: &Seat| seat.dealt_in;
        let players = self.seats.iter().filter(|seat| seat.dealt_in).count();
        if players < 2 {
            return None;
        }
        let small = if players == 2 {
            button
        } else {
            self.next_seat(button, dealt)?
        };
        let big = self.next_seat(small, dealt)?;
        Some((small, big))
    }
}
