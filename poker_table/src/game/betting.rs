//! Betting-round bookkeeping and action validation.
//!
//! Amounts for bets and raises are raise-to totals for the street. A
//! request that would need at least the seat's whole stack becomes an
//! all-in instead of failing.

use std::collections::BTreeSet;

use super::entities::{ActionKind, AppliedAction, Chips, SeatIndex};
use super::errors::{TableError, TableResult};

/// What the validator needs to know about the acting seat.
#[derive(Clone, Copy, Debug)]
pub struct SeatStake {
    pub seat: SeatIndex,
    /// Chips already put in on this street.
    pub street_bet: Chips,
    pub stack: Chips,
}

impl SeatStake {
    fn all_in_total(&self) -> Chips {
        self.street_bet + self.stack
    }
}

/// State of one street's betting.
#[derive(Clone, Debug)]
pub struct BettingRound {
    /// Largest street total any seat has put in.
    pub current_bet: Chips,
    /// Smallest legal raise increment.
    pub min_raise: Chips,
    pub big_blind: Chips,
    /// Seat that made the last bet or raise.
    pub last_aggressor: Option<SeatIndex>,
    /// Seats that acted since the bet last went up.
    acted: BTreeSet<SeatIndex>,
    /// Seats that acted since the last full bet or raise. These may call or
    /// fold a short all-in raise but not re-raise it.
    closed: BTreeSet<SeatIndex>,
}

impl BettingRound {
    /// A fresh street. `current_bet` is non-zero preflop, where the blinds
    /// already opened the betting.
    #[must_use]
    pub fn new(big_blind: Chips, current_bet: Chips) -> Self {
        Self {
            current_bet,
            min_raise: big_blind,
            big_blind,
            last_aggressor: None,
            acted: BTreeSet::new(),
            closed: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn to_call(&self, street_bet: Chips) -> Chips {
        self.current_bet.saturating_sub(street_bet)
    }

    #[must_use]
    pub fn has_acted(&self, seat: SeatIndex) -> bool {
        self.acted.contains(&seat)
    }

    /// Whether `seat` may put in a raise.
    #[must_use]
    pub fn can_raise(&self, seat: SeatIndex) -> bool {
        self.current_bet == 0 || !self.closed.contains(&seat)
    }

    /// Smallest legal raise-to total.
    #[must_use]
    pub fn min_raise_to(&self) -> Chips {
        if self.current_bet == 0 {
            self.big_blind
        } else {
            self.current_bet + self.min_raise
        }
    }

    /// Check a request against the round and resolve it into chip amounts.
    pub fn resolve(&self, stake: SeatStake, kind: ActionKind, amount: Chips) -> TableResult<AppliedAction> {
        let to_call = self.to_call(stake.street_bet);
        match kind {
            ActionKind::Fold => Ok(AppliedAction::Fold),
            ActionKind::Check => {
                if to_call == 0 {
                    Ok(AppliedAction::Check)
                } else {
                    Err(TableError::invalid_action(format!("can't check facing ${to_call}")))
                }
            }
            ActionKind::Call => {
                if to_call == 0 {
                    Err(TableError::invalid_action("nothing to call"))
                } else if to_call >= stake.stack {
                    self.resolve_all_in(stake)
                } else {
                    Ok(AppliedAction::Call { added: to_call })
                }
            }
            ActionKind::Bet => {
                if self.current_bet > 0 {
                    return Err(TableError::invalid_action("betting is already open, raise instead"));
                }
                if amount >= stake.all_in_total() {
                    return self.resolve_all_in(stake);
                }
                if amount < self.big_blind {
                    return Err(TableError::invalid_action(format!("minimum bet is ${}", self.big_blind)));
                }
                Ok(AppliedAction::Bet {
                    to: amount,
                    added: amount - stake.street_bet,
                })
            }
            ActionKind::Raise => {
                if self.current_bet == 0 {
                    return Err(TableError::invalid_action("no bet to raise"));
                }
                if !self.can_raise(stake.seat) {
                    return Err(TableError::invalid_action("betting wasn't reopened"));
                }
                if amount >= stake.all_in_total() {
                    return self.resolve_all_in(stake);
                }
                let min_to = self.min_raise_to();
                if amount < min_to {
                    return Err(TableError::invalid_action(format!("minimum raise is to ${min_to}")));
                }
                Ok(AppliedAction::Raise {
                    to: amount,
                    added: amount - stake.street_bet,
                })
            }
            ActionKind::AllIn => self.resolve_all_in(stake),
        }
    }

    fn resolve_all_in(&self, stake: SeatStake) -> TableResult<AppliedAction> {
        if stake.stack == 0 {
            return Err(TableError::invalid_action("no chips left"));
        }
        let to = stake.all_in_total();
        if to > self.current_bet && !self.can_raise(stake.seat) {
            return Err(TableError::invalid_action("betting wasn't reopened"));
        }
        Ok(AppliedAction::AllIn {
            to,
            added: stake.stack,
        })
    }

    /// Record an applied action. `street_total` is the seat's street bet
    /// after the action.
    pub fn record(&mut self, seat: SeatIndex, street_total: Chips) {
        if street_total > self.current_bet {
            let increment = street_total - self.current_bet;
            if increment >= self.min_raise {
                self.min_raise = increment;
                self.closed.clear();
            }
            self.current_bet = street_total;
            self.last_aggressor = Some(seat);
            self.acted.clear();
        }
        self.acted.insert(seat);
        self.closed.insert(seat);
    }

    /// Whether betting on this street is finished, given every seat that
    /// can still act with its street bet.
    #[must_use]
    pub fn is_complete(&self, can_act: &[(SeatIndex, Chips)]) -> bool {
        match can_act {
            [] => true,
            // A lone seat with nothing to call has nobody left to bet against.
            [(_, bet)] => *bet >= self.current_bet,
            _ => can_act
                .iter()
                .all(|(seat, bet)| self.has_acted(*seat) && *bet == self.current_bet),
        }
    }
}
