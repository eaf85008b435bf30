//! House autoplayers that keep hosted tables busy.
//!
//! An autoplayer is an ordinary client of the table: it joins with a buy-in,
//! watches snapshots and submits actions when it's its turn. It has no view
//! of anyone else's cards.

use log::{debug, info, warn};
use poker_table::{
    ActionRequest, Chips, Table, TableError, TableSnapshot, UserId,
    table::SeatSnapshot,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// Autoplayer user ids start here so they never collide with real players.
pub const HOUSE_USER_ID_BASE: UserId = 1_000_000;

/// How loose and aggressive an autoplayer is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temperament {
    /// Calls a lot, rarely raises
    Passive,
    Standard,
    /// Raises often, folds little
    Aggressive,
}

/// Decision thresholds of one temperament
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperamentParams {
    /// Chance of folding when facing a bet
    pub fold_rate: f64,
    /// Chance of betting or raising when allowed
    pub raise_rate: f64,
    /// Chance of calling off the whole stack
    pub call_all_in_rate: f64,
}

impl Temperament {
    #[must_use]
    pub fn params(self) -> TemperamentParams {
        match self {
            Self::Passive => TemperamentParams {
                fold_rate: 0.15,
                raise_rate: 0.05,
                call_all_in_rate: 0.3,
            },
            Self::Standard => TemperamentParams {
                fold_rate: 0.3,
                raise_rate: 0.15,
                call_all_in_rate: 0.4,
            },
            Self::Aggressive => TemperamentParams {
                fold_rate: 0.2,
                raise_rate: 0.35,
                call_all_in_rate: 0.6,
            },
        }
    }
}

impl FromStr for Temperament {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passive" => Ok(Self::Passive),
            "standard" => Ok(Self::Standard),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!("unknown temperament {other:?}")),
        }
    }
}

impl fmt::Display for Temperament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passive => write!(f, "passive"),
            Self::Standard => write!(f, "standard"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Pick an action for `seat`. `roll` is uniform in `0.0..1.0`.
#[must_use]
pub fn choose_action(
    state: &TableSnapshot,
    seat: &SeatSnapshot,
    params: TemperamentParams,
    roll: f64,
) -> Option<ActionRequest> {
    let user_id = seat.user_id?;
    let to_call = state.current_bet.saturating_sub(seat.street_bet);
    let raise_to = state.min_raise_to;
    let can_raise = raise_to > state.current_bet && seat.street_bet + seat.stack > raise_to;

    let request = if to_call == 0 {
        if can_raise && roll < params.raise_rate {
            if state.current_bet == 0 {
                ActionRequest::bet(user_id, raise_to)
            } else {
                ActionRequest::raise(user_id, raise_to)
            }
        } else {
            ActionRequest::check(user_id)
        }
    } else if to_call >= seat.stack {
        if roll < params.call_all_in_rate {
            ActionRequest::all_in(user_id)
        } else {
            ActionRequest::fold(user_id)
        }
    } else if roll < params.fold_rate {
        ActionRequest::fold(user_id)
    } else if can_raise && roll >= 1.0 - params.raise_rate {
        ActionRequest::raise(user_id, raise_to)
    } else {
        ActionRequest::call(user_id)
    };
    Some(request)
}

/// One house player at one table
pub struct Autoplayer {
    table: Arc<Table>,
    user_id: UserId,
    name: String,
    buy_in: Chips,
    params: TemperamentParams,
    think_time: Duration,
    rng: StdRng,
}

impl Autoplayer {
    #[must_use]
    pub fn new(
        table: Arc<Table>,
        user_id: UserId,
        temperament: Temperament,
        think_time: Duration,
    ) -> Self {
        let state = table.get_state();
        Self {
            name: format!("house{}", user_id - HOUSE_USER_ID_BASE),
            buy_in: state.buy_in_min,
            table,
            user_id,
            params: temperament.params(),
            think_time,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Join the table and play until the table halts or the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let table_id = self.table.table_id();
        match self.table.player_joins(self.user_id, self.name.as_str(), self.buy_in).await {
            Ok(outcome) => info!("{} sat down at table {table_id}, seat {}", self.name, outcome.seat()),
            Err(e) => {
                warn!("{} couldn't join table {table_id}: {e}", self.name);
                return;
            }
        }

        let mut states = self.table.subscribe();
        let mut last_acted = 0;
        loop {
            let state = states.borrow_and_update().clone();
            if state.halted.is_some() {
                warn!("{} leaving halted table {table_id}", self.name);
                return;
            }

            if let Err(e) = self.act_if_needed(&state, &mut last_acted).await {
                warn!("{} at table {table_id}: {e}", self.name);
                if e == TableError::QueueClosed {
                    return;
                }
            }

            if states.changed().await.is_err() {
                return;
            }
        }
    }

    async fn act_if_needed(
        &mut self,
        state: &TableSnapshot,
        last_acted: &mut u64,
    ) -> Result<(), TableError> {
        let Some(seat) = state.seat_of(self.user_id) else {
            return Ok(());
        };

        // Busted between hands: buy back in.
        if seat.stack == 0 && !state.phase.is_betting() {
            self.table.top_up(self.user_id, self.buy_in).await?;
            debug!("{} rebought for ${}", self.name, self.buy_in);
            return Ok(());
        }

        if !state.phase.is_betting() || state.to_act != Some(seat.index) {
            return Ok(());
        }
        // Never act twice on the same snapshot.
        if state.version <= *last_acted {
            return Ok(());
        }

        let roll = self.rng.random::<f64>();
        let Some(request) = choose_action(state, seat, self.params, roll) else {
            return Ok(());
        };
        let jitter = self.rng.random_range(0..=self.think_time.as_millis() as u64);
        tokio::time::sleep(self.think_time / 2 + Duration::from_millis(jitter / 2)).await;
        self.table.submit_action(request).await?;
        *last_acted = state.version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poker_table::{ActionKind, Phase, TableConfig, TableEngine};
    use tokio::time::Instant;

    fn preflop() -> TableSnapshot {
        let mut engine = TableEngine::new(TableConfig::default()).unwrap();
        let now = Instant::now();
        engine.join(1, "a".into(), 1000, now).unwrap();
        engine.join(2, "b".into(), 1000, now).unwrap();
        let state = engine.snapshot();
        assert_eq!(state.phase, Phase::Preflop);
        state
    }

    fn acting_seat(state: &TableSnapshot) -> SeatSnapshot {
        state.seats[state.to_act.unwrap()].clone()
    }

    #[test]
    fn test_temperament_parses() {
        assert_eq!("Aggressive".parse::<Temperament>(), Ok(Temperament::Aggressive));
        assert!("reckless".parse::<Temperament>().is_err());
        assert_eq!(Temperament::Passive.to_string(), "passive");
    }

    #[test]
    fn test_facing_blind_folds_calls_or_raises() {
        let state = preflop();
        let seat = acting_seat(&state);
        let params = Temperament::Standard.params();

        let kind = |roll| choose_action(&state, &seat, params, roll).unwrap().kind;
        assert_eq!(kind(0.0), ActionKind::Fold);
        assert_eq!(kind(0.5), ActionKind::Call);
        assert_eq!(kind(0.99), ActionKind::Raise);

        let raise = choose_action(&state, &seat, params, 0.99).unwrap();
        assert_eq!(raise.amount, state.min_raise_to);
    }

    #[test]
    fn test_checks_when_nothing_to_call() {
        let mut state = preflop();
        let mut seat = acting_seat(&state);
        seat.street_bet = state.current_bet;

        let request = choose_action(&state, &seat, Temperament::Passive.params(), 0.9).unwrap();
        assert_eq!(request.kind, ActionKind::Check);

        state.current_bet = 0;
        seat.street_bet = 0;
        let request = choose_action(&state, &seat, Temperament::Aggressive.params(), 0.0).unwrap();
        assert_eq!(request.kind, ActionKind::Bet);
    }

    #[test]
    fn test_short_stack_shoves_or_folds() {
        let state = preflop();
        let mut seat = acting_seat(&state);
        seat.stack = 3;
        let params = Temperament::Standard.params();

        assert_eq!(choose_action(&state, &seat, params, 0.1).unwrap().kind, ActionKind::AllIn);
        assert_eq!(choose_action(&state, &seat, params, 0.9).unwrap().kind, ActionKind::Fold);
    }
}
