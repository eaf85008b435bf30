//! Hand lifecycle for one table.
//!
//! [`TableEngine`] owns all of a table's game state and is only driven by the
//! table's actor, one call at a time. Every entry point takes the current
//! instant, so timeouts and delays can be driven from tests without a real
//! clock. Work that has to leave the engine (audit records, hand results,
//! released seats, risk signals) is queued as [`EngineEvent`]s and drained
//! by the caller after each call.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    betting::{BettingRound, SeatStake},
    constants::{DECK_SIZE, HOLE_CARDS, MAX_RECENT_REJECTIONS},
    deck::{Deck, DeckSeed, SeedSource, ShuffleAudit, ThreadRngSeedSource},
    entities::{
        ActionRequest, AppliedAction, Card, Chips, HandValue, Phase, SeatIndex, UserId, Username,
    },
    errors::{TableError, TableResult},
    functional::{argmax, eval_with_board},
    pot::{Contribution, RakePolicy, clockwise_after_button, layer_pots, split_pot},
    seats::{JoinOutcome, LeaveOutcome, Seat, SeatManager, SeatRelease, SeatStatus},
};
use crate::{
    security::risk_signals::RiskSignal,
    table::{
        config::TableConfig,
        snapshot::{
            ActionRejection, HandResult, Payout, PotAward, RevealedHand, SeatContribution,
            SeatSnapshot, TableSnapshot,
        },
    },
};

/// Draws allowed before a seed source that keeps repeating itself is
/// treated as broken.
const MAX_SEED_ATTEMPTS: usize = 4;

/// Work for the outside world produced by the engine, in the order it
/// happened.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Queued before any card of the hand is dealt.
    ShuffleCommitted(ShuffleAudit),
    HandCompleted(Arc<HandResult>),
    SeatReleased(SeatRelease),
    Risk(RiskSignal),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ActionSource {
    Player,
    Timeout,
    Leave,
}

#[derive(Debug)]
struct Turn {
    seat: SeatIndex,
    started: Instant,
    deadline: Instant,
    deadline_at: DateTime<Utc>,
}

impl Turn {
    fn start(seat: SeatIndex, now: Instant, timeout: Duration) -> Self {
        Self {
            seat,
            started: now,
            deadline: now + timeout,
            deadline_at: Utc::now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero()),
        }
    }
}

#[derive(Debug)]
struct Hand {
    id: Uuid,
    number: u64,
    seed: DeckSeed,
    commitment: String,
    deck: Deck,
    board: Vec<Card>,
    round: BettingRound,
    small_blind_seat: SeatIndex,
    big_blind_seat: SeatIndex,
    turn: Option<Turn>,
    saw_flop: bool,
    started_at: DateTime<Utc>,
}

pub struct TableEngine {
    config: TableConfig,
    seats: SeatManager,
    phase: Phase,
    /// Kept through showdown so the board stays visible.
    hand: Option<Hand>,
    hand_number: u64,
    rake_policy: RakePolicy,
    seed_source: Box<dyn SeedSource>,
    /// Digests of every seed this table has shuffled with.
    used_seeds: HashSet<[u8; 32]>,
    /// Chips bought in and topped up, minus chips released.
    chips_tracked: Chips,
    rake_collected: Chips,
    showdown_until: Option<Instant>,
    last_result: Option<Arc<HandResult>>,
    rejections: VecDeque<ActionRejection>,
    events: VecDeque<EngineEvent>,
    fault: Option<String>,
}

impl TableEngine {
    pub fn new(config: TableConfig) -> TableResult<Self> {
        let rake_policy = RakePolicy::for_config(&config.rake);
        Self::with_parts(config, rake_policy, Box::new(ThreadRngSeedSource))
    }

    pub fn with_parts(
        config: TableConfig,
        rake_policy: RakePolicy,
        seed_source: Box<dyn SeedSource>,
    ) -> TableResult<Self> {
        config.validate()?;
        Ok(Self {
            seats: SeatManager::new(config.max_players, config.randomize_seats),
            config,
            phase: Phase::Waiting,
            hand: None,
            hand_number: 0,
            rake_policy,
            seed_source,
            used_seeds: HashSet::new(),
            chips_tracked: 0,
            rake_collected: 0,
            showdown_until: None,
            last_result: None,
            rejections: VecDeque::with_capacity(MAX_RECENT_REJECTIONS),
            events: VecDeque::new(),
            fault: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn seats(&self) -> &SeatManager {
        &self.seats
    }

    #[must_use]
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        self.hand.as_ref().map_or(&[], |hand| hand.board.as_slice())
    }

    #[must_use]
    pub fn deck_remaining(&self) -> usize {
        self.hand.as_ref().map_or(DECK_SIZE, |hand| hand.deck.remaining())
    }

    /// Seat whose turn it is.
    #[must_use]
    pub fn to_act(&self) -> Option<SeatIndex> {
        self.hand
            .as_ref()
            .and_then(|hand| hand.turn.as_ref())
            .map(|turn| turn.seat)
    }

    #[must_use]
    pub fn hand_in_progress(&self) -> bool {
        self.phase.is_betting()
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&Arc<HandResult>> {
        self.last_result.as_ref()
    }

    #[must_use]
    pub fn rake_collected(&self) -> Chips {
        self.rake_collected
    }

    #[must_use]
    pub fn chips_tracked(&self) -> Chips {
        self.chips_tracked
    }

    pub fn drain_events(&mut self) -> VecDeque<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    // === Seating ===

    pub fn join(
        &mut self,
        user_id: UserId,
        username: Username,
        buy_in: Chips,
        now: Instant,
    ) -> TableResult<JoinOutcome> {
        let outcome = self
            .seats
            .join(user_id, username, buy_in, self.config.buy_in_bounds())?;
        match outcome {
            JoinOutcome::Seated(seat) => {
                self.chips_tracked += buy_in;
                info!(
                    "Table {}: user {user_id} seated at {seat} with ${buy_in}",
                    self.config.table_id
                );
            }
            JoinOutcome::Reconnected(seat) => {
                info!(
                    "Table {}: user {user_id} reconnected at seat {seat}",
                    self.config.table_id
                );
            }
        }
        self.try_start_hand(now);
        Ok(outcome)
    }

    pub fn leave(&mut self, user_id: UserId, now: Instant) -> TableResult<LeaveOutcome> {
        let outcome = self.seats.leave(user_id)?;
        match &outcome {
            LeaveOutcome::Released(release) => self.on_released(release.clone()),
            LeaveOutcome::Deferred(seat) => {
                info!(
                    "Table {}: user {user_id} leaving seat {seat} after this hand",
                    self.config.table_id
                );
                self.fold_leaving_seat(*seat, now);
            }
        }
        Ok(outcome)
    }

    pub fn disconnect(&mut self, user_id: UserId, now: Instant) -> TableResult<SeatIndex> {
        let seat = self.seats.disconnect(user_id, now)?;
        info!(
            "Table {}: user {user_id} at seat {seat} disconnected",
            self.config.table_id
        );
        Ok(seat)
    }

    pub fn top_up(&mut self, user_id: UserId, amount: Chips, now: Instant) -> TableResult<Chips> {
        if self.hand_in_progress() {
            return Err(TableError::HandInProgress);
        }
        let stack = self
            .seats
            .top_up(user_id, amount, self.config.buy_in_max)?;
        self.chips_tracked += amount;
        debug!(
            "Table {}: user {user_id} topped up ${amount} to ${stack}",
            self.config.table_id
        );
        self.try_start_hand(now);
        Ok(stack)
    }

    fn on_released(&mut self, release: SeatRelease) {
        self.chips_tracked -= release.stack;
        info!(
            "Table {}: seat {} released, user {} leaves with ${}",
            self.config.table_id, release.seat, release.user_id, release.stack
        );
        self.events.push_back(EngineEvent::SeatReleased(release));
    }

    /// A seat leaving mid-hand folds, unless it's already all-in and has
    /// nothing left to decide.
    fn fold_leaving_seat(&mut self, seat: SeatIndex, now: Instant) {
        let is_active = self
            .seats
            .seat(seat)
            .is_some_and(|s| s.status == SeatStatus::Active);
        if !is_active || !self.hand_in_progress() {
            return;
        }
        let on_turn = self.to_act() == Some(seat);
        if let Some(hand) = self.hand.as_ref()
            && let Some(s) = self.seats.seat(seat)
            && let Some(user_id) = s.user_id()
        {
            let to_call = hand.round.current_bet.saturating_sub(s.street_bet);
            self.events.push_back(EngineEvent::Risk(RiskSignal::left_mid_hand(
                self.config.table_id,
                Some(hand.id),
                user_id,
                on_turn,
                to_call,
            )));
        }
        if on_turn {
            self.apply_resolved(seat, AppliedAction::Fold, now, ActionSource::Leave);
            return;
        }
        if let Some(s) = self.seats.seat_mut(seat) {
            s.status = SeatStatus::Folded;
        }
        if self.live_count() <= 1 {
            self.finish_hand(now);
        }
    }

    // === Actions ===

    /// Validate and apply an action. Rejections are also recorded for the
    /// next snapshot.
    pub fn submit_action(&mut self, request: &ActionRequest, now: Instant) -> TableResult<AppliedAction> {
        match self.validate_action(request) {
            Ok((seat, applied)) => {
                if let Some(s) = self.seats.seat_mut(seat) {
                    s.missed_actions = 0;
                }
                self.apply_resolved(seat, applied, now, ActionSource::Player);
                Ok(applied)
            }
            Err(error) => {
                self.reject(request, error.clone());
                Err(error)
            }
        }
    }

    fn validate_action(&self, request: &ActionRequest) -> TableResult<(SeatIndex, AppliedAction)> {
        let seat_idx = self
            .seats
            .find(request.user_id)
            .ok_or(TableError::SeatNotFound)?;
        let hand = self
            .hand
            .as_ref()
            .filter(|_| self.phase.is_betting())
            .ok_or(TableError::NoActionExpected)?;
        let turn = hand.turn.as_ref().ok_or(TableError::NoActionExpected)?;
        if turn.seat != seat_idx {
            return Err(TableError::NotYourTurn);
        }
        let seat = self.seats.seat(seat_idx).ok_or(TableError::SeatNotFound)?;
        let stake = SeatStake {
            seat: seat_idx,
            street_bet: seat.street_bet,
            stack: seat.stack,
        };
        let applied = hand.round.resolve(stake, request.kind, request.amount)?;
        Ok((seat_idx, applied))
    }

    fn reject(&mut self, request: &ActionRequest, error: TableError) {
        warn!(
            "Table {}: rejected {} from user {}: {error}",
            self.config.table_id, request.kind, request.user_id
        );
        if self.rejections.len() == MAX_RECENT_REJECTIONS {
            self.rejections.pop_front();
        }
        self.rejections.push_back(ActionRejection {
            user_id: request.user_id,
            kind: request.kind,
            error,
            at: Utc::now(),
        });
    }

    fn apply_resolved(
        &mut self,
        seat_idx: SeatIndex,
        applied: AppliedAction,
        now: Instant,
        source: ActionSource,
    ) {
        let table_id = self.config.table_id;
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        let pot_before: Chips = self.seats.seats().iter().map(|s| s.contribution).sum();
        let bet_before = hand.round.current_bet;
        let last_aggressor = hand.round.last_aggressor;
        let elapsed = hand
            .turn
            .as_ref()
            .map_or(Duration::ZERO, |turn| now.saturating_duration_since(turn.started));

        let Some(seat) = self.seats.seat_mut(seat_idx) else {
            return;
        };
        let to_call = bet_before.saturating_sub(seat.street_bet);
        match applied {
            AppliedAction::Fold => seat.status = SeatStatus::Folded,
            AppliedAction::Check => {}
            _ => {
                seat.commit(applied.added());
            }
        }
        let street_total = seat.street_bet;
        let user_id = seat.user_id();
        hand.round.record(seat_idx, street_total);
        hand.turn = None;
        let hand_id = hand.id;
        debug!("Table {table_id}: seat {seat_idx} {applied}");

        if source == ActionSource::Player
            && let Some(user_id) = user_id
        {
            self.events.push_back(EngineEvent::Risk(RiskSignal::action_timing(
                table_id,
                Some(hand_id),
                user_id,
                applied.kind(),
                elapsed,
            )));

            let raised = street_total > bet_before;
            let ratio = Chips::from(self.config.extreme_bet_pot_ratio);
            if raised && pot_before > 0 && applied.added() > pot_before.saturating_mul(ratio) {
                self.events.push_back(EngineEvent::Risk(RiskSignal::extreme_bet_sizing(
                    table_id,
                    Some(hand_id),
                    user_id,
                    applied.added(),
                    pot_before,
                )));
            }

            if applied == AppliedAction::Fold
                && to_call > 0
                && let Some(aggressor) = last_aggressor.filter(|&a| a != seat_idx)
                && let Some(beneficiary) = self.seats.seat(aggressor).and_then(Seat::user_id)
            {
                self.events.push_back(EngineEvent::Risk(RiskSignal::fold_to_aggression(
                    table_id,
                    Some(hand_id),
                    user_id,
                    beneficiary,
                    to_call,
                )));
            }
        }

        self.advance(seat_idx, now);
    }

    /// Move play forward after `from` acted: next turn, next street, or the
    /// end of the hand. Streets nobody can bet on are dealt straight out.
    fn advance(&mut self, mut from: SeatIndex, now: Instant) {
        loop {
            if self.live_count() <= 1 {
                self.finish_hand(now);
                return;
            }
            let timeout = self.config.action_timeout();
            let Some(hand) = self.hand.as_mut() else {
                return;
            };
            let can_act: Vec<(SeatIndex, Chips)> = self
                .seats
                .seats()
                .iter()
                .filter(|s| s.can_act())
                .map(|s| (s.index, s.street_bet))
                .collect();

            if !hand.round.is_complete(&can_act) {
                let round = &hand.round;
                let next = self.seats.next_seat(from, |s| {
                    s.can_act() && (!round.has_acted(s.index) || s.street_bet < round.current_bet)
                });
                match next {
                    Some(seat) => {
                        hand.turn = Some(Turn::start(seat, now, timeout));
                        debug!("Table {}: seat {seat} to act", self.config.table_id);
                    }
                    None => self.fail("open betting round with nobody to act"),
                }
                return;
            }

            self.return_uncalled_bet();
            let Some((next_phase, count)) = self.phase.next_street() else {
                self.finish_hand(now);
                return;
            };
            if let Err(reason) = self.deal_street(next_phase, count) {
                self.fail(reason);
                return;
            }
            from = self.seats.button().unwrap_or(from);
        }
    }

    fn deal_street(&mut self, phase: Phase, count: usize) -> Result<(), String> {
        let hand = self.hand.as_mut().ok_or("no hand to deal to")?;
        for _ in 0..count {
            let card = hand.deck.deal_card().ok_or("deck ran out")?;
            hand.board.push(card);
        }
        hand.round = BettingRound::new(self.config.big_blind, 0);
        if phase == Phase::Flop {
            hand.saw_flop = true;
        }
        for seat in self.seats.seats_mut() {
            seat.street_bet = 0;
        }
        self.phase = phase;
        debug!(
            "Table {}: {phase} dealt, board {}",
            self.config.table_id,
            hand.board
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );
        Ok(())
    }

    /// Hand back the part of the biggest street bet nobody matched.
    fn return_uncalled_bet(&mut self) {
        let mut bets: Vec<(Chips, SeatIndex)> = self
            .seats
            .seats()
            .iter()
            .filter(|s| s.dealt_in)
            .map(|s| (s.street_bet, s.index))
            .collect();
        bets.sort_unstable_by(|a, b| b.cmp(a));
        let [(top, seat_idx), rest @ ..] = bets.as_slice() else {
            return;
        };
        let second = rest.first().map_or(0, |(bet, _)| *bet);
        if *top <= second {
            return;
        }
        let excess = top - second;
        if let Some(seat) = self.seats.seat_mut(*seat_idx) {
            seat.stack += excess;
            seat.street_bet -= excess;
            seat.contribution -= excess;
            if seat.status == SeatStatus::AllIn {
                seat.status = SeatStatus::Active;
            }
            debug!(
                "Table {}: returned uncalled ${excess} to seat {seat_idx}",
                self.config.table_id
            );
        }
    }

    fn live_count(&self) -> usize {
        self.seats.seats().iter().filter(|s| s.is_live()).count()
    }

    // === Hand boundaries ===

    fn try_start_hand(&mut self, now: Instant) {
        if self.phase != Phase::Waiting || self.fault.is_some() {
            return;
        }
        let ready = self
            .seats
            .seats()
            .iter()
            .filter(|s| s.can_be_dealt())
            .count();
        if ready < self.config.min_players {
            return;
        }
        if let Err(reason) = self.start_hand(now) {
            self.fail(reason);
        }
    }

    fn start_hand(&mut self, now: Instant) -> Result<(), String> {
        let table_id = self.config.table_id;
        let seed = self.fresh_seed()?;
        let button = self
            .seats
            .rotate_button_among(Seat::can_be_dealt)
            .ok_or("no seat for the button")?;
        for seat in self.seats.seats_mut() {
            let ready = seat.can_be_dealt();
            seat.reset_hand();
            seat.dealt_in = ready;
        }

        self.hand_number += 1;
        let hand_id = Uuid::new_v4();
        let commitment = seed.commitment(table_id, self.hand_number);
        self.events.push_back(EngineEvent::ShuffleCommitted(ShuffleAudit {
            table_id,
            hand_id,
            hand_number: self.hand_number,
            commitment: commitment.clone(),
            committed_at: Utc::now(),
        }));
        let mut deck = Deck::shuffled(&seed);

        let (small_seat, big_seat) = self.seats.blind_seats().ok_or("not enough players for blinds")?;
        let posted_small = self
            .seats
            .seat_mut(small_seat)
            .map_or(0, |s| s.commit(self.config.small_blind));
        let posted_big = self
            .seats
            .seat_mut(big_seat)
            .map_or(0, |s| s.commit(self.config.big_blind));

        let dealt: Vec<SeatIndex> = self
            .seats
            .seats()
            .iter()
            .filter(|s| s.dealt_in)
            .map(|s| s.index)
            .collect();
        let order = clockwise_after_button(dealt, button, self.config.max_players);
        for _ in 0..HOLE_CARDS {
            for &idx in &order {
                let card = deck.deal_card().ok_or("deck ran out")?;
                if let Some(seat) = self.seats.seat_mut(idx) {
                    seat.hole_cards.push(card);
                }
            }
        }

        self.hand = Some(Hand {
            id: hand_id,
            number: self.hand_number,
            seed,
            commitment,
            deck,
            board: Vec::with_capacity(5),
            round: BettingRound::new(self.config.big_blind, posted_small.max(posted_big)),
            small_blind_seat: small_seat,
            big_blind_seat: big_seat,
            turn: None,
            saw_flop: false,
            started_at: Utc::now(),
        });
        self.phase = Phase::Preflop;
        self.showdown_until = None;

        let users: Vec<UserId> = order
            .iter()
            .filter_map(|&idx| self.seats.seat(idx).and_then(Seat::user_id))
            .collect();
        for &user_id in &users {
            let others: Vec<UserId> = users.iter().copied().filter(|&u| u != user_id).collect();
            self.events.push_back(EngineEvent::Risk(RiskSignal::seat_co_occurrence(
                table_id,
                Some(hand_id),
                user_id,
                &others,
            )));
        }

        info!(
            "Table {table_id}: hand #{} started with {} players, button {button}, blinds {small_seat}/{big_seat}",
            self.hand_number,
            order.len()
        );
        self.advance(big_seat, now);
        Ok(())
    }

    fn fresh_seed(&mut self) -> Result<DeckSeed, String> {
        for _ in 0..MAX_SEED_ATTEMPTS {
            let seed = self.seed_source.next_seed();
            if self.used_seeds.insert(seed.digest()) {
                return Ok(seed);
            }
            warn!(
                "Table {}: seed source repeated a seed, drawing again",
                self.config.table_id
            );
        }
        Err("seed source keeps repeating seeds".to_string())
    }

    /// Award every pot, publish the hand result and settle seats.
    fn finish_hand(&mut self, now: Instant) {
        self.return_uncalled_bet();
        let table_id = self.config.table_id;
        let num_seats = self.config.max_players;
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        hand.turn = None;

        let seats = self.seats.seats();
        let contributions: Vec<Contribution> = seats
            .iter()
            .filter(|s| s.dealt_in)
            .map(|s| Contribution {
                seat: s.index,
                amount: s.contribution,
                live: s.is_live(),
                all_in: s.status == SeatStatus::AllIn,
            })
            .collect();
        let contributed: Vec<SeatContribution> = seats
            .iter()
            .filter(|s| s.dealt_in && s.contribution > 0)
            .filter_map(|s| {
                s.user_id().map(|user_id| SeatContribution {
                    seat: s.index,
                    user_id,
                    amount: s.contribution,
                })
            })
            .collect();
        let live: Vec<&Seat> = seats.iter().filter(|s| s.is_live()).collect();
        let showdown = live.len() >= 2;

        let evaluated: Result<Vec<(&Seat, HandValue)>, String> = if showdown {
            live.iter()
                .map(|&seat| {
                    eval_with_board(&seat.hole_cards, &hand.board)
                        .map(|value| (seat, value))
                        .map_err(|err| format!("can't evaluate seat {}: {err}", seat.index))
                })
                .collect()
        } else {
            Ok(vec![])
        };
        let evaluated = match evaluated {
            Ok(evaluated) => evaluated,
            Err(reason) => {
                self.fail(reason);
                return;
            }
        };
        let revealed: Vec<RevealedHand> = evaluated
            .iter()
            .filter_map(|(seat, value)| {
                seat.user_id().map(|user_id| RevealedHand {
                    seat: seat.index,
                    user_id,
                    cards: seat.hole_cards.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        let values: BTreeMap<SeatIndex, HandValue> = evaluated
            .into_iter()
            .map(|(seat, value)| (seat.index, value))
            .collect();

        let mut tiers = layer_pots(&contributions);
        let main_pot = tiers.first().map_or(0, |tier| tier.amount);
        let rake = self
            .rake_policy
            .collect(main_pot, &self.config.rake, hand.saw_flop);
        if let Some(main) = tiers.first_mut() {
            main.amount -= rake;
        }

        let button = self.seats.button().unwrap_or(0);
        let mut credits: Vec<(SeatIndex, Chips)> = Vec::new();
        let mut pots = Vec::with_capacity(tiers.len());
        for (i, tier) in tiers.into_iter().enumerate() {
            let contenders: Vec<SeatIndex> = tier.eligible.iter().copied().collect();
            let winners: Vec<SeatIndex> = if showdown {
                let hands: Vec<HandValue> = contenders
                    .iter()
                    .filter_map(|seat| values.get(seat).cloned())
                    .collect();
                argmax(&hands).into_iter().map(|idx| contenders[idx]).collect()
            } else {
                contenders
            };
            let ordered = clockwise_after_button(winners, button, num_seats);
            let payouts: Vec<Payout> = split_pot(tier.amount, &ordered)
                .into_iter()
                .filter_map(|(seat, amount)| {
                    let user_id = self.seats.seat(seat).and_then(Seat::user_id)?;
                    Some(Payout {
                        seat,
                        user_id,
                        amount,
                    })
                })
                .collect();
            credits.extend(payouts.iter().map(|p| (p.seat, p.amount)));
            pots.push(PotAward {
                amount: tier.amount,
                rake: if i == 0 { rake } else { 0 },
                eligible: tier.eligible,
                winners: payouts,
            });
        }

        let result = Arc::new(HandResult {
            table_id,
            hand_id: hand.id,
            hand_number: hand.number,
            board: hand.board.clone(),
            pots,
            rake,
            revealed,
            contributions: contributed,
            commitment: hand.commitment.clone(),
            deck_seed: hand.seed.reveal(),
            showdown,
            started_at: hand.started_at,
            finished_at: Utc::now(),
        });

        for seat in self.seats.seats_mut() {
            seat.contribution = 0;
            seat.street_bet = 0;
        }
        for (seat, amount) in credits {
            if let Some(s) = self.seats.seat_mut(seat) {
                s.stack += amount;
            }
        }
        self.rake_collected += rake;

        info!(
            "Table {table_id}: hand #{} finished, ${} paid out, ${rake} rake{}",
            result.hand_number,
            result.total_distributed(),
            if showdown { ", showdown" } else { "" }
        );

        self.phase = Phase::Showdown;
        self.showdown_until = Some(now + self.config.showdown_delay());
        self.last_result = Some(Arc::clone(&result));
        self.events.push_back(EngineEvent::HandCompleted(result));
        self.settle_seats();
    }

    /// End-of-hand seat bookkeeping: pending leaves are freed, dropped
    /// connections are marked, busted or idle seats sit out.
    fn settle_seats(&mut self) {
        let max_missed = self.config.max_missed_actions;
        let mut leaving = Vec::new();
        for seat in self.seats.seats_mut() {
            if !seat.is_occupied() {
                continue;
            }
            seat.reset_hand();
            if seat.leave_pending {
                leaving.push(seat.index);
                continue;
            }
            if matches!(seat.status, SeatStatus::Folded | SeatStatus::AllIn) {
                seat.status = SeatStatus::Active;
            }
            if !seat.connected {
                seat.status = SeatStatus::Disconnected;
            } else if seat.stack == 0 || (max_missed > 0 && seat.missed_actions >= max_missed) {
                seat.status = SeatStatus::SittingOut;
            }
        }
        for idx in leaving {
            if let Some(release) = self.seats.release(idx) {
                self.on_released(release);
            }
        }
    }

    /// Drop the hand in progress and give every seat its chips back.
    pub fn abandon_hand(&mut self) {
        if let Some(hand) = self.hand.take()
            && self.phase.is_betting()
        {
            info!(
                "Table {}: abandoning hand #{}, contributions refunded",
                self.config.table_id, hand.number
            );
        }
        for seat in self.seats.seats_mut() {
            seat.stack += seat.contribution;
            seat.contribution = 0;
        }
        self.settle_seats();
        self.phase = Phase::Waiting;
        self.showdown_until = None;
    }

    // === Timer ===

    /// Time-driven work: forfeits, turn timeouts and hand transitions.
    pub fn tick(&mut self, now: Instant) {
        if self.fault.is_some() {
            return;
        }
        self.forfeit_disconnected(now);
        if self.hand_in_progress() {
            self.expire_turn(now);
        }
        if self.phase == Phase::Showdown && self.showdown_until.is_none_or(|until| now >= until) {
            self.hand = None;
            self.phase = Phase::Waiting;
            self.showdown_until = None;
        }
        self.try_start_hand(now);
    }

    fn expire_turn(&mut self, now: Instant) {
        let Some(hand) = self.hand.as_ref() else {
            return;
        };
        let Some(turn) = hand.turn.as_ref().filter(|turn| now >= turn.deadline) else {
            return;
        };
        let seat_idx = turn.seat;
        let to_call = self
            .seats
            .seat(seat_idx)
            .map_or(0, |s| hand.round.to_call(s.street_bet));
        let applied = if to_call == 0 {
            AppliedAction::Check
        } else {
            AppliedAction::Fold
        };
        let hand_id = hand.id;

        let Some(seat) = self.seats.seat_mut(seat_idx) else {
            return;
        };
        seat.missed_actions += 1;
        let missed = seat.missed_actions;
        if let Some(user_id) = seat.user_id() {
            self.events.push_back(EngineEvent::Risk(RiskSignal::forced_action(
                self.config.table_id,
                Some(hand_id),
                user_id,
                applied.kind(),
                missed,
            )));
        }
        info!(
            "Table {}: seat {seat_idx} timed out and {applied}",
            self.config.table_id
        );
        self.apply_resolved(seat_idx, applied, now, ActionSource::Timeout);
    }

    fn forfeit_disconnected(&mut self, now: Instant) {
        let grace = self.config.disconnect_grace();
        let expired: Vec<SeatIndex> = self
            .seats
            .seats()
            .iter()
            .filter(|s| s.is_occupied() && !s.dealt_in && !s.connected)
            .filter(|s| {
                s.disconnected_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= grace)
            })
            .map(|s| s.index)
            .collect();
        for idx in expired {
            if let Some(release) = self.seats.release(idx) {
                info!(
                    "Table {}: seat {idx} forfeited after disconnect grace",
                    self.config.table_id
                );
                self.on_released(release);
            }
        }
    }

    // === Consistency ===

    fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Table {}: {reason}", self.config.table_id);
        self.fault.get_or_insert(reason);
    }

    /// Check chip conservation and seat consistency.
    pub fn check_invariants(&self) -> TableResult<()> {
        if let Some(fault) = &self.fault {
            return Err(TableError::InvariantViolation(fault.clone()));
        }

        let seats = self.seats.seats();
        let stacks: Chips = seats.iter().map(|s| s.stack).sum();
        let contributions: Chips = seats.iter().map(|s| s.contribution).sum();
        if stacks + contributions + self.rake_collected != self.chips_tracked {
            return Err(TableError::InvariantViolation(format!(
                "stacks ${stacks} + pot ${contributions} + rake ${} != tracked ${}",
                self.rake_collected, self.chips_tracked
            )));
        }

        if let Some(button) = self.seats.button()
            && !self.seats.seat(button).is_some_and(Seat::is_occupied)
        {
            return Err(TableError::InvariantViolation(format!(
                "button on empty seat {button}"
            )));
        }

        if let Some(seat) = self.to_act()
            && !self.seats.seat(seat).is_some_and(Seat::can_act)
        {
            return Err(TableError::InvariantViolation(format!(
                "seat {seat} to act but can't"
            )));
        }

        Ok(())
    }

    // === Views ===

    /// Full snapshot, hole cards included. `version` is left at zero for
    /// the publisher to fill in.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let seats = self
            .seats
            .seats()
            .iter()
            .map(|seat| SeatSnapshot {
                index: seat.index,
                user_id: seat.user_id(),
                username: seat.occupant.as_ref().map(|o| o.username.clone()),
                status: seat.status,
                stack: seat.stack,
                street_bet: seat.street_bet,
                contribution: seat.contribution,
                dealt_in: seat.dealt_in,
                connected: seat.connected,
                connection: seat.connection,
                hole_cards: seat.hole_cards.clone(),
            })
            .collect();

        let betting = self.hand.as_ref().filter(|_| self.phase.is_betting());
        let pots = if betting.is_some() {
            let contributions: Vec<Contribution> = self
                .seats
                .seats()
                .iter()
                .filter(|s| s.dealt_in)
                .map(|s| Contribution {
                    seat: s.index,
                    amount: s.contribution,
                    live: s.is_live(),
                    all_in: s.status == SeatStatus::AllIn,
                })
                .collect();
            layer_pots(&contributions)
        } else {
            vec![]
        };

        TableSnapshot {
            table_id: self.config.table_id,
            name: self.config.name.clone(),
            blinds: self.config.blinds(),
            buy_in_min: self.config.buy_in_min,
            buy_in_max: self.config.buy_in_max,
            min_players: self.config.min_players,
            max_players: self.config.max_players,
            version: 0,
            phase: self.phase,
            hand_number: self.hand_number,
            hand_id: self.hand.as_ref().map(|hand| hand.id),
            seats,
            button: self.seats.button(),
            small_blind_seat: betting.map(|hand| hand.small_blind_seat),
            big_blind_seat: betting.map(|hand| hand.big_blind_seat),
            to_act: self.to_act(),
            action_deadline: self
                .hand
                .as_ref()
                .and_then(|hand| hand.turn.as_ref())
                .map(|turn| turn.deadline_at),
            pots,
            board: self.board().to_vec(),
            deck_remaining: self.deck_remaining(),
            current_bet: betting.map_or(0, |hand| hand.round.current_bet),
            min_raise_to: betting.map_or(0, |hand| hand.round.min_raise_to()),
            recent_rejections: self.rejections.iter().cloned().collect(),
            last_hand: self.last_result.clone(),
            halted: self.fault.clone(),
        }
    }
}

impl std::fmt::Debug for TableEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEngine")
            .field("table_id", &self.config.table_id)
            .field("phase", &self.phase)
            .field("hand_number", &self.hand_number)
            .field("chips_tracked", &self.chips_tracked)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::deck::SEED_LEN;
    use crate::game::entities::ActionKind;
    use crate::game::pot::RakeConfig;

    fn config() -> TableConfig {
        TableConfig {
            table_id: 9,
            min_players: 2,
            max_players: 6,
            small_blind: 5,
            big_blind: 10,
            buy_in_min: 100,
            buy_in_max: 1000,
            action_timeout_ms: 30_000,
            showdown_delay_ms: 1_000,
            max_missed_actions: 2,
            disconnect_grace_ms: 60_000,
            ..TableConfig::default()
        }
    }

    fn counting_seeds() -> Box<dyn SeedSource> {
        let mut counter = 0u8;
        Box::new(move || {
            counter = counter.wrapping_add(1);
            DeckSeed::new([counter; SEED_LEN])
        })
    }

    fn engine_with(config: TableConfig) -> TableEngine {
        TableEngine::with_parts(config, RakePolicy::default(), counting_seeds()).expect("valid config")
    }

    fn seat_players(engine: &mut TableEngine, stacks: &[Chips], now: Instant) {
        for (user, &stack) in stacks.iter().enumerate() {
            let user_id = user as UserId + 1;
            engine
                .join(user_id, Username::new(&format!("p{user_id}")), stack, now)
                .expect("room at the table");
        }
    }

    fn act(engine: &mut TableEngine, user_id: UserId, kind: ActionKind, amount: Chips, now: Instant) {
        let request = ActionRequest::with_amount(user_id, kind, amount);
        engine
            .submit_action(&request, now)
            .unwrap_or_else(|e| panic!("user {user_id} {kind} rejected: {e}"));
    }

    fn user_to_act(engine: &TableEngine) -> UserId {
        let seat = engine.to_act().expect("someone to act");
        engine
            .seats()
            .seat(seat)
            .and_then(Seat::user_id)
            .expect("occupied")
    }

    fn stack_of(engine: &TableEngine, user_id: UserId) -> Chips {
        let seat = engine.seats().find(user_id).expect("seated");
        engine.seats().seat(seat).map_or(0, |s| s.stack)
    }

    fn risk_kinds(events: &VecDeque<EngineEvent>) -> Vec<crate::security::SignalKind> {
        events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Risk(signal) => Some(signal.kind),
                _ => None,
            })
            .collect()
    }

    // === Hand Start Tests ===

    #[test]
    fn test_waits_for_min_players() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000], now);
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_heads_up_blinds_sum_to_fifteen() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);

        assert_eq!(engine.phase(), Phase::Preflop);
        let snapshot = engine.snapshot();
        let posted: Chips = snapshot.seats.iter().map(|s| s.street_bet).sum();
        assert_eq!(posted, 15);
        assert_eq!(snapshot.button, Some(0));
        assert_eq!(snapshot.small_blind_seat, Some(0));
        assert_eq!(snapshot.big_blind_seat, Some(1));
        assert_eq!(snapshot.to_act, Some(0));
        assert_eq!(snapshot.deck_remaining, 48);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_shuffle_committed_before_anything_else() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        let events = engine.drain_events();
        let Some(EngineEvent::ShuffleCommitted(audit)) = events.front() else {
            panic!("expected shuffle audit first, got {events:?}");
        };
        assert_eq!(audit.hand_number, 1);
        assert_eq!(audit.table_id, 9);
        assert_eq!(
            risk_kinds(&events),
            vec![
                crate::security::SignalKind::SeatCoOccurrence,
                crate::security::SignalKind::SeatCoOccurrence
            ]
        );
    }

    // === Betting Flow Tests ===

    #[test]
    fn test_call_then_check_deals_flop() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);

        act(&mut engine, 1, ActionKind::Call, 0, now);
        assert_eq!(engine.to_act(), Some(1));
        act(&mut engine, 2, ActionKind::Check, 0, now);

        assert_eq!(engine.phase(), Phase::Flop);
        assert_eq!(engine.board().len(), 3);
        assert_eq!(engine.deck_remaining(), 45);
        // Big blind acts first after the flop heads-up.
        assert_eq!(engine.to_act(), Some(1));
        assert_eq!(engine.snapshot().pots[0].amount, 20);
    }

    #[test]
    fn test_out_of_turn_action_dropped_and_reported() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        let before = engine.snapshot();

        let result = engine.submit_action(&ActionRequest::check(2), now);
        assert_eq!(result, Err(TableError::NotYourTurn));

        let after = engine.snapshot();
        assert_eq!(after.seats, before.seats);
        assert_eq!(after.to_act, before.to_act);
        assert_eq!(after.recent_rejections.len(), 1);
        assert_eq!(after.recent_rejections[0].user_id, 2);
        assert_eq!(after.recent_rejections[0].error, TableError::NotYourTurn);
    }

    #[test]
    fn test_rejections_ring_keeps_most_recent() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        for _ in 0..(MAX_RECENT_REJECTIONS + 4) {
            let _ = engine.submit_action(&ActionRequest::check(1), now);
        }
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.recent_rejections.len(), MAX_RECENT_REJECTIONS);
        assert!(matches!(
            snapshot.recent_rejections[0].error,
            TableError::InvalidAction(_)
        ));
    }

    #[test]
    fn test_action_from_stranger_is_rejected() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        assert_eq!(
            engine.submit_action(&ActionRequest::fold(77), now),
            Err(TableError::SeatNotFound)
        );
    }

    #[test]
    fn test_fold_awards_blinds_and_refunds_uncalled() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);

        act(&mut engine, 1, ActionKind::Fold, 0, now);

        assert_eq!(engine.phase(), Phase::Showdown);
        assert_eq!(stack_of(&engine, 1), 995);
        assert_eq!(stack_of(&engine, 2), 1005);
        let result = engine.last_result().expect("hand result");
        assert!(!result.showdown);
        assert!(result.revealed.is_empty());
        assert_eq!(result.total_contributed(), 10);
        assert_eq!(result.total_distributed(), 10);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_next_hand_after_showdown_delay_moves_button() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        act(&mut engine, 1, ActionKind::Fold, 0, now);

        engine.tick(now + Duration::from_millis(500));
        assert_eq!(engine.phase(), Phase::Showdown);

        engine.tick(now + Duration::from_millis(1_000));
        assert_eq!(engine.phase(), Phase::Preflop);
        assert_eq!(engine.hand_number(), 2);
        assert_eq!(engine.seats().button(), Some(1));
    }

    #[test]
    fn test_all_in_preflop_runs_out_the_board() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[500, 500], now);

        act(&mut engine, 1, ActionKind::AllIn, 0, now);
        act(&mut engine, 2, ActionKind::Call, 0, now);

        assert_eq!(engine.phase(), Phase::Showdown);
        assert_eq!(engine.board().len(), 5);
        let result = engine.last_result().expect("hand result");
        assert!(result.showdown);
        assert_eq!(result.revealed.len(), 2);
        assert_eq!(result.total_distributed(), 1000);
        assert_eq!(stack_of(&engine, 1) + stack_of(&engine, 2), 1000);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_short_all_in_creates_one_side_pot() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        // Seats 0..3. Button 0, blinds 1 and 2, seat 3 opens.
        seat_players(&mut engine, &[1000, 1000, 1000, 100], now);
        assert_eq!(user_to_act(&engine), 4);

        act(&mut engine, 4, ActionKind::AllIn, 0, now);
        act(&mut engine, 1, ActionKind::Call, 0, now);
        act(&mut engine, 2, ActionKind::Fold, 0, now);
        act(&mut engine, 3, ActionKind::Raise, 300, now);
        act(&mut engine, 1, ActionKind::Call, 0, now);

        assert_eq!(engine.phase(), Phase::Flop);
        let pots = engine.snapshot().pots;
        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, 305);
        assert_eq!(pots[0].eligible, [0, 2, 3].into_iter().collect());
        assert_eq!(pots[1].amount, 400);
        assert_eq!(pots[1].eligible, [0, 2].into_iter().collect());

        while engine.phase().is_betting() {
            let user = user_to_act(&engine);
            act(&mut engine, user, ActionKind::Check, 0, now);
        }
        let result = engine.last_result().expect("hand result");
        assert_eq!(result.total_contributed(), 705);
        assert_eq!(result.total_distributed() + result.rake, 705);
        assert_eq!(result.pots.len(), 2);
        assert!(!result.pots[1].eligible.contains(&3));
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_rake_collected_after_flop() {
        let now = Instant::now();
        let rake = RakeConfig {
            rate_bps: 1_000,
            cap: Some(50),
            no_flop_no_drop: true,
        };
        let mut engine = TableEngine::with_parts(
            TableConfig { rake, ..config() },
            RakePolicy::for_config(&rake),
            counting_seeds(),
        )
        .expect("valid config");
        seat_players(&mut engine, &[1000, 1000], now);

        act(&mut engine, 1, ActionKind::Call, 0, now);
        act(&mut engine, 2, ActionKind::Check, 0, now);
        while engine.phase().is_betting() {
            let user = user_to_act(&engine);
            act(&mut engine, user, ActionKind::Check, 0, now);
        }
        let result = engine.last_result().expect("hand result");
        assert_eq!(result.rake, 2);
        assert_eq!(result.pots[0].rake, 2);
        assert_eq!(result.total_distributed(), 18);
        assert_eq!(engine.rake_collected(), 2);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_no_flop_no_drop() {
        let now = Instant::now();
        let rake = RakeConfig {
            rate_bps: 1_000,
            cap: None,
            no_flop_no_drop: true,
        };
        let mut engine = TableEngine::with_parts(
            TableConfig { rake, ..config() },
            RakePolicy::for_config(&rake),
            counting_seeds(),
        )
        .expect("valid config");
        seat_players(&mut engine, &[1000, 1000], now);
        act(&mut engine, 1, ActionKind::Fold, 0, now);
        assert_eq!(engine.last_result().map(|r| r.rake), Some(0));
    }

    // === Risk Signal Tests ===

    #[test]
    fn test_fold_to_raise_names_aggressor() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        engine.drain_events();

        act(&mut engine, 1, ActionKind::Raise, 30, now);
        act(&mut engine, 2, ActionKind::Fold, 0, now);

        let events = engine.drain_events();
        let fold_signal = events.iter().find_map(|event| match event {
            EngineEvent::Risk(signal)
                if signal.kind == crate::security::SignalKind::FoldToAggression =>
            {
                Some(signal.clone())
            }
            _ => None,
        });
        let signal = fold_signal.expect("fold to aggression reported");
        assert_eq!(signal.user_id, 2);
        assert_eq!(signal.details["beneficiary"], 1);
    }

    #[test]
    fn test_extreme_bet_reported() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        engine.drain_events();

        // 995 added into a pot of 15.
        act(&mut engine, 1, ActionKind::AllIn, 0, now);
        let kinds = risk_kinds(&engine.drain_events());
        assert!(kinds.contains(&crate::security::SignalKind::ExtremeBetSizing));
        assert!(kinds.contains(&crate::security::SignalKind::ActionTiming));
    }

    // === Timeout Tests ===

    #[test]
    fn test_timeout_folds_when_facing_bet() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        engine.drain_events();

        engine.tick(now + Duration::from_secs(29));
        assert_eq!(engine.phase(), Phase::Preflop);

        engine.tick(now + Duration::from_secs(30));
        assert_eq!(engine.phase(), Phase::Showdown);
        assert_eq!(stack_of(&engine, 1), 995);
        let kinds = risk_kinds(&engine.drain_events());
        assert_eq!(kinds, vec![crate::security::SignalKind::ForcedAction]);
    }

    #[test]
    fn test_timeout_checks_when_nothing_owed() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        act(&mut engine, 1, ActionKind::Call, 0, now);

        engine.tick(now + Duration::from_secs(31));
        assert_eq!(engine.phase(), Phase::Flop);
    }

    #[test]
    fn test_repeated_timeouts_sit_player_out() {
        let now = Instant::now();
        let mut engine = engine_with(TableConfig {
            max_missed_actions: 1,
            ..config()
        });
        seat_players(&mut engine, &[1000, 1000], now);

        let timeout = now + Duration::from_secs(30);
        engine.tick(timeout);
        assert_eq!(
            engine.seats().seat(0).map(|s| s.status),
            Some(SeatStatus::SittingOut)
        );

        engine.tick(timeout + Duration::from_secs(1));
        assert_eq!(engine.phase(), Phase::Waiting);

        // Reconnecting deals the player back in.
        engine
            .join(1, Username::new("p1"), 0, timeout + Duration::from_secs(2))
            .expect("reconnect");
        assert_eq!(engine.phase(), Phase::Preflop);
    }

    // === Seat Lifecycle Tests ===

    #[test]
    fn test_rejoin_mid_hand_does_not_duplicate() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        let outcome = engine
            .join(2, Username::new("p2"), 500, now)
            .expect("reconnect");
        assert_eq!(outcome, JoinOutcome::Reconnected(1));
        assert_eq!(engine.seats().occupied_count(), 2);
        assert_eq!(stack_of(&engine, 2), 990);
    }

    #[test]
    fn test_join_mid_hand_waits_for_next_hand() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        engine
            .join(3, Username::new("p3"), 500, now)
            .expect("room left");
        let seat = engine.seats().seat(2).expect("seat");
        assert_eq!(seat.status, SeatStatus::Active);
        assert!(!seat.dealt_in);
        assert!(seat.hole_cards.is_empty());
    }

    #[test]
    fn test_leave_mid_hand_folds_and_frees_after_hand() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000, 1000], now);
        engine.drain_events();

        // Seat 0 is the button and first to act three-handed.
        assert_eq!(engine.to_act(), Some(0));
        let outcome = engine.leave(2, now).expect("seated");
        assert_eq!(outcome, LeaveOutcome::Deferred(1));
        assert_eq!(
            engine.seats().seat(1).map(|s| s.status),
            Some(SeatStatus::Folded)
        );
        assert_eq!(engine.seats().occupied_count(), 3);

        act(&mut engine, 1, ActionKind::Fold, 0, now);
        assert_eq!(engine.phase(), Phase::Showdown);
        assert_eq!(engine.seats().occupied_count(), 2);
        let released = engine.drain_events().into_iter().find_map(|event| match event {
            EngineEvent::SeatReleased(release) => Some(release),
            _ => None,
        });
        assert_eq!(released.map(|r| (r.user_id, r.stack)), Some((2, 995)));
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_leaving_mid_hand_is_reported() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000, 1000], now);
        engine.drain_events();

        // Off turn: the small blind owes 5 more.
        engine.leave(2, now).expect("seated");
        // On turn: the button owes the full big blind.
        assert_eq!(engine.to_act(), Some(0));
        engine.leave(1, now).expect("seated");

        let left: Vec<RiskSignal> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Risk(signal)
                    if signal.kind == crate::security::SignalKind::LeftMidHand =>
                {
                    Some(signal)
                }
                _ => None,
            })
            .collect();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].user_id, 2);
        assert_eq!(left[0].details["on_turn"], false);
        assert_eq!(left[0].details["to_call"], 5);
        assert_eq!(left[1].user_id, 1);
        assert_eq!(left[1].details["on_turn"], true);
        assert_eq!(left[1].details["to_call"], 10);
        assert!(
            left.iter()
                .all(|s| s.severity == crate::security::risk_signals::Severity::Medium)
        );
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_leaving_between_hands_is_not_reported() {
        let now = Instant::now();
        let mut engine = engine_with(TableConfig {
            min_players: 3,
            ..config()
        });
        seat_players(&mut engine, &[1000, 1000], now);
        engine.drain_events();

        engine.leave(1, now).expect("seated");
        assert!(risk_kinds(&engine.drain_events()).is_empty());
    }

    #[test]
    fn test_disconnected_seat_forfeited_after_grace() {
        let now = Instant::now();
        let mut engine = engine_with(TableConfig {
            min_players: 3,
            ..config()
        });
        seat_players(&mut engine, &[1000, 1000], now);
        engine.disconnect(1, now).expect("seated");
        assert_eq!(
            engine.seats().seat(0).map(|s| s.status),
            Some(SeatStatus::Disconnected)
        );

        engine.tick(now + Duration::from_secs(59));
        assert_eq!(engine.seats().occupied_count(), 2);
        engine.tick(now + Duration::from_secs(60));
        assert_eq!(engine.seats().occupied_count(), 1);
        assert_eq!(engine.chips_tracked(), 1000);
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_top_up_rules() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[500, 500], now);
        assert_eq!(engine.top_up(1, 100, now), Err(TableError::HandInProgress));

        act(&mut engine, 1, ActionKind::Fold, 0, now);
        assert_eq!(engine.top_up(1, 100, now), Ok(595));
        assert!(engine.top_up(1, 500, now).is_err());
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    // === Abandon & Fault Tests ===

    #[test]
    fn test_abandon_refunds_contributions() {
        let now = Instant::now();
        let mut engine = engine_with(config());
        seat_players(&mut engine, &[1000, 1000], now);
        act(&mut engine, 1, ActionKind::Raise, 40, now);

        engine.abandon_hand();
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(stack_of(&engine, 1), 1000);
        assert_eq!(stack_of(&engine, 2), 1000);
        assert!(engine.board().is_empty());
        assert_eq!(engine.check_invariants(), Ok(()));
    }

    #[test]
    fn test_repeated_seed_halts_table() {
        let now = Instant::now();
        let constant: Box<dyn SeedSource> = Box::new(|| DeckSeed::new([7; SEED_LEN]));
        let mut engine =
            TableEngine::with_parts(config(), RakePolicy::default(), constant).expect("valid config");
        seat_players(&mut engine, &[1000, 1000], now);
        act(&mut engine, 1, ActionKind::Fold, 0, now);

        engine.tick(now + Duration::from_secs(5));
        assert!(matches!(
            engine.check_invariants(),
            Err(TableError::InvariantViolation(_))
        ));
        assert!(engine.snapshot().halted.is_some());
    }
}
