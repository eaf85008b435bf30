//! Side pot layering and chip conservation tests using property-based testing
//!
//! These tests verify that pot layering and distribution work correctly in
//! all scenarios:
//! - Multiple all-ins at different amounts
//! - Folded players contribute but can't win
//! - Correct distribution of remainder chips
//! - Side pot eligibility based on investment levels
//! - No chips created or lost over whole hands played through the engine

use poker_table::{
    TableConfig, TableEngine,
    game::{
        EngineEvent,
        deck::{DeckSeed, SEED_LEN},
        entities::{ActionKind, ActionRequest, Chips, Phase, SeatIndex, Username},
        pot::{Contribution, PotTier, RakeConfig, RakePolicy, clockwise_after_button, layer_pots, split_pot},
    },
};
use proptest::prelude::*;
use std::{collections::BTreeSet, time::Duration};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
enum Stake {
    Folded(Chips),
    AllIn(Chips),
    Matched,
}

fn stake_strategy(max: Chips) -> impl Strategy<Value = Stake> {
    prop_oneof![
        (0..=max).prop_map(Stake::Folded),
        (1..=max).prop_map(Stake::AllIn),
        Just(Stake::Matched),
    ]
}

/// Contributions as they look at the end of a betting round: every live
/// seat that isn't all-in has matched the largest contribution.
fn hand_strategy() -> impl Strategy<Value = Vec<Contribution>> {
    (1..=2000u64)
        .prop_flat_map(|max| (Just(max), prop::collection::vec(stake_strategy(max), 1..=8)))
        .prop_map(|(max, mut stakes)| {
            stakes.push(Stake::Matched);
            stakes
                .into_iter()
                .enumerate()
                .map(|(seat, stake)| match stake {
                    Stake::Folded(amount) => Contribution {
                        seat,
                        amount,
                        live: false,
                        all_in: false,
                    },
                    Stake::AllIn(amount) => Contribution {
                        seat,
                        amount,
                        live: true,
                        all_in: true,
                    },
                    Stake::Matched => Contribution {
                        seat,
                        amount: max,
                        live: true,
                        all_in: false,
                    },
                })
                .collect()
        })
}

fn contribution(seat: SeatIndex, amount: Chips, live: bool, all_in: bool) -> Contribution {
    Contribution {
        seat,
        amount,
        live,
        all_in,
    }
}

fn pot(amount: Chips, eligible: &[SeatIndex]) -> PotTier {
    PotTier {
        amount,
        eligible: eligible.iter().copied().collect(),
    }
}

#[test]
fn test_simple_side_pot_three_players() {
    // Player 0: All-in $50
    // Player 1: Calls $100
    // Player 2: Calls $100
    let pots = layer_pots(&[
        contribution(0, 50, true, true),
        contribution(1, 100, true, false),
        contribution(2, 100, true, false),
    ]);
    assert_eq!(pots, vec![pot(150, &[0, 1, 2]), pot(100, &[1, 2])]);
}

#[test]
fn test_multiple_side_pots_four_players() {
    // Player 0: All-in $25
    // Player 1: All-in $75
    // Player 2: All-in $150
    // Player 3: Calls $150
    let pots = layer_pots(&[
        contribution(0, 25, true, true),
        contribution(1, 75, true, true),
        contribution(2, 150, true, true),
        contribution(3, 150, true, false),
    ]);
    assert_eq!(
        pots,
        vec![pot(100, &[0, 1, 2, 3]), pot(150, &[1, 2, 3]), pot(150, &[2, 3])]
    );
}

#[test]
fn test_folded_player_contributes_but_cannot_win() {
    // Player 1 folds after putting in $60; player 0 is all-in for $40.
    let pots = layer_pots(&[
        contribution(0, 40, true, true),
        contribution(1, 60, false, false),
        contribution(2, 200, true, false),
        contribution(3, 200, true, false),
    ]);
    assert_eq!(pots, vec![pot(160, &[0, 2, 3]), pot(340, &[2, 3])]);
}

#[test]
fn test_remainder_goes_clockwise_from_button() {
    let winners = clockwise_after_button([1, 4, 6], 4, 8);
    assert_eq!(winners, vec![6, 1, 4]);
    assert_eq!(split_pot(100, &winners), vec![(6, 34), (1, 33), (4, 33)]);
}

/// Play one hand three-handed: the button limps, the small blind folds,
/// the big blind checks and both check it down. The pot is $25.
fn play_limped_hand(attempt: u64) -> TableEngine {
    let now = Instant::now();
    let config = TableConfig {
        min_players: 3,
        max_players: 3,
        small_blind: 5,
        big_blind: 10,
        buy_in_min: 100,
        buy_in_max: 1000,
        ..TableConfig::default()
    };
    let seeds = move || {
        let mut bytes = [0u8; SEED_LEN];
        bytes[..8].copy_from_slice(&attempt.to_le_bytes());
        DeckSeed::new(bytes)
    };
    let mut engine = TableEngine::with_parts(config, RakePolicy::default(), Box::new(seeds))
        .expect("valid config");
    for user_id in 1..=3 {
        engine
            .join(user_id, Username::new(&format!("p{user_id}")), 500, now)
            .expect("seat available");
    }

    // Seat 0 holds the button and acts first.
    assert_eq!(engine.to_act(), Some(0));
    engine.submit_action(&ActionRequest::call(1), now).expect("button calls");
    engine.submit_action(&ActionRequest::fold(2), now).expect("small blind folds");
    while engine.phase().is_betting() {
        let seat = engine.to_act().expect("someone to act");
        let user_id = engine
            .seats()
            .seat(seat)
            .and_then(|s| s.user_id())
            .expect("seat to act is occupied");
        engine
            .submit_action(&ActionRequest::check(user_id), now)
            .expect("checks are legal");
    }
    engine
}

#[test]
fn test_showdown_tie_gives_odd_chip_clockwise_from_button() {
    // Some deck among the first few thousand splits the pot.
    let tied = (0..5_000u64)
        .map(play_limped_hand)
        .find(|engine| {
            engine
                .last_result()
                .is_some_and(|r| r.pots.iter().any(|pot| pot.winners.len() == 2))
        })
        .expect("a split pot within the attempts");

    let result = tied.last_result().expect("hand finished");
    assert_eq!(tied.phase(), Phase::Showdown);
    assert!(result.showdown);
    assert_eq!(result.total_distributed(), 25);
    // The big blind sits first after the button and takes the odd chip.
    assert_eq!(result.winnings_for(3), 13);
    assert_eq!(result.winnings_for(1), 12);
    assert_eq!(result.winnings_for(2), 0);
    assert_eq!(tied.check_invariants(), Ok(()));
}

proptest! {
    #[test]
    fn test_layering_conserves_chips(contributions in hand_strategy()) {
        let pots = layer_pots(&contributions);
        let total: Chips = contributions.iter().map(|c| c.amount).sum();
        prop_assert_eq!(pots.iter().map(|p| p.amount).sum::<Chips>(), total);
    }

    #[test]
    fn test_eligibility_respects_status(contributions in hand_strategy()) {
        let pots = layer_pots(&contributions);
        let live: BTreeSet<SeatIndex> =
            contributions.iter().filter(|c| c.live).map(|c| c.seat).collect();
        let matched: BTreeSet<SeatIndex> = contributions
            .iter()
            .filter(|c| c.live && !c.all_in)
            .map(|c| c.seat)
            .collect();

        for pot in &pots {
            prop_assert!(pot.amount > 0);
            prop_assert!(!pot.eligible.is_empty());
            prop_assert!(pot.eligible.is_subset(&live), "folded seat eligible in {:?}", pot);
            prop_assert!(matched.is_subset(&pot.eligible), "matched seat missing from {:?}", pot);
        }
    }

    #[test]
    fn test_all_in_wins_at_most_its_level(contributions in hand_strategy()) {
        let pots = layer_pots(&contributions);
        for all_in in contributions.iter().filter(|c| c.live && c.all_in) {
            let reachable: Chips = pots
                .iter()
                .filter(|p| p.eligible.contains(&all_in.seat))
                .map(|p| p.amount)
                .sum();
            let matched: Chips = contributions.iter().map(|c| c.amount.min(all_in.amount)).sum();
            prop_assert_eq!(reachable, matched, "seat {} all-in for {}", all_in.seat, all_in.amount);
        }
    }

    #[test]
    fn test_split_is_even_and_complete(amount in 0u64..100_000, winners in 1usize..=9) {
        let seats: Vec<SeatIndex> = (0..winners).collect();
        let shares = split_pot(amount, &seats);
        prop_assert_eq!(shares.iter().map(|(_, s)| s).sum::<Chips>(), amount);
        let amounts: Vec<Chips> = shares.iter().map(|(_, s)| *s).collect();
        for pair in amounts.windows(2) {
            // Odd chips go to the earliest winners.
            prop_assert!(pair[0] >= pair[1]);
            prop_assert!(pair[0] - pair[1] <= 1);
        }
    }
}

fn counting_seeds() -> impl FnMut() -> DeckSeed + Send {
    let mut counter = 0u64;
    move || {
        counter += 1;
        let mut bytes = [0u8; SEED_LEN];
        bytes[..8].copy_from_slice(&counter.to_le_bytes());
        DeckSeed::new(bytes)
    }
}

const KINDS: [ActionKind; 6] = [
    ActionKind::Fold,
    ActionKind::Check,
    ActionKind::Call,
    ActionKind::Bet,
    ActionKind::Raise,
    ActionKind::AllIn,
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Random play, legal or not, never breaks chip conservation.
    #[test]
    fn test_random_play_conserves_chips(
        stacks in prop::collection::vec(100u64..=1000, 2..=6),
        script in prop::collection::vec((0usize..6, 0u64..=1200), 1..200),
    ) {
        let rake = RakeConfig {
            rate_bps: 500,
            cap: Some(30),
            no_flop_no_drop: true,
        };
        let config = TableConfig {
            min_players: 2,
            max_players: 6,
            small_blind: 5,
            big_blind: 10,
            buy_in_min: 100,
            buy_in_max: 1000,
            showdown_delay_ms: 500,
            rake,
            ..TableConfig::default()
        };
        let mut engine = TableEngine::with_parts(
            config,
            RakePolicy::for_config(&rake),
            Box::new(counting_seeds()),
        )
        .expect("valid config");

        let mut now = Instant::now();
        for (idx, &stack) in stacks.iter().enumerate() {
            let user_id = idx as i64 + 1;
            engine
                .join(user_id, Username::new(&format!("p{user_id}")), stack, now)
                .expect("seat available");
        }
        let bought_in: Chips = stacks.iter().sum();
        let mut hands_completed = 0;

        for (choice, amount) in script {
            match engine.to_act().filter(|_| engine.phase().is_betting()) {
                Some(seat) => {
                    let user_id = engine
                        .seats()
                        .seat(seat)
                        .and_then(|s| s.user_id())
                        .expect("seat to act is occupied");
                    let request = ActionRequest::with_amount(user_id, KINDS[choice], amount);
                    let _ = engine.submit_action(&request, now);
                }
                None => {
                    now += Duration::from_millis(500);
                    engine.tick(now);
                }
            }
            prop_assert_eq!(engine.check_invariants(), Ok(()));

            for event in engine.drain_events() {
                if let EngineEvent::HandCompleted(result) = event {
                    hands_completed += 1;
                    prop_assert_eq!(
                        result.total_distributed() + result.rake,
                        result.total_contributed(),
                        "hand #{} leaked chips",
                        result.hand_number
                    );
                }
            }
        }

        let snapshot = engine.snapshot();
        let stacks_now: Chips = snapshot.seats.iter().map(|s| s.stack).sum();
        let in_pot: Chips = snapshot.seats.iter().map(|s| s.contribution).sum();
        prop_assert_eq!(stacks_now + in_pot + engine.rake_collected(), bought_in);
        prop_assert!(hands_completed <= engine.hand_number());
        prop_assert!(engine.phase() != Phase::Waiting || engine.to_act().is_none());
    }
}
