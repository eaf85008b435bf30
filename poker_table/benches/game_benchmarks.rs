use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use poker_table::{
    TableConfig, TableEngine,
    entities::{ActionRequest, Card, Suit, Username},
    functional::{argmax, eval},
    game::{
        deck::{Deck, DeckSeed, SEED_LEN},
        pot::{Contribution, RakePolicy, layer_pots},
    },
};
use tokio::time::Instant;

fn counting_seeds() -> impl FnMut() -> DeckSeed + Send {
    let mut counter = 0u64;
    move || {
        counter += 1;
        let mut bytes = [0u8; SEED_LEN];
        bytes[..8].copy_from_slice(&counter.to_le_bytes());
        DeckSeed::new(bytes)
    }
}

/// Engine with N seated players and the first hand dealt
fn setup_engine_with_players(n_players: usize) -> TableEngine {
    let config = TableConfig {
        max_players: 10,
        ..TableConfig::default()
    };
    let rake = RakePolicy::for_config(&config.rake);
    let mut engine = TableEngine::with_parts(config, rake, Box::new(counting_seeds())).unwrap();
    let now = Instant::now();
    for i in 0..n_players {
        let user_id = i as i64 + 1;
        engine
            .join(user_id, Username::new(&format!("player{i}")), 1000, now)
            .unwrap();
    }
    engine
}

/// Benchmark hand evaluation with 5 cards
fn bench_hand_eval_5_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spade),
        Card(14, Suit::Heart),
        Card(9, Suit::Club),
        Card(9, Suit::Diamond),
        Card(2, Suit::Heart),
    ];

    c.bench_function("hand_eval_5_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark hand evaluation with 7 cards (hole cards + board)
fn bench_hand_eval_7_cards(c: &mut Criterion) {
    let cards = vec![
        Card(14, Suit::Spade),  // Hole: Ace of Spades
        Card(13, Suit::Spade),  // Hole: King of Spades
        Card(12, Suit::Spade),  // Board: Queen of Spades
        Card(11, Suit::Spade),  // Board: Jack of Spades
        Card(10, Suit::Spade),  // Board: 10 of Spades (royal flush)
        Card(2, Suit::Heart),   // Board: 2 of Hearts
        Card(3, Suit::Diamond), // Board: 3 of Diamonds
    ];

    c.bench_function("hand_eval_7_cards", |b| {
        b.iter(|| eval(&cards));
    });
}

/// Benchmark picking winners among N showdown hands
fn bench_hand_comparison(c: &mut Criterion) {
    let board = [
        Card(12, Suit::Club),
        Card(8, Suit::Diamond),
        Card(5, Suit::Spade),
        Card(3, Suit::Heart),
        Card(13, Suit::Club),
    ];
    let holes = [
        [Card(14, Suit::Heart), Card(14, Suit::Spade)],
        [Card(12, Suit::Heart), Card(11, Suit::Heart)],
        [Card(7, Suit::Diamond), Card(6, Suit::Diamond)],
        [Card(4, Suit::Club), Card(2, Suit::Club)],
    ];
    let hands: Vec<_> = holes
        .iter()
        .map(|hole| {
            let mut cards = hole.to_vec();
            cards.extend_from_slice(&board);
            eval(&cards).unwrap()
        })
        .collect();

    c.bench_function("hand_comparison", |b| {
        b.iter(|| argmax(&hands));
    });
}

/// Benchmark a seeded shuffle
fn bench_shuffle(c: &mut Criterion) {
    let seed = DeckSeed::new([42; SEED_LEN]);
    c.bench_function("deck_shuffle", |b| {
        b.iter(|| Deck::shuffled(&seed));
    });
}

/// Benchmark pot layering with a staircase of all-ins
fn bench_layer_pots(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer_pots");

    for n_players in [2, 6, 10] {
        let contributions: Vec<Contribution> = (0..n_players)
            .map(|seat| Contribution {
                seat,
                amount: 100 * (seat as u64 + 1),
                live: seat % 3 != 1,
                all_in: seat + 1 < n_players,
            })
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_players}_players")),
            &contributions,
            |b, contributions| {
                b.iter(|| layer_pots(contributions));
            },
        );
    }

    group.finish();
}

/// Benchmark snapshot generation with different player counts
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for n_players in [2, 6, 10] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_players}_players")),
            &n_players,
            |b, &n| {
                let engine = setup_engine_with_players(n);
                b.iter(|| engine.snapshot());
            },
        );
    }

    group.finish();
}

/// Benchmark a whole preflop of calls and checks
fn bench_preflop_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("preflop_round");

    for n_players in [2, 10] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n_players}_players")),
            &n_players,
            |b, &n| {
                b.iter_batched(
                    || setup_engine_with_players(n),
                    |mut engine| {
                        let now = Instant::now();
                        while let Some(seat) = engine.to_act().filter(|_| engine.phase().is_betting()) {
                            let Some(user_id) = engine.seats().seat(seat).and_then(|s| s.user_id()) else {
                                break;
                            };
                            let call = engine.submit_action(&ActionRequest::call(user_id), now);
                            if call.is_err() {
                                let _ = engine.submit_action(&ActionRequest::check(user_id), now);
                            }
                            if engine.board().len() >= 3 {
                                break;
                            }
                        }
                        engine.drain_events();
                        engine
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    hand_evaluation,
    bench_hand_eval_5_cards,
    bench_hand_eval_7_cards,
    bench_hand_comparison,
);

criterion_group!(
    table_operations,
    bench_shuffle,
    bench_layer_pots,
    bench_snapshot,
    bench_preflop_round,
);

criterion_main!(hand_evaluation, table_operations);
