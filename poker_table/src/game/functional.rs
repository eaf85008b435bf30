//! Hand evaluation.
//!
//! `eval` ranks any 5 to 7 distinct cards by their best 5-card hand. The
//! returned [`HandValue`] orders by category first and then by tie-break
//! values, so comparing two values with `Ord` settles a showdown.

use std::collections::HashSet;
use thiserror::Error;

use super::entities::{Card, HandValue, Rank, Value};

const MIN_CARDS: usize = 5;
const MAX_CARDS: usize = 7;
const ACE: Value = 14;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EvalError {
    #[error("need 5 to 7 cards, got {0}")]
    InvalidHandSize(usize),
    #[error("duplicate card {0}")]
    DuplicateCard(Card),
    #[error("card value {0} out of range")]
    InvalidValue(Value),
}

/// Rank the best 5-card hand within `cards`.
pub fn eval(cards: &[Card]) -> Result<HandValue, EvalError> {
    if !(MIN_CARDS..=MAX_CARDS).contains(&cards.len()) {
        return Err(EvalError::InvalidHandSize(cards.len()));
    }
    let mut seen = HashSet::with_capacity(cards.len());
    for card in cards {
        if !(2..=ACE).contains(&card.0) {
            return Err(EvalError::InvalidValue(card.0));
        }
        if !seen.insert(*card) {
            return Err(EvalError::DuplicateCard(*card));
        }
    }

    let mut counts = [0u8; ACE as usize + 1];
    let mut by_suit: [Vec<Value>; 4] = Default::default();
    for &Card(value, suit) in cards {
        counts[value as usize] += 1;
        by_suit[suit.index()].push(value);
    }

    let flush_values = by_suit.iter().find(|values| values.len() >= 5).map(|values| {
        let mut values = values.clone();
        values.sort_unstable_by(|a, b| b.cmp(a));
        values
    });

    if let Some(values) = &flush_values
        && let Some(high) = straight_high(values)
    {
        let rank = if high == ACE {
            Rank::RoyalFlush
        } else {
            Rank::StraightFlush
        };
        return Ok(HandValue {
            rank,
            values: vec![high],
        });
    }

    // Distinct values grouped by multiplicity, biggest groups then highest
    // values first.
    let mut groups: Vec<(u8, Value)> = (2..=ACE)
        .filter(|&v| counts[v as usize] > 0)
        .map(|v| (counts[v as usize], v))
        .collect();
    groups.sort_unstable_by(|a, b| b.cmp(a));

    let (top_count, top_value) = groups[0];

    if top_count == 4 {
        return Ok(HandValue {
            rank: Rank::FourOfAKind,
            values: with_kickers(&[top_value], &groups, 1),
        });
    }

    if top_count == 3
        && let Some(&(_, pair_value)) = groups[1..].iter().find(|(count, _)| *count >= 2)
    {
        return Ok(HandValue {
            rank: Rank::FullHouse,
            values: vec![top_value, pair_value],
        });
    }

    if let Some(values) = flush_values {
        return Ok(HandValue {
            rank: Rank::Flush,
            values: values.into_iter().take(5).collect(),
        });
    }

    let distinct: Vec<Value> = {
        let mut values: Vec<Value> = groups.iter().map(|&(_, v)| v).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        values
    };
    if let Some(high) = straight_high(&distinct) {
        return Ok(HandValue {
            rank: Rank::Straight,
            values: vec![high],
        });
    }

    if top_count == 3 {
        return Ok(HandValue {
            rank: Rank::ThreeOfAKind,
            values: with_kickers(&[top_value], &groups, 2),
        });
    }

    if top_count == 2 {
        let (second_count, second_value) = groups[1];
        if second_count == 2 {
            return Ok(HandValue {
                rank: Rank::TwoPair,
                values: with_kickers(&[top_value, second_value], &groups, 1),
            });
        }
        return Ok(HandValue {
            rank: Rank::OnePair,
            values: with_kickers(&[top_value], &groups, 3),
        });
    }

    Ok(HandValue {
        rank: Rank::HighCard,
        values: distinct.into_iter().take(5).collect(),
    })
}

/// Rank a seat's hole cards together with the board.
pub fn eval_with_board(hole: &[Card], board: &[Card]) -> Result<HandValue, EvalError> {
    let mut cards = Vec::with_capacity(hole.len() + board.len());
    cards.extend_from_slice(hole);
    cards.extend_from_slice(board);
    eval(&cards)
}

/// Indices of every hand tied for best, in ascending order.
#[must_use]
pub fn argmax(hands: &[HandValue]) -> Vec<usize> {
    let Some(best) = hands.iter().max() else {
        return vec![];
    };
    hands
        .iter()
        .enumerate()
        .filter(|(_, hand)| *hand == best)
        .map(|(idx, _)| idx)
        .collect()
}

/// Highest card of the best straight within `values` (sorted descending,
/// duplicates allowed). The wheel A-2-3-4-5 counts as 5-high.
fn straight_high(values: &[Value]) -> Option<Value> {
    let mut present = [false; ACE as usize + 1];
    for &value in values {
        present[value as usize] = true;
    }
    // Ace also plays low.
    present[1] = present[ACE as usize];
    (5..=ACE).rev().find(|&high| (high - 4..=high).all(|v| present[v as usize]))
}

/// `made` followed by the `n` highest values not already used.
fn with_kickers(made: &[Value], groups: &[(u8, Value)], n: usize) -> Vec<Value> {
    let mut kickers: Vec<Value> = groups
        .iter()
        .map(|&(_, v)| v)
        .filter(|v| !made.contains(v))
        .collect();
    kickers.sort_unstable_by(|a, b| b.cmp(a));
    made.iter().copied().chain(kickers.into_iter().take(n)).collect()
}

/// Parse a compact card list such as `"As Kd 10h 2c"`. Test helper.
#[cfg(test)]
pub(crate) fn cards(repr: &str) -> Vec<Card> {
    use super::entities::Suit;

    repr.split_whitespace()
        .map(|token| {
            let (value, suit) = token.split_at(token.len() - 1);
            let value = match value {
                "A" => 14,
                "K" => 13,
                "Q" => 12,
                "J" => 11,
                v => v.parse().expect("numeric card value"),
            };
            let suit = match suit {
                "c" => Suit::Club,
                "s" => Suit::Spade,
                "d" => Suit::Diamond,
                "h" => Suit::Heart,
                s => panic!("unknown suit {s}"),
            };
            Card(value, suit)
        })
        .collect()
}
