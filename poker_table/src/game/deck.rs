//! Deck construction, seeded Fisher-Yates shuffling and shuffle commitments.

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use super::constants::DECK_SIZE;
use super::entities::{Card, Suit};
use crate::table::config::TableId;

pub const SEED_LEN: usize = 32;

/// Secret that fully determines one hand's card order.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct DeckSeed([u8; SEED_LEN]);

impl DeckSeed {
    pub fn new(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Commitment published before any card is revealed. Binds the seed to
    /// the table and hand so a commitment can't be replayed elsewhere.
    #[must_use]
    pub fn commitment(&self, table_id: TableId, hand_number: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        hasher.update(table_id.to_le_bytes());
        hasher.update(hand_number.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Digest used to detect seed reuse without keeping seeds around.
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.0).into()
    }

    /// Hex form, only meant to be published after the hand is over.
    #[must_use]
    pub fn reveal(&self) -> String {
        hex::encode(self.0)
    }
}

// Keep seeds out of logs.
impl fmt::Debug for DeckSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeckSeed(..)")
    }
}

/// Where per-hand seeds come from.
pub trait SeedSource: Send {
    fn next_seed(&mut self) -> DeckSeed;
}

/// Seeds drawn from the thread-local CSPRNG, which is itself seeded by the OS.
#[derive(Debug, Default)]
pub struct ThreadRngSeedSource;

impl SeedSource for ThreadRngSeedSource {
    fn next_seed(&mut self) -> DeckSeed {
        let mut bytes = [0u8; SEED_LEN];
        rand::rng().fill_bytes(&mut bytes);
        DeckSeed(bytes)
    }
}

impl<F> SeedSource for F
where
    F: FnMut() -> DeckSeed + Send,
{
    fn next_seed(&mut self) -> DeckSeed {
        self()
    }
}

#[derive(Debug)]
pub struct Deck {
    cards: [Card; DECK_SIZE],
    deck_idx: usize,
}

impl Deck {
    /// A deck shuffled by Fisher-Yates driven by ChaCha20 seeded with `seed`.
    ///
    /// Every swap draws uniformly from the remaining range; `random_range`
    /// rejects out-of-zone samples instead of reducing modulo the range.
    pub fn shuffled(seed: &DeckSeed) -> Self {
        let mut deck = Self::default();
        let mut rng = ChaCha20Rng::from_seed(seed.0);
        for i in (1..DECK_SIZE).rev() {
            let j = rng.random_range(0..=i);
            deck.cards.swap(i, j);
        }
        deck
    }

    pub fn deal_card(&mut self) -> Option<Card> {
        let card = self.cards.get(self.deck_idx).copied()?;
        self.deck_idx += 1;
        Some(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        DECK_SIZE - self.deck_idx
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards: [Card; DECK_SIZE] = [Card(2, Suit::Club); DECK_SIZE];
        for (i, value) in (2u8..=14u8).enumerate() {
            for (j, suit) in Suit::ALL.into_iter().enumerate() {
                cards[4 * i + j] = Card(value, suit);
            }
        }
        Self { cards, deck_idx: 0 }
    }
}

/// Record appended to the shuffle audit log before a hand's cards are dealt.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ShuffleAudit {
    pub table_id: TableId,
    pub hand_id: Uuid,
    pub hand_number: u64,
    pub commitment: String,
    pub committed_at: DateTime<Utc>,
}

/// Recompute a commitment from a revealed seed, e.g. when auditing a
/// finished hand.
#[must_use]
pub fn verify_commitment(
    revealed_seed: &str,
    table_id: TableId,
    hand_number: u64,
    commitment: &str,
) -> bool {
    let Ok(bytes) = hex::decode(revealed_seed) else {
        return false;
    };
    let Ok(seed) = <[u8; SEED_LEN]>::try_from(bytes.as_slice()) else {
        return false;
    };
    DeckSeed(seed).commitment(table_id, hand_number) == commitment
}
