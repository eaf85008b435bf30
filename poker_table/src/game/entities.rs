use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::constants;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Self::Club, Self::Spade, Self::Diamond, Self::Heart];

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Club => 0,
            Self::Spade => 1,
            Self::Diamond => 2,
            Self::Heart => 3,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values.
pub type Value = u8;

/// A card is a tuple of a uInt8 value (deuce=2u8 ... ace=14u8) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    /// Position of the card in a freshly opened (unshuffled) deck.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        usize::from(self.0 - 2) * 4 + self.1.index()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A",
            13 => "K",
            12 => "Q",
            11 => "J",
            v => &v.to_string(),
        };
        let repr = format!("{value}/{}", self.1);
        write!(f, "{repr:>4}")
    }
}

/// The ten hand categories, weakest first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "hi",
            Self::OnePair => "1p",
            Self::TwoPair => "2p",
            Self::ThreeOfAKind => "3k",
            Self::Straight => "s8",
            Self::Flush => "fs",
            Self::FullHouse => "fh",
            Self::FourOfAKind => "4k",
            Self::StraightFlush => "sf",
            Self::RoyalFlush => "rf",
        };
        write!(f, "{repr}")
    }
}

/// Comparable strength of a hand. Category first, then tie-break values
/// from most to least significant.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandValue {
    pub rank: Rank,
    pub values: Vec<Value>,
}

impl fmt::Display for HandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}[{values}]", self.rank)
    }
}

/// Type alias for whole chips. All bets and player stacks are represented
/// as whole chips.
pub type Chips = u64;

/// External identity of a player.
pub type UserId = i64;

/// Type alias for seat positions at the table.
pub type SeatIndex = usize;

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Username(String);

impl Username {
    pub fn new(s: &str) -> Self {
        let mut username: String = s
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        if let Some((idx, _)) = username.char_indices().nth(constants::MAX_USERNAME_LENGTH) {
            username.truncate(idx);
        }
        Self(username)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = format!("${}/{}", self.small, self.big);
        write!(f, "{repr}")
    }
}

/// What a player asks to do on their turn.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Check,
    Bet,
    Call,
    Raise,
    Fold,
    AllIn,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Check => "check",
            Self::Bet => "bet",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::Fold => "fold",
            Self::AllIn => "all-in",
        };
        write!(f, "{repr}")
    }
}

/// A player's action submission. `amount` is the raise-to total for the
/// street and only read for bets and raises.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActionRequest {
    pub user_id: UserId,
    pub kind: ActionKind,
    pub amount: Chips,
    pub submitted_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(user_id: UserId, kind: ActionKind) -> Self {
        Self {
            user_id,
            kind,
            amount: 0,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_amount(user_id: UserId, kind: ActionKind, amount: Chips) -> Self {
        Self {
            amount,
            ..Self::new(user_id, kind)
        }
    }

    pub fn check(user_id: UserId) -> Self {
        Self::new(user_id, ActionKind::Check)
    }

    pub fn call(user_id: UserId) -> Self {
        Self::new(user_id, ActionKind::Call)
    }

    pub fn fold(user_id: UserId) -> Self {
        Self::new(user_id, ActionKind::Fold)
    }

    pub fn all_in(user_id: UserId) -> Self {
        Self::new(user_id, ActionKind::AllIn)
    }

    pub fn bet(user_id: UserId, amount: Chips) -> Self {
        Self::with_amount(user_id, ActionKind::Bet, amount)
    }

    pub fn raise(user_id: UserId, amount: Chips) -> Self {
        Self::with_amount(user_id, ActionKind::Raise, amount)
    }
}

/// An action after validation, with chip amounts resolved against the
/// seat's stack.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppliedAction {
    Fold,
    Check,
    /// Chips added to match the current bet.
    Call { added: Chips },
    /// First bet of the street, to a street total of `to`.
    Bet { to: Chips, added: Chips },
    Raise { to: Chips, added: Chips },
    /// Whole stack committed; `to` is the seat's resulting street total.
    AllIn { to: Chips, added: Chips },
}

impl AppliedAction {
    #[must_use]
    pub fn added(&self) -> Chips {
        match self {
            Self::Fold | Self::Check => 0,
            Self::Call { added }
            | Self::Bet { added, .. }
            | Self::Raise { added, .. }
            | Self::AllIn { added, .. } => *added,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Fold => ActionKind::Fold,
            Self::Check => ActionKind::Check,
            Self::Call { .. } => ActionKind::Call,
            Self::Bet { .. } => ActionKind::Bet,
            Self::Raise { .. } => ActionKind::Raise,
            Self::AllIn { .. } => ActionKind::AllIn,
        }
    }
}

impl fmt::Display for AppliedAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "folds".to_string(),
            Self::Check => "checks".to_string(),
            Self::Call { added } => format!("calls ${added}"),
            Self::Bet { to, .. } => format!("bets ${to}"),
            Self::Raise { to, .. } => format!("raises to ${to}"),
            Self::AllIn { to, .. } => format!("all-ins for ${to}"),
        };
        write!(f, "{repr}")
    }
}

/// Table lifecycle phase.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl Phase {
    /// Whether chips can move on this phase.
    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }

    /// Next street and the number of community cards it reveals.
    #[must_use]
    pub fn next_street(self) -> Option<(Phase, usize)> {
        match self {
            Self::Preflop => Some((Self::Flop, 3)),
            Self::Flop => Some((Self::Turn, 1)),
            Self::Turn => Some((Self::River, 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}
