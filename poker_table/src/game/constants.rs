//! Fixed limits of the game.

use super::entities::Chips;

/// A 52-card deck deals 2 hole cards to at most 23 players and still
/// leaves 5 community cards.
pub const MAX_PLAYERS: usize = 23;

pub const DECK_SIZE: usize = 52;

pub const HOLE_CARDS: usize = 2;

pub const BOARD_SIZE: usize = 5;

pub const MAX_USERNAME_LENGTH: usize = 32;

/// Number of recent action rejections kept in a table snapshot.
pub const MAX_RECENT_REJECTIONS: usize = 16;

pub const DEFAULT_SMALL_BLIND: Chips = 5;

pub const DEFAULT_BIG_BLIND: Chips = 10;

pub const DEFAULT_BUY_IN_MIN: Chips = 20 * DEFAULT_BIG_BLIND;

pub const DEFAULT_BUY_IN_MAX: Chips = 200 * DEFAULT_BIG_BLIND;
