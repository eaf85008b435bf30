//! Pot layering, pot distribution and rake rules.
//!
//! Contributions are partitioned into tiers. Each tier caps every seat's
//! contribution at an all-in level, so a seat that went all-in for less is
//! only eligible for the tiers it fully paid into. Tiers are recomputed from
//! scratch whenever contributions change, which keeps the layering correct
//! mid-street and not only at hand end.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, sync::Arc};

use super::entities::{Chips, SeatIndex};

/// One seat's stake in the current hand.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Contribution {
    pub seat: SeatIndex,
    pub amount: Chips,
    /// Still contesting the pot (not folded).
    pub live: bool,
    pub all_in: bool,
}

/// A pot and the seats that can win it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PotTier {
    pub amount: Chips,
    pub eligible: BTreeSet<SeatIndex>,
}

/// Partition contributions into a main pot followed by side pots.
///
/// Tier boundaries are the distinct all-in levels of live seats plus the
/// largest contribution. A live seat that isn't all-in can still match any
/// level, so it's eligible everywhere. Adjacent tiers with the same
/// eligible set are merged.
#[must_use]
pub fn layer_pots(contributions: &[Contribution]) -> Vec<PotTier> {
    let Some(max) = contributions.iter().map(|c| c.amount).max() else {
        return vec![];
    };
    if max == 0 {
        return vec![];
    }

    let mut caps: Vec<Chips> = contributions
        .iter()
        .filter(|c| c.live && c.all_in && c.amount > 0)
        .map(|c| c.amount)
        .collect();
    caps.push(max);
    caps.sort_unstable();
    caps.dedup();

    let live: BTreeSet<SeatIndex> = contributions
        .iter()
        .filter(|c| c.live)
        .map(|c| c.seat)
        .collect();

    let mut tiers: Vec<PotTier> = Vec::with_capacity(caps.len());
    let mut prev = 0;
    for cap in caps {
        let amount: Chips = contributions
            .iter()
            .map(|c| c.amount.min(cap) - c.amount.min(prev))
            .sum();
        prev = cap;
        if amount == 0 {
            continue;
        }

        let eligible: BTreeSet<SeatIndex> = contributions
            .iter()
            .filter(|c| c.live && (!c.all_in || c.amount >= cap))
            .map(|c| c.seat)
            .collect();

        // Dead money above every live seat's level stays with the last tier
        // that still has contenders.
        if eligible.is_empty() {
            match tiers.last_mut() {
                Some(last) => last.amount += amount,
                None => tiers.push(PotTier {
                    amount,
                    eligible: live.clone(),
                }),
            }
            continue;
        }

        match tiers.last_mut() {
            Some(last) if last.eligible == eligible => last.amount += amount,
            _ => tiers.push(PotTier { amount, eligible }),
        }
    }
    tiers
}

/// Seats ordered clockwise starting from the first seat after the button.
/// This is the order odd chips are handed out in.
#[must_use]
pub fn clockwise_after_button(
    seats: impl IntoIterator<Item = SeatIndex>,
    button: SeatIndex,
    num_seats: usize,
) -> Vec<SeatIndex> {
    let mut seats: Vec<SeatIndex> = seats.into_iter().collect();
    let n = num_seats.max(1);
    seats.sort_by_key(|&seat| (seat + n - (button % n) - 1) % n);
    seats
}

/// Split `amount` evenly between `winners`, who must already be in odd-chip
/// order. The first `amount % winners.len()` winners get one extra chip.
#[must_use]
pub fn split_pot(amount: Chips, winners: &[SeatIndex]) -> Vec<(SeatIndex, Chips)> {
    if winners.is_empty() {
        return vec![];
    }
    let n = winners.len() as Chips;
    let share = amount / n;
    let remainder = (amount % n) as usize;
    winners
        .iter()
        .enumerate()
        .map(|(idx, &seat)| (seat, share + Chips::from(idx < remainder)))
        .collect()
}

/// Rate and cap record for rake.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RakeConfig {
    /// Rate in basis points (1/100th of a percent).
    pub rate_bps: u32,
    /// Largest rake taken from one hand. `None` means uncapped.
    #[serde(default)]
    pub cap: Option<Chips>,
    /// Skip rake for hands that end before the flop.
    #[serde(default)]
    pub no_flop_no_drop: bool,
}

pub const BASIS_POINTS: u32 = 10_000;

#[enum_dispatch]
pub trait RakeRule {
    /// Rake owed on a main pot of `main_pot` chips.
    fn rake(&self, main_pot: Chips, config: &RakeConfig) -> Chips;
}

/// Never takes anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRake;

impl RakeRule for NoRake {
    fn rake(&self, _main_pot: Chips, _config: &RakeConfig) -> Chips {
        0
    }
}

/// `rate_bps` of the main pot rounded down, limited by `cap`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PercentageRake;

impl RakeRule for PercentageRake {
    fn rake(&self, main_pot: Chips, config: &RakeConfig) -> Chips {
        let raw = u128::from(main_pot) * u128::from(config.rate_bps) / u128::from(BASIS_POINTS);
        let raw = Chips::try_from(raw).unwrap_or(Chips::MAX);
        match config.cap {
            Some(cap) => raw.min(cap),
            None => raw,
        }
    }
}

pub type RakeFn = dyn Fn(Chips, &RakeConfig) -> Chips + Send + Sync;

/// House-specific rule injected by the host.
#[derive(Clone)]
pub struct CustomRake(pub Arc<RakeFn>);

impl CustomRake {
    pub fn new(f: impl Fn(Chips, &RakeConfig) -> Chips + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl RakeRule for CustomRake {
    fn rake(&self, main_pot: Chips, config: &RakeConfig) -> Chips {
        (self.0)(main_pot, config)
    }
}

impl fmt::Debug for CustomRake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomRake(..)")
    }
}

#[enum_dispatch(RakeRule)]
#[derive(Clone, Debug)]
pub enum RakePolicy {
    NoRake,
    PercentageRake,
    CustomRake,
}

impl RakePolicy {
    /// Policy implied by a config alone: percentage when a rate is set.
    #[must_use]
    pub fn for_config(config: &RakeConfig) -> Self {
        if config.rate_bps == 0 {
            NoRake.into()
        } else {
            PercentageRake.into()
        }
    }

    /// Rake to collect at pot-award time. Never more than the main pot.
    #[must_use]
    pub fn collect(&self, main_pot: Chips, config: &RakeConfig, saw_flop: bool) -> Chips {
        if config.no_flop_no_drop && !saw_flop {
            return 0;
        }
        self.rake(main_pot, config).min(main_pot)
    }
}

impl Default for RakePolicy {
    fn default() -> Self {
        NoRake.into()
    }
}
