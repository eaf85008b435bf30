//! Seat randomization to prevent seat selection manipulation.

use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::game::entities::SeatIndex;

/// Picks a uniformly random empty seat so players can't choose to sit next
/// to (or across from) a partner.
#[derive(Debug)]
pub struct SeatRandomizer {
    rng: StdRng,
}

impl SeatRandomizer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded randomizer for reproducible seating in tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Find a random available seat
    ///
    /// # Arguments
    ///
    /// * `occupied_seats` - Currently occupied seat indices
    /// * `max_seats` - Number of seats at the table
    ///
    /// # Returns
    ///
    /// * `Option<SeatIndex>` - Random empty seat, or `None` if the table is full
    pub fn find_random_seat(
        &mut self,
        occupied_seats: &[SeatIndex],
        max_seats: usize,
    ) -> Option<SeatIndex> {
        let available_seats: Vec<SeatIndex> = (0..max_seats)
            .filter(|seat| !occupied_seats.contains(seat))
            .collect();
        available_seats.choose(&mut self.rng).copied()
    }
}

impl Default for SeatRandomizer {
    fn default() -> Self {
        Self::new()
    }
}
