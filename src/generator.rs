//! Synthetic row source. Every field is drawn independently and uniformly.

use crate::record::{compose_segment, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Lowest generated amount: `1.00`.
pub const MONETARY_MIN: Decimal = Decimal::from_parts(100, 0, 0, false, 2);
/// Highest generated amount: `9999.99`.
pub const MONETARY_MAX: Decimal = Decimal::from_parts(999_999, 0, 0, false, 2);

/// Half-open customer id range `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdBounds {
    pub min: i64,
    pub max: i64,
}

impl Default for CustomerIdBounds {
    fn default() -> Self {
        Self { min: 1_234_567, max: 23_456_789 }
    }
}

pub struct RowGenerator {
    rng: StdRng,
    bounds: CustomerIdBounds,
}

impl RowGenerator {
    pub fn from_entropy(bounds: CustomerIdBounds) -> Self {
        Self { rng: StdRng::from_entropy(), bounds }
    }

    /// Deterministic generator: equal seeds and bounds yield equal rows.
    pub fn seeded(seed: u64, bounds: CustomerIdBounds) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), bounds }
    }

    /// Generator for fan-out worker `worker`: derived from `seed` when given.
    pub fn for_worker(seed: Option<u64>, worker: usize, bounds: CustomerIdBounds) -> Self {
        match seed {
            Some(s) => Self::seeded(s.wrapping_add(worker as u64), bounds),
            None => Self::from_entropy(bounds),
        }
    }

    pub fn generate(&mut self) -> Record {
        let segment = compose_segment(
            self.rng.gen_range(1..=4),
            self.rng.gen_range(1..=4),
            self.rng.gen_range(1..=4),
        );
        let customer_id = self.rng.gen_range(self.bounds.min..self.bounds.max);
        let monetary_value = self.monetary();
        Record::new(segment, customer_id, monetary_value)
    }

    // Half-up to two places at generation time; the encoder prints it as-is.
    fn monetary(&mut self) -> Decimal {
        let u: f64 = self.rng.gen();
        let fraction = Decimal::from_f64(u).unwrap_or(Decimal::ZERO);
        let raw = MONETARY_MIN + fraction * (MONETARY_MAX - MONETARY_MIN);
        let mut value = raw
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .clamp(MONETARY_MIN, MONETARY_MAX);
        value.rescale(2);
        value
    }
}

impl Iterator for RowGenerator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        Some(self.generate())
    }
}
