//! Live-price simulation between upstream quote refreshes.
//!
//! The upstream quote moves coarsely; polling clients expect a price that
//! moves every tick. The simulator runs a bounded random walk seeded from
//! the previous live price, drifting with the 1-hour trend and mean-
//! reverting whenever it strays more than 1% from the reference quote.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;

/// Base per-tick noise, as a fraction of the live price.
const NOISE_PCT: f64 = 0.001;
/// Minimum visible step in dollars; low-priced tokens switch to this.
const MIN_ABS_STEP: f64 = 0.01;
/// Maximum drift from the reference quote, as a fraction of it.
const MAX_DRIFT_PCT: f64 = 0.01;
/// Fraction of the excess kept after a reversion pull (20% is pulled back).
const REVERSION_KEEP: f64 = 0.8;

/// One recorded tick of the simulated stream.
#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub live_price: f64,
    pub reference_price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-session price walk with a bounded FIFO history.
pub struct PriceSimulator {
    history: VecDeque<PricePoint>,
    capacity: usize,
    rng: ChaCha8Rng,
}

impl PriceSimulator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    #[must_use]
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn last_live_price(&self) -> Option<f64> {
        self.history.back().map(|p| p.live_price)
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<PricePoint> {
        &self.history
    }

    /// Advances the walk one tick and records the point.
    ///
    /// `hourly_change_pct` is the quote's 1-hour percent change; it is
    /// scaled down to a per-second trend so the walk leans the way the
    /// market is moving.
    pub fn step(
        &mut self,
        reference_price: f64,
        hourly_change_pct: f64,
        timestamp: DateTime<Utc>,
    ) -> f64 {
        // First tick starts from the reference quote itself.
        let base = self.last_live_price().unwrap_or(reference_price);

        let trend = (hourly_change_pct / 3600.0) / 100.0;

        let pct_step: f64 = self.rng.gen_range(-NOISE_PCT..NOISE_PCT);
        let noise = if (pct_step * base).abs() < MIN_ABS_STEP {
            // Percentage noise is invisible at this price; use an absolute
            // dollar step instead.
            self.rng.gen_range(-MIN_ABS_STEP..MIN_ABS_STEP) / base
        } else {
            pct_step
        };

        let mut live = base * (1.0 + trend + noise);

        let max_drift = reference_price * MAX_DRIFT_PCT;
        if (live - reference_price).abs() > max_drift {
            live = reference_price + (live - reference_price) * REVERSION_KEEP;
        }

        self.history.push_back(PricePoint {
            live_price: live,
            reference_price,
            timestamp,
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        live
    }
}
