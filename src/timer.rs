use std::ops::Mul;
use std::time::Duration;

use crate::SeededRng;

// In seconds.
const JITTER_RANGE: f32 = 0.5;

/// Exponential backoff for flight retransmission.
///
/// Starts at the configured RTO, doubles on every attempt and gives up
/// after the configured number of retries. A small jitter desynchronizes
/// peers that started at the same instant.
pub struct ExponentialBackoff {
    rto: Duration,
    jitter: f32,
    left: usize,
}

impl ExponentialBackoff {
    pub fn new(start_rto: Duration, retries: usize, rng: &mut SeededRng) -> Self {
        Self {
            rto: start_rto,
            jitter: Self::jitter(rng),
            left: retries,
        }
    }

    pub fn rto(&self) -> Duration {
        if self.jitter < 0.0 {
            let duration = Duration::from_secs_f32(self.jitter.abs());
            self.rto.saturating_sub(duration)
        } else {
            self.rto + Duration::from_secs_f32(self.jitter)
        }
        .max(Duration::from_millis(50))
    }

    // A value between -0.25s and 0.25s
    fn jitter(rng: &mut SeededRng) -> f32 {
        rng.random::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
    }

    pub fn attempt(&mut self, rng: &mut SeededRng) {
        let (n, overflow) = self.left.overflowing_sub(1);

        if overflow {
            return;
        }

        self.left = n;
        self.jitter = Self::jitter(rng);
        self.rto = self.rto.mul(2);
    }

    pub fn can_retry(&self) -> bool {
        self.left > 0
    }
}
