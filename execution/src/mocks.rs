//! Deterministic stand-ins for tests.

use crash_types::SeedPair;
use std::collections::VecDeque;

use crate::crash_point::CrashSource;

/// Hands out a scripted sequence of crash points, then repeats the last one.
pub struct FixedCrashPoints {
    points: VecDeque<f64>,
    last: f64,
    rounds: u64,
}

impl FixedCrashPoints {
    pub fn new(points: impl IntoIterator<Item = f64>) -> Self {
        let points: VecDeque<f64> = points.into_iter().collect();
        let last = points.back().copied().unwrap_or(2.0);
        Self {
            points,
            last,
            rounds: 0,
        }
    }
}

impl CrashSource for FixedCrashPoints {
    fn next_round(&mut self) -> (SeedPair, f64) {
        self.rounds += 1;
        let crash_point = self.points.pop_front().unwrap_or(self.last);
        let seeds = SeedPair {
            server: format!("fixed-server-{}", self.rounds),
            client: format!("fixed-client-{}", self.rounds),
        };
        (seeds, crash_point)
    }
}
