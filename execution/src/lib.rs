//! Crash engine execution layer.
//!
//! This crate contains the deterministic pieces of the crash game: crash point
//! derivation, the multiplier curve, the ledger reducer, and the per-channel round
//! state machine. The service crate wraps them with persistence and timers.
//!
//! ## Determinism requirements
//! - Do not read the wall clock here; callers pass `now_ms`.
//! - Randomness only enters through a caller-supplied [`rand::Rng`] or [`CrashSource`].
//! - Iterate ordered collections so plans and snapshots are reproducible.

pub mod crash_point;
pub use crash_point::{choose, choose_for, CrashSource, RandomSeeds};
pub mod curve;
pub mod ledger_state;
pub use ledger_state::LedgerState;
pub mod round;
pub use round::{AutoCashBook, RoundState, RoundTiming, TickAction};

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
