//! Types shared by the crash round engine, its ledger, and the service that hosts them.
//!
//! Nothing in this crate performs I/O. The execution crate builds the deterministic
//! state machines on top of these types and the service crate persists and schedules them.

pub mod keys;
pub use keys::{BalanceKey, ChannelKey, KeyParseError, UserId};
pub mod ledger;
pub use ledger::{LedgerEvent, LogRecord, RECENT_MAX};
pub mod round;
pub use round::{Bet, Phase, RoundError, RoundView, SeedPair};
