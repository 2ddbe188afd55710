//! Crash table service.
//!
//! Hosts one crash round per channel on top of a durable balance ledger:
//! - [`ledger`]: append-only log + snapshot persistence for balances and crash history
//! - [`round`]: per-channel actor driving the round state machine from a fixed-rate tick
//! - [`registry`]: channel to round map shared by every front end
//! - [`http`]: JSON command surface for driving rounds without a chat client

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod registry;
pub mod render;
pub mod round;

pub use clock::{Clock, SystemClock};
pub use config::{build_config, Args, ConfigError, EngineConfig};
pub use error::{EngineError, Reply};
pub use ledger::{Ledger, LedgerError};
pub use registry::RoundRegistry;
pub use render::{RenderSink, TracingSink};
pub use round::{ChannelSettings, Round, RoundContext};
