use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::{ChannelKey, UserId};

/// Lifecycle phase of a channel's round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No tick loop is driving the round.
    Idle,
    /// Accepting joins until the countdown deadline.
    Countdown,
    /// Multiplier is climbing; cashouts are accepted.
    Running,
    /// Crash point reached; the next countdown starts after a short hold.
    Crashed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Countdown => "countdown",
            Phase::Running => "running",
            Phase::Crashed => "crashed",
        }
    }

    /// Joins are accepted while the round has not launched.
    pub fn accepts_joins(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Countdown)
    }
}

/// A user's escrowed stake for the current round.
///
/// `amount` has already been debited from the user's balance when the bet exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub amount: u64,
    pub joined_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cashed_at: Option<f64>,
}

impl Bet {
    pub fn new(amount: u64, joined_at_ms: u64) -> Self {
        Self {
            amount,
            joined_at_ms,
            cashed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.cashed_at.is_none()
    }

    /// Credit owed for cashing out at `multiplier`. Fractions of a unit are forfeited.
    pub fn payout_at(&self, multiplier: f64) -> u64 {
        // `as` saturates for out-of-range floats.
        (self.amount as f64 * multiplier).floor() as u64
    }
}

/// Server and client seed a round's crash point was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPair {
    pub server: String,
    pub client: String,
}

/// What the render/display collaborator reads once per tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub channel: ChannelKey,
    pub round_id: u64,
    pub phase: Phase,
    /// Seconds until launch; zero outside the countdown.
    pub seconds_left: f64,
    pub multiplier: f64,
    /// Only revealed once the round has crashed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    /// Only revealed once the round has crashed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<SeedPair>,
    pub joined: Vec<UserId>,
    /// Most recent first.
    pub recent: Vec<f64>,
}

/// Rejections a round reports to its caller. None of them change state.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RoundError {
    #[error("round already running")]
    AlreadyRunning,
    #[error("bet amount must be at least 1")]
    InvalidAmount,
    #[error("insufficient balance (balance={balance}, amount={amount})")]
    InsufficientBalance { balance: u64, amount: u64 },
    #[error("already joined this round")]
    AlreadyJoined,
    #[error("not in this round")]
    NotInRound,
    #[error("already cashed out")]
    AlreadyCashed,
    #[error("round is not running")]
    NotRunning,
    #[error("round already crashed")]
    RoundCrashed,
    #[error("auto cashout target must be a finite value >= 1.01 (got {0})")]
    InvalidTarget(f64),
    #[error("only the channel host can set balances for other users")]
    NotHost,
}

impl RoundError {
    /// Stable machine-readable code for front ends.
    pub fn code(&self) -> &'static str {
        match self {
            RoundError::AlreadyRunning => "ALREADY_RUNNING",
            RoundError::InvalidAmount => "INVALID_AMOUNT",
            RoundError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            RoundError::AlreadyJoined => "ALREADY_JOINED",
            RoundError::NotInRound => "NOT_IN_ROUND",
            RoundError::AlreadyCashed => "ALREADY_CASHED",
            RoundError::NotRunning => "NOT_RUNNING",
            RoundError::RoundCrashed => "ROUND_CRASHED",
            RoundError::InvalidTarget(_) => "INVALID_TARGET",
            RoundError::NotHost => "NOT_HOST",
        }
    }
}
