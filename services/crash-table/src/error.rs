use crash_types::{ChannelKey, RoundError};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error("ledger unavailable: {0}")]
    Durability(#[from] LedgerError),
    #[error("no round set up for channel {0}")]
    NotFound(ChannelKey),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Round(err) => err.code(),
            EngineError::Durability(_) => "DURABILITY",
            EngineError::NotFound(_) => "NOT_FOUND",
        }
    }

    pub fn as_round(&self) -> Option<&RoundError> {
        match self {
            EngineError::Round(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of a front end command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            code: None,
            message: message.into(),
        }
    }

    pub fn rejected(err: &EngineError) -> Self {
        Self {
            ok: false,
            code: Some(err.code()),
            message: err.to_string(),
        }
    }

    pub fn from_result(result: Result<String, EngineError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(err) => Self::rejected(&err),
        }
    }
}
