//! Event-sourced ledger state.
//!
//! [`LedgerState::apply`] is the only function that mutates balances. Live appends,
//! startup replay, and tests all go through it, so there is exactly one definition of
//! what an event means.
//!
//! ## Replay invariant
//! Records carry a sequence number and the state remembers the highest one it has
//! folded in (`last_seq`). [`LedgerState::apply_record`] ignores anything at or below
//! it, which makes replaying a log that overlaps a snapshot a no-op for the overlap.

use crash_types::{BalanceKey, ChannelKey, LedgerEvent, LogRecord, RECENT_MAX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Per-user balance record as stored in snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub balance: u64,
}

/// Whole ledger state. Serialized as-is to form a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub last_seq: u64,
    #[serde(default)]
    pub users: BTreeMap<BalanceKey, UserRecord>,
    #[serde(default)]
    pub recent: BTreeMap<ChannelKey, VecDeque<f64>>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single event. Pure with respect to everything but `self`.
    pub fn apply(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Set { k, balance } => {
                self.users.insert(k.clone(), UserRecord { balance: *balance });
            }
            LedgerEvent::Debit { k, amount } => {
                let record = self.users.entry(k.clone()).or_default();
                record.balance = record.balance.saturating_sub(*amount);
            }
            LedgerEvent::Credit { k, amount } => {
                let record = self.users.entry(k.clone()).or_default();
                record.balance = record.balance.saturating_add(*amount);
            }
            LedgerEvent::RecentPush { kc, mult } => {
                let history = self.recent.entry(kc.clone()).or_default();
                history.push_front(*mult);
                history.truncate(RECENT_MAX);
            }
        }
    }

    /// Apply a logged record unless this state already reflects it.
    ///
    /// Returns whether the record was applied.
    pub fn apply_record(&mut self, record: &LogRecord) -> bool {
        if record.seq <= self.last_seq {
            return false;
        }
        self.apply(&record.event);
        self.last_seq = record.seq;
        true
    }

    /// Cached balance; zero for keys never referenced.
    pub fn balance(&self, key: &BalanceKey) -> u64 {
        self.users.get(key).map(|record| record.balance).unwrap_or(0)
    }

    pub fn contains(&self, key: &BalanceKey) -> bool {
        self.users.contains_key(key)
    }

    /// Recent crash multipliers for a channel, most recent first.
    pub fn recent(&self, channel: &ChannelKey) -> Vec<f64> {
        self.recent
            .get(channel)
            .map(|history| history.iter().copied().collect())
            .unwrap_or_default()
    }
}
