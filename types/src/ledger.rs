use serde::{Deserialize, Serialize};

use crate::keys::{BalanceKey, ChannelKey};

/// Maximum number of crash multipliers retained per channel for display.
pub const RECENT_MAX: usize = 9;

/// A single balance or history mutation.
///
/// Events are immutable once appended to the log. The log is the source of truth and
/// the in-memory balances are rebuilt by replaying it in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Absolute overwrite. Used for initialization and administrative correction.
    Set { k: BalanceKey, balance: u64 },
    /// Subtract `amount`, clamping the balance at zero.
    Debit { k: BalanceKey, amount: u64 },
    /// Add `amount`.
    Credit { k: BalanceKey, amount: u64 },
    /// Record a realized crash multiplier at the front of the channel history.
    RecentPush { kc: ChannelKey, mult: f64 },
}

impl LedgerEvent {
    /// Balance key touched by this event, if any.
    pub fn balance_key(&self) -> Option<&BalanceKey> {
        match self {
            LedgerEvent::Set { k, .. } | LedgerEvent::Debit { k, .. } | LedgerEvent::Credit { k, .. } => {
                Some(k)
            }
            LedgerEvent::RecentPush { .. } => None,
        }
    }
}

/// One line of the write-ahead log: an event stamped with its append sequence.
///
/// A snapshot remembers the last sequence it folded in, so replay after a crash between
/// writing the snapshot and truncating the log skips what the snapshot already holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub seq: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_record_line_format() {
        let record = LogRecord {
            seq: 7,
            event: LedgerEvent::Debit {
                k: ChannelKey::new("g", "c").user("u"),
                amount: 25,
            },
        };
        let line = serde_json::to_string(&record).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["seq"], 7);
        assert_eq!(value["type"], "debit");
        assert_eq!(value["k"], "g:c:u");
        assert_eq!(value["amount"], 25);

        let decoded: LogRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_recent_push_line_format() {
        let line = r#"{"seq":1,"type":"recent_push","kc":"g:c","mult":2.5}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();
        assert_eq!(
            record.event,
            LedgerEvent::RecentPush {
                kc: ChannelKey::new("g", "c"),
                mult: 2.5
            }
        );
        assert!(record.event.balance_key().is_none());
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let line = r#"{"seq":1,"type":"transfer","k":"g:c:u","amount":1}"#;
        assert!(serde_json::from_str::<LogRecord>(line).is_err());
    }
}
