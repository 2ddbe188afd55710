use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity of a player as issued by the front end.
pub type UserId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("expected {expected} ':'-separated parts (got {got}): {value}")]
    WrongArity {
        expected: usize,
        got: usize,
        value: String,
    },
    #[error("key part must not be empty: {0}")]
    EmptyPart(String),
}

/// A channel inside a guild. Rounds and recent-crash history are scoped to one channel.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    pub guild: String,
    pub channel: String,
}

impl ChannelKey {
    pub fn new(guild: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            guild: guild.into(),
            channel: channel.into(),
        }
    }

    /// Balance key for `user` in this channel.
    pub fn user(&self, user: &str) -> BalanceKey {
        BalanceKey {
            guild: self.guild.clone(),
            channel: self.channel.clone(),
            user: user.to_string(),
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.guild, self.channel)
    }
}

impl FromStr for ChannelKey {
    type Err = KeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let [guild, channel] = split_parts::<2>(value)?;
        Ok(Self::new(guild, channel))
    }
}

/// Key of a single balance record: one user in one channel of one guild.
///
/// Balances are not shared across channels, so the same user holds an independent
/// balance in every channel they play in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BalanceKey {
    pub guild: String,
    pub channel: String,
    pub user: UserId,
}

impl BalanceKey {
    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(self.guild.clone(), self.channel.clone())
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.guild, self.channel, self.user)
    }
}

impl FromStr for BalanceKey {
    type Err = KeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let [guild, channel, user] = split_parts::<3>(value)?;
        Ok(Self {
            guild: guild.to_string(),
            channel: channel.to_string(),
            user: user.to_string(),
        })
    }
}

// Keys persist as their flat text form so snapshot maps can key on them.
macro_rules! impl_text_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_text_serde!(ChannelKey);
impl_text_serde!(BalanceKey);

fn split_parts<const N: usize>(value: &str) -> Result<[&str; N], KeyParseError> {
    let parts: Vec<&str> = value.split(':').collect();
    let parts: [&str; N] = parts.try_into().map_err(|parts: Vec<&str>| KeyParseError::WrongArity {
        expected: N,
        got: parts.len(),
        value: value.to_string(),
    })?;
    if parts.iter().any(|part| part.is_empty()) {
        return Err(KeyParseError::EmptyPart(value.to_string()));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_key_text_form() {
        let key = ChannelKey::new("g1", "c1").user("u1");
        assert_eq!(key.to_string(), "g1:c1:u1");
        assert_eq!("g1:c1:u1".parse::<BalanceKey>().unwrap(), key);
        assert_eq!(key.channel_key(), ChannelKey::new("g1", "c1"));
    }

    #[test]
    fn test_key_parse_rejects_bad_arity() {
        assert_eq!(
            "g1:c1".parse::<BalanceKey>(),
            Err(KeyParseError::WrongArity {
                expected: 3,
                got: 2,
                value: "g1:c1".to_string()
            })
        );
        assert!("g1::u1".parse::<BalanceKey>().is_err());
        assert!("g1:c1:u1".parse::<ChannelKey>().is_err());
    }

    #[test]
    fn test_balance_key_serializes_as_string() {
        let key = ChannelKey::new("g", "c").user("u");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"g:c:u\"");
        let decoded: BalanceKey = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, key);
    }
}
