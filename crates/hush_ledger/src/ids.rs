use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A `shard.realm.num` ledger entity: account, token or contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Long-zero EVM address: 4 bytes shard, 8 bytes realm, 8 bytes num,
    /// big-endian, hex encoded without a `0x` prefix.
    pub fn to_solidity_address(&self) -> Result<String, EntityIdError> {
        let shard = u32::try_from(self.shard).map_err(|_| EntityIdError::ShardOverflow(self.shard))?;
        let mut bytes = [0u8; 20];
        bytes[..4].copy_from_slice(&shard.to_be_bytes());
        bytes[4..12].copy_from_slice(&self.realm.to_be_bytes());
        bytes[12..].copy_from_slice(&self.num.to_be_bytes());
        Ok(hex::encode(bytes))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityIdError {
    #[error("expected an id of the form shard.realm.num, got {0:?}")]
    Malformed(String),

    #[error("invalid checksum suffix in {0:?}")]
    Checksum(String),

    #[error("shard {0} does not fit a solidity address")]
    ShardOverflow(u64),
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    /// Parses `shard.realm.num`, with an optional `-abcde` checksum suffix.
    /// The checksum is accepted but not verified.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = match trimmed.split_once('-') {
            Some((body, checksum)) => {
                if checksum.len() != 5 || !checksum.bytes().all(|b| b.is_ascii_lowercase()) {
                    return Err(EntityIdError::Checksum(s.to_string()));
                }
                body
            }
            None => trimmed,
        };

        let parts: Vec<&str> = body.split('.').collect();
        let [shard, realm, num] = parts.as_slice() else {
            return Err(EntityIdError::Malformed(s.to_string()));
        };
        let parse = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EntityIdError::Malformed(s.to_string()));
            }
            part.parse::<u64>().map_err(|_| EntityIdError::Malformed(s.to_string()))
        };

        Ok(Self::new(parse(shard)?, parse(realm)?, parse(num)?))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
