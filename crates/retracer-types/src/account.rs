//! Account storage and the opaque state snapshot blob.
//!
//! A [`StateSnapshot`] is the unit the execution engine consumes and produces.
//! It is treated as an append-only version chain: each replay step takes one
//! snapshot and yields exactly one successor, and nothing ever mutates a
//! snapshot in place. Components that need a field (balance, code) go through
//! [`StateSnapshot::decode`] explicitly; no internal layout is assumed
//! anywhere else.

use std::fmt;

use anyhow::{anyhow, Result};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::cell::{Cell, Hash256};

/// Decoded account storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Balance in minimal currency units.
    pub balance: u128,
    pub status: AccountStatus,
    /// Logical time of the last transaction applied to this account.
    pub last_lt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Address has received funds but carries no code yet.
    Uninit,
    Active {
        code: Cell,
        data: Cell,
    },
    /// Storage debt froze the account; only the state hash survives.
    Frozen { state_hash: Hash256 },
}

impl AccountState {
    /// The account's active code cell, if any.
    pub fn code(&self) -> Option<&Cell> {
        match &self.status {
            AccountStatus::Active { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Opaque serialized account state.
///
/// The payload is the canonical BCS encoding of [`AccountState`]; everything
/// outside this module treats it as a blob keyed by its [`state_hash`].
///
/// [`state_hash`]: StateSnapshot::state_hash
#[derive(Clone, PartialEq, Eq)]
pub struct StateSnapshot(Vec<u8>);

impl StateSnapshot {
    pub fn encode(state: &AccountState) -> Result<Self> {
        let bytes =
            bcs::to_bytes(state).map_err(|e| anyhow!("failed to encode account state: {}", e))?;
        Ok(Self(bytes))
    }

    pub fn decode(&self) -> Result<AccountState> {
        bcs::from_bytes(&self.0).map_err(|e| anyhow!("failed to decode account state: {}", e))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(encoded))
            .map_err(|e| anyhow!("invalid snapshot base64: {}", e))?;
        Ok(Self(raw))
    }

    /// Digest of the serialized storage, used to cross-check a re-executed
    /// transaction against the authoritative on-chain record.
    pub fn state_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        Hash256(hasher.finalize().into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateSnapshot({} bytes, {})", self.0.len(), self.state_hash())
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for StateSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> serde::de::Visitor<'de> for SnapshotVisitor {
            type Value = StateSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a state snapshot as base64 string or raw bytes")
            }

            fn visit_str<E: serde::de::Error>(
                self,
                v: &str,
            ) -> std::result::Result<StateSnapshot, E> {
                StateSnapshot::from_base64(v).map_err(E::custom)
            }

            fn visit_bytes<E: serde::de::Error>(
                self,
                v: &[u8],
            ) -> std::result::Result<StateSnapshot, E> {
                Ok(StateSnapshot(v.to_vec()))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<StateSnapshot, A::Error> {
                let mut bytes = Vec::new();
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Ok(StateSnapshot(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(SnapshotVisitor)
        } else {
            deserializer.deserialize_bytes(SnapshotVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_state() -> AccountState {
        AccountState {
            balance: 1_500_000_000,
            status: AccountStatus::Active {
                code: Cell::ordinary(vec![0xA1, 0xB2], Vec::new()).unwrap(),
                data: Cell::ordinary(vec![0x01], Vec::new()).unwrap(),
            },
            last_lt: 42_000_001,
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let state = active_state();
        let snapshot = StateSnapshot::encode(&state).unwrap();
        let decoded = snapshot.decode().unwrap();
        assert_eq!(decoded.balance, state.balance);
        assert_eq!(decoded.last_lt, state.last_lt);
        // Code/data references must survive bit-for-bit.
        assert_eq!(decoded.status, state.status);
    }

    #[test]
    fn test_state_hash_tracks_content() {
        let snap_a = StateSnapshot::encode(&active_state()).unwrap();
        let mut other = active_state();
        other.balance += 1;
        let snap_b = StateSnapshot::encode(&other).unwrap();
        assert_ne!(snap_a.state_hash(), snap_b.state_hash());

        let snap_c = StateSnapshot::encode(&active_state()).unwrap();
        assert_eq!(snap_a.state_hash(), snap_c.state_hash());
    }

    #[test]
    fn test_base64_carriage() {
        let snapshot = StateSnapshot::encode(&active_state()).unwrap();
        let restored = StateSnapshot::from_base64(&snapshot.to_base64()).unwrap();
        assert_eq!(snapshot, restored);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let snapshot = StateSnapshot::from_bytes(vec![0xFF; 7]);
        assert!(snapshot.decode().is_err());
    }

    #[test]
    fn test_snapshot_json_is_base64_string() {
        let snapshot = StateSnapshot::encode(&active_state()).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, format!("\"{}\"", snapshot.to_base64()));
        let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
