//! Cell model: the bounded binary tree shape all on-chain values share.
//!
//! Every ledger record (account code, message bodies, the action register,
//! configuration) is carried as a tree of cells. A cell holds up to 1023
//! payload bits and up to four child references, plus an "exotic" marker for
//! cells that are pure references rather than inline content.
//!
//! The one exotic shape this workspace inspects is the **library reference**:
//! a cell of exactly 264 bits whose first 8 bits equal [`LIBRARY_CELL_TAG`],
//! followed by the 256-bit hash of the real code fragment. Resolving such a
//! reference requires a side-channel fetch (see `retracer-resolver`).
//!
//! Canonical wire carriage is BCS, wrapped in base64 where a textual form is
//! needed. Flat cells dumped by the execution engine's log are carried as raw
//! hex of their payload bytes.

use std::fmt;

use anyhow::{anyhow, bail, Result};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Maximum payload bits a single cell can carry.
pub const MAX_CELL_BITS: u16 = 1023;
/// Maximum child references per cell.
pub const MAX_CELL_REFS: usize = 4;
/// Leading 8-bit tag of a library-reference cell.
pub const LIBRARY_CELL_TAG: u8 = 2;
/// Exact payload size of a library-reference cell: 8 tag bits + 256 hash bits.
pub const LIBRARY_REF_BITS: u16 = 264;

/// 256-bit digest. Hex in human-readable encodings, raw bytes in BCS.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            bail!("expected 32 bytes, got {}", bytes.len());
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| anyhow!("invalid hash hex: {}", e))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HashVisitor;

        impl<'de> serde::de::Visitor<'de> for HashVisitor {
            type Value = Hash256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 32-byte hash as hex string or raw bytes")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Hash256, E> {
                Hash256::from_hex(v).map_err(E::custom)
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> std::result::Result<Hash256, E> {
                Hash256::from_slice(v).map_err(E::custom)
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Hash256, A::Error> {
                let mut bytes = Vec::with_capacity(32);
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Hash256::from_slice(&bytes).map_err(serde::de::Error::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HashVisitor)
        } else {
            deserializer.deserialize_bytes(HashVisitor)
        }
    }
}

/// One node of the on-chain cell tree.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Payload bytes; the final byte may be partially used per `bit_len`.
    data: Vec<u8>,
    /// Number of meaningful payload bits.
    bit_len: u16,
    /// Child cells, depth-first.
    refs: Vec<Cell>,
    /// Exotic cells are references/markers rather than inline content.
    exotic: bool,
}

impl Cell {
    /// Build an ordinary cell from whole payload bytes.
    pub fn ordinary(data: Vec<u8>, refs: Vec<Cell>) -> Result<Self> {
        let bits = data.len() * 8;
        if bits > MAX_CELL_BITS as usize {
            bail!("cell payload of {} bits exceeds {}", bits, MAX_CELL_BITS);
        }
        Self::with_bit_len(data, bits as u16, refs, false)
    }

    /// Build a cell with an explicit bit length and exotic marker.
    pub fn with_bit_len(data: Vec<u8>, bit_len: u16, refs: Vec<Cell>, exotic: bool) -> Result<Self> {
        if bit_len > MAX_CELL_BITS {
            bail!("cell payload of {} bits exceeds {}", bit_len, MAX_CELL_BITS);
        }
        if data.len() * 8 < bit_len as usize {
            bail!(
                "cell payload of {} bytes cannot hold {} bits",
                data.len(),
                bit_len
            );
        }
        if refs.len() > MAX_CELL_REFS {
            bail!("cell with {} refs exceeds {}", refs.len(), MAX_CELL_REFS);
        }
        Ok(Self {
            data,
            bit_len,
            refs,
            exotic,
        })
    }

    /// Build the library-reference cell pointing at `fragment_hash`.
    pub fn library_ref(fragment_hash: &Hash256) -> Self {
        let mut data = Vec::with_capacity(33);
        data.push(LIBRARY_CELL_TAG);
        data.extend_from_slice(fragment_hash.as_bytes());
        Self {
            data,
            bit_len: LIBRARY_REF_BITS,
            refs: Vec::new(),
            exotic: true,
        }
    }

    /// Classify this cell as a library reference.
    ///
    /// The rule is purely shape-based so it applies equally to cells decoded
    /// from account state and to flat cells recovered from an execution log
    /// stack dump: exactly 264 payload bits with a leading tag byte of 2.
    /// Returns the referenced fragment hash on a match.
    pub fn library_ref_hash(&self) -> Option<Hash256> {
        if self.bit_len != LIBRARY_REF_BITS {
            return None;
        }
        if self.data.len() < 33 || self.data[0] != LIBRARY_CELL_TAG {
            return None;
        }
        Hash256::from_slice(&self.data[1..33]).ok()
    }

    pub fn bit_len(&self) -> u16 {
        self.bit_len
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Cell] {
        &self.refs
    }

    pub fn is_exotic(&self) -> bool {
        self.exotic
    }

    /// Deterministic representation hash: descriptor bytes, payload, then the
    /// hashes of every child, in order.
    pub fn repr_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        let d1 = (self.refs.len() as u8) | ((self.exotic as u8) << 3);
        let d2 = ((self.bit_len / 8) as u8).wrapping_mul(2) + ((self.bit_len % 8 != 0) as u8);
        hasher.update([d1, d2]);
        hasher.update((self.bit_len).to_le_bytes());
        hasher.update(&self.data);
        for child in &self.refs {
            hasher.update(child.repr_hash().0);
        }
        Hash256(hasher.finalize().into())
    }

    /// Walk the tree depth-first, visiting this cell first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Cell)) {
        visit(self);
        for child in &self.refs {
            child.walk(visit);
        }
    }

    // ==================== Wire carriage ====================

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bcs::to_bytes(self).map_err(|e| anyhow!("failed to encode cell: {}", e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bcs::from_bytes(bytes).map_err(|e| anyhow!("failed to decode cell: {}", e))
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(encoded))
            .map_err(|e| anyhow!("invalid cell base64: {}", e))?;
        Self::from_bytes(&raw)
    }

    /// Parse a flat cell from the raw payload hex an engine log dump carries.
    ///
    /// Such dumps are reference-free; the bit length is the full byte width.
    pub fn from_raw_hex(s: &str) -> Result<Self> {
        let data = hex::decode(s.trim()).map_err(|e| anyhow!("invalid cell hex: {}", e))?;
        let bit_len = data.len() * 8;
        if bit_len > MAX_CELL_BITS as usize {
            bail!("cell hex of {} bits exceeds {}", bit_len, MAX_CELL_BITS);
        }
        Ok(Self {
            data,
            bit_len: bit_len as u16,
            refs: Vec::new(),
            exotic: false,
        })
    }

    pub fn to_raw_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cell{{{} bits, {} refs{}, {}}}",
            self.bit_len,
            self.refs.len(),
            if self.exotic { ", exotic" } else { "" },
            self.repr_hash()
        )
    }
}
