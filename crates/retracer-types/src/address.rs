//! Account address parsing and formatting.
//!
//! Addresses are carried in raw form, `workchain:hex`, e.g.
//! `0:3333333333333333333333333333333333333333333333333333333333333333`.
//! Provider payloads are normalized through [`AccountAddress::parse`] at the
//! transport boundary so the rest of the workspace only ever compares typed
//! values.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::cell::Hash256;

/// Raw-form account address: workchain id plus the 256-bit account id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountAddress {
    pub workchain: i32,
    pub account: Hash256,
}

impl AccountAddress {
    pub fn new(workchain: i32, account: Hash256) -> Self {
        Self { workchain, account }
    }

    /// Parse a raw-form address, tolerating an optional `0x` on the hex part.
    pub fn parse(s: &str) -> Result<Self> {
        let (wc, rest) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("address missing workchain separator: {}", s))?;
        let workchain: i32 = wc
            .parse()
            .map_err(|_| anyhow!("invalid workchain in address: {}", s))?;
        let hex_part = rest.strip_prefix("0x").unwrap_or(rest);
        if hex_part.len() != 64 {
            bail!("account id must be 64 hex chars, got {}", hex_part.len());
        }
        let account = Hash256::from_hex(hex_part)?;
        Ok(Self { workchain, account })
    }
}

impl FromStr for AccountAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, self.account.to_hex())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self)
    }
}
