//! Message shapes and the decoded action register.

use serde::{Deserialize, Serialize};

use crate::address::AccountAddress;
use crate::cell::{Cell, Hash256};

/// Code/data bundle carried by a deploying message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInit {
    pub code: Option<Cell>,
    pub data: Option<Cell>,
}

/// A ledger message.
///
/// Only internal messages carry value and a sender; external-in messages are
/// requests injected from outside the ledger, external-out messages are
/// event-style emissions with no destination account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Internal {
        src: AccountAddress,
        dst: AccountAddress,
        value: u128,
        bounce: bool,
        body: Option<Cell>,
        state_init: Option<StateInit>,
        created_lt: u64,
        fwd_fee: u128,
    },
    ExternalIn {
        dst: AccountAddress,
        body: Option<Cell>,
        state_init: Option<StateInit>,
    },
    ExternalOut {
        src: AccountAddress,
        body: Option<Cell>,
        created_lt: u64,
    },
}

impl Message {
    pub fn is_internal(&self) -> bool {
        matches!(self, Message::Internal { .. })
    }

    /// Attached value; zero for both external shapes regardless of payload.
    pub fn value(&self) -> u128 {
        match self {
            Message::Internal { value, .. } => *value,
            _ => 0,
        }
    }

    pub fn source(&self) -> Option<&AccountAddress> {
        match self {
            Message::Internal { src, .. } => Some(src),
            Message::ExternalOut { src, .. } => Some(src),
            Message::ExternalIn { .. } => None,
        }
    }

    pub fn destination(&self) -> Option<&AccountAddress> {
        match self {
            Message::Internal { dst, .. } => Some(dst),
            Message::ExternalIn { dst, .. } => Some(dst),
            Message::ExternalOut { .. } => None,
        }
    }

    /// Deployment code carried by this message, if any.
    pub fn deploy_code(&self) -> Option<&Cell> {
        match self {
            Message::Internal { state_init, .. } | Message::ExternalIn { state_init, .. } => {
                state_init.as_ref().and_then(|init| init.code.as_ref())
            }
            Message::ExternalOut { .. } => None,
        }
    }
}

/// One entry of the action register a compute phase leaves behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutAction {
    SendMessage { mode: u8, message: Message },
    SetCode { code_hash: Hash256 },
    ReserveCurrency { mode: u8, value: u128 },
}

/// Bytes of register payload carried per cell in the chain.
const REGISTER_CHUNK_BYTES: usize = 127;

/// Decode the action register cell into its action list.
///
/// The register is a chain of cells linked through the first reference, whose
/// concatenated payload is the canonical BCS encoding of the list. An absent
/// register is represented by the caller passing `None` and decodes to empty.
pub fn decode_actions(register: Option<&Cell>) -> anyhow::Result<Vec<OutAction>> {
    let Some(mut cell) = register else {
        return Ok(Vec::new());
    };
    let mut payload = Vec::new();
    loop {
        payload.extend_from_slice(cell.data());
        match cell.refs().first() {
            Some(next) => cell = next,
            None => break,
        }
    }
    bcs::from_bytes(&payload).map_err(|e| anyhow::anyhow!("failed to decode action register: {}", e))
}

/// Encode an action list into a register cell chain.
pub fn encode_actions(actions: &[OutAction]) -> anyhow::Result<Cell> {
    let payload =
        bcs::to_bytes(actions).map_err(|e| anyhow::anyhow!("failed to encode actions: {}", e))?;
    let mut tail: Option<Cell> = None;
    for chunk in payload.chunks(REGISTER_CHUNK_BYTES).rev() {
        let refs = tail.take().map(|c| vec![c]).unwrap_or_default();
        tail = Some(Cell::ordinary(chunk.to_vec(), refs)?);
    }
    match tail {
        Some(cell) => Ok(cell),
        None => Cell::ordinary(Vec::new(), Vec::new()),
    }
}
