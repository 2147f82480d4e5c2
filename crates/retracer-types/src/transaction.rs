//! Normalized chain records: transactions, block coordinates, round bounds.
//!
//! These are the shapes every component above the transport boundary works
//! with. Provider payloads never escape `retracer-transport`; they are decoded
//! into these types exactly once, per response shape.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::AccountAddress;
use crate::cell::Hash256;
use crate::message::Message;

/// Coordinates of one sub-chain (shard) block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockIdent {
    pub workchain: i32,
    pub shard: u64,
    pub seqno: u32,
}

impl fmt::Display for BlockIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{:016x},{})", self.workchain, self.shard, self.seqno)
    }
}

/// Block coordinates plus the root hash that pins their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub ident: BlockIdent,
    pub root_hash: Hash256,
}

/// A resolved sub-chain block, including the top-level block that seals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardBlock {
    pub ident: BlockIdent,
    pub root_hash: Hash256,
    /// Sequence number of the enclosing top-level block.
    pub master_seqno: u32,
}

/// Per-account logical-time span inside one shard summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBlockRange {
    pub account: AccountAddress,
    pub min_lt: u64,
    pub max_lt: u64,
}

/// One shard summary inside a top-level block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescr {
    pub ident: BlockIdent,
    pub root_hash: Hash256,
    pub account_blocks: Vec<AccountBlockRange>,
}

/// A full top-level (consensus round) block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopBlock {
    pub seqno: u32,
    pub root_hash: Hash256,
    /// Shared random seed for every transaction settled in this round.
    pub rand_seed: Hash256,
    pub gen_utime: u32,
    pub shards: Vec<ShardDescr>,
}

/// Execution context shared by all of one account's transactions in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRoundBound {
    pub top_seqno: u32,
    pub rand_seed: Hash256,
    /// Earliest logical time for the account inside the round.
    pub min_lt: u64,
}

/// Unique handle for a transaction on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    pub account: AccountAddress,
    pub lt: u64,
    pub hash: Hash256,
}

/// Old/new account state hashes a transaction commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub old: Hash256,
    pub new: Hash256,
}

/// Compute-phase outcome of a generic transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputePhase {
    Skipped { reason: String },
    Vm(VmComputePhase),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmComputePhase {
    pub success: bool,
    pub exit_code: i32,
    pub vm_steps: u32,
    pub gas_used: u64,
    pub gas_fees: u128,
}

/// Action-phase outcome, present when the compute phase produced actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPhase {
    pub success: bool,
    pub result_code: i32,
    pub total_actions: u32,
}

/// Transaction description. Only the generic shape is replayable; everything
/// else (tick-tock, split, merge) is surfaced as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxDescription {
    Generic {
        compute: ComputePhase,
        action: Option<ActionPhase>,
        aborted: bool,
    },
    Other { kind: String },
}

/// A fully decoded on-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub account: AccountAddress,
    pub lt: u64,
    pub hash: Hash256,
    /// Unix timestamp the block assigned to this transaction.
    pub now: u32,
    pub in_msg: Option<Message>,
    pub out_msgs: Vec<Message>,
    pub total_fees: u128,
    pub state_update: StateUpdate,
    pub description: TxDescription,
}

impl TransactionRecord {
    pub fn handle(&self) -> TxHandle {
        TxHandle {
            account: self.account,
            lt: self.lt,
            hash: self.hash,
        }
    }

    /// Sum of outgoing internal-message values; external emissions count zero.
    pub fn sent_total(&self) -> u128 {
        self.out_msgs.iter().map(|m| m.value()).sum()
    }
}

/// A transaction record together with the block it was settled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub record: TransactionRecord,
    pub block: BlockRef,
}
