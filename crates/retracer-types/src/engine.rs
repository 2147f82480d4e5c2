//! Execution-engine contract.
//!
//! The engine is an external deterministic virtual-machine emulator; this
//! workspace never re-implements its semantics. It is invoked once per
//! replayed transaction with a state snapshot, the inbound message, the
//! round's configuration/seed, and the active library table, and returns
//! either a success payload or a failure.
//!
//! Implementations: `retracer-transport::EmulatorClient` speaks to a remote
//! emulator service; tests inject scripted fakes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::account::StateSnapshot;
use crate::cell::{Cell, Hash256};
use crate::message::Message;
use crate::transaction::TransactionRecord;

/// Code fragments available to the engine, keyed by fragment hash.
///
/// Owned exclusively by one reconstruction attempt; the retry controller
/// grows it by at most one entry per round.
pub type LibraryTable = BTreeMap<Hash256, Cell>;

/// Per-round context shared by every engine invocation of one reconstruction.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Global configuration valid for the round's top-level block.
    pub config: Cell,
    pub libraries: LibraryTable,
    pub rand_seed: Hash256,
}

/// Inputs for a single engine invocation.
#[derive(Debug, Clone)]
pub struct ExecutionInput {
    pub snapshot: StateSnapshot,
    /// Inbound message; storage-only transactions carry none.
    pub message: Option<Message>,
    pub lt: u64,
    pub now: u32,
}

/// Success payload: the successor snapshot plus everything needed to build
/// and verify a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSuccess {
    pub snapshot: StateSnapshot,
    /// The transaction the engine produced, including its state update.
    pub transaction: TransactionRecord,
    /// Raw action register, when the compute phase left one.
    pub actions: Option<Cell>,
    /// Engine event log.
    pub logs: String,
    /// Instruction-level virtual machine log.
    pub vm_log: String,
}

/// Failure payload. `exit_code` is present when the virtual machine ran far
/// enough to terminate with one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub reason: String,
    pub exit_code: Option<i32>,
    pub logs: String,
    pub vm_log: String,
}

/// Tagged outcome of one engine invocation. Produced exactly once per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionResult {
    Success(Box<ExecutionSuccess>),
    Failure(ExecutionFailure),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }
}

/// The deterministic execution engine boundary.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Execute one transaction's worth of work against `input.snapshot`.
    async fn execute(
        &self,
        input: ExecutionInput,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<ExecutionResult>;

    /// Engine build identifier, embedded in every trace report.
    fn version(&self) -> String;
}
