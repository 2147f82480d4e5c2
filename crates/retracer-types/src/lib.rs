//! Shared types for the tvm-retracer workspace.
//!
//! This crate provides foundational types used across multiple crates in the
//! workspace, breaking circular dependency chains.
//!
//! ## Ledger Types
//!
//! - [`Cell`] - bounded binary tree node, the universal on-chain value shape
//! - [`AccountAddress`] / [`AccountState`] / [`StateSnapshot`] - account storage
//! - [`Message`] / [`TransactionRecord`] - normalized chain records
//! - [`TxHandle`] / [`ConsensusRoundBound`] - replay coordinates
//!
//! ## Engine Contract
//!
//! The [`engine`] module defines the interface to the external deterministic
//! execution engine. The engine itself lives outside this workspace; callers
//! inject an implementation (see `retracer-transport::EmulatorClient`).

pub mod account;
pub mod address;
pub mod cell;
pub mod engine;
pub mod env_utils;
pub mod error;
pub mod message;
pub mod transaction;

pub use account::{AccountState, AccountStatus, StateSnapshot};
pub use address::AccountAddress;
pub use cell::{Cell, Hash256, LIBRARY_CELL_TAG, LIBRARY_REF_BITS};
pub use engine::{
    ExecutionContext, ExecutionEngine, ExecutionFailure, ExecutionInput, ExecutionResult,
    ExecutionSuccess, LibraryTable,
};
pub use error::{Result, RetraceError};
pub use message::{Message, OutAction, StateInit};
pub use transaction::{
    AccountBlockRange, ActionPhase, BlockIdent, BlockRef, ChainTransaction, ComputePhase,
    ConsensusRoundBound, ShardBlock, ShardDescr, StateUpdate, TopBlock, TransactionRecord,
    TxDescription, TxHandle, VmComputePhase,
};

use std::time::Duration;

/// Configuration for retry behavior on network operations.
#[derive(Debug, Copy, Clone)]
pub struct RetryConfig {
    /// Number of retry attempts.
    pub retries: usize,
    /// Initial backoff duration between retries.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Create a new RetryConfig with the specified parameters.
    pub fn new(retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 4,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(5000),
        }
    }
}
