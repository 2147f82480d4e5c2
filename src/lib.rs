//! tvm-retracer: historical transaction replay and trace verification.
//!
//! Reconstructs the exact pre-execution state of an account at the moment a
//! historical transaction ran, re-executes the transaction against an
//! external deterministic emulator, and cross-checks the result against the
//! on-chain outcome.
//!
//! This crate is a thin facade over the workspace members:
//!
//! - [`retracer_types`] - ledger/engine types and the error taxonomy
//! - [`retracer_transport`] - indexer, library, and emulator HTTP clients
//! - [`retracer_locator`] - transaction -> replay-coordinate resolution
//! - [`retracer_resolver`] - library-cell detection and fetching
//! - [`retracer_core`] - replay, trace assembly, and the retry pipeline
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tvm_retracer::{
//!     EmulatorClient, EmulatorConfig, IndexClient, IndexConfig, LibraryClient,
//!     LibraryResolver, Retracer,
//! };
//!
//! let index = Arc::new(IndexClient::new(IndexConfig::from_env()));
//! let resolver = LibraryResolver::new(vec![Arc::new(LibraryClient::new(
//!     "primary",
//!     "https://lib.mainnet.tvmscan.io/api/v1",
//! ))]);
//! let engine = Arc::new(EmulatorClient::new(EmulatorConfig::from_env()));
//!
//! let retracer = Retracer::new(index, resolver, engine);
//! let report = retracer.trace(&tx_hash).await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub use retracer_core::{
    assemble, missing_library_cell, replay, ComputeInfo, ComputeSummary, MoneyFlow, ReplayOutcome,
    Retracer, TraceReport, MISSING_LIBRARY_EXIT_CODE,
};
pub use retracer_locator::ChainLocator;
pub use retracer_resolver::{FragmentCache, LibraryResolver, LibraryScan};
pub use retracer_transport::{
    ChainDataProvider, EmulatorClient, EmulatorConfig, IndexClient, IndexConfig, LibraryClient,
    LibraryProvider,
};
pub use retracer_types::{
    AccountAddress, AccountState, AccountStatus, Cell, ConsensusRoundBound, ExecutionContext,
    ExecutionEngine, ExecutionInput, ExecutionResult, Hash256, LibraryTable, Message, RetraceError,
    StateSnapshot, TransactionRecord, TxHandle,
};
