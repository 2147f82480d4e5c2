//! HTTP transport for the tvm-retracer workspace.
//!
//! Three client families live here, all speaking JSON over HTTP via blocking
//! `ureq` agents that the async layer drives through `spawn_blocking`:
//!
//! - [`IndexClient`] - chain-data indexer (transactions, blocks, account
//!   state, configuration)
//! - [`LibraryClient`] - content provider for externally-referenced code
//!   fragments
//! - [`EmulatorClient`] - adapter implementing the execution-engine contract
//!   against a remote emulator service
//!
//! Raw provider payloads are decoded into the normalized `retracer-types`
//! shapes at this boundary; nothing above this crate sees provider JSON.

pub mod emulator;
pub mod index;
pub mod library;
pub mod network;
pub mod provider;

pub use emulator::{EmulatorClient, EmulatorConfig};
pub use index::{IndexClient, IndexConfig};
pub use library::{LibraryClient, LibraryProvider};
pub use provider::ChainDataProvider;
