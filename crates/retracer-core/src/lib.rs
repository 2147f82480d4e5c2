//! Core reconstruction pipeline: replay, trace assembly, retry control.
//!
//! The pieces compose strictly downward:
//!
//! ```text
//! ChainLocator -> LibraryResolver -> replay() -> assemble()
//!        ^                                           |
//!        '----------- Retracer (retry loop) ---------'
//! ```
//!
//! [`Retracer`] is the entry point for callers: give it a chain-data
//! provider, a library resolver, and an execution engine, then ask it to
//! [`trace`](Retracer::trace) a transaction hash.

pub mod replayer;
pub mod retracer;
pub mod trace;
pub mod vm_log;

#[cfg(test)]
mod testing;

pub use replayer::{replay, ReplayOutcome};
pub use retracer::Retracer;
pub use trace::{assemble, state_update_matches, ComputeInfo, ComputeSummary, MoneyFlow, TraceReport};
pub use vm_log::{missing_library_cell, MISSING_LIBRARY_EXIT_CODE};
