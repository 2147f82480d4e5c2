//! Retry Controller - the pipeline driver.
//!
//! One reconstruction walks `Locating -> Reconstructing -> Emulating ->
//! Verified`, strictly sequentially: every stage's output is the next
//! stage's required input, so there is no safe parallelism inside a single
//! reconstruction.
//!
//! The single recoverable condition is a library fragment whose absence only
//! surfaces during execution. When the target emulation fails with the exact
//! missing-library log signature, the controller enters `Diagnosing`,
//! recovers the fragment hash from the log's stack dump, fetches its content,
//! and restarts the whole pipeline with the fragment added to the library
//! table (`Retrying`). Each round grows the table by exactly one entry, so
//! the loop terminates once the transaction's true dependency set is covered
//! or an unrelated failure occurs. Every other failure propagates untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use retracer_locator::ChainLocator;
use retracer_resolver::LibraryResolver;
use retracer_transport::ChainDataProvider;
use retracer_types::error::{Result, RetraceError};
use retracer_types::{
    ExecutionContext, ExecutionEngine, ExecutionInput, ExecutionResult, Hash256, LibraryTable,
};

use crate::replayer::replay;
use crate::trace::{assemble, state_update_matches, TraceReport};
use crate::vm_log::{missing_library_cell, MISSING_LIBRARY_EXIT_CODE};

/// Pipeline stage, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locating,
    Reconstructing,
    Emulating,
    Diagnosing,
    Retrying,
    Verified,
    Failed,
}

enum Attempt {
    Report(Box<TraceReport>),
    /// Target emulation hit the missing-library signature; retry with this
    /// fragment added.
    MissingFragment(Hash256),
}

/// Reconstructs and verifies historical transaction traces.
///
/// One `Retracer` may serve many concurrent reconstructions; the only state
/// shared between them is the resolver's optional read-only fragment cache.
pub struct Retracer {
    locator: ChainLocator,
    resolver: LibraryResolver,
    engine: Arc<dyn ExecutionEngine>,
}

impl Retracer {
    pub fn new(
        provider: Arc<dyn ChainDataProvider>,
        resolver: LibraryResolver,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        Self {
            locator: ChainLocator::new(provider),
            resolver,
            engine,
        }
    }

    /// Reconstruct the state behind `hash`, re-execute it, and verify the
    /// outcome. Runs to completion or failure; cancellation mid-flight is
    /// not supported.
    pub async fn trace(&self, hash: &Hash256) -> Result<TraceReport> {
        let mut extra: LibraryTable = BTreeMap::new();
        loop {
            match self.attempt(hash, &extra).await? {
                Attempt::Report(report) => return Ok(*report),
                Attempt::MissingFragment(fragment) => {
                    info!(stage = ?Stage::Retrying, fragment = %fragment, "fetching run-time library dependency");
                    let content = self.resolver.fetch(&fragment).await?;
                    extra.insert(fragment, content);
                }
            }
        }
    }

    async fn attempt(&self, hash: &Hash256, extra: &LibraryTable) -> Result<Attempt> {
        debug!(stage = ?Stage::Locating, hash = %hash, attempt_libraries = extra.len(), "starting attempt");
        let handle = self.locator.locate(hash).await?;
        let target = self.locator.transaction_details(&handle).await?;
        let round = self.locator.resolve_round(&target.block, &handle).await?;
        let mut preceding = self
            .locator
            .sibling_transactions(&handle, round.min_lt)
            .await?;
        preceding.reverse();

        debug!(
            stage = ?Stage::Reconstructing,
            preceding = preceding.len(),
            min_lt = round.min_lt,
            target_lt = handle.lt,
            "rebuilding pre-execution state"
        );
        let provider = self.locator.provider();
        // The last state settled before any transaction of this round.
        let pre_round_seqno = round.top_seqno.saturating_sub(1);
        let snapshot = provider
            .account_state(&handle.account, pre_round_seqno)
            .await?;
        let config = provider.config_for_block(round.top_seqno).await?;

        let pre_state = snapshot.decode()?;
        let original_code = pre_state.code().cloned();
        let deploy_code = target.record.in_msg.as_ref().and_then(|m| m.deploy_code());
        let scan = self.resolver.scan(&pre_state, deploy_code, extra).await?;

        let ctx = ExecutionContext {
            config,
            libraries: scan.libraries.clone(),
            rand_seed: round.rand_seed,
        };
        let replayed = replay(
            self.engine.as_ref(),
            snapshot,
            pre_state.balance,
            &preceding,
            &ctx,
        )
        .await?;

        debug!(stage = ?Stage::Emulating, lt = handle.lt, "executing target transaction");
        let input = ExecutionInput {
            snapshot: replayed.snapshot,
            message: target.record.in_msg.clone(),
            lt: target.record.lt,
            now: target.record.now,
        };
        match self.engine.execute(input, &ctx).await? {
            ExecutionResult::Success(success) => {
                let mut report = assemble(
                    &success,
                    replayed.balance,
                    self.engine.version(),
                    original_code,
                    scan.resolved_code,
                )?;
                report.state_update_hash_ok = state_update_matches(&success, &target.record);
                info!(
                    stage = ?Stage::Verified,
                    hash = %hash,
                    state_update_hash_ok = report.state_update_hash_ok,
                    "reconstruction complete"
                );
                Ok(Attempt::Report(Box::new(report)))
            }
            ExecutionResult::Failure(failure) => {
                if failure.exit_code == Some(MISSING_LIBRARY_EXIT_CODE) {
                    debug!(stage = ?Stage::Diagnosing, "inspecting execution log tail");
                    if let Some(cell) = missing_library_cell(&failure.vm_log) {
                        if let Some(fragment) = cell.library_ref_hash() {
                            if !scan.libraries.contains_key(&fragment) {
                                return Ok(Attempt::MissingFragment(fragment));
                            }
                            // Already provided and still failing: retrying
                            // cannot make progress.
                        }
                    }
                }
                debug!(stage = ?Stage::Failed, lt = target.record.lt, reason = %failure.reason, "target emulation failed");
                Err(RetraceError::EngineFailure {
                    lt: target.record.lt,
                    reason: failure.reason,
                    logs: failure.logs,
                    vm_log: failure.vm_log,
                })
            }
        }
    }
}
