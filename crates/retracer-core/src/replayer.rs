//! State Replayer - sequential re-execution of preceding transactions.
//!
//! Rebuilds the account's pre-execution state by folding the engine over
//! every transaction of the round that precedes the target, oldest first.
//! Each step consumes one snapshot and produces exactly one successor; the
//! balance is re-derived from the produced snapshot after every step rather
//! than accumulated arithmetically, so fee and forward-value nuances the
//! caller does not model cannot drift.
//!
//! Replay is all-or-nothing: the first non-success outcome aborts the whole
//! reconstruction with the failing transaction's logical time and both log
//! streams. There is no retry at this layer.

use tracing::debug;

use retracer_types::error::{Result, RetraceError};
use retracer_types::{
    ExecutionContext, ExecutionEngine, ExecutionInput, ExecutionResult, StateSnapshot,
    TransactionRecord,
};

/// Result of folding the engine over the preceding transactions.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub snapshot: StateSnapshot,
    pub balance: u128,
}

/// Replay `transactions` (oldest -> newest) on top of `start`.
///
/// An empty sequence is a no-op returning the inputs unchanged. The sequence
/// must be strictly increasing in logical time; anything else would rebuild
/// a state that never existed on chain and is rejected outright.
pub async fn replay(
    engine: &dyn ExecutionEngine,
    start: StateSnapshot,
    start_balance: u128,
    transactions: &[TransactionRecord],
    ctx: &ExecutionContext,
) -> Result<ReplayOutcome> {
    for pair in transactions.windows(2) {
        if pair[0].lt >= pair[1].lt {
            return Err(RetraceError::IntegrityViolation(format!(
                "replay sequence out of order: lt {} precedes lt {}",
                pair[0].lt, pair[1].lt
            )));
        }
    }

    let mut snapshot = start;
    let mut balance = start_balance;

    for tx in transactions {
        let input = ExecutionInput {
            snapshot: snapshot.clone(),
            message: tx.in_msg.clone(),
            lt: tx.lt,
            now: tx.now,
        };
        match engine.execute(input, ctx).await? {
            ExecutionResult::Success(success) => {
                snapshot = success.snapshot;
                balance = snapshot.decode()?.balance;
                debug!(lt = tx.lt, balance = balance, "replayed preceding transaction");
            }
            ExecutionResult::Failure(failure) => {
                return Err(RetraceError::EngineFailure {
                    lt: tx.lt,
                    reason: failure.reason,
                    logs: failure.logs,
                    vm_log: failure.vm_log,
                });
            }
        }
    }

    Ok(ReplayOutcome { snapshot, balance })
}
