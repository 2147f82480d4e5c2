//! Trace Assembler - turns one successful execution into a structured report.
//!
//! Money decoding is internal-message-only: external messages carry no value
//! and no sender, and outgoing external messages contribute nothing to
//! `sent_total`. Only generic transaction descriptions are supported; any
//! other shape is an unsupported input, not a best-effort decode.
//!
//! The integrity flag is set by the caller after comparing the produced
//! state hash with the on-chain record (see [`state_update_matches`]); a
//! mismatch flags the report, it never fails it.

use serde::Serialize;

use retracer_types::error::{Result, RetraceError};
use retracer_types::message::decode_actions;
use retracer_types::{
    AccountAddress, Cell, ComputePhase, ExecutionSuccess, Message, OutAction, TransactionRecord,
    TxDescription,
};

/// Money movement around the target transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoneyFlow {
    pub balance_before: u128,
    pub sent_total: u128,
    pub total_fees: u128,
    pub balance_after: u128,
}

/// Compute-phase summary: the literal string `"skipped"` when the phase was
/// skipped, a structured record otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeInfo {
    Skipped,
    Computed(ComputeSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComputeSummary {
    pub success: bool,
    pub exit_code: i32,
    pub vm_steps: u32,
    pub gas_used: u64,
    pub gas_fees: u128,
}

impl Serialize for ComputeInfo {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ComputeInfo::Skipped => serializer.serialize_str("skipped"),
            ComputeInfo::Computed(summary) => summary.serialize(serializer),
        }
    }
}

/// The final product of a reconstruction: one verified, replayable trace.
///
/// Constructed once at the end of a successful reconstruction; immutable
/// afterwards. Serializable for any downstream display or storage format.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    /// True when the re-executed state hash matches the on-chain record.
    pub state_update_hash_ok: bool,
    pub account: AccountAddress,
    /// Sender of the inbound message; absent for external requests.
    pub sender: Option<AccountAddress>,
    /// Value attached to the inbound message; zero for external requests.
    pub amount: u128,
    pub money: MoneyFlow,
    pub compute: ComputeInfo,
    pub actions: Vec<OutAction>,
    pub logs: String,
    pub vm_log: String,
    pub engine_version: String,
    /// Code the engine actually executed.
    pub code: Option<Cell>,
    /// The account's raw on-chain code; differs from `code` when the on-chain
    /// cell is a library reference.
    pub original_code: Option<Cell>,
}

/// Bit-exact comparison of the produced and on-chain resulting state hashes.
pub fn state_update_matches(success: &ExecutionSuccess, on_chain: &TransactionRecord) -> bool {
    success.transaction.state_update.new == on_chain.state_update.new
}

/// Build the report for one successful target execution.
///
/// `state_update_hash_ok` is initialized to `false`; the caller compares
/// state hashes and sets it.
pub fn assemble(
    success: &ExecutionSuccess,
    balance_before: u128,
    engine_version: String,
    original_code: Option<Cell>,
    resolved_code: Option<Cell>,
) -> Result<TraceReport> {
    let tx = &success.transaction;

    let (compute, action) = match &tx.description {
        TxDescription::Generic {
            compute, action, ..
        } => (compute, action),
        TxDescription::Other { kind } => {
            return Err(RetraceError::UnsupportedTransactionShape(kind.clone()));
        }
    };

    let balance_after = success.snapshot.decode()?.balance;

    let (sender, amount) = match &tx.in_msg {
        Some(Message::Internal { src, value, .. }) => (Some(*src), *value),
        _ => (None, 0),
    };

    let compute = match compute {
        ComputePhase::Skipped { .. } => ComputeInfo::Skipped,
        ComputePhase::Vm(vm) => {
            // A zero exit code with a failed action phase hides the real
            // failure signal; prefer the action-phase result code there.
            let exit_code = if vm.exit_code == 0 {
                action.map(|a| a.result_code).unwrap_or(0)
            } else {
                vm.exit_code
            };
            ComputeInfo::Computed(ComputeSummary {
                success: vm.success,
                exit_code,
                vm_steps: vm.vm_steps,
                gas_used: vm.gas_used,
                gas_fees: vm.gas_fees,
            })
        }
    };

    let actions = decode_actions(success.actions.as_ref())?;

    let code = resolved_code.or_else(|| original_code.clone());

    Ok(TraceReport {
        state_update_hash_ok: false,
        account: tx.account,
        sender,
        amount,
        money: MoneyFlow {
            balance_before,
            sent_total: tx.sent_total(),
            total_fees: tx.total_fees,
            balance_after,
        },
        compute,
        actions,
        logs: success.logs.clone(),
        vm_log: success.vm_log.clone(),
        engine_version,
        code,
        original_code,
    })
}
