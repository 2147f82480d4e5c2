//! Scripted fakes shared by this crate's unit tests.

#![cfg(test)]

use std::collections::BTreeSet;

use anyhow::Result;
use parking_lot::Mutex;

use retracer_types::{
    AccountAddress, AccountState, AccountStatus, Cell, ComputePhase, ExecutionContext,
    ExecutionEngine, ExecutionFailure, ExecutionInput, ExecutionResult, ExecutionSuccess,
    Hash256, Message, StateSnapshot, StateUpdate, TransactionRecord, TxDescription,
    VmComputePhase,
};

pub fn test_address(fill: u8) -> AccountAddress {
    AccountAddress::new(0, Hash256([fill; 32]))
}

/// A minimal generic transaction at the given logical time.
pub fn stub_transaction(lt: u64) -> TransactionRecord {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&lt.to_le_bytes());
    TransactionRecord {
        account: test_address(0xAA),
        lt,
        hash: Hash256(hash),
        now: 1_700_000_000,
        in_msg: Some(Message::Internal {
            src: test_address(0xBB),
            dst: test_address(0xAA),
            value: 0,
            bounce: false,
            body: None,
            state_init: None,
            created_lt: lt.saturating_sub(1),
            fwd_fee: 0,
        }),
        out_msgs: Vec::new(),
        total_fees: 0,
        state_update: StateUpdate {
            old: Hash256([0; 32]),
            new: Hash256([0; 32]),
        },
        description: TxDescription::Generic {
            compute: ComputePhase::Vm(VmComputePhase {
                success: true,
                exit_code: 0,
                vm_steps: 1,
                gas_used: 1,
                gas_fees: 0,
            }),
            action: None,
            aborted: false,
        },
    }
}

/// Deterministic state transition used by [`FakeEngine`].
///
/// Chains the previous snapshot's hash into the successor's data cell, so a
/// different application order produces a different final state hash.
pub fn fold_state(prev: &StateSnapshot, lt: u64, fee: u128) -> AccountState {
    let prev_state = prev.decode().expect("fold over undecodable snapshot");
    let code = match &prev_state.status {
        AccountStatus::Active { code, .. } => code.clone(),
        _ => Cell::ordinary(vec![0xC0], Vec::new()).unwrap(),
    };
    let mut data = prev.state_hash().0[..8].to_vec();
    data.extend_from_slice(&lt.to_le_bytes());
    AccountState {
        balance: prev_state.balance.saturating_sub(fee),
        status: AccountStatus::Active {
            code,
            data: Cell::ordinary(data, Vec::new()).unwrap(),
        },
        last_lt: lt,
    }
}

/// Scripted deterministic engine.
pub struct FakeEngine {
    fee: u128,
    fail_at: Option<(u64, String, Option<i32>)>,
    /// Fragment hashes that must be present in the library table; a missing
    /// one fails the run with the missing-library log signature.
    required_libraries: BTreeSet<Hash256>,
    invocations: Mutex<usize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            fee: 0,
            fail_at: None,
            required_libraries: BTreeSet::new(),
            invocations: Mutex::new(0),
        }
    }

    pub fn with_fee(mut self, fee: u128) -> Self {
        self.fee = fee;
        self
    }

    pub fn failing_at(mut self, lt: u64, reason: &str, exit_code: Option<i32>) -> Self {
        self.fail_at = Some((lt, reason.to_string(), exit_code));
        self
    }

    pub fn requiring_library(mut self, hash: Hash256) -> Self {
        self.required_libraries.insert(hash);
        self
    }

    pub fn invocations(&self) -> usize {
        *self.invocations.lock()
    }
}

/// The log tail an engine emits when code opens an unresolved library cell.
pub fn missing_library_log(fragment: &Hash256) -> String {
    format!(
        "execute PUSHREF\n\
         stack: [ C{{{}}} ]\n\
         execute CTOS\n\
         handling exception code 9: failed to load library cell\n\
         default exception handler, terminating vm with exit code 9\n",
        Cell::library_ref(fragment).to_raw_hex()
    )
}

#[async_trait::async_trait]
impl ExecutionEngine for FakeEngine {
    async fn execute(
        &self,
        input: ExecutionInput,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult> {
        *self.invocations.lock() += 1;

        if let Some((lt, reason, exit_code)) = &self.fail_at {
            if input.lt == *lt {
                return Ok(ExecutionResult::Failure(ExecutionFailure {
                    reason: reason.clone(),
                    exit_code: *exit_code,
                    logs: "emulation aborted".to_string(),
                    vm_log: "execute THROW\n".to_string(),
                }));
            }
        }

        for fragment in &self.required_libraries {
            if !ctx.libraries.contains_key(fragment) {
                return Ok(ExecutionResult::Failure(ExecutionFailure {
                    reason: "transaction aborted with exit code 9".to_string(),
                    exit_code: Some(9),
                    logs: "emulation aborted".to_string(),
                    vm_log: missing_library_log(fragment),
                }));
            }
        }

        let old_hash = input.snapshot.state_hash();
        let new_state = fold_state(&input.snapshot, input.lt, self.fee);
        let snapshot = StateSnapshot::encode(&new_state)?;

        let account = input
            .message
            .as_ref()
            .and_then(|m| m.destination().copied())
            .unwrap_or_else(|| test_address(0xAA));
        let mut tx_hash = [0u8; 32];
        tx_hash[..8].copy_from_slice(&input.lt.to_le_bytes());
        tx_hash[31] = 0xE1;

        let transaction = TransactionRecord {
            account,
            lt: input.lt,
            hash: Hash256(tx_hash),
            now: input.now,
            in_msg: input.message.clone(),
            out_msgs: Vec::new(),
            total_fees: self.fee,
            state_update: StateUpdate {
                old: old_hash,
                new: snapshot.state_hash(),
            },
            description: TxDescription::Generic {
                compute: ComputePhase::Vm(VmComputePhase {
                    success: true,
                    exit_code: 0,
                    vm_steps: 3,
                    gas_used: 300,
                    gas_fees: self.fee,
                }),
                action: None,
                aborted: false,
            },
        };

        Ok(ExecutionResult::Success(Box::new(ExecutionSuccess {
            snapshot,
            transaction,
            actions: None,
            logs: "emulation ok".to_string(),
            vm_log: "execute ACCEPT\n".to_string(),
        })))
    }

    fn version(&self) -> String {
        "fake-engine-1".to_string()
    }
}
