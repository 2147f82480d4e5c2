//! Shared fixtures for end-to-end pipeline tests.
//!
//! Builds a small but complete on-chain world: one account with a round's
//! worth of history, the blocks that seal it, and a deterministic scripted
//! engine whose state transition chains the previous snapshot hash, so
//! replay order and completeness are observable through the final state
//! hash.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use retracer_resolver::LibraryResolver;
use retracer_transport::{ChainDataProvider, LibraryProvider};
use retracer_types::{
    AccountAddress, AccountBlockRange, AccountState, AccountStatus, BlockIdent, BlockRef, Cell,
    ChainTransaction, ComputePhase, ExecutionContext, ExecutionEngine, ExecutionFailure,
    ExecutionInput, ExecutionResult, ExecutionSuccess, Hash256, Message, ShardBlock, ShardDescr,
    StateSnapshot, StateUpdate, TopBlock, TransactionRecord, TxDescription, VmComputePhase,
};

pub const TOP_SEQNO: u32 = 900;
pub const TARGET_LT: u64 = 300;
pub const START_BALANCE: u128 = 10_000_000_000;

pub fn addr(fill: u8) -> AccountAddress {
    AccountAddress::new(0, Hash256([fill; 32]))
}

pub fn account() -> AccountAddress {
    addr(0xAA)
}

pub fn target_hash() -> Hash256 {
    Hash256([0x33; 32])
}

/// Deterministic engine state transition, shared by the scripted engine and
/// the fixture that precomputes the on-chain state hashes.
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

// ==================== Fake chain-data provider ====================

pub struct FakeChainProvider {
    pub transactions: Vec<ChainTransaction>,
    pub shard_blocks: Vec<ShardBlock>,
    pub top_blocks: Vec<TopBlock>,
    pub states: HashMap<(AccountAddress, u32), StateSnapshot>,
    pub config: Cell,
}

#[async_trait::async_trait]
impl ChainDataProvider for FakeChainProvider {
    async fn find_transactions(&self, hash: &Hash256) -> Result<Vec<ChainTransaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| tx.record.hash == *hash)
            .cloned()
            .collect())
    }

    async fn transaction(
        &self,
        account: &AccountAddress,
        lt: u64,
        hash: &Hash256,
    ) -> Result<Option<ChainTransaction>> {
        Ok(self
            .transactions
            .iter()
            .find(|tx| {
                tx.record.account == *account && tx.record.lt == lt && tx.record.hash == *hash
            })
            .cloned())
    }

    async fn transactions_in_range(
        &self,
        account: &AccountAddress,
        from_lt: u64,
        to_lt: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let mut txs: Vec<_> = self
            .transactions
            .iter()
            .map(|tx| tx.record.clone())
            .filter(|tx| tx.account == *account && tx.lt >= from_lt && tx.lt < to_lt)
            .collect();
        // Indexers page newest-first.
        txs.sort_by(|a, b| b.lt.cmp(&a.lt));
        Ok(txs)
    }

    async fn shard_block(&self, ident: &BlockIdent) -> Result<Option<ShardBlock>> {
        Ok(self.shard_blocks.iter().find(|b| b.ident == *ident).copied())
    }

    async fn top_block(&self, seqno: u32) -> Result<Option<TopBlock>> {
        Ok(self.top_blocks.iter().find(|b| b.seqno == seqno).cloned())
    }

    async fn config_for_block(&self, _seqno: u32) -> Result<Cell> {
        Ok(self.config.clone())
    }

    async fn account_state(
        &self,
        account: &AccountAddress,
        seqno: u32,
    ) -> Result<StateSnapshot> {
        self.states
            .get(&(*account, seqno))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no state for {} at seqno {}", account, seqno))
    }
}

// ==================== Fake library provider ====================

pub struct FakeLibraryProvider {
    name: String,
    entries: BTreeMap<Hash256, Cell>,
}

impl FakeLibraryProvider {
    pub fn new(name: &str, entries: BTreeMap<Hash256, Cell>) -> Self {
        Self {
            name: name.to_string(),
            entries,
        }
    }
}

#[async_trait::async_trait]
impl LibraryProvider for FakeLibraryProvider {
    async fn library(&self, hash: &Hash256) -> Result<Option<Cell>> {
        Ok(self.entries.get(hash).cloned())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ==================== Scripted engine ====================

/// Deterministic engine that records the library table of every invocation.
pub struct RecordingEngine {
    fee: u128,
    /// Fragment required only when executing this logical time.
    require_at: Option<(u64, Hash256)>,
    /// Scripted terminal failure at a logical time.
    fail_at: Option<(u64, String, Option<i32>, String)>,
    /// (lt, library table keys) per invocation, in call order.
    pub seen: Mutex<Vec<(u64, Vec<Hash256>)>>,
    invocations: Mutex<usize>,
}

impl RecordingEngine {
    pub fn new(fee: u128) -> Self {
        Self {
            fee,
            require_at: None,
            fail_at: None,
            seen: Mutex::new(Vec::new()),
            invocations: Mutex::new(0),
        }
    }

    pub fn requiring_library_at(mut self, lt: u64, fragment: Hash256) -> Self {
        self.require_at = Some((lt, fragment));
        self
    }

    pub fn failing_at(
        mut self,
        lt: u64,
        reason: &str,
        exit_code: Option<i32>,
        vm_log: &str,
    ) -> Self {
        self.fail_at = Some((lt, reason.to_string(), exit_code, vm_log.to_string()));
        self
    }

    pub fn invocations(&self) -> usize {
        *self.invocations.lock()
    }
}

#[async_trait::async_trait]
impl ExecutionEngine for RecordingEngine {
    async fn execute(
        &self,
        input: ExecutionInput,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult> {
        *self.invocations.lock() += 1;
        self.seen
            .lock()
            .push((input.lt, ctx.libraries.keys().copied().collect()));

        if let Some((lt, reason, exit_code, vm_log)) = &self.fail_at {
            if input.lt == *lt {
                return Ok(ExecutionResult::Failure(ExecutionFailure {
                    reason: reason.clone(),
                    exit_code: *exit_code,
                    logs: "emulation aborted".to_string(),
                    vm_log: vm_log.clone(),
                }));
            }
        }

        if let Some((lt, fragment)) = &self.require_at {
            if input.lt == *lt && !ctx.libraries.contains_key(fragment) {
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

        let transaction = TransactionRecord {
            account: input
                .message
                .as_ref()
                .and_then(|m| m.destination().copied())
                .unwrap_or_else(account),
            lt: input.lt,
            hash: Hash256([0xE1; 32]),
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

// ==================== Scenario assembly ====================

pub struct Scenario {
    pub provider: Arc<FakeChainProvider>,
    pub engine: Arc<RecordingEngine>,
    pub resolver: LibraryResolver,
    pub code: Cell,
}

pub struct ScenarioOptions {
    pub preceding_lts: Vec<u64>,
    pub code: Cell,
    pub library_entries: BTreeMap<Hash256, Cell>,
    pub engine: Option<RecordingEngine>,
    pub fee: u128,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            preceding_lts: vec![100, 200],
            code: Cell::ordinary(vec![0xC0, 0xDE], Vec::new()).unwrap(),
            library_entries: BTreeMap::new(),
            engine: None,
            fee: 0,
        }
    }
}

fn stub_record(account: AccountAddress, lt: u64, hash_fill: u8) -> TransactionRecord {
    TransactionRecord {
        account,
        lt,
        hash: Hash256([hash_fill; 32]),
        now: 1_700_000_000,
        in_msg: Some(Message::Internal {
            src: addr(0xBB),
            dst: account,
            value: 1_000_000,
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
                vm_steps: 3,
                gas_used: 300,
                gas_fees: 0,
            }),
            action: None,
            aborted: false,
        },
    }
}

/// Build a complete fixture world around one target transaction at
/// [`TARGET_LT`], with the on-chain resulting state hash precomputed from
/// the scripted engine's own transition function.
pub fn build_scenario(options: ScenarioOptions) -> Scenario {
    let account = account();
    let block = BlockRef {
        ident: BlockIdent {
            workchain: 0,
            shard: 0x8000000000000000,
            seqno: 40,
        },
        root_hash: Hash256([0x40; 32]),
    };

    let pre_round = AccountState {
        balance: START_BALANCE,
        status: AccountStatus::Active {
            code: options.code.clone(),
            data: Cell::ordinary(vec![0xDA], Vec::new()).unwrap(),
        },
        last_lt: 50,
    };
    let start_snapshot = StateSnapshot::encode(&pre_round).unwrap();

    // Precompute the authoritative post-target state hash by walking the
    // same transition chain the engine will.
    let mut snapshot = start_snapshot.clone();
    for lt in &options.preceding_lts {
        snapshot = StateSnapshot::encode(&fold_state(&snapshot, *lt, options.fee)).unwrap();
    }
    let pre_target_hash = snapshot.state_hash();
    let post_target =
        StateSnapshot::encode(&fold_state(&snapshot, TARGET_LT, options.fee)).unwrap();

    let mut transactions = Vec::new();
    for (i, lt) in options.preceding_lts.iter().enumerate() {
        transactions.push(ChainTransaction {
            record: stub_record(account, *lt, 0x41 + i as u8),
            block,
        });
    }
    let mut target = stub_record(account, TARGET_LT, 0x33);
    target.state_update = StateUpdate {
        old: pre_target_hash,
        new: post_target.state_hash(),
    };
    transactions.push(ChainTransaction {
        record: target,
        block,
    });

    let min_lt = options.preceding_lts.first().copied().unwrap_or(TARGET_LT);
    let provider = Arc::new(FakeChainProvider {
        transactions,
        shard_blocks: vec![ShardBlock {
            ident: block.ident,
            root_hash: block.root_hash,
            master_seqno: TOP_SEQNO,
        }],
        top_blocks: vec![TopBlock {
            seqno: TOP_SEQNO,
            root_hash: Hash256([0x90; 32]),
            rand_seed: Hash256([0x91; 32]),
            gen_utime: 1_700_000_000,
            shards: vec![ShardDescr {
                ident: block.ident,
                root_hash: block.root_hash,
                account_blocks: vec![AccountBlockRange {
                    account,
                    min_lt,
                    max_lt: TARGET_LT,
                }],
            }],
        }],
        states: HashMap::from([((account, TOP_SEQNO - 1), start_snapshot)]),
        config: Cell::ordinary(vec![0xCF], Vec::new()).unwrap(),
    });

    let engine = Arc::new(
        options
            .engine
            .unwrap_or_else(|| RecordingEngine::new(options.fee)),
    );
    let resolver = LibraryResolver::new(vec![Arc::new(FakeLibraryProvider::new(
        "primary",
        options.library_entries,
    )) as Arc<dyn LibraryProvider>])
    .with_pace(std::time::Duration::from_millis(1));

    Scenario {
        provider,
        engine,
        resolver,
        code: options.code,
    }
}
