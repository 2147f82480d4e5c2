//! Chain Locator - resolves a transaction hash into replay coordinates.
//!
//! Given a transaction hash, this crate finds the on-chain record, its
//! containing sub-chain block, the enclosing top-level block, and the
//! logical-time lower bound of the account's consensus round. These four
//! pieces are everything the replayer needs to rebuild pre-execution state.
//!
//! The locator is a thin, strictly-ordered orchestration over an injected
//! [`ChainDataProvider`]; it owns no caching and no retries. A failed
//! cross-check between the sub-chain block and the top-level block's shard
//! summary is an integrity violation and is never retried.

use std::sync::Arc;

use tracing::debug;

use retracer_transport::ChainDataProvider;
use retracer_types::error::{Result, RetraceError};
use retracer_types::{
    BlockRef, ChainTransaction, ConsensusRoundBound, Hash256, TransactionRecord, TxHandle,
};

/// Resolves transaction hashes into the chain coordinates needed for replay.
pub struct ChainLocator {
    provider: Arc<dyn ChainDataProvider>,
}

impl ChainLocator {
    /// Create a locator over an explicit provider. Fakes inject here in tests.
    pub fn new(provider: Arc<dyn ChainDataProvider>) -> Self {
        Self { provider }
    }

    /// Resolve a transaction hash into its unique handle.
    pub async fn locate(&self, hash: &Hash256) -> Result<TxHandle> {
        let candidates = self.provider.find_transactions(hash).await?;
        let Some(first) = candidates.into_iter().next() else {
            return Err(RetraceError::not_found(format!(
                "no transaction with hash {}",
                hash
            )));
        };
        let handle = first.record.handle();
        debug!(
            hash = %hash,
            account = %handle.account,
            lt = handle.lt,
            "located transaction"
        );
        Ok(handle)
    }

    /// Fetch the full transaction record and its containing block.
    pub async fn transaction_details(&self, handle: &TxHandle) -> Result<ChainTransaction> {
        let found = self
            .provider
            .transaction(&handle.account, handle.lt, &handle.hash)
            .await?;
        found.ok_or_else(|| {
            RetraceError::not_found(format!(
                "transaction {} at lt {} for {}",
                handle.hash, handle.lt, handle.account
            ))
        })
    }

    /// Resolve the consensus round that settled `block`.
    ///
    /// Cross-checks the sub-chain block's root hash against the matching
    /// shard summary of the enclosing top-level block; any disagreement is
    /// fatal. The round's `min_lt` is the smallest logical time ≤ the
    /// target's found for the account across every shard summary, defaulting
    /// to the target's own logical time.
    pub async fn resolve_round(
        &self,
        block: &BlockRef,
        handle: &TxHandle,
    ) -> Result<ConsensusRoundBound> {
        let shard_block = self
            .provider
            .shard_block(&block.ident)
            .await?
            .ok_or_else(|| {
                RetraceError::not_found(format!("sub-chain block {}", block.ident))
            })?;

        if shard_block.root_hash != block.root_hash {
            return Err(RetraceError::IntegrityViolation(format!(
                "sub-chain block {} root {} does not match transaction's block root {}",
                block.ident, shard_block.root_hash, block.root_hash
            )));
        }

        let top = self
            .provider
            .top_block(shard_block.master_seqno)
            .await?
            .ok_or_else(|| {
                RetraceError::not_found(format!(
                    "top-level block {}",
                    shard_block.master_seqno
                ))
            })?;

        // The top-level block must reference this exact sub-chain block.
        let sealed_root = if block.ident.workchain == -1 {
            Some(top.root_hash)
        } else {
            top.shards
                .iter()
                .find(|descr| descr.ident == block.ident)
                .map(|descr| descr.root_hash)
        };
        match sealed_root {
            Some(root) if root == shard_block.root_hash => {}
            Some(root) => {
                return Err(RetraceError::IntegrityViolation(format!(
                    "top-level block {} seals {} with root {}, sub-chain block has {}",
                    top.seqno, block.ident, root, shard_block.root_hash
                )));
            }
            None => {
                return Err(RetraceError::IntegrityViolation(format!(
                    "top-level block {} does not seal sub-chain block {}",
                    top.seqno, block.ident
                )));
            }
        }

        let min_lt = top
            .shards
            .iter()
            .flat_map(|descr| descr.account_blocks.iter())
            .filter(|ab| ab.account == handle.account && ab.min_lt <= handle.lt)
            .map(|ab| ab.min_lt)
            .min()
            .unwrap_or(handle.lt);

        debug!(
            top_seqno = top.seqno,
            min_lt = min_lt,
            target_lt = handle.lt,
            "resolved consensus round"
        );

        Ok(ConsensusRoundBound {
            top_seqno: top.seqno,
            rand_seed: top.rand_seed,
            min_lt,
        })
    }

    /// The account's transactions with lt in `[min_lt, handle.lt)`,
    /// newest-first as received. Callers reverse to oldest-first for replay.
    pub async fn sibling_transactions(
        &self,
        handle: &TxHandle,
        min_lt: u64,
    ) -> Result<Vec<TransactionRecord>> {
        if min_lt >= handle.lt {
            return Ok(Vec::new());
        }
        let mut siblings = self
            .provider
            .transactions_in_range(&handle.account, min_lt, handle.lt)
            .await?;
        // Defensive normalization: drop the target itself and anything the
        // backend returned outside the half-open range.
        siblings.retain(|tx| tx.lt >= min_lt && tx.lt < handle.lt);
        debug!(
            account = %handle.account,
            count = siblings.len(),
            "fetched preceding transactions"
        );
        Ok(siblings)
    }

    pub fn provider(&self) -> &Arc<dyn ChainDataProvider> {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result as AnyResult;
    use retracer_types::{
        AccountAddress, AccountBlockRange, BlockIdent, Cell, ShardBlock, ShardDescr,
        StateSnapshot, TopBlock,
    };

    struct FakeProvider {
        transactions: Vec<ChainTransaction>,
        shard_blocks: Vec<ShardBlock>,
        top_blocks: Vec<TopBlock>,
    }

    #[async_trait::async_trait]
    impl ChainDataProvider for FakeProvider {
        async fn find_transactions(&self, hash: &Hash256) -> AnyResult<Vec<ChainTransaction>> {
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
        ) -> AnyResult<Option<ChainTransaction>> {
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
        ) -> AnyResult<Vec<TransactionRecord>> {
            let mut txs: Vec<_> = self
                .transactions
                .iter()
                .map(|tx| tx.record.clone())
                .filter(|tx| tx.account == *account && tx.lt >= from_lt && tx.lt < to_lt)
                .collect();
            txs.sort_by(|a, b| b.lt.cmp(&a.lt));
            Ok(txs)
        }

        async fn shard_block(&self, ident: &BlockIdent) -> AnyResult<Option<ShardBlock>> {
            Ok(self.shard_blocks.iter().find(|b| b.ident == *ident).copied())
        }

        async fn top_block(&self, seqno: u32) -> AnyResult<Option<TopBlock>> {
            Ok(self.top_blocks.iter().find(|b| b.seqno == seqno).cloned())
        }

        async fn config_for_block(&self, _seqno: u32) -> AnyResult<Cell> {
            Ok(Cell::ordinary(vec![0x01], Vec::new())?)
        }

        async fn account_state(
            &self,
            _account: &AccountAddress,
            _seqno: u32,
        ) -> AnyResult<StateSnapshot> {
            Ok(StateSnapshot::from_bytes(Vec::new()))
        }
    }

    fn addr(fill: u8) -> AccountAddress {
        AccountAddress::new(0, Hash256([fill; 32]))
    }

    fn tx(account: AccountAddress, lt: u64, hash_fill: u8, block: BlockRef) -> ChainTransaction {
        use retracer_types::{ComputePhase, StateUpdate, TxDescription, VmComputePhase};
        ChainTransaction {
            record: TransactionRecord {
                account,
                lt,
                hash: Hash256([hash_fill; 32]),
                now: 1_700_000_000,
                in_msg: None,
                out_msgs: Vec::new(),
                total_fees: 0,
                state_update: StateUpdate {
                    old: Hash256([0; 32]),
                    new: Hash256([1; 32]),
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
            },
            block,
        }
    }

    fn block_ident(seqno: u32) -> BlockIdent {
        BlockIdent {
            workchain: 0,
            shard: 0x8000000000000000,
            seqno,
        }
    }

    fn fixture() -> (FakeProvider, TxHandle, BlockRef) {
        let account = addr(0xAA);
        let block = BlockRef {
            ident: block_ident(40),
            root_hash: Hash256([0x40; 32]),
        };
        let target = tx(account, 300, 0x33, block);
        let handle = target.record.handle();

        let provider = FakeProvider {
            transactions: vec![
                tx(account, 100, 0x31, block),
                tx(account, 200, 0x32, block),
                target,
            ],
            shard_blocks: vec![ShardBlock {
                ident: block.ident,
                root_hash: block.root_hash,
                master_seqno: 900,
            }],
            top_blocks: vec![TopBlock {
                seqno: 900,
                root_hash: Hash256([0x90; 32]),
                rand_seed: Hash256([0x91; 32]),
                gen_utime: 1_700_000_000,
                shards: vec![
                    ShardDescr {
                        ident: block.ident,
                        root_hash: block.root_hash,
                        account_blocks: vec![AccountBlockRange {
                            account,
                            min_lt: 100,
                            max_lt: 300,
                        }],
                    },
                    // A second shard mentioning the account with an even
                    // smaller lt; the scan must keep the minimum.
                    ShardDescr {
                        ident: block_ident(41),
                        root_hash: Hash256([0x41; 32]),
                        account_blocks: vec![AccountBlockRange {
                            account,
                            min_lt: 90,
                            max_lt: 95,
                        }],
                    },
                ],
            }],
        };
        (provider, handle, block)
    }

    #[tokio::test]
    async fn test_locate_and_details() {
        let (provider, handle, _) = fixture();
        let locator = ChainLocator::new(Arc::new(provider));
        let located = locator.locate(&handle.hash).await.unwrap();
        assert_eq!(located, handle);
        let details = locator.transaction_details(&located).await.unwrap();
        assert_eq!(details.record.lt, 300);
    }

    #[tokio::test]
    async fn test_locate_unknown_hash_is_not_found() {
        let (provider, _, _) = fixture();
        let locator = ChainLocator::new(Arc::new(provider));
        let err = locator.locate(&Hash256([0xEE; 32])).await.unwrap_err();
        assert!(matches!(err, RetraceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_resolve_round_scans_all_shards_for_min_lt() {
        let (provider, handle, block) = fixture();
        let locator = ChainLocator::new(Arc::new(provider));
        let round = locator.resolve_round(&block, &handle).await.unwrap();
        assert_eq!(round.top_seqno, 900);
        assert_eq!(round.min_lt, 90);
        assert_eq!(round.rand_seed, Hash256([0x91; 32]));
    }

    #[tokio::test]
    async fn test_resolve_round_defaults_to_target_lt() {
        let (mut provider, handle, block) = fixture();
        for top in &mut provider.top_blocks {
            for shard in &mut top.shards {
                shard.account_blocks.clear();
            }
        }
        let locator = ChainLocator::new(Arc::new(provider));
        let round = locator.resolve_round(&block, &handle).await.unwrap();
        assert_eq!(round.min_lt, handle.lt);
    }

    #[tokio::test]
    async fn test_resolve_round_root_mismatch_is_integrity_violation() {
        let (mut provider, handle, block) = fixture();
        provider.top_blocks[0].shards[0].root_hash = Hash256([0xBD; 32]);
        let locator = ChainLocator::new(Arc::new(provider));
        let err = locator.resolve_round(&block, &handle).await.unwrap_err();
        assert!(matches!(err, RetraceError::IntegrityViolation(_)));
    }

    #[tokio::test]
    async fn test_resolve_round_missing_shard_block_is_not_found() {
        let (mut provider, handle, block) = fixture();
        provider.shard_blocks.clear();
        let locator = ChainLocator::new(Arc::new(provider));
        let err = locator.resolve_round(&block, &handle).await.unwrap_err();
        assert!(matches!(err, RetraceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_siblings_newest_first_and_exclusive_of_target() {
        let (provider, handle, _) = fixture();
        let locator = ChainLocator::new(Arc::new(provider));
        let siblings = locator.sibling_transactions(&handle, 100).await.unwrap();
        let lts: Vec<u64> = siblings.iter().map(|tx| tx.lt).collect();
        assert_eq!(lts, vec![200, 100]);
    }

    #[tokio::test]
    async fn test_siblings_empty_when_round_starts_at_target() {
        let (provider, handle, _) = fixture();
        let locator = ChainLocator::new(Arc::new(provider));
        let siblings = locator
            .sibling_transactions(&handle, handle.lt)
            .await
            .unwrap();
        assert!(siblings.is_empty());
    }
}
