//! Chain-data provider abstraction.
//!
//! This trait allows the locator and the retry controller to be sourced from
//! different backends (live indexer, in-memory fixtures) without coupling
//! callers to a specific client implementation.

use anyhow::{anyhow, Result};

use retracer_types::{
    AccountAddress, BlockIdent, Cell, ChainTransaction, Hash256, ShardBlock, StateSnapshot,
    TopBlock, TransactionRecord,
};

use crate::index::IndexClient;

/// Unified interface to the chain-data indexer.
///
/// Range listings are returned newest-first, exactly as the backend pages
/// them; callers reverse for replay.
#[async_trait::async_trait]
pub trait ChainDataProvider: Send + Sync {
    async fn find_transactions(&self, hash: &Hash256) -> Result<Vec<ChainTransaction>>;

    async fn transaction(
        &self,
        account: &AccountAddress,
        lt: u64,
        hash: &Hash256,
    ) -> Result<Option<ChainTransaction>>;

    async fn transactions_in_range(
        &self,
        account: &AccountAddress,
        from_lt: u64,
        to_lt: u64,
    ) -> Result<Vec<TransactionRecord>>;

    async fn shard_block(&self, ident: &BlockIdent) -> Result<Option<ShardBlock>>;

    async fn top_block(&self, seqno: u32) -> Result<Option<TopBlock>>;

    async fn config_for_block(&self, seqno: u32) -> Result<Cell>;

    async fn account_state(&self, account: &AccountAddress, seqno: u32)
        -> Result<StateSnapshot>;
}

#[async_trait::async_trait]
impl ChainDataProvider for IndexClient {
    async fn find_transactions(&self, hash: &Hash256) -> Result<Vec<ChainTransaction>> {
        let client = self.clone();
        let hash = *hash;
        tokio::task::spawn_blocking(move || IndexClient::find_transactions(&client, &hash))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn transaction(
        &self,
        account: &AccountAddress,
        lt: u64,
        hash: &Hash256,
    ) -> Result<Option<ChainTransaction>> {
        let client = self.clone();
        let account = *account;
        let hash = *hash;
        tokio::task::spawn_blocking(move || IndexClient::transaction(&client, &account, lt, &hash))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn transactions_in_range(
        &self,
        account: &AccountAddress,
        from_lt: u64,
        to_lt: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let client = self.clone();
        let account = *account;
        tokio::task::spawn_blocking(move || {
            IndexClient::transactions_in_range(&client, &account, from_lt, to_lt)
        })
        .await
        .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn shard_block(&self, ident: &BlockIdent) -> Result<Option<ShardBlock>> {
        let client = self.clone();
        let ident = *ident;
        tokio::task::spawn_blocking(move || IndexClient::shard_block(&client, &ident))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn top_block(&self, seqno: u32) -> Result<Option<TopBlock>> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || IndexClient::top_block(&client, seqno))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn config_for_block(&self, seqno: u32) -> Result<Cell> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || IndexClient::config_for_block(&client, seqno))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }

    async fn account_state(
        &self,
        account: &AccountAddress,
        seqno: u32,
    ) -> Result<StateSnapshot> {
        let client = self.clone();
        let account = *account;
        tokio::task::spawn_blocking(move || IndexClient::account_state(&client, &account, seqno))
            .await
            .map_err(|e| anyhow!("indexer task failed: {}", e))?
    }
}
