//! Chain-data indexer client.
//!
//! Speaks the indexer's JSON API: transaction lookup by hash or by
//! account/lt/hash triple, account transaction listing by logical-time range,
//! shard and top-level block lookup, and account-state/configuration
//! snapshots. Every response shape is decoded here, once, into the normalized
//! `retracer-types` records.
//!
//! ## Usage
//!
//! ```ignore
//! let client = IndexClient::new(IndexConfig::from_env());
//! let candidates = client.find_transactions(&tx_hash)?;
//! ```

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use retracer_types::env_utils::{env_bool, env_string_or, env_var_or};
use retracer_types::{
    AccountAddress, AccountBlockRange, ActionPhase, BlockIdent, BlockRef, Cell, ChainTransaction,
    ComputePhase, Hash256, Message, ShardBlock, ShardDescr, StateInit, StateSnapshot, StateUpdate,
    TopBlock, TransactionRecord, TxDescription, VmComputePhase,
};

use crate::network::default_index_endpoint;

/// Maximum sibling transactions requested per range listing.
const RANGE_PAGE_LIMIT: usize = 256;

/// Configuration for the indexer client. Always passed in explicitly;
/// `from_env` is a convenience for binaries, never an ambient default.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl IndexConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_millis(15_000),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read configuration from `RETRACER_NETWORK`, `RETRACER_INDEX_ENDPOINT`,
    /// `RETRACER_INDEX_API_KEY`, and `RETRACER_HTTP_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let network = env_string_or("RETRACER_NETWORK", "mainnet");
        let endpoint = env_string_or("RETRACER_INDEX_ENDPOINT", &default_index_endpoint(&network));
        let api_key = std::env::var("RETRACER_INDEX_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let timeout = Duration::from_millis(env_var_or("RETRACER_HTTP_TIMEOUT_MS", 15_000));
        Self {
            endpoint,
            api_key,
            timeout,
        }
    }
}

/// Blocking indexer client. Clone-cheap; the async provider layer drives it
/// through `spawn_blocking`.
#[derive(Clone)]
pub struct IndexClient {
    endpoint: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl IndexClient {
    pub fn new(config: IndexConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .build();
        Self {
            endpoint: config.endpoint,
            api_key: config.api_key,
            agent,
        }
    }

    pub fn mainnet() -> Self {
        Self::new(IndexConfig::new(default_index_endpoint("mainnet")))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), path);
        let mut request = self.agent.get(&url);
        if let Some(key) = &self.api_key {
            request = request.set("X-Api-Key", key);
        }
        for (name, value) in query {
            request = request.query(name, value);
        }

        let debug = env_bool("RETRACER_DEBUG_PROVIDER");
        match request.call() {
            Ok(response) => {
                if debug {
                    eprintln!("[provider] GET {} status={}", url, response.status());
                }
                response
                    .into_json()
                    .with_context(|| format!("invalid JSON from {}", url))
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                if debug {
                    eprintln!("[provider] GET {} status={} body={}", url, code, body);
                }
                bail!("indexer returned {} for {}: {}", code, url, body)
            }
            Err(e) => Err(anyhow!("request to {} failed: {}", url, e)),
        }
    }

    /// Find transactions matching a hash. Zero results is a valid answer;
    /// the locator decides whether that is fatal.
    pub fn find_transactions(&self, hash: &Hash256) -> Result<Vec<ChainTransaction>> {
        let value = self.get_json("transactionsByHash", &[("hash", hash.to_hex())])?;
        let response: raw::TransactionsResponse =
            serde_json::from_value(value).context("unexpected transactionsByHash shape")?;
        response
            .transactions
            .into_iter()
            .map(decode_chain_transaction)
            .collect()
    }

    /// Fetch one full transaction by its address/lt/hash triple.
    pub fn transaction(
        &self,
        account: &AccountAddress,
        lt: u64,
        hash: &Hash256,
    ) -> Result<Option<ChainTransaction>> {
        let value = self.get_json(
            "transaction",
            &[
                ("account", account.to_string()),
                ("lt", lt.to_string()),
                ("hash", hash.to_hex()),
            ],
        )?;
        let response: raw::TransactionsResponse =
            serde_json::from_value(value).context("unexpected transaction shape")?;
        response
            .transactions
            .into_iter()
            .next()
            .map(decode_chain_transaction)
            .transpose()
    }

    /// List an account's transactions with lt in `[from_lt, to_lt)`,
    /// newest-first as the indexer pages them.
    pub fn transactions_in_range(
        &self,
        account: &AccountAddress,
        from_lt: u64,
        to_lt: u64,
    ) -> Result<Vec<TransactionRecord>> {
        let value = self.get_json(
            "transactions",
            &[
                ("account", account.to_string()),
                ("start_lt", from_lt.to_string()),
                ("end_lt", to_lt.to_string()),
                ("sort", "desc".to_string()),
                ("limit", RANGE_PAGE_LIMIT.to_string()),
            ],
        )?;
        let response: raw::TransactionsResponse =
            serde_json::from_value(value).context("unexpected transactions shape")?;
        response
            .transactions
            .into_iter()
            .map(decode_transaction)
            .collect()
    }

    /// Locate a sub-chain block by its shard coordinates.
    pub fn shard_block(&self, ident: &BlockIdent) -> Result<Option<ShardBlock>> {
        let value = self.get_json(
            "blocks",
            &[
                ("workchain", ident.workchain.to_string()),
                ("shard", format!("{:016x}", ident.shard)),
                ("seqno", ident.seqno.to_string()),
            ],
        )?;
        let response: raw::BlocksResponse =
            serde_json::from_value(value).context("unexpected blocks shape")?;
        response
            .blocks
            .into_iter()
            .next()
            .map(decode_shard_block)
            .transpose()
    }

    /// Fetch a full top-level block, including its shard summaries.
    pub fn top_block(&self, seqno: u32) -> Result<Option<TopBlock>> {
        let value = self.get_json("masterchainBlock", &[("seqno", seqno.to_string())])?;
        if value.is_null() {
            return Ok(None);
        }
        let response: raw::RawTopBlock =
            serde_json::from_value(value).context("unexpected masterchainBlock shape")?;
        Some(decode_top_block(response)).transpose()
    }

    /// Fetch the global configuration valid for a top-level block.
    pub fn config_for_block(&self, seqno: u32) -> Result<Cell> {
        let value = self.get_json("config", &[("seqno", seqno.to_string())])?;
        let response: raw::ConfigResponse =
            serde_json::from_value(value).context("unexpected config shape")?;
        Cell::from_base64(&response.config_boc).context("invalid config payload")
    }

    /// Fetch an account snapshot as of a top-level block.
    pub fn account_state(&self, account: &AccountAddress, seqno: u32) -> Result<StateSnapshot> {
        let value = self.get_json(
            "accountState",
            &[
                ("account", account.to_string()),
                ("seqno", seqno.to_string()),
            ],
        )?;
        let response: raw::AccountStateResponse =
            serde_json::from_value(value).context("unexpected accountState shape")?;
        StateSnapshot::from_base64(&response.state_boc).context("invalid account state payload")
    }
}

// ==================== Raw response shapes ====================

mod raw {
    use super::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct TransactionsResponse {
        #[serde(default)]
        pub transactions: Vec<RawTransaction>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawTransaction {
        pub account: String,
        pub lt: String,
        pub hash: String,
        pub now: u32,
        #[serde(default)]
        pub in_msg: Option<RawMessage>,
        #[serde(default)]
        pub out_msgs: Vec<RawMessage>,
        pub total_fees: String,
        pub state_update: RawStateUpdate,
        pub description: RawDescription,
        #[serde(default)]
        pub block_ref: Option<RawBlockRef>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawMessage {
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub source: Option<String>,
        #[serde(default)]
        pub destination: Option<String>,
        #[serde(default)]
        pub value: Option<String>,
        #[serde(default)]
        pub bounce: Option<bool>,
        #[serde(default)]
        pub body_boc: Option<String>,
        #[serde(default)]
        pub init_code_boc: Option<String>,
        #[serde(default)]
        pub init_data_boc: Option<String>,
        #[serde(default)]
        pub created_lt: Option<String>,
        #[serde(default)]
        pub fwd_fee: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawStateUpdate {
        pub old_hash: String,
        pub new_hash: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawDescription {
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub aborted: bool,
        #[serde(default)]
        pub compute: Option<RawComputePhase>,
        #[serde(default)]
        pub action: Option<RawActionPhase>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawComputePhase {
        #[serde(default)]
        pub skipped: bool,
        #[serde(default)]
        pub reason: Option<String>,
        #[serde(default)]
        pub success: bool,
        #[serde(default)]
        pub exit_code: i32,
        #[serde(default)]
        pub vm_steps: u32,
        #[serde(default)]
        pub gas_used: u64,
        #[serde(default)]
        pub gas_fees: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawActionPhase {
        pub success: bool,
        pub result_code: i32,
        #[serde(default)]
        pub total_actions: u32,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawBlockRef {
        pub workchain: i32,
        pub shard: String,
        pub seqno: u32,
        pub root_hash: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct BlocksResponse {
        #[serde(default)]
        pub blocks: Vec<RawBlock>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawBlock {
        pub workchain: i32,
        pub shard: String,
        pub seqno: u32,
        pub root_hash: String,
        pub masterchain_seqno: u32,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawTopBlock {
        pub seqno: u32,
        pub root_hash: String,
        pub rand_seed: String,
        pub gen_utime: u32,
        #[serde(default)]
        pub shards: Vec<RawShardDescr>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawShardDescr {
        pub workchain: i32,
        pub shard: String,
        pub seqno: u32,
        pub root_hash: String,
        #[serde(default)]
        pub account_blocks: Vec<RawAccountBlock>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawAccountBlock {
        pub account: String,
        pub min_lt: String,
        pub max_lt: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct AccountStateResponse {
        pub state_boc: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct ConfigResponse {
        pub config_boc: String,
    }
}

// ==================== Boundary conversions ====================

fn parse_u64(s: &str, what: &str) -> Result<u64> {
    s.parse()
        .map_err(|_| anyhow!("invalid {} value: {}", what, s))
}

fn parse_u128(s: &str, what: &str) -> Result<u128> {
    s.parse()
        .map_err(|_| anyhow!("invalid {} value: {}", what, s))
}

fn parse_shard(s: &str) -> Result<u64> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(trimmed, 16).map_err(|_| anyhow!("invalid shard value: {}", s))
}

fn decode_cell_opt(encoded: &Option<String>, what: &str) -> Result<Option<Cell>> {
    encoded
        .as_deref()
        .map(|b64| Cell::from_base64(b64).with_context(|| format!("invalid {} payload", what)))
        .transpose()
}

fn decode_message(msg: raw::RawMessage) -> Result<Message> {
    let body = decode_cell_opt(&msg.body_boc, "message body")?;
    let init_code = decode_cell_opt(&msg.init_code_boc, "state init code")?;
    let init_data = decode_cell_opt(&msg.init_data_boc, "state init data")?;
    let state_init = if init_code.is_some() || init_data.is_some() {
        Some(StateInit {
            code: init_code,
            data: init_data,
        })
    } else {
        None
    };

    match msg.kind.as_str() {
        "internal" => Ok(Message::Internal {
            src: AccountAddress::parse(
                msg.source
                    .as_deref()
                    .ok_or_else(|| anyhow!("internal message missing source"))?,
            )?,
            dst: AccountAddress::parse(
                msg.destination
                    .as_deref()
                    .ok_or_else(|| anyhow!("internal message missing destination"))?,
            )?,
            value: parse_u128(msg.value.as_deref().unwrap_or("0"), "message value")?,
            bounce: msg.bounce.unwrap_or(false),
            body,
            state_init,
            created_lt: parse_u64(msg.created_lt.as_deref().unwrap_or("0"), "created_lt")?,
            fwd_fee: parse_u128(msg.fwd_fee.as_deref().unwrap_or("0"), "fwd_fee")?,
        }),
        "external_in" => Ok(Message::ExternalIn {
            dst: AccountAddress::parse(
                msg.destination
                    .as_deref()
                    .ok_or_else(|| anyhow!("inbound external message missing destination"))?,
            )?,
            body,
            state_init,
        }),
        "external_out" => Ok(Message::ExternalOut {
            src: AccountAddress::parse(
                msg.source
                    .as_deref()
                    .ok_or_else(|| anyhow!("outbound external message missing source"))?,
            )?,
            body,
            created_lt: parse_u64(msg.created_lt.as_deref().unwrap_or("0"), "created_lt")?,
        }),
        other => bail!("unknown message type from provider: {}", other),
    }
}

fn decode_description(desc: raw::RawDescription) -> Result<TxDescription> {
    if desc.kind != "generic" {
        return Ok(TxDescription::Other { kind: desc.kind });
    }
    let compute = match desc.compute {
        None => ComputePhase::Skipped {
            reason: "absent".to_string(),
        },
        Some(phase) if phase.skipped => ComputePhase::Skipped {
            reason: phase.reason.unwrap_or_else(|| "unspecified".to_string()),
        },
        Some(phase) => ComputePhase::Vm(VmComputePhase {
            success: phase.success,
            exit_code: phase.exit_code,
            vm_steps: phase.vm_steps,
            gas_used: phase.gas_used,
            gas_fees: parse_u128(phase.gas_fees.as_deref().unwrap_or("0"), "gas_fees")?,
        }),
    };
    let action = desc.action.map(|a| ActionPhase {
        success: a.success,
        result_code: a.result_code,
        total_actions: a.total_actions,
    });
    Ok(TxDescription::Generic {
        compute,
        action,
        aborted: desc.aborted,
    })
}

fn decode_transaction(tx: raw::RawTransaction) -> Result<TransactionRecord> {
    Ok(TransactionRecord {
        account: AccountAddress::parse(&tx.account)?,
        lt: parse_u64(&tx.lt, "lt")?,
        hash: Hash256::from_hex(&tx.hash)?,
        now: tx.now,
        in_msg: tx.in_msg.map(decode_message).transpose()?,
        out_msgs: tx
            .out_msgs
            .into_iter()
            .map(decode_message)
            .collect::<Result<Vec<_>>>()?,
        total_fees: parse_u128(&tx.total_fees, "total_fees")?,
        state_update: StateUpdate {
            old: Hash256::from_hex(&tx.state_update.old_hash)?,
            new: Hash256::from_hex(&tx.state_update.new_hash)?,
        },
        description: decode_description(tx.description)?,
    })
}

fn decode_chain_transaction(tx: raw::RawTransaction) -> Result<ChainTransaction> {
    let block_raw = tx
        .block_ref
        .as_ref()
        .ok_or_else(|| anyhow!("transaction record missing block reference"))?;
    let block = BlockRef {
        ident: BlockIdent {
            workchain: block_raw.workchain,
            shard: parse_shard(&block_raw.shard)?,
            seqno: block_raw.seqno,
        },
        root_hash: Hash256::from_hex(&block_raw.root_hash)?,
    };
    Ok(ChainTransaction {
        record: decode_transaction(tx)?,
        block,
    })
}

fn decode_shard_block(block: raw::RawBlock) -> Result<ShardBlock> {
    Ok(ShardBlock {
        ident: BlockIdent {
            workchain: block.workchain,
            shard: parse_shard(&block.shard)?,
            seqno: block.seqno,
        },
        root_hash: Hash256::from_hex(&block.root_hash)?,
        master_seqno: block.masterchain_seqno,
    })
}

fn decode_top_block(block: raw::RawTopBlock) -> Result<TopBlock> {
    let shards = block
        .shards
        .into_iter()
        .map(|descr| {
            let account_blocks = descr
                .account_blocks
                .into_iter()
                .map(|ab| {
                    Ok(AccountBlockRange {
                        account: AccountAddress::parse(&ab.account)?,
                        min_lt: parse_u64(&ab.min_lt, "min_lt")?,
                        max_lt: parse_u64(&ab.max_lt, "max_lt")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ShardDescr {
                ident: BlockIdent {
                    workchain: descr.workchain,
                    shard: parse_shard(&descr.shard)?,
                    seqno: descr.seqno,
                },
                root_hash: Hash256::from_hex(&descr.root_hash)?,
                account_blocks,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TopBlock {
        seqno: block.seqno,
        root_hash: Hash256::from_hex(&block.root_hash)?,
        rand_seed: Hash256::from_hex(&block.rand_seed)?,
        gen_utime: block.gen_utime,
        shards,
    })
}
