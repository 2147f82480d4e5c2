//! Execution-engine adapter for a remote emulator service.
//!
//! The emulator is the external deterministic virtual machine the pipeline
//! replays against; this adapter ships it one state snapshot plus one message
//! per call and decodes the outcome. Opaque blobs (snapshot, message,
//! configuration, cells) travel as BCS wrapped in base64.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine as _;
use serde::Deserialize;

use retracer_types::env_utils::{env_string_or, env_var_or};
use retracer_types::{
    Cell, ExecutionContext, ExecutionEngine, ExecutionFailure, ExecutionInput, ExecutionResult,
    ExecutionSuccess, StateSnapshot, TransactionRecord,
};

/// Configuration for the emulator service adapter.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl EmulatorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(60_000),
        }
    }

    /// Read configuration from `RETRACER_EMULATOR_ENDPOINT` and
    /// `RETRACER_EMULATOR_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self {
            endpoint: env_string_or("RETRACER_EMULATOR_ENDPOINT", "http://127.0.0.1:8090"),
            timeout: Duration::from_millis(env_var_or("RETRACER_EMULATOR_TIMEOUT_MS", 60_000)),
        }
    }
}

/// HTTP adapter implementing the engine contract against an emulator service.
#[derive(Clone)]
pub struct EmulatorClient {
    endpoint: String,
    agent: ureq::Agent,
    version: String,
}

impl EmulatorClient {
    pub fn new(config: EmulatorConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            agent: ureq::AgentBuilder::new().timeout(config.timeout).build(),
            version: "emulator-service".to_string(),
        }
    }

    /// Pin the engine build identifier reported in trace reports.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Query the service for its build identifier and cache it.
    pub fn refresh_version(mut self) -> Result<Self> {
        let url = format!("{}/version", self.endpoint.trim_end_matches('/'));
        let value: serde_json::Value = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| anyhow!("request to {} failed: {}", url, e))?
            .into_json()
            .with_context(|| format!("invalid JSON from {}", url))?;
        if let Some(version) = value.get("version").and_then(|v| v.as_str()) {
            self.version = version.to_string();
        }
        Ok(self)
    }

    fn execute_blocking(&self, request: serde_json::Value) -> Result<ExecutionResult> {
        let url = format!("{}/emulate", self.endpoint.trim_end_matches('/'));
        let value: serde_json::Value = match self.agent.post(&url).send_json(request) {
            Ok(response) => response
                .into_json()
                .with_context(|| format!("invalid JSON from {}", url))?,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("emulator returned {}: {}", code, body)
            }
            Err(e) => return Err(anyhow!("request to {} failed: {}", url, e)),
        };
        let raw: RawEmulateResponse =
            serde_json::from_value(value).context("unexpected emulate shape")?;
        decode_outcome(raw)
    }
}

fn bcs_b64<T: serde::Serialize>(value: &T, what: &str) -> Result<String> {
    let bytes = bcs::to_bytes(value).map_err(|e| anyhow!("failed to encode {}: {}", what, e))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn bcs_from_b64<T: serde::de::DeserializeOwned>(encoded: &str, what: &str) -> Result<T> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| anyhow!("invalid {} base64: {}", what, e))?;
    bcs::from_bytes(&raw).map_err(|e| anyhow!("failed to decode {}: {}", what, e))
}

fn encode_request(input: &ExecutionInput, ctx: &ExecutionContext) -> Result<serde_json::Value> {
    let libraries: Vec<serde_json::Value> = ctx
        .libraries
        .iter()
        .map(|(hash, cell)| {
            Ok(serde_json::json!({
                "hash": hash.to_hex(),
                "boc": cell.to_base64()?,
            }))
        })
        .collect::<Result<_>>()?;
    Ok(serde_json::json!({
        "snapshot": input.snapshot.to_base64(),
        "message": input
            .message
            .as_ref()
            .map(|m| bcs_b64(m, "message"))
            .transpose()?,
        "lt": input.lt,
        "now": input.now,
        "rand_seed": ctx.rand_seed.to_hex(),
        "config": ctx.config.to_base64()?,
        "libraries": libraries,
    }))
}

#[derive(Debug, Deserialize)]
struct RawEmulateResponse {
    success: bool,
    #[serde(default)]
    snapshot: Option<String>,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    actions_boc: Option<String>,
    #[serde(default)]
    logs: String,
    #[serde(default)]
    vm_log: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    exit_code: Option<i32>,
}

fn decode_outcome(raw: RawEmulateResponse) -> Result<ExecutionResult> {
    if !raw.success {
        return Ok(ExecutionResult::Failure(ExecutionFailure {
            reason: raw.error.unwrap_or_else(|| "emulation failed".to_string()),
            exit_code: raw.exit_code,
            logs: raw.logs,
            vm_log: raw.vm_log,
        }));
    }
    let snapshot = raw
        .snapshot
        .as_deref()
        .ok_or_else(|| anyhow!("successful emulation missing snapshot"))?;
    let transaction = raw
        .transaction
        .as_deref()
        .ok_or_else(|| anyhow!("successful emulation missing transaction"))?;
    let transaction: TransactionRecord = bcs_from_b64(transaction, "transaction")?;
    let actions = raw
        .actions_boc
        .as_deref()
        .map(|b64| Cell::from_base64(b64).context("invalid actions payload"))
        .transpose()?;
    Ok(ExecutionResult::Success(Box::new(ExecutionSuccess {
        snapshot: StateSnapshot::from_base64(snapshot)?,
        transaction,
        actions,
        logs: raw.logs,
        vm_log: raw.vm_log,
    })))
}

#[async_trait::async_trait]
impl ExecutionEngine for EmulatorClient {
    async fn execute(
        &self,
        input: ExecutionInput,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult> {
        let request = encode_request(&input, ctx)?;
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.execute_blocking(request))
            .await
            .map_err(|e| anyhow!("emulator task failed: {}", e))?
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}
