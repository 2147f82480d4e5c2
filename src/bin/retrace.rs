//! tvm-retracer CLI: replay one historical transaction and print its
//! verified trace as JSON.
//!
//! ## Example Usage
//!
//! ```bash
//! # Trace a transaction on mainnet, pretty-printed
//! tvm-retracer 69a9...c4e1 --pretty
//!
//! # Against explicit services
//! tvm-retracer 69a9...c4e1 \
//!     --endpoint https://index.mainnet.tvmscan.io/api/v3 \
//!     --emulator http://127.0.0.1:8090 \
//!     --fallback-library-endpoint https://lib2.example.io/api/v1
//! ```
//!
//! Logging goes to stderr and is controlled via `RUST_LOG`; the report is the
//! only thing written to stdout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use tvm_retracer::{
    EmulatorClient, EmulatorConfig, FragmentCache, Hash256, IndexClient, IndexConfig,
    LibraryClient, LibraryProvider, LibraryResolver, Retracer,
};

#[derive(Parser)]
#[command(name = "tvm-retracer", version, about = "Replay and verify a historical transaction")]
struct Cli {
    /// Transaction hash, hex
    hash: String,

    /// Chain-data index endpoint (default: RETRACER_INDEX_ENDPOINT or mainnet)
    #[arg(long)]
    endpoint: Option<String>,

    /// Index API key (default: RETRACER_INDEX_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Primary library content endpoint (default: derived from the index endpoint)
    #[arg(long)]
    library_endpoint: Option<String>,

    /// Fallback library content endpoint
    #[arg(long)]
    fallback_library_endpoint: Option<String>,

    /// Pacing between library provider attempts, in milliseconds
    #[arg(long, default_value_t = 500)]
    library_pace_ms: u64,

    /// Emulator service endpoint (default: RETRACER_EMULATOR_ENDPOINT)
    #[arg(long)]
    emulator: Option<String>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let hash = Hash256::from_hex(&cli.hash)?;

    let mut index_config = cli
        .endpoint
        .map(IndexConfig::new)
        .unwrap_or_else(IndexConfig::from_env);
    if let Some(key) = cli.api_key {
        index_config = index_config.with_api_key(key);
    }
    let index_endpoint = index_config.endpoint.clone();
    let index = Arc::new(IndexClient::new(index_config));

    let primary_library = cli.library_endpoint.unwrap_or_else(|| {
        retracer_transport::network::library_endpoint_for(&index_endpoint)
    });
    let mut providers: Vec<Arc<dyn LibraryProvider>> =
        vec![Arc::new(LibraryClient::new("primary", primary_library))];
    if let Some(fallback) = cli.fallback_library_endpoint {
        providers.push(Arc::new(LibraryClient::new("fallback", fallback)));
    }
    let resolver = LibraryResolver::new(providers)
        .with_pace(Duration::from_millis(cli.library_pace_ms))
        .with_cache(Arc::new(FragmentCache::new()));

    let emulator_config = cli
        .emulator
        .map(EmulatorConfig::new)
        .unwrap_or_else(EmulatorConfig::from_env);
    let engine = Arc::new(EmulatorClient::new(emulator_config));

    let retracer = Retracer::new(index, resolver, engine);
    let report = retracer.trace(&hash).await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}
