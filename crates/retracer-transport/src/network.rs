//! Endpoint defaults and network inference.

const MAINNET_INDEX: &str = "https://index.mainnet.tvmscan.io/api/v3";
const TESTNET_INDEX: &str = "https://index.testnet.tvmscan.io/api/v3";
const MAINNET_LIBRARY: &str = "https://lib.mainnet.tvmscan.io/api/v1";
const TESTNET_LIBRARY: &str = "https://lib.testnet.tvmscan.io/api/v1";

pub fn infer_network_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("testnet") {
        Some("testnet")
    } else if lower.contains("mainnet") {
        Some("mainnet")
    } else {
        None
    }
}

pub fn default_index_endpoint(network: &str) -> String {
    match network {
        "testnet" => TESTNET_INDEX.to_string(),
        _ => MAINNET_INDEX.to_string(),
    }
}

pub fn default_library_endpoint(network: &str) -> String {
    match network {
        "testnet" => TESTNET_LIBRARY.to_string(),
        _ => MAINNET_LIBRARY.to_string(),
    }
}

/// Resolve the library endpoint matching an index endpoint's network.
pub fn library_endpoint_for(index_url: &str) -> String {
    match infer_network_from_url(index_url) {
        Some("testnet") => TESTNET_LIBRARY.to_string(),
        _ => MAINNET_LIBRARY.to_string(),
    }
}
