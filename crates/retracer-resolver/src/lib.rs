//! Library Resolver - detects and fetches externally-referenced code fragments.
//!
//! Account code (and code carried by an incoming deployment payload) may
//! contain library cells: 264-bit references that stand in for real bytecode
//! stored out of band. The resolver walks those trees, collects every
//! reference, and resolves each through a chain of content providers with a
//! mandatory pacing delay between attempts. The resulting table is what the
//! execution engine links against.
//!
//! When the account's own root code cell is itself a reference, the fetched
//! content is additionally surfaced as `resolved_code`, so callers can
//! distinguish the code actually executed from the raw on-chain pointer.

pub mod cache;

pub use cache::FragmentCache;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use retracer_transport::LibraryProvider;
use retracer_types::error::{Result, RetraceError};
use retracer_types::{AccountState, Cell, Hash256, LibraryTable};

/// Pacing between provider attempts, respecting secondary-provider rate
/// limits.
const DEFAULT_FETCH_PACE: Duration = Duration::from_millis(500);

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct LibraryScan {
    /// Fragment hash -> fetched content, for every reference discovered plus
    /// any entries supplied by the caller.
    pub libraries: LibraryTable,
    /// The account's real code when its on-chain code is itself a reference.
    pub resolved_code: Option<Cell>,
}

/// Resolves library references through an ordered provider chain.
pub struct LibraryResolver {
    providers: Vec<Arc<dyn LibraryProvider>>,
    pace: Duration,
    cache: Option<Arc<FragmentCache>>,
}

impl LibraryResolver {
    /// Create a resolver over an ordered provider chain. The first provider
    /// is primary; the rest are fallbacks, tried in order.
    pub fn new(providers: Vec<Arc<dyn LibraryProvider>>) -> Self {
        Self {
            providers,
            pace: DEFAULT_FETCH_PACE,
            cache: None,
        }
    }

    /// Override the pacing delay between provider attempts.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// Share a fragment cache across reconstructions. Content is immutable
    /// once fetched, so the cache is read-only from the resolver's view.
    pub fn with_cache(mut self, cache: Arc<FragmentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Scan account state and an optional deployment payload for library
    /// references and resolve all of them.
    ///
    /// `extra` entries (from the retry controller) are merged into the result
    /// without re-fetching.
    pub async fn scan(
        &self,
        state: &AccountState,
        deploy_code: Option<&Cell>,
        extra: &LibraryTable,
    ) -> Result<LibraryScan> {
        let mut wanted: BTreeSet<Hash256> = BTreeSet::new();
        let mut self_code_ref: Option<Hash256> = None;

        if let Some(code) = state.code() {
            self_code_ref = code.library_ref_hash();
            collect_refs(code, &mut wanted);
        }
        if let Some(code) = deploy_code {
            collect_refs(code, &mut wanted);
        }

        let mut scan = LibraryScan {
            libraries: extra.clone(),
            resolved_code: None,
        };

        for hash in &wanted {
            if scan.libraries.contains_key(hash) {
                continue;
            }
            let content = self.fetch(hash).await?;
            scan.libraries.insert(*hash, content);
        }

        if let Some(hash) = self_code_ref {
            scan.resolved_code = scan.libraries.get(&hash).cloned();
        }

        debug!(
            fragments = scan.libraries.len(),
            self_code_resolved = scan.resolved_code.is_some(),
            "resolved library references"
        );
        Ok(scan)
    }

    /// Resolve one fragment hash through the provider chain.
    ///
    /// Primary first; each further attempt waits out the pacing delay.
    /// `LibraryUnavailable` only when every provider misses or fails.
    pub async fn fetch(&self, hash: &Hash256) -> Result<Cell> {
        if let Some(cache) = &self.cache {
            if let Some(cell) = cache.get(hash) {
                return Ok(cell);
            }
        }

        for (attempt, provider) in self.providers.iter().enumerate() {
            if attempt > 0 {
                tokio::time::sleep(self.pace).await;
            }
            match provider.library(hash).await {
                Ok(Some(cell)) => {
                    debug!(hash = %hash, provider = provider.name(), "fetched fragment");
                    if let Some(cache) = &self.cache {
                        cache.put(*hash, cell.clone());
                    }
                    return Ok(cell);
                }
                Ok(None) => {
                    debug!(hash = %hash, provider = provider.name(), "fragment miss");
                }
                Err(e) => {
                    debug!(
                        hash = %hash,
                        provider = provider.name(),
                        error = %e,
                        "fragment fetch failed"
                    );
                }
            }
        }
        Err(RetraceError::LibraryUnavailable(*hash))
    }
}

/// Collect every library reference in a cell tree.
fn collect_refs(root: &Cell, out: &mut BTreeSet<Hash256>) {
    root.walk(&mut |cell| {
        if let Some(hash) = cell.library_ref_hash() {
            out.insert(hash);
        }
    });
}
