//! In-process fragment cache.
//!
//! Keyed by content hash; content is immutable once fetched, so a single
//! cache instance is safe to share read-only across concurrent
//! reconstructions.

use std::collections::HashMap;

use parking_lot::RwLock;

use retracer_types::{Cell, Hash256};

/// Thread-safe fragment-content cache.
#[derive(Debug, Default)]
pub struct FragmentCache {
    entries: RwLock<HashMap<Hash256, Cell>>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &Hash256) -> Option<Cell> {
        self.entries.read().get(hash).cloned()
    }

    pub fn put(&self, hash: Hash256, content: Cell) {
        self.entries.write().insert(hash, content);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
