use crate::ports::host::Asset;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Versioned static asset caches, keyed by cache name then request path.
#[derive(Debug, Clone, Default)]
pub struct AssetCache {
    caches: Arc<RwLock<BTreeMap<String, HashMap<String, Asset>>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, cache_name: &str, asset: Asset) {
        let mut caches = self.caches.write().expect("cache lock");
        caches
            .entry(cache_name.to_string())
            .or_default()
            .insert(asset.path.clone(), asset);
    }

    /// Looks `path` up across every cache.
    pub fn lookup(&self, path: &str) -> Option<Asset> {
        let caches = self.caches.read().expect("cache lock");
        caches.values().find_map(|cache| cache.get(path).cloned())
    }

    /// Drops every cache whose name differs from `keep`, returning the dropped names.
    pub fn retain_only(&self, keep: &str) -> Vec<String> {
        let mut caches = self.caches.write().expect("cache lock");
        let stale: Vec<String> = caches
            .keys()
            .filter(|name| name.as_str() != keep)
            .cloned()
            .collect();
        for name in &stale {
            caches.remove(name);
        }
        stale
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.caches
            .read()
            .expect("cache lock")
            .keys()
            .cloned()
            .collect()
    }
}
