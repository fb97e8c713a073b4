use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;
use rhai::{AST, Engine};

use crate::Result;

/// Default maximum number of cached compiled scripts.
const DEFAULT_CAPACITY: usize = 128;

/// Thread-safe, size-bounded cache of compiled scripts keyed by source text.
pub struct ScriptCache {
    map: Mutex<LruCache<String, Arc<AST>>>,
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ScriptCache {
    /// Create a new cache with default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new cache with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            map: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Compiled form of `source`, compiling with `engine` and caching on miss.
    pub fn get_or_compile(&self, engine: &Engine, source: &str) -> Result<Arc<AST>> {
        if let Some(found) = self.map.lock().get(source).cloned() {
            return Ok(found);
        }

        // Compile outside the lock.
        let compiled = Arc::new(engine.compile(source)?);

        let mut guard = self.map.lock();
        if let Some(found) = guard.get(source).cloned() {
            return Ok(found);
        }
        guard.put(source.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Number of cached scripts.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_and_evicts() {
        let engine = Engine::new();
        let cache = ScriptCache::with_capacity(2);
        let a = cache.get_or_compile(&engine, "1 + 1").unwrap();
        let again = cache.get_or_compile(&engine, "1 + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &again));

        cache.get_or_compile(&engine, "2").unwrap();
        cache.get_or_compile(&engine, "3").unwrap();
        assert_eq!(cache.len(), 2);
        let fresh = cache.get_or_compile(&engine, "1 + 1").unwrap();
        assert!(!Arc::ptr_eq(&a, &fresh));
    }

    #[test]
    fn parse_errors_are_not_cached() {
        let engine = Engine::new();
        let cache = ScriptCache::new();
        assert!(cache.get_or_compile(&engine, "let = ;").is_err());
        assert!(cache.is_empty());
    }
}
