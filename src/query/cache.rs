//! LRU cache of compiled queries

use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;

use super::parser::Query;
use crate::error::Result;

/// Number of compiled queries a document keeps
pub const DEFAULT_CAPACITY: usize = 64;

/// Expression text to compiled query, least recently used evicted first
#[derive(Debug)]
pub struct QueryCache {
    entries: LruCache<String, Rc<Query>>,
}

impl QueryCache {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            entries: LruCache::new(capacity),
        }
    }

    /// Compiled form of `expr`, parsing it on a miss
    ///
    /// Malformed expressions are not cached.
    pub fn compile(&mut self, expr: &str) -> Result<Rc<Query>> {
        if let Some(query) = self.entries.get(expr) {
            return Ok(Rc::clone(query));
        }
        let query = Rc::new(Query::parse(expr)?);
        log::trace!("compiled query {expr:?} ({} terms)", query.terms.len());
        self.entries.put(expr.to_string(), Rc::clone(&query));
        Ok(query)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        QueryCache::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_query() {
        let mut cache = QueryCache::default();
        let a = cache.compile(r#"a == "x""#).unwrap();
        let b = cache.compile(r#"a == "x""#).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction() {
        let mut cache = QueryCache::new(2);
        let first = cache.compile("a == 1").unwrap();
        cache.compile("b == 2").unwrap();
        cache.compile("c == 3").unwrap();
        assert_eq!(cache.len(), 2);
        let again = cache.compile("a == 1").unwrap();
        assert!(!Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_errors_not_cached() {
        let mut cache = QueryCache::new(0);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.compile("a ==").is_err());
        assert!(cache.is_empty());
    }
}
