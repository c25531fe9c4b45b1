//! Bounded memoization for the cost models and the liquidity classifier.
//!
//! Keys are exact: every float that goes into a key is stored as its IEEE-754
//! bit pattern, so two inputs share an entry only if they are bit-for-bit
//! identical. Near-identical books are deliberate misses.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Capability interface for a bounded key/value store.
///
/// Models are generic over this trait so the eviction policy can be swapped
/// without touching model code.
pub trait MemoStore<K, V> {
    fn get(&mut self, key: &K) -> Option<V>;
    fn insert(&mut self, key: K, value: V);
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value or compute, store and return it. Failed
    /// computations are not stored.
    fn get_or_try_insert_with<E, F>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        V: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}

/// Least-recently-used store with a fixed capacity.
#[derive(Debug)]
pub struct LruStore<K, V> {
    entries: HashMap<K, V>,
    /// Front = least recently used
    order: VecDeque<K>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruStore<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> MemoStore<K, V> for LruStore<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        match self.entries.get(key).cloned() {
            Some(v) => {
                self.hits += 1;
                self.touch(key);
                Some(v)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key.clone(), value);
            self.touch(&key);
            return;
        }

        // Evict least recently used if at capacity
        if self.entries.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.entries.remove(&old);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Exact key for one side of a book: `(price bits, volume bits)` per level.
pub type LevelsKey = Vec<(u64, u64)>;

pub fn levels_key(levels: &[crate::book::PriceLevel]) -> LevelsKey {
    levels.iter().map(|l| l.key_bits()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_insert_computes_once() {
        let mut store: LruStore<u32, f64> = LruStore::new(4);
        let mut calls = 0;

        let a: Result<f64, ()> = store.get_or_try_insert_with(1, || {
            calls += 1;
            Ok(1.5)
        });
        let b: Result<f64, ()> = store.get_or_try_insert_with(1, || {
            calls += 1;
            Ok(9.9)
        });

        assert_eq!(a, Ok(1.5));
        assert_eq!(b, Ok(1.5));
        assert_eq!(calls, 1);
        assert_eq!(store.hits(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let mut store: LruStore<u32, f64> = LruStore::new(4);
        let r: Result<f64, &str> = store.get_or_try_insert_with(7, || Err("singular"));
        assert!(r.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_lru_eviction() {
        let mut store: LruStore<u32, u32> = LruStore::new(3);
        store.insert(1, 10);
        store.insert(2, 20);
        store.insert(3, 30);

        // Touch 1 so 2 becomes least recently used
        assert_eq!(store.get(&1), Some(10));
        store.insert(4, 40);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&2), None);
        assert_eq!(store.get(&1), Some(10));
        assert_eq!(store.get(&4), Some(40));
    }

    #[test]
    fn test_exact_float_keys() {
        use crate::book::PriceLevel;

        let mut store: LruStore<LevelsKey, f64> = LruStore::new(8);
        let a = [PriceLevel::new(100.0, 1.0)];
        let b = [PriceLevel::new(100.0 + 1e-9, 1.0)];

        store.insert(levels_key(&a), 0.5);
        assert_eq!(store.get(&levels_key(&a)), Some(0.5));
        assert_eq!(store.get(&levels_key(&b)), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut store: LruStore<u8, u8> = LruStore::new(0);
        store.insert(1, 1);
        store.insert(2, 2);
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&2), Some(2));
    }
}
