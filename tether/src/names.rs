//! Stable hash-keyed lookup of well-known names.

use std::{
    collections::HashMap,
    hash::Hasher,
};
use twox_hash::XxHash64;

/// Seed for the stable name hash. Part of the wire contract: changing it
/// invalidates every well-known hash ever written.
const NAME_HASH_SEED: u64 = 0;

/// Stable 64-bit hash of a UTF-8 name.
pub fn name_hash(name: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(NAME_HASH_SEED);
    hasher.write(name.as_bytes());
    hasher.finish()
}

/// Bidirectional map between values and the stable hash of their names.
///
/// Duplicate values are refused: the first insertion wins and later
/// insertions of the same value report `false`. Duplicate *hashes* of
/// distinct names are tolerated; lookups resolve to the first insertion.
#[derive(Debug, Clone)]
pub struct NameMap<V> {
    by_value: HashMap<V, u64>,
    by_hash: HashMap<u64, V>,
}

impl<V> Default for NameMap<V> {
    fn default() -> Self {
        Self {
            by_value: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }
}

impl<V: Clone + Eq + std::hash::Hash> NameMap<V> {
    /// Build a map from values and a naming function.
    pub fn build<I, F>(values: I, name_of: F) -> Self
    where
        I: IntoIterator<Item = V>,
        F: Fn(&V) -> String,
    {
        let mut map = Self::default();
        for value in values {
            let name = name_of(&value);
            map.insert(value, &name);
        }
        map
    }

    /// Insert one value under the hash of its name. Returns `false` when the
    /// value is already present (first insertion wins).
    pub fn insert(&mut self, value: V, name: &str) -> bool {
        if self.by_value.contains_key(&value) {
            return false
        }
        let hash = name_hash(name);
        self.by_value.insert(value.clone(), hash);
        self.by_hash.entry(hash).or_insert(value);
        true
    }

    /// Hash of a contained value.
    pub fn hash_of(&self, value: &V) -> Option<u64> {
        self.by_value.get(value).copied()
    }

    /// Value registered under a hash.
    pub fn value_of(&self, hash: u64) -> Option<&V> {
        self.by_hash.get(&hash)
    }

    /// Whether any value is registered.
    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_across_calls() {
        assert_eq!(name_hash("tether"), name_hash("tether"));
        assert_ne!(name_hash("tether"), name_hash("Tether"));
    }

    #[test]
    fn lookups_are_bidirectional() {
        let map = NameMap::build(vec!["a".to_string(), "b".to_string()], |v| v.clone());
        let hash = map.hash_of(&"a".to_string()).unwrap();
        assert_eq!(map.value_of(hash), Some(&"a".to_string()));
        assert_eq!(map.value_of(0xdead_beef), None);
    }

    #[test]
    fn first_insertion_wins_for_duplicate_values() {
        let mut map = NameMap::default();
        assert!(map.insert(1u32, "one"));
        assert!(!map.insert(1u32, "uno"));
        assert_eq!(map.hash_of(&1), Some(name_hash("one")));
    }
}
