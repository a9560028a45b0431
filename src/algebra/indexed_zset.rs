//! `IndexedZSet<K,V>`: a Z-set over `(K,V)` pairs, physically indexed so the
//! `(V -> weight)` slice for one `K` can be enumerated without scanning
//! other keys (spec §3, design note §9: "two-level map").

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{HasZero, Weight, WithNumEntries, ZSet, ZSetBuilder};
use crate::error::DbspResult;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::{self, Debug, Formatter};

/// Outer map keyed by `K`, inner map keyed by `V`, weights as leaves.
#[derive(Clone)]
pub struct IndexedZSet<K, V> {
    outer: HashMap<K, ZSet<V>>,
}

impl<K, V> IndexedZSet<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
    pub fn empty() -> Self {
        Self {
            outer: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty()
    }

    /// Number of distinct keys with non-empty value slices.
    pub fn key_count(&self) -> usize {
        self.outer.len()
    }

    /// Total number of `(k,v,w)` triples across all keys.
    pub fn len(&self) -> usize {
        self.outer.values().map(ZSet::len).sum()
    }

    /// All `(v, w)` pairs associated with `key`, or an empty slice map if
    /// `key` is absent.
    pub fn slice(&self, key: &K) -> Option<&ZSet<V>> {
        self.outer.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.outer.contains_key(key)
    }

    /// Iterate every `(k, v, w)` triple. Enumerating per-key slices and
    /// summing equals this full iteration (I5).
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V, Weight)> {
        self.outer
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |(v, w)| (k, v, w)))
    }

    /// Outer keys, each with a non-empty value slice. Boxed so callers that
    /// pick between two differently-typed `IndexedZSet`s at runtime (e.g.
    /// the smaller side of a join) can store both branches in one binding.
    pub fn keys(&self) -> Box<dyn Iterator<Item = &K> + '_> {
        Box::new(self.outer.keys())
    }

    pub fn add(&self, other: &Self) -> DbspResult<Self> {
        let mut result = self.clone();
        for (k, v, w) in other.iter() {
            result.insert(k.clone(), v.clone(), w)?;
        }
        Ok(result)
    }

    pub fn negate(&self) -> DbspResult<Self> {
        let mut outer = HashMap::with_capacity(self.outer.len());
        for (k, vs) in self.outer.iter() {
            outer.insert(k.clone(), vs.negate()?);
        }
        Ok(Self { outer })
    }

    pub fn difference(&self, other: &Self) -> DbspResult<Self> {
        self.add(&other.negate()?)
    }

    /// Accumulate `weight` onto `(key, value)`, dropping the per-key slice
    /// once it becomes empty and pruning the outer entry too.
    pub fn insert(&mut self, key: K, value: V, weight: Weight) -> DbspResult<()> {
        match self.outer.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().insert(value, weight)?;
                if occupied.get().is_empty() {
                    occupied.remove();
                }
            }
            Entry::Vacant(vacant) => {
                let mut zset = ZSet::empty();
                zset.insert(value, weight)?;
                if !zset.is_empty() {
                    vacant.insert(zset);
                }
            }
        }
        Ok(())
    }

    /// Converts to a flat `ZSet<(K,V)>`.
    pub fn to_zset(&self) -> DbspResult<ZSet<(K, V)>> {
        let mut builder: ZSetBuilder<(K, V)> = ZSetBuilder::with_capacity(self.len());
        for (k, v, w) in self.iter() {
            builder.add_weight((k.clone(), v.clone()), w)?;
        }
        Ok(builder.to_zset())
    }

    /// Builds an `IndexedZSet` from a flat `ZSet<(K,V)>`.
    pub fn from_zset(zset: &ZSet<(K, V)>) -> DbspResult<Self> {
        let mut result = Self::empty();
        for ((k, v), w) in zset.iter() {
            result.insert(k.clone(), v.clone(), w)?;
        }
        Ok(result)
    }

    /// Builds an `IndexedZSet` directly from `(k,v,w)` triples, coalescing
    /// duplicates and dropping zero-weight results.
    pub fn build_with<I>(triples: I) -> DbspResult<Self>
    where
        I: IntoIterator<Item = (K, V, Weight)>,
    {
        let mut result = Self::empty();
        for (k, v, w) in triples {
            result.insert(k, v, w)?;
        }
        Ok(result)
    }
}

impl<K, V> WithNumEntries for IndexedZSet<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
    fn num_entries(&self) -> usize {
        self.len()
    }
}

impl<K, V> Default for IndexedZSet<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<K, V> PartialEq for IndexedZSet<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
    fn eq(&self, other: &Self) -> bool {
        self.outer == other.outer
    }
}

impl<K, V> Eq for IndexedZSet<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
}

impl<K, V> Debug for IndexedZSet<K, V>
where
    K: KeyProperties + Debug,
    V: KeyProperties + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.outer.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(n: i64) -> Weight {
        Weight::new(n)
    }

    #[test]
    fn per_key_slices_sum_to_full_iteration() {
        let iz = IndexedZSet::build_with([
            (1, "a", w(1)),
            (1, "b", w(2)),
            (2, "c", w(3)),
        ])
        .unwrap();
        let total: i64 = iz.iter().map(|(_, _, weight)| weight.get()).sum();
        assert_eq!(total, 6);
        assert_eq!(iz.slice(&1).unwrap().len(), 2);
    }

    #[test]
    fn roundtrip_through_flat_zset() {
        let iz = IndexedZSet::build_with([(1, "a", w(1)), (2, "b", w(-1))]).unwrap();
        let flat = iz.to_zset().unwrap();
        let back = IndexedZSet::from_zset(&flat).unwrap();
        assert_eq!(iz, back);
    }

    #[test]
    fn cancellation_drops_key_entirely() {
        let mut iz: IndexedZSet<i32, &str> = IndexedZSet::empty();
        iz.insert(1, "a", w(5)).unwrap();
        iz.insert(1, "a", w(-5)).unwrap();
        assert!(!iz.contains_key(&1));
        assert!(iz.is_empty());
    }
}
