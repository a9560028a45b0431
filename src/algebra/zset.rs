//! `ZSet<K>`: a mapping from keys to non-zero signed weights, closed under
//! union, difference, negation, projection, and filtering (spec §3, §4.1).

use crate::algebra::finite_map::{FiniteHashMap, KeyProperties, MapBuilder};
use crate::algebra::{HasZero, WithNumEntries, Weight};
use crate::error::{DbspError, DbspResult};
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;

/// A weighted multiset over `K`. No entry ever carries weight zero (I1).
#[derive(Clone)]
pub struct ZSet<K> {
    map: FiniteHashMap<K, Weight>,
}

impl<K> ZSet<K>
where
    K: KeyProperties,
{
    /// The empty Z-set, the additive identity.
    pub fn empty() -> Self {
        Self {
            map: FiniteHashMap::empty(),
        }
    }

    /// Number of keys with non-zero weight.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Add `weight` to the current weight of `key`, checking for overflow
    /// and dropping the entry if the result cancels to zero.
    pub fn insert(&mut self, key: K, weight: Weight) -> DbspResult<()> {
        self.map.checked_increment_owned(key, weight)
    }

    /// `a + b`: union with additive weight combination, O(min(|a|,|b|)).
    pub fn add(&self, other: &Self) -> DbspResult<Self> {
        Ok(Self {
            map: self.map.checked_add_by_ref(&other.map)?,
        })
    }

    /// `a - b == add(a, negate(b))`.
    pub fn difference(&self, other: &Self) -> DbspResult<Self> {
        self.add(&other.negate()?)
    }

    /// Flips the sign of every weight.
    pub fn negate(&self) -> DbspResult<Self> {
        Ok(Self {
            map: self.map.checked_neg_by_ref()?,
        })
    }

    pub fn get_weight(&self, key: &K) -> Weight {
        self.map.lookup(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn try_find(&self, key: &K) -> Option<Weight> {
        self.map.get_in_support(key).copied()
    }

    /// Applies `f` to every key and recoalesces; a group homomorphism when
    /// `f` is total (I4) — distinct source keys mapping to the same image
    /// have their weights summed, and cancel out if opposite in sign.
    pub fn map_keys<K2, F>(&self, f: F) -> DbspResult<ZSet<K2>>
    where
        K2: KeyProperties,
        F: Fn(&K) -> K2,
    {
        let mut builder = ZSetBuilder::with_capacity(self.len());
        for (k, w) in self.map.iter() {
            builder.add_weight(f(k), *w)?;
        }
        Ok(builder.to_zset())
    }

    /// Drops entries whose predicate is false, preserving weight on
    /// survivors.
    pub fn filter<P>(&self, predicate: P) -> DbspResult<Self>
    where
        P: Fn(&K) -> bool,
    {
        let mut builder = ZSetBuilder::with_capacity(self.len());
        for (k, w) in self.map.iter() {
            if predicate(k) {
                builder.add_weight(k.clone(), *w)?;
            }
        }
        Ok(builder.to_zset())
    }

    pub fn fold<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, &K, Weight) -> A,
    {
        let mut acc = init;
        for (k, w) in self.map.iter() {
            acc = f(acc, k, *w);
        }
        acc
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, Weight)> {
        self.map.iter().map(|(k, w)| (k, *w))
    }

    /// A builder that accumulates `(k, w)` pairs, coalescing duplicates.
    pub fn build_with<I>(pairs: I) -> DbspResult<Self>
    where
        I: IntoIterator<Item = (K, Weight)>,
    {
        let mut builder = ZSetBuilder::with_capacity(0);
        for (k, w) in pairs {
            builder.add_weight(k, w)?;
        }
        Ok(builder.to_zset())
    }

    /// Deterministic, sorted iteration for tests and canonical comparisons.
    pub fn to_sorted_vec(&self) -> Vec<(K, Weight)>
    where
        K: Ord,
    {
        let mut entries: Vec<(K, Weight)> = self.map.iter().map(|(k, w)| (k.clone(), *w)).collect();
        entries.sort_by(|(k1, _), (k2, _)| k1.cmp(k2));
        entries
    }
}

impl<K> Default for ZSet<K>
where
    K: KeyProperties,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<K> WithNumEntries for ZSet<K>
where
    K: KeyProperties,
{
    fn num_entries(&self) -> usize {
        self.len()
    }
}

impl<K> PartialEq for ZSet<K>
where
    K: KeyProperties,
{
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K> Eq for ZSet<K> where K: KeyProperties {}

impl<K> Debug for ZSet<K>
where
    K: KeyProperties + Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

/// A growable accumulator that coalesces duplicate keys additively; call
/// [`ZSetBuilder::to_zset`] to freeze into a [`ZSet`] with zero entries
/// excluded — the "builder-then-immutable" pattern (spec §9).
pub struct ZSetBuilder<K>
where
    K: KeyProperties,
{
    map: FiniteHashMap<K, Weight>,
}

impl<K> ZSetBuilder<K>
where
    K: KeyProperties,
{
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: FiniteHashMap::with_capacity(capacity),
        }
    }

    /// Additive: repeated calls for the same key accumulate.
    pub fn add_weight(&mut self, key: K, weight: Weight) -> DbspResult<()> {
        self.map.checked_increment_owned(key, weight)
    }

    pub fn to_zset(self) -> ZSet<K> {
        ZSet { map: self.map }
    }
}

impl<K> Default for ZSetBuilder<K>
where
    K: KeyProperties,
{
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
