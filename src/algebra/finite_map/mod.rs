//! A finite map from keys to group values with finite support: non-zero
//! only for a finite number of keys. This is the storage this crate's
//! `ZSet`/`IndexedZSet` facades are built on.

#[cfg(test)]
mod tests;

use crate::algebra::{AddAssignByRef, AddByRef, GroupValue, HasZero, NegByRef, Weight};
use crate::error::{DbspError, DbspResult};
use hashbrown::{
    hash_map,
    hash_map::{Entry, HashMap, RawEntryMut},
};
use std::{
    fmt::{Debug, Formatter, Result},
    hash::Hash,
    mem::swap,
    ops::Add,
};

/// The properties expected of a finite-map key. `Debug` is required so the
/// unbounded user-weight path (`ZSet`/`IndexedZSet`) can name the offending
/// key in a `DbspError::WeightOverflow`.
pub trait KeyProperties: Clone + Eq + Hash + Debug {}

impl<T> KeyProperties for T where T: Clone + Eq + Hash + Debug {}

/// Interface to build maps element-by-element, additive on repeated keys.
pub trait MapBuilder<Key, Value> {
    fn empty() -> Self;
    fn with_capacity(capacity: usize) -> Self;
    fn increment(&mut self, key: &Key, value: Value);
    fn increment_owned(&mut self, key: Key, value: Value);
}

/// A finite map backed by a hash table.
///
/// Invariant: only keys with a non-zero value are present; `increment`,
/// `update`, `add` etc. all restore the invariant by removing an entry the
/// moment its value becomes zero.
#[derive(Clone)]
pub struct FiniteHashMap<Key, Value> {
    pub(crate) value: HashMap<Key, Value>,
}

impl<Key, Value> FiniteHashMap<Key, Value> {
    pub fn new() -> Self {
        Self {
            value: HashMap::default(),
        }
    }

    pub fn with_capacity(size: usize) -> Self {
        Self {
            value: HashMap::with_capacity(size),
        }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Key, Value> {
        self.value.iter()
    }
}

impl<Key, Value> Default for FiniteHashMap<Key, Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Key, Value> IntoIterator for FiniteHashMap<Key, Value> {
    type Item = (Key, Value);
    type IntoIter = hash_map::IntoIter<Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.value.into_iter()
    }
}

impl<'a, Key, Value> IntoIterator for &'a FiniteHashMap<Key, Value> {
    type Item = (&'a Key, &'a Value);
    type IntoIter = hash_map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.value.iter()
    }
}

impl<Key, Value> MapBuilder<Key, Value> for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    fn empty() -> Self {
        Self::new()
    }

    fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity(capacity)
    }

    fn increment(&mut self, key: &Key, value: Value) {
        if value.is_zero() {
            return;
        }
        match self.value.raw_entry_mut().from_key(key) {
            RawEntryMut::Vacant(vacant) => {
                vacant.insert(key.clone(), value);
            }
            RawEntryMut::Occupied(mut occupied) => {
                occupied.get_mut().add_assign_by_ref(&value);
                if occupied.get().is_zero() {
                    occupied.remove_entry();
                }
            }
        }
    }

    fn increment_owned(&mut self, key: Key, value: Value) {
        if value.is_zero() {
            return;
        }
        match self.value.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().add_assign_by_ref(&value);
                if occupied.get().is_zero() {
                    occupied.remove_entry();
                }
            }
        }
    }
}

impl<Key, Value> FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    pub fn lookup(&self, key: &Key) -> Value {
        self.value.get(key).cloned().unwrap_or_else(Value::zero)
    }

    pub fn get_in_support(&self, key: &Key) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.value.contains_key(key)
    }

    pub fn support(&self) -> hash_map::Keys<'_, Key, Value> {
        self.value.keys()
    }

    /// Modify the value associated with `key`, removing the entry if the
    /// result is zero.
    pub fn update<F>(&mut self, key: &Key, f: F)
    where
        F: FnOnce(&mut Value),
    {
        match self.value.raw_entry_mut().from_key(key) {
            RawEntryMut::Occupied(mut oe) => {
                let val = oe.get_mut();
                f(val);
                if val.is_zero() {
                    oe.remove();
                }
            }
            RawEntryMut::Vacant(ve) => {
                let mut val = Value::zero();
                f(&mut val);
                if !val.is_zero() {
                    ve.insert(key.clone(), val);
                }
            }
        }
    }
}

/// The checked counterpart to [`MapBuilder::increment_owned`]/[`AddByRef`]/
/// [`NegByRef`] for `Weight`-valued maps, used on the unbounded user-weight
/// path (`ZSet`/`IndexedZSet`): returns `WeightOverflow` with the offending
/// key instead of panicking. Specialized on `Weight` rather than generalized
/// over `GroupValue` since `Weight` is the only value type this crate ever
/// stores in a `FiniteHashMap`.
impl<Key> FiniteHashMap<Key, Weight>
where
    Key: KeyProperties,
{
    pub fn checked_increment_owned(&mut self, key: Key, value: Weight) -> DbspResult<()> {
        if value.is_zero() {
            return Ok(());
        }
        match self.value.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
            Entry::Occupied(mut occupied) => {
                let combined = occupied
                    .get()
                    .checked_add(value)
                    .ok_or_else(|| DbspError::weight_overflow(occupied.key()))?;
                if combined.is_zero() {
                    occupied.remove_entry();
                } else {
                    *occupied.get_mut() = combined;
                }
            }
        }
        Ok(())
    }

    pub fn checked_add_by_ref(&self, other: &Self) -> DbspResult<Self> {
        let mut result = self.clone();
        for (key, value) in other.value.iter() {
            result.checked_increment_owned(key.clone(), *value)?;
        }
        Ok(result)
    }

    pub fn checked_neg_by_ref(&self) -> DbspResult<Self> {
        let mut result = self.clone();
        for (key, value) in result.value.iter_mut() {
            *value = value
                .checked_neg()
                .ok_or_else(|| DbspError::weight_overflow(key))?;
        }
        Ok(result)
    }
}

impl<Key, Value> Add for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    type Output = Self;

    fn add(self, other: Self) -> Self {
        fn add_inner<Key, Value>(
            mut this: FiniteHashMap<Key, Value>,
            other: FiniteHashMap<Key, Value>,
        ) -> FiniteHashMap<Key, Value>
        where
            Key: KeyProperties,
            Value: GroupValue,
        {
            for (key, value) in other.value {
                match this.value.entry(key) {
                    Entry::Vacant(vacant) => {
                        vacant.insert(value);
                    }
                    Entry::Occupied(mut occupied) => {
                        occupied.get_mut().add_assign_by_ref(&value);
                        if occupied.get().is_zero() {
                            occupied.remove_entry();
                        }
                    }
                }
            }
            this
        }

        // Walk the smaller side, merge into the larger.
        if self.len() >= other.len() {
            add_inner(self, other)
        } else {
            add_inner(other, self)
        }
    }
}

impl<Key, Value> AddByRef for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    fn add_by_ref(&self, other: &Self) -> Self {
        self.clone().add(other.clone())
    }
}

impl<Key, Value> HasZero for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    fn is_zero(&self) -> bool {
        self.value.is_empty()
    }

    fn zero() -> Self {
        Self::default()
    }
}

impl<Key, Value> NegByRef for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    fn neg_by_ref(&self) -> Self {
        let mut result = self.clone();
        for val in result.value.values_mut() {
            let mut tmp = Value::zero();
            swap(val, &mut tmp);
            *val = tmp.neg_by_ref();
        }
        result
    }
}

impl<Key, Value> PartialEq for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
    fn eq(&self, other: &Self) -> bool {
        self.value.eq(&other.value)
    }
}

impl<Key, Value> Eq for FiniteHashMap<Key, Value>
where
    Key: KeyProperties,
    Value: GroupValue,
{
}

impl<K, V> Debug for FiniteHashMap<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.value.fmt(f)
    }
}
