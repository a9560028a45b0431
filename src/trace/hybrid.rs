//! The hybrid memory/disk tier (spec §4.3.4): buffers small batches in
//! memory and spills to the [`crate::trace::lsm::LsmStore`] once a
//! threshold is crossed. Visibility rule: after a spill, in-memory
//! updates for a `(K,V)` are added **on top of** the disk version, never
//! replacing it, since weights are additive.
//!
//! Mirrors `LsmStore`'s public surface (`store_batch`, `get`,
//! `get_iterator`, `get_range_iterator`, `compact`, `get_stats`) rather
//! than introducing a separate vocabulary, so callers can swap one for
//! the other. Grounded the same way as `LsmStore` — no teacher file
//! covers a disk-spill tier, so this is built from the spec's own
//! description rather than imitating a specific corpus file (see
//! DESIGN.md).

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{AddByRef, HasZero, Weight};
use crate::error::DbspResult;
use crate::trace::lsm::{Config, LsmStore, Stats};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Decides whether a single batch is large enough to force an immediate
/// spill, independent of the cumulative-bytes threshold (spec §4.3.4,
/// condition (b)).
pub trait SpillCoordinator {
    fn should_spill(&self, batch_bytes: u64) -> bool;
}

/// The default coordinator: spill a batch immediately if it alone would
/// exceed `spill_threshold * max_memory_bytes`.
pub struct ThresholdSpillCoordinator {
    pub spill_threshold: f64,
    pub max_memory_bytes: u64,
}

impl SpillCoordinator for ThresholdSpillCoordinator {
    fn should_spill(&self, batch_bytes: u64) -> bool {
        (batch_bytes as f64) >= self.spill_threshold * self.max_memory_bytes as f64
    }
}

pub struct HybridStore<K, V, C = ThresholdSpillCoordinator>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
    C: SpillCoordinator,
{
    memory: DashMap<(K, V), Weight>,
    disk: LsmStore<K, V>,
    buffered_bytes: AtomicU64,
    spill_threshold: f64,
    max_memory_bytes: u64,
    coordinator: C,
}

impl<K, V> HybridStore<K, V, ThresholdSpillCoordinator>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    pub fn new(config: Config) -> Self {
        let coordinator = ThresholdSpillCoordinator {
            spill_threshold: config.spill_threshold,
            max_memory_bytes: config.max_memory_bytes,
        };
        Self::with_coordinator(config, coordinator)
    }
}

impl<K, V, C> HybridStore<K, V, C>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
    C: SpillCoordinator,
{
    pub fn with_coordinator(config: Config, coordinator: C) -> Self {
        Self {
            memory: DashMap::new(),
            spill_threshold: config.spill_threshold,
            max_memory_bytes: config.max_memory_bytes,
            disk: LsmStore::new(config),
            buffered_bytes: AtomicU64::new(0),
            coordinator,
        }
    }

    pub fn store_batch(&self, triples: Vec<(K, V, Weight)>) -> DbspResult<()> {
        self.store_batch_with_flush(triples, false)
    }

    pub fn store_batch_with_flush(&self, triples: Vec<(K, V, Weight)>, flush: bool) -> DbspResult<()> {
        let batch_bytes = (triples.len() * (std::mem::size_of::<Weight>() + 16)) as u64;

        for (k, v, w) in triples {
            self.memory
                .entry((k, v))
                .and_modify(|existing| *existing = existing.add_by_ref(&w))
                .or_insert(w);
        }
        self.memory.retain(|_, w| !w.is_zero());
        let buffered = self.buffered_bytes.fetch_add(batch_bytes, Ordering::Relaxed) + batch_bytes;

        let crosses_cumulative_threshold =
            (buffered as f64) >= self.spill_threshold * self.max_memory_bytes as f64;
        if flush || self.coordinator.should_spill(batch_bytes) || crosses_cumulative_threshold {
            self.spill()?;
        }
        Ok(())
    }

    /// Flushes all buffered in-memory updates into the LSM backend.
    pub fn spill(&self) -> DbspResult<()> {
        let drained: Vec<(K, V, Weight)> = self
            .memory
            .iter()
            .map(|entry| {
                let (k, v) = entry.key().clone();
                (k, v, *entry.value())
            })
            .collect();
        if drained.is_empty() {
            return Ok(());
        }
        self.disk.store_batch(drained)?;
        self.memory.clear();
        self.buffered_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn combined(&self) -> BTreeMap<(K, V), Weight> {
        let mut acc: BTreeMap<(K, V), Weight> = BTreeMap::new();
        for (k, v, w) in self.disk.get_iterator() {
            acc.insert((k, v), w);
        }
        for entry in self.memory.iter() {
            let slot = acc.entry(entry.key().clone()).or_insert_with(Weight::zero);
            *slot = slot.add_by_ref(entry.value());
        }
        acc.retain(|_, w| !w.is_zero());
        acc
    }

    pub fn get(&self, key: &K) -> Option<(V, Weight)> {
        self.combined()
            .into_iter()
            .find(|((k, _), _)| k == key)
            .map(|((_, v), w)| (v, w))
    }

    pub fn get_iterator(&self) -> Vec<(K, V, Weight)> {
        self.combined().into_iter().map(|((k, v), w)| (k, v, w)).collect()
    }

    pub fn get_range_iterator(&self, start: Option<&K>, end: Option<&K>) -> Vec<(K, V, Weight)> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Vec::new();
            }
        }
        self.get_iterator()
            .into_iter()
            .filter(|(k, _, _)| start.map_or(true, |s| k >= s) && end.map_or(true, |e| k <= e))
            .collect()
    }

    pub fn compact(&self) -> DbspResult<()> {
        self.spill()?;
        self.disk.compact()
    }

    pub fn get_stats(&self) -> Stats {
        self.disk.get_stats()
    }

    /// Flushes any unspilled updates before the store is dropped (spec
    /// design note: "on Dispose, any unspilled updates must be flushed").
    pub fn dispose(self) -> DbspResult<()> {
        self.spill()
    }
}
