//! The LSM backend (spec §4.3.2) and the temporal spine built over it
//! (spec §4.3.3).
//!
//! There is no teacher file to ground a disk-backed merge store on — the
//! teacher crate and its sibling forks either keep traces entirely
//! in-memory (`trace/layers/mod.rs`) or delegate to an external engine
//! (SplinterDB/RocksDB in the feldera forks), and wrapping an
//! unfamiliar external DB crate not otherwise used in the corpus would
//! risk fabricating a dependency with no grounding (see DESIGN.md).
//! `LsmStore` is therefore a from-scratch structure: multiple
//! [`dashmap::DashMap`] "levels" (grounded on the teacher's own use of
//! `dashmap` via the `typedmap`/`dashmap` feature) probed top-to-bottom
//! with merge-on-read weight summation, collapsed on `compact`. The
//! sort/merge/drop-zero discipline in `compact`/`get_iterator` is adapted
//! from the teacher's `trace::consolidation` module.

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{AddByRef, HasZero, IndexedZSet, Weight, WithNumEntries};
use crate::error::{DbspError, DbspResult};
use crate::trace::{LogicalTime, TemporalTrace};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Configuration recognized by the LSM backend and its hybrid tier (spec
/// §4.3.5 — "the only recognized options").
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data_path: Option<PathBuf>,
    pub max_memory_bytes: u64,
    pub compaction_threshold: usize,
    pub write_buffer_size: usize,
    pub block_cache_size: usize,
    pub spill_threshold: f64,
}

/// `{bytesWritten, bytesRead, keysStored, compactionCount,
/// lastCompactionTime?}` (spec §6). Counters are monotonically
/// non-decreasing except `keys_stored`, which tracks the current count.
#[derive(Debug, Clone)]
pub struct Stats {
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub keys_stored: u64,
    pub compaction_count: u64,
    pub last_compaction_time: Option<SystemTime>,
}

struct StatsInner {
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    compaction_count: AtomicU64,
    last_compaction_time: RwLock<Option<SystemTime>>,
}

impl StatsInner {
    fn new() -> Self {
        Self {
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            compaction_count: AtomicU64::new(0),
            last_compaction_time: RwLock::new(None),
        }
    }
}

/// A triple-addressed, signed-weight key/value backend (spec §4.3.2).
/// `V` participates in the physical key so range scans on `K` locate all
/// of its `V`s contiguously, and so negative or zero `V` values are never
/// truncated by lexicographic encoding (spec: "Negative-V keys").
pub struct LsmStore<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    levels: RwLock<Vec<Arc<DashMap<(K, V), Weight>>>>,
    stats: StatsInner,
    data_path: Option<PathBuf>,
}

impl<K, V> LsmStore<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    pub fn new(config: Config) -> Self {
        Self {
            levels: RwLock::new(Vec::new()),
            stats: StatsInner::new(),
            data_path: config.data_path,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Config::default())
    }

    /// Buffer additions as a new top level; duplicates within `triples`
    /// coalesce by addition before the level is pushed.
    pub fn store_batch(&self, triples: Vec<(K, V, Weight)>) -> DbspResult<()> {
        self.store_batch_with_flush(triples, false)
    }

    pub fn store_batch_with_flush(&self, triples: Vec<(K, V, Weight)>, flush: bool) -> DbspResult<()> {
        let level: DashMap<(K, V), Weight> = DashMap::new();
        let mut bytes_written = 0u64;
        for (k, v, w) in triples {
            bytes_written += Self::estimate_triple_size(&k, &v, &w);
            level
                .entry((k, v))
                .and_modify(|existing| *existing = existing.add_by_ref(&w))
                .or_insert(w);
        }
        level.retain(|_, w| !w.is_zero());

        self.levels.write().expect("lsm level lock poisoned").push(Arc::new(level));
        self.stats.bytes_written.fetch_add(bytes_written, Ordering::Relaxed);

        if flush {
            self.compact()?;
        }
        Ok(())
    }

    fn estimate_triple_size(_k: &K, _v: &V, _w: &Weight) -> u64 {
        // A rough, deterministic accounting unit; the exact byte size
        // depends on the caller's codec and is not load-bearing for any
        // tested invariant, only for stats monotonicity.
        std::mem::size_of::<Weight>() as u64 + 16
    }

    /// Merge-on-read: sum every level's weight for `(k,v)` across all
    /// keys matching `k`, returning the first with a non-zero net weight.
    pub fn get(&self, key: &K) -> Option<(V, Weight)> {
        let merged = self.merge_for_key(key);
        self.stats.bytes_read.fetch_add(1, Ordering::Relaxed);
        merged.into_iter().find(|(_, w)| !w.is_zero())
    }

    fn merge_for_key(&self, key: &K) -> Vec<(V, Weight)> {
        let mut acc: BTreeMap<V, Weight> = BTreeMap::new();
        for level in self.levels.read().expect("lsm level lock poisoned").iter() {
            for entry in level.iter() {
                let (k, v) = entry.key();
                if k == key {
                    let slot = acc.entry(v.clone()).or_insert_with(Weight::zero);
                    *slot = slot.add_by_ref(entry.value());
                }
            }
        }
        acc.into_iter().collect()
    }

    /// All non-zero `(k, v, w)` triples, sorted ascending by `(K, V)`.
    pub fn get_iterator(&self) -> Vec<(K, V, Weight)> {
        self.merged_sorted()
    }

    /// Inclusive on both bounds; `None` means unbounded; an inverted
    /// range (`start > end`) yields an empty result (spec §4.3.2).
    pub fn get_range_iterator(&self, start: Option<&K>, end: Option<&K>) -> Vec<(K, V, Weight)> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Vec::new();
            }
        }
        self.merged_sorted()
            .into_iter()
            .filter(|(k, _, _)| {
                start.map_or(true, |s| k >= s) && end.map_or(true, |e| k <= e)
            })
            .collect()
    }

    fn merged_sorted(&self) -> Vec<(K, V, Weight)> {
        let mut acc: BTreeMap<(K, V), Weight> = BTreeMap::new();
        for level in self.levels.read().expect("lsm level lock poisoned").iter() {
            for entry in level.iter() {
                let slot = acc.entry(entry.key().clone()).or_insert_with(Weight::zero);
                *slot = slot.add_by_ref(entry.value());
            }
        }
        acc.into_iter()
            .filter(|(_, w)| !w.is_zero())
            .map(|((k, v), w)| (k, v, w))
            .collect()
    }

    /// Merge all levels into one, folding same-`(K,V)` weights and
    /// dropping zeros; updates `compaction_count`/`last_compaction_time`.
    pub fn compact(&self) -> DbspResult<()> {
        let merged = self.merged_sorted();
        let collapsed: DashMap<(K, V), Weight> = DashMap::new();
        for (k, v, w) in merged {
            collapsed.insert((k, v), w);
        }
        *self.levels.write().expect("lsm level lock poisoned") = vec![Arc::new(collapsed)];
        self.stats.compaction_count.fetch_add(1, Ordering::Relaxed);
        *self
            .stats
            .last_compaction_time
            .write()
            .expect("lsm stats lock poisoned") = Some(SystemTime::now());
        Ok(())
    }

    pub fn get_stats(&self) -> Stats {
        Stats {
            bytes_written: self.stats.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.stats.bytes_read.load(Ordering::Relaxed),
            keys_stored: self.merged_sorted().len() as u64,
            compaction_count: self.stats.compaction_count.load(Ordering::Relaxed),
            last_compaction_time: *self
                .stats
                .last_compaction_time
                .read()
                .expect("lsm stats lock poisoned"),
        }
    }
}

#[cfg(feature = "with-serde")]
impl<K, V> LsmStore<K, V>
where
    K: KeyProperties + Ord + serde::Serialize + serde::de::DeserializeOwned,
    V: KeyProperties + Ord + serde::Serialize + serde::de::DeserializeOwned,
{
    /// Opens a store at `config.data_path`, loading a prior snapshot if
    /// one exists; otherwise starts empty.
    pub fn open(config: Config) -> DbspResult<Self> {
        let store = Self::new(config.clone());
        if let Some(path) = &config.data_path {
            let snapshot_path = path.join("snapshot.bin");
            if snapshot_path.exists() {
                let bytes = fs::read(&snapshot_path)
                    .map_err(|e| DbspError::storage_io(Some(snapshot_path.clone()), e))?;
                let triples: Vec<(K, V, Weight)> = bincode::deserialize(&bytes)?;
                store.store_batch(triples)?;
            }
        }
        Ok(store)
    }

    /// Flushes the current merged state to `DataPath/snapshot.bin`. The
    /// set of files present afterward is sufficient to reconstruct
    /// identical logical state via [`LsmStore::open`].
    pub fn dispose(self) -> DbspResult<()> {
        if let Some(path) = &self.data_path {
            fs::create_dir_all(path).map_err(|e| DbspError::storage_io(Some(path.clone()), e))?;
            let snapshot_path = path.join("snapshot.bin");
            let triples = self.merged_sorted();
            let bytes = bincode::serialize(&triples)?;
            fs::write(&snapshot_path, bytes)
                .map_err(|e| DbspError::storage_io(Some(snapshot_path), e))?;
        }
        Ok(())
    }
}

/// The temporal spine over the LSM backend (spec §4.3.3): an ordered
/// index from logical time to the batch inserted at that time.
/// `query_at_time` sums every bucket with time ≤ *t*.
pub struct LsmTrace<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    spine: BTreeMap<LogicalTime, IndexedZSet<K, V>>,
    frontier: LogicalTime,
}

impl<K, V> LsmTrace<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    pub fn in_memory() -> Self {
        Self {
            spine: BTreeMap::new(),
            frontier: 0,
        }
    }

    pub fn frontier(&self) -> LogicalTime {
        self.frontier
    }

    /// Total leaf entries across every bucket in the spine, used to decide
    /// whether a compaction pass is worth logging.
    pub fn entry_count(&self) -> usize {
        self.spine.values().map(IndexedZSet::num_entries).sum()
    }
}

impl<K, V> Default for LsmTrace<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<K, V> TemporalTrace<K, V> for LsmTrace<K, V>
where
    K: KeyProperties + Ord,
    V: KeyProperties + Ord,
{
    fn insert_batch(&mut self, t: LogicalTime, triples: Vec<(K, V, Weight)>) -> DbspResult<()> {
        // Permissive reading of the open AdvanceFrontier question (spec
        // §9): inserts below the frontier are accepted, not rejected.
        let bucket = IndexedZSet::build_with(triples)?;
        let entry = self.spine.entry(t).or_insert_with(IndexedZSet::empty);
        *entry = entry.add(&bucket)?;
        if entry.is_empty() {
            self.spine.remove(&t);
        }
        Ok(())
    }

    fn query_at_time(&self, t: LogicalTime) -> DbspResult<IndexedZSet<K, V>> {
        let mut result = IndexedZSet::empty();
        for (_, bucket) in self.spine.range(..=t) {
            result = result.add(bucket)?;
        }
        Ok(result)
    }

    fn query_time_range(
        &self,
        lo: Option<LogicalTime>,
        hi: Option<LogicalTime>,
    ) -> DbspResult<Vec<(LogicalTime, IndexedZSet<K, V>)>> {
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                return Ok(Vec::new());
            }
        }
        let lo = lo.unwrap_or(LogicalTime::MIN);
        let hi = hi.unwrap_or(LogicalTime::MAX);
        Ok(self
            .spine
            .range(lo..=hi)
            .map(|(t, bucket)| (*t, bucket.clone()))
            .collect())
    }

    fn compact(&mut self, up_to: LogicalTime) -> DbspResult<()> {
        let to_fold: Vec<LogicalTime> = self.spine.range(..=up_to).map(|(t, _)| *t).collect();
        if to_fold.is_empty() {
            return Ok(());
        }
        let mut merged = IndexedZSet::empty();
        for t in &to_fold {
            if let Some(bucket) = self.spine.remove(t) {
                merged = merged.add(&bucket)?;
            }
        }
        if !merged.is_empty() {
            let entry = self.spine.entry(up_to).or_insert_with(IndexedZSet::empty);
            *entry = entry.add(&merged)?;
        }
        // Queries strictly above `up_to` are unaffected: every folded
        // bucket had time <= up_to, so the new bucket at `up_to`
        // contributes identically to any query_at_time(t) with t >= up_to.
        log::debug!(
            "lsm trace compacted up to t={up_to}, {} buckets folded, {} entries remain",
            to_fold.len(),
            self.entry_count()
        );
        Ok(())
    }

    fn advance_frontier(&mut self, t: LogicalTime) {
        if t > self.frontier {
            self.frontier = t;
        }
    }

    fn dispose(self) -> DbspResult<()> {
        Ok(())
    }

    fn flush_maintenance(&mut self) -> DbspResult<()> {
        self.compact(self.frontier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;

    fn w(n: i64) -> Weight {
        Weight::new(n)
    }

    // Scenario 1.
    #[test]
    fn store_range_query_includes_negative_and_zero_v() {
        let store: LsmStore<i32, i32> = LsmStore::in_memory();
        store
            .store_batch(vec![
                (1, -5, w(1)),
                (1, -1, w(1)),
                (1, 0, w(1)),
                (1, 3, w(1)),
                (0, 100, w(1)),
                (2, 200, w(1)),
            ])
            .unwrap();
        let result = store.get_range_iterator(Some(&1), Some(&1));
        let vs: Vec<i32> = result.iter().map(|(_, v, _)| *v).collect();
        assert_eq!(vs, vec![-5, -1, 0, 3]);
    }

    // Scenario 2.
    #[test]
    fn insert_and_cancel_then_compact_drops_the_key() {
        let store: LsmStore<i32, &str> = LsmStore::in_memory();
        store.store_batch(vec![(1, "X", w(2))]).unwrap();
        store.store_batch(vec![(1, "X", w(-2))]).unwrap();
        store.compact().unwrap();
        assert!(store.get(&1).is_none());
    }

    // Scenario 3.
    #[test]
    fn compact_drops_zero_weight_keeps_negative() {
        let store: LsmStore<i32, &str> = LsmStore::in_memory();
        store
            .store_batch(vec![
                (1, "One", w(1)),
                (2, "Two", w(2)),
                (3, "Three", w(3)),
                (4, "Four", w(0)),
                (5, "Five", w(-1)),
            ])
            .unwrap();
        store.compact().unwrap();
        let all = store.get_iterator();
        assert_eq!(all.len(), 4);
        assert!(!all.iter().any(|(k, _, _)| *k == 4));
        assert!(all.iter().any(|(k, v, wt)| *k == 5 && *v == "Five" && *wt == w(-1)));
    }

    // Scenario 4.
    #[test]
    fn range_iterator_bounds_behave_per_spec() {
        let store: LsmStore<i32, &str> = LsmStore::in_memory();
        let triples: Vec<_> = (1..=10).map(|k| (k, "v", w(1))).collect();
        store.store_batch(triples).unwrap();
        store.compact().unwrap();

        let mid = store.get_range_iterator(Some(&3), Some(&7));
        assert_eq!(mid.iter().map(|(k, _, _)| *k).collect::<Vec<_>>(), (3..=7).collect::<Vec<_>>());

        assert!(store.get_range_iterator(Some(&8), Some(&3)).is_empty());

        let prefix = store.get_range_iterator(None, Some(&5));
        assert_eq!(prefix.iter().map(|(k, _, _)| *k).collect::<Vec<_>>(), (1..=5).collect::<Vec<_>>());

        let suffix = store.get_range_iterator(Some(&4), None);
        assert_eq!(suffix.iter().map(|(k, _, _)| *k).collect::<Vec<_>>(), (4..=10).collect::<Vec<_>>());
    }

    // Scenario 6: four concurrent writers, each owning a disjoint range of
    // keys, racing against one reader that polls `get_iterator` throughout.
    #[test]
    fn disjoint_tenth_cancellation_drops_only_multiples_of_ten() {
        let store: LsmStore<i32, &str> = LsmStore::in_memory();

        std::thread::scope(|scope| {
            for chunk in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    let mut triples = Vec::new();
                    for k in (chunk * 250 + 1)..=((chunk + 1) * 250) {
                        triples.push((k, "v", w(1)));
                        if k % 10 == 0 {
                            triples.push((k, "v", w(-1)));
                        }
                    }
                    store.store_batch(triples).unwrap();
                });
            }

            let store = &store;
            scope.spawn(move || {
                // Every snapshot the reader observes must itself be internally
                // sorted and duplicate-free, concurrently with the writers.
                for _ in 0..50 {
                    let snapshot = store.get_iterator();
                    let mut keys: Vec<i32> = snapshot.iter().map(|(k, _, _)| *k).collect();
                    let mut sorted = keys.clone();
                    sorted.sort_unstable();
                    assert_eq!(keys, sorted);
                    keys.dedup();
                    assert_eq!(keys.len(), snapshot.len());
                }
            });
        });

        store.compact().unwrap();
        let all = store.get_iterator();
        assert_eq!(all.len(), 900);
        assert!(all.iter().all(|(k, _, _)| k % 10 != 0));
        let mut keys: Vec<i32> = all.iter().map(|(k, _, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        keys.dedup();
        assert_eq!(keys.len(), all.len());
    }

    // Scenario 5.
    #[test]
    fn temporal_spine_query_at_time_matches_scenario() {
        let mut trace: LsmTrace<i32, &str> = LsmTrace::in_memory();
        trace
            .insert_batch(1, vec![(1, "a", w(1)), (2, "b", w(1))])
            .unwrap();
        trace
            .insert_batch(2, vec![(1, "a", w(-1)), (3, "c", w(2))])
            .unwrap();

        let at1 = trace.query_at_time(1).unwrap();
        assert!(at1.contains_key(&1));
        assert!(at1.contains_key(&2));

        let at2 = trace.query_at_time(2).unwrap();
        assert!(!at2.contains_key(&1));
        assert!(at2.contains_key(&3));
    }

    #[test]
    fn compact_does_not_affect_queries_strictly_above_the_boundary() {
        let mut trace: LsmTrace<i32, &str> = LsmTrace::in_memory();
        trace.insert_batch(1, vec![(1, "a", w(1))]).unwrap();
        trace.insert_batch(5, vec![(2, "b", w(1))]).unwrap();
        let before = trace.query_at_time(10).unwrap();
        trace.compact(3).unwrap();
        let after = trace.query_at_time(10).unwrap();
        assert_eq!(before, after);
    }

    // Scenario 7.
    #[cfg(feature = "with-serde")]
    #[test]
    fn reopening_a_disposed_store_reproduces_the_same_sorted_iterator() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_path: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let store: LsmStore<i32, String> = LsmStore::open(config.clone()).unwrap();
        store
            .store_batch(vec![
                (1, "a".to_string(), w(2)),
                (2, "b".to_string(), w(-1)),
                (3, "c".to_string(), w(5)),
            ])
            .unwrap();
        let captured = store.get_iterator();
        store.dispose().unwrap();

        let reopened: LsmStore<i32, String> = LsmStore::open(config).unwrap();
        let reloaded = reopened.get_iterator();
        assert_eq!(captured, reloaded);
    }
}
