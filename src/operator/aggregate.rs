//! `AggregateOperator`: per-key reduction over an indexed trace
//! (SPEC_FULL.md §4.2 "[SUPPLEMENT] Aggregate operator").
//!
//! Grounded on the teacher's `AggregateIncremental` (`operator/aggregate.rs`
//! in `vmware-database-stream-processor`): that operator is driven by a
//! delta stream plus the *delayed integral* of the same stream, and for
//! every key touched by the delta it retracts the old aggregate (computed
//! against the integral before the delta lands) and inserts the new one
//! (computed against the integral after). Here the integral is kept
//! in-process as `IndexedZSet` state rather than wired through the
//! circuit as a second stream, since this crate's operators own their
//! state directly instead of composing over `Stream`/`Circuit` nodes.

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{IndexedZSet, Weight, ZSet, ZSetBuilder};
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};

/// State: the fully integrated indexed trace `T`. `step(delta)` retracts
/// the aggregate for every key touched by `delta` as it stood before the
/// update, then inserts the recomputed aggregate for that key afterward.
/// Keys untouched by `delta` never recompute (spec: "only consider values
/// in the support of the delta").
pub struct AggregateOperator<K, V, O, F>
where
    K: KeyProperties,
    V: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &ZSet<V>) -> O,
{
    trace: IndexedZSet<K, V>,
    agg_func: F,
}

impl<K, V, O, F> AggregateOperator<K, V, O, F>
where
    K: KeyProperties,
    V: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &ZSet<V>) -> O,
{
    pub fn new(agg_func: F) -> Self {
        Self {
            trace: IndexedZSet::empty(),
            agg_func,
        }
    }
}

impl<K, V, O, F> StepUnary<IndexedZSet<K, V>, ZSet<O>> for AggregateOperator<K, V, O, F>
where
    K: KeyProperties,
    V: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &ZSet<V>) -> O,
{
    fn step(&mut self, delta: &IndexedZSet<K, V>) -> DbspResult<ZSet<O>> {
        let mut builder: ZSetBuilder<O> = ZSetBuilder::with_capacity(delta.key_count() * 2);

        for key in delta.keys() {
            if let Some(old_slice) = self.trace.slice(key) {
                if !old_slice.is_empty() {
                    let old_agg = (self.agg_func)(key, old_slice);
                    builder.add_weight(old_agg, Weight::new(-1))?;
                }
            }
        }

        let updated = self.trace.add(delta)?;

        for key in delta.keys() {
            if let Some(new_slice) = updated.slice(key) {
                if !new_slice.is_empty() {
                    let new_agg = (self.agg_func)(key, new_slice);
                    builder.add_weight(new_agg, Weight::new(1))?;
                }
            }
        }

        self.trace = updated;
        Ok(builder.to_zset())
    }
}

impl<K, V, O, F> FlushMaintenance for AggregateOperator<K, V, O, F>
where
    K: KeyProperties,
    V: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &ZSet<V>) -> O,
{
}
