//! `DistinctOperator`: incremental set-ification of a weighted Z-set
//! (SPEC_FULL.md §4.2 "[SUPPLEMENT] Distinct operator").
//!
//! A key's set-presence is `1` if its cumulative weight is strictly
//! positive, `0` otherwise (deletions and multiplicities collapse).
//! Grounded on the same retract-old/insert-new shape as the teacher's
//! `AggregateIncremental` (`operator/aggregate.rs`): only keys touched by
//! the delta can change presence, so the operator recomputes the
//! before/after indicator only for those keys and emits the signed
//! difference.

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{HasZero, Weight, ZSet, ZSetBuilder};
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};

fn presence(weight: Weight) -> Weight {
    if weight.get() > 0 {
        Weight::new(1)
    } else {
        Weight::new(0)
    }
}

/// State: the cumulative weighted trace `T`. Output: the delta of
/// `distinct(T)`, where `distinct` maps every strictly-positive weight to
/// `1` and every non-positive weight to absence.
pub struct DistinctOperator<K>
where
    K: KeyProperties,
{
    trace: ZSet<K>,
}

impl<K> DistinctOperator<K>
where
    K: KeyProperties,
{
    pub fn new() -> Self {
        Self {
            trace: ZSet::empty(),
        }
    }
}

impl<K> Default for DistinctOperator<K>
where
    K: KeyProperties,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> StepUnary<ZSet<K>, ZSet<K>> for DistinctOperator<K>
where
    K: KeyProperties,
{
    fn step(&mut self, delta: &ZSet<K>) -> DbspResult<ZSet<K>> {
        let mut builder: ZSetBuilder<K> = ZSetBuilder::with_capacity(delta.len() * 2);

        let updated = self.trace.add(delta)?;

        for (key, _) in delta.iter() {
            let old_presence = presence(self.trace.get_weight(key));
            let new_presence = presence(updated.get_weight(key));
            // `presence` only ever yields 0 or 1, so this subtraction is
            // always in -1..=1 and never approaches i64's range.
            let change = new_presence - old_presence;
            if !change.is_zero() {
                builder.add_weight(key.clone(), change)?;
            }
        }

        self.trace = updated;
        Ok(builder.to_zset())
    }
}

impl<K> FlushMaintenance for DistinctOperator<K> where K: KeyProperties {}
