//! `SnapshotOperator`: the temporal snapshot operator (spec §4.2.6).
//!
//! "Configured with a trace (§4.3) and a clock handle. Per step: read
//! current logical time *t*, call `trace.QueryAtTime(t)`, write the
//! returned multiset as the operator's output handle value. Does not
//! mutate the trace." Grounded on the teacher's read-only cursor
//! operators (`Stream::inspect`/trace readers in `circuit/mod.rs`), which
//! likewise observe a trace without feeding anything back into it; unlike
//! those this operator's "input" is the clock's logical time rather than
//! a delta, so it implements [`StepUnary`] with `In = LogicalTime`.

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::IndexedZSet;
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};
use crate::trace::{LogicalTime, TemporalTrace};

/// Holds a shared handle to a trace; produces the full `QueryAtTime(t)`
/// snapshot on every step without mutating the underlying trace.
pub struct SnapshotOperator<K, V, T>
where
    K: KeyProperties,
    V: KeyProperties,
    T: TemporalTrace<K, V>,
{
    trace: T,
    _keys: std::marker::PhantomData<(K, V)>,
}

impl<K, V, T> SnapshotOperator<K, V, T>
where
    K: KeyProperties,
    V: KeyProperties,
    T: TemporalTrace<K, V>,
{
    pub fn new(trace: T) -> Self {
        Self {
            trace,
            _keys: std::marker::PhantomData,
        }
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut T {
        &mut self.trace
    }
}

impl<K, V, T> StepUnary<LogicalTime, IndexedZSet<K, V>> for SnapshotOperator<K, V, T>
where
    K: KeyProperties,
    V: KeyProperties,
    T: TemporalTrace<K, V>,
{
    fn step(&mut self, current_time: &LogicalTime) -> DbspResult<IndexedZSet<K, V>> {
        self.trace.query_at_time(*current_time)
    }
}

impl<K, V, T> FlushMaintenance for SnapshotOperator<K, V, T>
where
    K: KeyProperties,
    V: KeyProperties,
    T: TemporalTrace<K, V>,
{
    fn flush_maintenance(&mut self) -> DbspResult<()> {
        self.trace.flush_maintenance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;
    use crate::trace::lsm::LsmTrace;

    fn w(n: i64) -> Weight {
        Weight::new(n)
    }

    #[test]
    fn snapshot_tracks_the_clock_without_mutating_the_trace() {
        let mut trace: LsmTrace<i32, &str> = LsmTrace::in_memory();
        trace
            .insert_batch(1, vec![(1, "a", w(1)), (2, "b", w(1))])
            .unwrap();
        trace.insert_batch(3, vec![(2, "b", w(-1)), (3, "c", w(1))]).unwrap();

        let mut op = SnapshotOperator::new(trace);

        let at1 = op.step(&1).unwrap();
        assert!(at1.contains_key(&1));
        assert!(at1.contains_key(&2));
        assert!(!at1.contains_key(&3));

        let at2 = op.step(&2).unwrap();
        assert_eq!(at2, at1);

        let at3 = op.step(&3).unwrap();
        assert!(at3.contains_key(&3));
        assert!(!at3.contains_key(&2));
    }
}
