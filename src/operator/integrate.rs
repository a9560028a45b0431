//! `IntegrateOperator`: sums deltas over time into a cumulative state
//! (spec §4.2.1).

use crate::algebra::ZSet;
use crate::algebra::finite_map::KeyProperties;
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};

/// State: an accumulator `S`, initially empty. `step` returns the *new
/// state*, not a delta — the operator's purpose is to materialize the
/// integrated view.
pub struct IntegrateOperator<K>
where
    K: KeyProperties,
{
    state: ZSet<K>,
}

impl<K> IntegrateOperator<K>
where
    K: KeyProperties,
{
    pub fn new() -> Self {
        Self {
            state: ZSet::empty(),
        }
    }

    /// The current accumulated state without mutating it.
    pub fn current_state(&self) -> &ZSet<K> {
        &self.state
    }
}

impl<K> Default for IntegrateOperator<K>
where
    K: KeyProperties,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> StepUnary<ZSet<K>, ZSet<K>> for IntegrateOperator<K>
where
    K: KeyProperties,
{
    fn step(&mut self, delta: &ZSet<K>) -> DbspResult<ZSet<K>> {
        self.state = self.state.add(delta)?;
        Ok(self.state.clone())
    }
}

impl<K> FlushMaintenance for IntegrateOperator<K> where K: KeyProperties {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;

    fn zs(pairs: &[(&'static str, i64)]) -> ZSet<&'static str> {
        ZSet::build_with(pairs.iter().map(|&(k, w)| (k, Weight::new(w)))).unwrap()
    }

    #[test]
    fn integrate_idempotence_on_empty_delta() {
        let mut op = IntegrateOperator::new();
        op.step(&zs(&[("alice", 1)])).unwrap();
        let before = op.current_state().clone();
        let result = op.step(&ZSet::empty()).unwrap();
        assert_eq!(result, before);
        assert_eq!(op.current_state(), &before);
    }

    #[test]
    fn integrate_sequence_matches_spec_scenario() {
        let mut op = IntegrateOperator::new();

        let s0 = op.step(&zs(&[("alice", 1), ("bob", 1)])).unwrap();
        assert_eq!(s0, zs(&[("alice", 1), ("bob", 1)]));

        let s1 = op.step(&zs(&[("alice", -1), ("charlie", 1)])).unwrap();
        assert_eq!(s1, zs(&[("bob", 1), ("charlie", 1)]));

        let s2 = op.step(&zs(&[("bob", -1)])).unwrap();
        assert_eq!(s2, zs(&[("charlie", 1)]));

        let s3 = op.step(&zs(&[("charlie", -1), ("alice", 1)])).unwrap();
        assert_eq!(s3, zs(&[("alice", 1)]));
    }
}
