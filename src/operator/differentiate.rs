//! `DifferentiateOperator`: converts a stream of full snapshots into a
//! stream of deltas (spec §4.2.2).

use crate::algebra::ZSet;
use crate::algebra::finite_map::KeyProperties;
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};

/// State: the previous input snapshot `P`. `step(delta) = difference(delta,
/// P)`, then `P <- delta`.
pub struct DifferentiateOperator<K>
where
    K: KeyProperties,
{
    previous: ZSet<K>,
}

impl<K> DifferentiateOperator<K>
where
    K: KeyProperties,
{
    pub fn new() -> Self {
        Self {
            previous: ZSet::empty(),
        }
    }
}

impl<K> Default for DifferentiateOperator<K>
where
    K: KeyProperties,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> StepUnary<ZSet<K>, ZSet<K>> for DifferentiateOperator<K>
where
    K: KeyProperties,
{
    fn step(&mut self, snapshot: &ZSet<K>) -> DbspResult<ZSet<K>> {
        let out = snapshot.difference(&self.previous)?;
        self.previous = snapshot.clone();
        Ok(out)
    }
}

impl<K> FlushMaintenance for DifferentiateOperator<K> where K: KeyProperties {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;
    use crate::operator::IntegrateOperator;

    fn zs(pairs: &[(&'static str, i64)]) -> ZSet<&'static str> {
        ZSet::build_with(pairs.iter().map(|&(k, w)| (k, Weight::new(w)))).unwrap()
    }

    #[test]
    fn differentiate_inverts_integrate() {
        let deltas = vec![
            zs(&[("alice", 1), ("bob", 1)]),
            zs(&[("alice", -1), ("charlie", 1)]),
            zs(&[("bob", -1)]),
        ];

        let mut integrate = IntegrateOperator::new();
        let mut differentiate = DifferentiateOperator::new();

        for delta in &deltas {
            let snapshot = integrate.step(delta).unwrap();
            let recovered = differentiate.step(&snapshot).unwrap();
            assert_eq!(&recovered, delta);
        }
    }

    #[test]
    fn differentiate_of_empty_is_empty() {
        let mut op: DifferentiateOperator<&str> = DifferentiateOperator::new();
        assert!(op.step(&ZSet::empty()).unwrap().is_empty());
    }
}
