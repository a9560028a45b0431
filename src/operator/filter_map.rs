//! `FilterOperator` / `MapOperator`: stateless per-delta transforms
//! (spec §4.2.4 — "filter and map are applied directly to the delta;
//! they require no state and are always incremental").

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::ZSet;
use crate::error::DbspResult;
use crate::operator::{FlushMaintenance, StepUnary};

/// Drops entries whose key fails `predicate`, preserving weight on
/// survivors. Stateless: `step(delta) = delta.filter(predicate)`.
pub struct FilterOperator<K, P>
where
    K: KeyProperties,
    P: Fn(&K) -> bool,
{
    predicate: P,
    _key: std::marker::PhantomData<K>,
}

impl<K, P> FilterOperator<K, P>
where
    K: KeyProperties,
    P: Fn(&K) -> bool,
{
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            _key: std::marker::PhantomData,
        }
    }
}

impl<K, P> StepUnary<ZSet<K>, ZSet<K>> for FilterOperator<K, P>
where
    K: KeyProperties,
    P: Fn(&K) -> bool,
{
    fn step(&mut self, delta: &ZSet<K>) -> DbspResult<ZSet<K>> {
        delta.filter(&self.predicate)
    }
}

impl<K, P> FlushMaintenance for FilterOperator<K, P>
where
    K: KeyProperties,
    P: Fn(&K) -> bool,
{
}

/// Applies `f` to every key, a group homomorphism when `f` is total (I4):
/// distinct source keys mapping to the same image have their weights
/// summed, and cancel out if opposite in sign. Stateless per delta.
pub struct MapOperator<K, K2, F>
where
    K: KeyProperties,
    K2: KeyProperties,
    F: Fn(&K) -> K2,
{
    f: F,
    _keys: std::marker::PhantomData<(K, K2)>,
}

impl<K, K2, F> MapOperator<K, K2, F>
where
    K: KeyProperties,
    K2: KeyProperties,
    F: Fn(&K) -> K2,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _keys: std::marker::PhantomData,
        }
    }
}

impl<K, K2, F> StepUnary<ZSet<K>, ZSet<K2>> for MapOperator<K, K2, F>
where
    K: KeyProperties,
    K2: KeyProperties,
    F: Fn(&K) -> K2,
{
    fn step(&mut self, delta: &ZSet<K>) -> DbspResult<ZSet<K2>> {
        delta.map_keys(&self.f)
    }
}

impl<K, K2, F> FlushMaintenance for MapOperator<K, K2, F>
where
    K: KeyProperties,
    K2: KeyProperties,
    F: Fn(&K) -> K2,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;

    fn zs(pairs: &[(i32, i64)]) -> ZSet<i32> {
        ZSet::build_with(pairs.iter().map(|&(k, w)| (k, Weight::new(w)))).unwrap()
    }

    #[test]
    fn filter_is_stateless_across_steps() {
        let mut op = FilterOperator::new(|k: &i32| k % 2 == 0);
        let out1 = op.step(&zs(&[(1, 1), (2, 1)])).unwrap();
        assert_eq!(out1.get_weight(&2), Weight::new(1));
        assert!(!out1.contains_key(&1));

        let out2 = op.step(&zs(&[(3, 1), (4, 1)])).unwrap();
        assert_eq!(out2.get_weight(&4), Weight::new(1));
        assert!(!out2.contains_key(&3));
    }

    #[test]
    fn map_merges_and_cancels_per_delta() {
        let mut op = MapOperator::new(|k: &i32| k.abs());
        let out = op.step(&zs(&[(1, 5), (-1, -5)])).unwrap();
        assert!(out.is_empty());
    }
}
