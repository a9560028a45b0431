//! `InnerJoinOperator`: incremental equi-join over two indexed traces
//! (spec §4.2.3).
//!
//! The cross-product within a matching key is grounded on the teacher's
//! `operator::join::Join::eval` (`other_examples/...src-operator-join.rs.rs`):
//! for each key present on both sides, multiply every `(value, weight)`
//! pair on the left against every pair on the right. Unlike the teacher,
//! which holds one materialized `IndexedZSet` per side behind a generic
//! `Trie`/`Cursor`, state here is kept directly as two `IndexedZSet`s and
//! the three-term decomposition required by spec §4.2.3 is computed
//! explicitly rather than folded into a single cursor merge, since the
//! three terms (`δL⋈R`, `L⋈δR`, `δL⋈δR`) must be summed *before* the state
//! update to avoid double-counting `δL×δR`.

use crate::algebra::IndexedZSet;
use crate::algebra::finite_map::KeyProperties;
use crate::error::{DbspError, DbspResult};
use crate::operator::{FlushMaintenance, StepBinary};

/// State: two indexed traces, `L : IndexedZSet<K,VL>` and
/// `R : IndexedZSet<K,VR>`. Output: the current delta of `L ⋈ R`.
pub struct InnerJoinOperator<K, VL, VR>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
{
    left: IndexedZSet<K, VL>,
    right: IndexedZSet<K, VR>,
}

impl<K, VL, VR> InnerJoinOperator<K, VL, VR>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
{
    pub fn new() -> Self {
        Self {
            left: IndexedZSet::empty(),
            right: IndexedZSet::empty(),
        }
    }

    /// Joins two fixed-at-this-instant indexed Z-sets, emitting
    /// `(k, vl, vr)` for every shared key, weight `wl * wr`, summed within
    /// a fixed `(k, vl, vr)` and with net-zero results dropped.
    fn cross(
        left: &IndexedZSet<K, VL>,
        right: &IndexedZSet<K, VR>,
    ) -> DbspResult<IndexedZSet<K, (VL, VR)>> {
        let mut out = IndexedZSet::empty();
        // Iterate the outer map of the smaller side and probe the other
        // (grounded on the teacher's merge-join: probe the shorter cursor).
        let probe_left = left.key_count() <= right.key_count();
        let probe = if probe_left { left.keys() } else { right.keys() };

        for key in probe {
            let (left_slice, right_slice) = match (left.slice(key), right.slice(key)) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };

            for (vl, wl) in left_slice.iter() {
                for (vr, wr) in right_slice.iter() {
                    let weight = wl
                        .checked_mul(wr)
                        .ok_or_else(|| DbspError::weight_overflow(key))?;
                    out.insert(key.clone(), (vl.clone(), vr.clone()), weight)?;
                }
            }
        }
        Ok(out)
    }

    fn combine(
        a: IndexedZSet<K, (VL, VR)>,
        b: IndexedZSet<K, (VL, VR)>,
        c: IndexedZSet<K, (VL, VR)>,
    ) -> DbspResult<IndexedZSet<K, (VL, VR)>> {
        a.add(&b)?.add(&c)
    }
}

impl<K, VL, VR> Default for InnerJoinOperator<K, VL, VR>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, VL, VR> StepBinary<IndexedZSet<K, VL>, IndexedZSet<K, VR>, IndexedZSet<K, (VL, VR)>>
    for InnerJoinOperator<K, VL, VR>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
{
    fn step(
        &mut self,
        left_delta: &IndexedZSet<K, VL>,
        right_delta: &IndexedZSet<K, VR>,
    ) -> DbspResult<IndexedZSet<K, (VL, VR)>> {
        // out = (dL join R) + (L join dR) + (dL join dR), computed against
        // the *pre-update* state so dL x dR is not double-counted.
        let dl_join_r = Self::cross(left_delta, &self.right)?;
        let l_join_dr = Self::cross(&self.left, right_delta)?;
        let dl_join_dr = Self::cross(left_delta, right_delta)?;
        let out = Self::combine(dl_join_r, l_join_dr, dl_join_dr)?;

        self.left = self.left.add(left_delta)?;
        self.right = self.right.add(right_delta)?;

        Ok(out)
    }
}

impl<K, VL, VR> FlushMaintenance for InnerJoinOperator<K, VL, VR>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Weight;

    fn w(n: i64) -> Weight {
        Weight::new(n)
    }

    #[test]
    fn matches_spec_customer_scenario() {
        let mut op: InnerJoinOperator<&str, &str, &str> = InnerJoinOperator::new();

        let left1 =
            IndexedZSet::build_with([("c1", "widget", w(1)), ("c2", "gizmo", w(1))]).unwrap();
        let right1 = IndexedZSet::build_with([
            ("c1", "processing", w(1)),
            ("c2", "pending", w(1)),
        ])
        .unwrap();
        let out1 = op.step(&left1, &right1).unwrap();
        assert_eq!(out1.len(), 2);
        assert_eq!(
            out1.slice(&"c1").unwrap().get_weight(&("widget", "processing")),
            w(1)
        );
        assert_eq!(
            out1.slice(&"c2").unwrap().get_weight(&("gizmo", "pending")),
            w(1)
        );

        // Delete-and-insert on one side must produce exactly the cancelling
        // pair plus the new pair.
        let left2 =
            IndexedZSet::build_with([("c1", "widget", w(-1)), ("c1", "sprocket", w(1))]).unwrap();
        let out2 = op.step(&left2, &IndexedZSet::empty()).unwrap();
        assert_eq!(
            out2.slice(&"c1").unwrap().get_weight(&("widget", "processing")),
            w(-1)
        );
        assert_eq!(
            out2.slice(&"c1").unwrap().get_weight(&("sprocket", "processing")),
            w(1)
        );
    }

    #[test]
    fn join_commutativity_at_weight_level() {
        let mut forward: InnerJoinOperator<i32, &str, &str> = InnerJoinOperator::new();
        let mut reversed: InnerJoinOperator<i32, &str, &str> = InnerJoinOperator::new();

        let dl = IndexedZSet::build_with([(1, "a", w(2)), (2, "b", w(1))]).unwrap();
        let dr = IndexedZSet::build_with([(1, "x", w(3)), (2, "y", w(-1))]).unwrap();

        let out_forward = forward.step(&dl, &dr).unwrap();
        let out_reversed = reversed.step(&dr, &dl).unwrap();

        for (k, (vl, vr), weight) in out_forward.iter().map(|(k, pair, w)| (k, pair.clone(), w)) {
            assert_eq!(out_reversed.slice(k).unwrap().get_weight(&(vr, vl)), weight);
        }
    }

    #[test]
    fn no_double_counting_of_delta_cross_delta() {
        let mut op: InnerJoinOperator<i32, &str, &str> = InnerJoinOperator::new();
        let dl = IndexedZSet::build_with([(1, "a", w(1))]).unwrap();
        let dr = IndexedZSet::build_with([(1, "x", w(1))]).unwrap();
        let out = op.step(&dl, &dr).unwrap();
        // Only dl x dr contributes on the first step (state was empty).
        assert_eq!(out.slice(&1).unwrap().get_weight(&("a", "x")), w(1));
        assert_eq!(out.len(), 1);
    }
}
