//! `JoinProjectOperator`: inner join fused with a projection, so the
//! `(VL, VR)` intermediate pair never materializes (spec §4.2.3,
//! "fused join-project avoids materializing the pair when only a
//! projection of it is needed").
//!
//! Shares the three-term decomposition and smaller-side-probes idiom with
//! [`crate::operator::InnerJoinOperator`] (grounded on the same teacher
//! file, `other_examples/...src-operator-join.rs.rs`), but applies the
//! projection closure `F` directly inside the cursor walk instead of
//! building an intermediate `IndexedZSet<K, (VL, VR)>`.

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{IndexedZSet, ZSet, ZSetBuilder};
use crate::error::{DbspError, DbspResult};
use crate::operator::{FlushMaintenance, StepBinary};

pub struct JoinProjectOperator<K, VL, VR, O, F>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &VL, &VR) -> O,
{
    left: IndexedZSet<K, VL>,
    right: IndexedZSet<K, VR>,
    project: F,
}

impl<K, VL, VR, O, F> JoinProjectOperator<K, VL, VR, O, F>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &VL, &VR) -> O,
{
    pub fn new(project: F) -> Self {
        Self {
            left: IndexedZSet::empty(),
            right: IndexedZSet::empty(),
            project,
        }
    }

    fn cross_project(
        &self,
        left: &IndexedZSet<K, VL>,
        right: &IndexedZSet<K, VR>,
        builder: &mut ZSetBuilder<O>,
    ) -> DbspResult<()> {
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
                    builder.add_weight((self.project)(key, vl, vr), weight)?;
                }
            }
        }
        Ok(())
    }
}

impl<K, VL, VR, O, F> StepBinary<IndexedZSet<K, VL>, IndexedZSet<K, VR>, ZSet<O>>
    for JoinProjectOperator<K, VL, VR, O, F>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &VL, &VR) -> O,
{
    fn step(
        &mut self,
        left_delta: &IndexedZSet<K, VL>,
        right_delta: &IndexedZSet<K, VR>,
    ) -> DbspResult<ZSet<O>> {
        let mut builder: ZSetBuilder<O> = ZSetBuilder::with_capacity(0);

        // out = (dL join R) + (L join dR) + (dL join dR), against
        // pre-update state, same ordering constraint as `InnerJoinOperator`.
        self.cross_project(left_delta, &self.right, &mut builder)?;
        self.cross_project(&self.left, right_delta, &mut builder)?;
        self.cross_project(left_delta, right_delta, &mut builder)?;

        self.left = self.left.add(left_delta)?;
        self.right = self.right.add(right_delta)?;

        Ok(builder.to_zset())
    }
}

impl<K, VL, VR, O, F> FlushMaintenance for JoinProjectOperator<K, VL, VR, O, F>
where
    K: KeyProperties,
    VL: KeyProperties,
    VR: KeyProperties,
    O: KeyProperties,
    F: Fn(&K, &VL, &VR) -> O,
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
    fn projection_avoids_materializing_the_pair() {
        let mut op = JoinProjectOperator::new(|_k: &&str, vl: &&str, vr: &i32| format!("{vl}:{vr}"));

        let left = IndexedZSet::build_with([("c1", "widget", w(1))]).unwrap();
        let right = IndexedZSet::build_with([("c1", 42, w(1))]).unwrap();
        let out = op.step(&left, &right).unwrap();
        assert_eq!(out.get_weight(&"widget:42".to_string()), w(1));
    }

    #[test]
    fn matches_join_then_map_semantics() {
        use crate::operator::InnerJoinOperator;

        let mut joined: InnerJoinOperator<i32, &str, i32> = InnerJoinOperator::new();
        let mut fused = JoinProjectOperator::new(|k: &i32, vl: &&str, vr: &i32| (*k, vl.len() as i32 + vr));

        let dl = IndexedZSet::build_with([(1, "ab", w(1)), (2, "cde", w(1))]).unwrap();
        let dr = IndexedZSet::build_with([(1, 10, w(1)), (2, 20, w(1))]).unwrap();

        let pairs = joined.step(&dl, &dr).unwrap();
        let expected: ZSet<(i32, i32)> = ZSet::build_with(pairs.iter().map(|(k, pair, weight)| {
            let &(vl, vr) = pair;
            ((*k, vl.len() as i32 + vr), weight)
        }))
        .unwrap();

        let fused_out = fused.step(&dl, &dr).unwrap();
        assert_eq!(fused_out, expected);
    }
}
