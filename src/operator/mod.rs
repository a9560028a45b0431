//! Incremental operators (L1): stateful nodes whose output delta is
//! provably equivalent to a full recomputation applied to the new input,
//! but whose cost is proportional to delta size (spec §4.2).
//!
//! Every operator conforms to one of two narrow capability traits —
//! [`StepUnary`] or [`StepBinary`] — plus the optional [`FlushMaintenance`]
//! hook used by the circuit's maintenance pass (spec §4.4, "Maintenance
//! hook"). Private state is opaque to the circuit runtime, which only ever
//! calls `step`.

mod aggregate;
mod differentiate;
mod distinct;
mod filter_map;
mod integrate;
mod join;
mod join_project;
mod snapshot;

pub use aggregate::AggregateOperator;
pub use differentiate::DifferentiateOperator;
pub use distinct::DistinctOperator;
pub use filter_map::{FilterOperator, MapOperator};
pub use integrate::IntegrateOperator;
pub use join::InnerJoinOperator;
pub use join_project::JoinProjectOperator;
pub use snapshot::SnapshotOperator;

use crate::error::DbspResult;

/// An operator that consumes one input delta and produces one output delta
/// per step.
pub trait StepUnary<In, Out> {
    fn step(&mut self, delta: &In) -> DbspResult<Out>;
}

/// An operator that consumes a delta from each of two input ports.
pub trait StepBinary<Left, Right, Out> {
    fn step(&mut self, left_delta: &Left, right_delta: &Right) -> DbspResult<Out>;
}

/// Operators that hold a trace and want a chance to compact/collect stats
/// during the circuit's periodic maintenance pass (spec §4.4).
pub trait FlushMaintenance {
    fn flush_maintenance(&mut self) -> DbspResult<()> {
        Ok(())
    }
}
