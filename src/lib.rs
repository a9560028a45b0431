//! `dbsp-core`: the computational core of an incremental view-maintenance
//! engine built on Differential Dataflow / DBSP semantics.
//!
//! Four layers, leaves first: the weighted-multiset algebra ([`algebra`]),
//! stateful incremental [`operator`]s, a [`trace`]d temporal LSM store, and
//! a synchronous [`circuit`] runtime that drives it all one step at a time.

pub mod algebra;
pub mod circuit;
pub mod error;
pub mod operator;
pub mod trace;

pub use algebra::{IndexedZSet, Weight, ZSet, ZSetBuilder};
pub use circuit::{CircuitBuilder, CircuitHandle, CircuitRuntime, StreamHandle};
pub use error::{DbspError, DbspResult};
