//! The temporal trace and LSM storage layer (L2, spec §4.3): a
//! time-indexed persistent Z-set backed by a log-structured merge store,
//! with merge-on-read weight cancellation and a hybrid memory/disk
//! spill tier.

pub mod codec;
pub mod hybrid;
pub mod lsm;

pub use codec::{BincodeCodec, Codec};
pub use hybrid::{HybridStore, SpillCoordinator, ThresholdSpillCoordinator};
pub use lsm::{Config, LsmStore, LsmTrace, Stats};

use crate::algebra::finite_map::KeyProperties;
use crate::algebra::{IndexedZSet, Weight};
use crate::error::DbspResult;

/// Logical time: a step counter, monotonically advanced by the circuit's
/// clock handle (spec §4.4, `AddClock`).
pub type LogicalTime = u64;

/// The time-indexed persistent Z-set contract (spec §4.3.1).
pub trait TemporalTrace<K, V>
where
    K: KeyProperties,
    V: KeyProperties,
{
    /// Atomically appends a batch at time `t`. Entries within the batch
    /// sharing a `(K,V)` sum their weights; zero-weight results drop.
    /// `t` should be ≥ any previously inserted time, but per the
    /// permissive reading of the open `AdvanceFrontier` question (spec
    /// §9) out-of-order inserts are accepted, not rejected.
    fn insert_batch(&mut self, t: LogicalTime, triples: Vec<(K, V, Weight)>) -> DbspResult<()>;

    /// The sum of all batches with timestamp ≤ `t`, per-(K,V) weights
    /// added and zeros dropped.
    fn query_at_time(&self, t: LogicalTime) -> DbspResult<IndexedZSet<K, V>>;

    /// The per-time buckets within the inclusive range `[lo, hi]`; `None`
    /// on either bound means unbounded.
    fn query_time_range(
        &self,
        lo: Option<LogicalTime>,
        hi: Option<LogicalTime>,
    ) -> DbspResult<Vec<(LogicalTime, IndexedZSet<K, V>)>>;

    /// Collapses all batches with timestamp ≤ `up_to` into one logically
    /// equivalent batch. Queries strictly above `up_to` are unaffected;
    /// the spec does not require preserving intermediate queries at
    /// earlier *t* (see design-note discussion in `trace::lsm`).
    fn compact(&mut self, up_to: LogicalTime) -> DbspResult<()>;

    /// An informational hint; never rejects a subsequent insert below
    /// the frontier.
    fn advance_frontier(&mut self, t: LogicalTime);

    /// Synchronous: flushes in-memory buffers and closes files.
    fn dispose(self) -> DbspResult<()>
    where
        Self: Sized;

    /// Called by the circuit's maintenance pass (spec §4.4, "Maintenance
    /// hook"). Default: nothing to do.
    fn flush_maintenance(&mut self) -> DbspResult<()> {
        Ok(())
    }
}
