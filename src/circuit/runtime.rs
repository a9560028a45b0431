//! `CircuitRuntime` / `CircuitHandle`: single-step, single-threaded
//! execution of the DAG assembled by [`crate::circuit::builder::CircuitBuilder`]
//! (spec §4.4, §5).
//!
//! Spec §5 scopes this crate to **one** synchronous, single-threaded
//! circuit per instance ("multiple independent circuits may run in
//! parallel" means run several `CircuitRuntime`s, not many threads
//! *inside* one). The teacher's `circuit::runtime::Runtime` is instead a
//! multithreaded data-parallel host for many copies of one circuit,
//! built on `crossbeam_utils::sync::Parker` and a kill-signal protocol
//! answering "how do N workers co-run one circuit" — a question this
//! spec does not ask. We keep the teacher's naming (`Runtime`, a handle
//! type) but drop the worker-pool/parker/kill-signal machinery entirely.

use crate::circuit::handle::StreamHandle;
use crate::error::{DbspError, DbspResult};
use std::fmt::{self, Debug, Formatter};

pub(crate) struct ExecutableNode {
    pub(crate) name: String,
    pub(crate) run: Box<dyn FnMut() -> DbspResult<()>>,
}

/// The engine: holds the topologically-ordered executables, the clock
/// handles it auto-increments, and the maintenance pass.
pub struct CircuitRuntime {
    executables: Vec<ExecutableNode>,
    clocks: Vec<StreamHandle<i64>>,
    maintenance: Vec<Box<dyn FnMut() -> DbspResult<()>>>,
    maintenance_every_steps: u64,
    step_count: u64,
    poisoned: Option<DbspError>,
}

impl CircuitRuntime {
    pub(crate) fn new(
        executables: Vec<ExecutableNode>,
        clocks: Vec<StreamHandle<i64>>,
        maintenance: Vec<Box<dyn FnMut() -> DbspResult<()>>>,
        maintenance_every_steps: u64,
    ) -> Self {
        Self {
            executables,
            clocks,
            maintenance,
            maintenance_every_steps,
            step_count: 0,
            poisoned: None,
        }
    }

    fn poisoned_error(&self) -> DbspError {
        DbspError::OperatorStepFailed {
            node: "<circuit>".to_string(),
            cause: Box::new(DbspError::invariant_violation(
                "circuit is poisoned by a prior step failure; dispose and rebuild",
            )),
        }
    }

    /// Executes every node exactly once, in topological order. On
    /// failure the circuit is poisoned (spec §7, `OperatorStepFailed`):
    /// every subsequent `step()` returns `Err` until disposal.
    pub fn step(&mut self) -> DbspResult<()> {
        if self.poisoned.is_some() {
            return Err(self.poisoned_error());
        }

        self.step_count += 1;
        for clock in &self.clocks {
            let current = clock.peek().unwrap_or(0);
            clock.write(current + 1);
        }

        for node in &mut self.executables {
            if let Err(err) = (node.run)() {
                let wrapped = DbspError::OperatorStepFailed {
                    node: node.name.clone(),
                    cause: Box::new(err),
                };
                self.poisoned = Some(DbspError::invariant_violation(format!(
                    "poisoned by failure in '{}'",
                    node.name
                )));
                log::warn!("circuit poisoned at step {}: node '{}' failed", self.step_count, node.name);
                return Err(wrapped);
            }
        }

        if self.maintenance_every_steps != 0 && self.step_count % self.maintenance_every_steps == 0 {
            self.run_maintenance()?;
        }

        Ok(())
    }

    fn run_maintenance(&mut self) -> DbspResult<()> {
        log::debug!("running {} maintenance pass(es) at step {}", self.maintenance.len(), self.step_count);
        for pass in &mut self.maintenance {
            pass()?;
        }
        Ok(())
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Synchronous disposal: a final maintenance flush so attached
    /// traces complete any in-flight compactions (spec §5,
    /// "Cancellation": "`Dispose` of a trace is synchronous and must
    /// complete all in-flight compactions or abandon them safely").
    pub fn dispose(mut self) -> DbspResult<()> {
        self.run_maintenance()
    }
}

/// Closures aren't `Debug`; this reports only the observable state a test
/// failure message needs (step count, poisoned flag).
impl Debug for CircuitRuntime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitRuntime")
            .field("executables", &self.executables.len())
            .field("step_count", &self.step_count)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

/// The user-facing handle returned by `CircuitBuilder::start` (spec
/// §4.4: "build once, then start, step N times, dispose").
pub struct CircuitHandle {
    runtime: CircuitRuntime,
}

impl Debug for CircuitHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitHandle").field("runtime", &self.runtime).finish()
    }
}

impl CircuitHandle {
    pub(crate) fn new(runtime: CircuitRuntime) -> Self {
        Self { runtime }
    }

    pub fn step(&mut self) -> DbspResult<()> {
        self.runtime.step()
    }

    pub fn step_count(&self) -> u64 {
        self.runtime.step_count()
    }

    pub fn is_poisoned(&self) -> bool {
        self.runtime.is_poisoned()
    }

    pub fn dispose(self) -> DbspResult<()> {
        self.runtime.dispose()
    }
}

#[cfg(test)]
mod tests {
    use crate::circuit::builder::CircuitBuilder;
    use crate::error::DbspError;

    #[test]
    fn clock_auto_increments_once_per_step() {
        let mut builder = CircuitBuilder::new();
        let clock = builder.add_clock("clock").unwrap();
        let mut handle = builder.start().unwrap();

        handle.step().unwrap();
        assert_eq!(clock.peek(), Some(1));
        handle.step().unwrap();
        assert_eq!(clock.peek(), Some(2));
        handle.step().unwrap();
        assert_eq!(clock.peek(), Some(3));
    }

    #[test]
    fn operator_failure_poisons_the_circuit() {
        let mut builder = CircuitBuilder::new();
        builder
            .add_executable("boom", &[], || Err(DbspError::invariant_violation("kaboom")))
            .unwrap();
        let mut handle = builder.start().unwrap();

        let first = handle.step();
        assert!(first.is_err());
        assert!(handle.is_poisoned());

        let second = handle.step();
        match second {
            Err(DbspError::OperatorStepFailed { node, .. }) => assert_eq!(node, "<circuit>"),
            other => panic!("expected poisoned error, got {other:?}"),
        }
    }

    #[test]
    fn maintenance_runs_every_n_steps() {
        let mut builder = CircuitBuilder::new();
        let count = std::rc::Rc::new(std::cell::RefCell::new(0));
        let count_clone = count.clone();
        builder.add_maintenance(move || {
            *count_clone.borrow_mut() += 1;
            Ok(())
        });
        builder.set_maintenance_every_steps(2);
        let mut handle = builder.start().unwrap();

        handle.step().unwrap();
        assert_eq!(*count.borrow(), 0);
        handle.step().unwrap();
        assert_eq!(*count.borrow(), 1);
        handle.step().unwrap();
        handle.step().unwrap();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn maintenance_every_steps_zero_means_never() {
        let mut builder = CircuitBuilder::new();
        let count = std::rc::Rc::new(std::cell::RefCell::new(0));
        let count_clone = count.clone();
        builder.add_maintenance(move || {
            *count_clone.borrow_mut() += 1;
            Ok(())
        });
        let mut handle = builder.start().unwrap();
        for _ in 0..10 {
            handle.step().unwrap();
        }
        assert_eq!(*count.borrow(), 0);
    }
}
