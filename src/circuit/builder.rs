//! `CircuitBuilder`: constructs the directed graph of a circuit (spec
//! §4.4). Nodes are either operators (registered as type-erased
//! per-step executables) or stream handles (sources/sinks/the clock).
//! `Start()` validates the graph and hands back a [`CircuitHandle`].
//!
//! Grounded on the teacher's own graph bookkeeping dependency
//! (`petgraph`, already in `Cargo.toml`) rather than a hand-rolled
//! topological sort — spec §4.4's "[AMBIENT] Scheduling grounding" note
//! names `petgraph::algo::toposort` over a `petgraph::graph::DiGraph`
//! explicitly.

use crate::circuit::handle::StreamHandle;
use crate::circuit::runtime::{CircuitHandle, CircuitRuntime, ExecutableNode};
use crate::error::{DbspError, DbspResult};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Source,
    Sink,
    Clock,
    Executable { mediator: bool },
}

struct NodeRecord {
    kind: NodeKind,
    type_tag: &'static str,
}

/// A feedback edge exempted from the acyclic check; `mediator` must name
/// a node registered as a mediator (an integrate/differentiate closing
/// the loop).
struct FeedbackEdge {
    mediator: String,
    from: String,
    to: String,
}

pub struct CircuitBuilder {
    nodes: HashMap<String, NodeRecord>,
    edges: Vec<(String, String)>,
    feedback_edges: Vec<FeedbackEdge>,
    executables: Vec<ExecutableNode>,
    clocks: Vec<StreamHandle<i64>>,
    maintenance: Vec<Box<dyn FnMut() -> DbspResult<()>>>,
    maintenance_every_steps: u64,
}

impl CircuitBuilder {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            feedback_edges: Vec::new(),
            executables: Vec::new(),
            clocks: Vec::new(),
            maintenance: Vec::new(),
            maintenance_every_steps: 0,
        }
    }

    /// `MaintenanceEverySteps` (spec §4.4): 0 disables (the resolved
    /// reading of the open question in §9 — "never", not "every step").
    pub fn set_maintenance_every_steps(&mut self, n: u64) {
        self.maintenance_every_steps = n;
    }

    fn register(&mut self, name: &str, kind: NodeKind, type_tag: &'static str) -> DbspResult<()> {
        if self.nodes.contains_key(name) {
            return Err(DbspError::DuplicateName { name: name.to_string() });
        }
        self.nodes.insert(name.to_string(), NodeRecord { kind, type_tag });
        Ok(())
    }

    /// `AddInput<T>(name) -> StreamHandle<T>` — caller-writable before
    /// each step.
    pub fn add_input<T>(&mut self, name: &str) -> DbspResult<StreamHandle<T>> {
        self.register(name, NodeKind::Source, std::any::type_name::<T>())?;
        Ok(StreamHandle::new(name))
    }

    /// `AddOutput(handle, name)` — declares an external observation
    /// point. Fails with `TypeMismatch` if `name` was already bound to a
    /// handle of a different type.
    pub fn add_output<T>(&mut self, handle: &StreamHandle<T>, name: &str) -> DbspResult<()> {
        let type_tag = std::any::type_name::<T>();
        if let Some(existing) = self.nodes.get(name) {
            if existing.type_tag != type_tag {
                return Err(DbspError::TypeMismatch {
                    expected: existing.type_tag.to_string(),
                    found: type_tag.to_string(),
                });
            }
            return Err(DbspError::DuplicateName { name: name.to_string() });
        }
        let _ = handle;
        self.nodes.insert(
            name.to_string(),
            NodeRecord {
                kind: NodeKind::Sink,
                type_tag,
            },
        );
        Ok(())
    }

    /// `AddClock(name) -> StreamHandle<int64>` — the runtime increments
    /// this once per step, starting at the step count at which the
    /// circuit is started.
    pub fn add_clock(&mut self, name: &str) -> DbspResult<StreamHandle<i64>> {
        self.register(name, NodeKind::Clock, std::any::type_name::<i64>())?;
        let handle = StreamHandle::new(name);
        handle.write(0);
        self.clocks.push(handle.clone());
        Ok(handle)
    }

    /// Registers a named mailbox for wiring an executable's output to a
    /// downstream `reads` dependency, without the "caller writes before
    /// every step" contract of `add_input`. The general stream-handle
    /// node spec §4.4 describes; `add_input`/`add_clock` are its two
    /// specialized roles.
    pub fn add_handle<T>(&mut self, name: &str) -> DbspResult<StreamHandle<T>> {
        self.register(name, NodeKind::Source, std::any::type_name::<T>())?;
        Ok(StreamHandle::new(name))
    }

    /// `AddExecutable(op)` — enrolls a user-defined per-step executable.
    /// `reads` names the upstream nodes this executable's `run` closure
    /// observes; the runtime schedules it after all of them.
    pub fn add_executable<F>(&mut self, name: &str, reads: &[&str], run: F) -> DbspResult<()>
    where
        F: FnMut() -> DbspResult<()> + 'static,
    {
        self.register(name, NodeKind::Executable { mediator: false }, "executable")?;
        for upstream in reads {
            self.edges.push((upstream.to_string(), name.to_string()));
        }
        self.executables.push(ExecutableNode {
            name: name.to_string(),
            run: Box::new(run),
        });
        Ok(())
    }

    /// Marks a previously-registered executable as a cycle mediator (an
    /// integrate/differentiate closing a feedback loop with an initial
    /// value) so `add_feedback_edge` can reference it.
    pub fn mark_mediator(&mut self, name: &str) -> DbspResult<()> {
        match self.nodes.get_mut(name) {
            Some(record) if matches!(record.kind, NodeKind::Executable { .. }) => {
                record.kind = NodeKind::Executable { mediator: true };
                Ok(())
            }
            _ => Err(DbspError::invariant_violation(format!(
                "cannot mark unknown or non-executable node '{name}' as a mediator"
            ))),
        }
    }

    /// Declares `from -> to` as an intentionally cyclic edge, mediated by
    /// `mediator_node` (spec §4.4: "feedback edges must be mediated by
    /// an integrate/differentiate with an initial value"). Exempted from
    /// the acyclic check performed at `start()`.
    pub fn add_feedback_edge(&mut self, mediator_node: &str, from: &str, to: &str) {
        self.feedback_edges.push(FeedbackEdge {
            mediator: mediator_node.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// `AddSnapshot(name, trace, clock)` — registers a temporal snapshot
    /// operator (§4.2.6) that reads `clock` (by `peek`, since more than
    /// one node may observe the clock in a step) and writes the
    /// `QueryAtTime` result to a freshly-created output handle.
    pub fn add_snapshot<K, V, T>(
        &mut self,
        name: &str,
        mut op: crate::operator::SnapshotOperator<K, V, T>,
        clock: &StreamHandle<i64>,
    ) -> DbspResult<StreamHandle<crate::algebra::IndexedZSet<K, V>>>
    where
        K: crate::algebra::finite_map::KeyProperties + 'static,
        V: crate::algebra::finite_map::KeyProperties + 'static,
        T: crate::trace::TemporalTrace<K, V> + 'static,
    {
        use crate::operator::{FlushMaintenance, StepUnary};
        use std::cell::RefCell;
        use std::rc::Rc;

        let output: StreamHandle<crate::algebra::IndexedZSet<K, V>> =
            StreamHandle::new(format!("{name}::out"));
        let out_for_step = output.clone();
        let clock_for_step = clock.clone();
        let clock_name = clock.name().to_string();
        let shared = Rc::new(RefCell::new(op));

        let shared_for_step = shared.clone();
        self.add_executable(name, &[clock_name.as_str()], move || {
            let t = clock_for_step.peek().unwrap_or(0) as u64;
            let result = shared_for_step.borrow_mut().step(&t)?;
            out_for_step.write(result);
            Ok(())
        })?;

        let shared_for_maintenance = shared;
        self.add_maintenance(move || shared_for_maintenance.borrow_mut().flush_maintenance());

        Ok(output)
    }

    /// Registers a closure invoked by the maintenance pass (spec §4.4,
    /// "Maintenance hook"): compaction on attached traces, stats
    /// collection, region telemetry flush. Independent of the step DAG.
    pub fn add_maintenance<F>(&mut self, run: F)
    where
        F: FnMut() -> DbspResult<()> + 'static,
    {
        self.maintenance.push(Box::new(run));
    }

    /// Validates the graph and computes a topological order: acyclic
    /// over non-feedback edges; every feedback edge's declared mediator
    /// must be tagged as a mediator node.
    pub fn start(self) -> DbspResult<CircuitHandle> {
        let CircuitBuilder {
            nodes,
            edges,
            feedback_edges,
            executables,
            clocks,
            maintenance,
            maintenance_every_steps,
        } = self;

        for fe in &feedback_edges {
            match nodes.get(&fe.mediator) {
                Some(record) if matches!(record.kind, NodeKind::Executable { mediator: true }) => {}
                Some(_) => {
                    return Err(DbspError::CycleWithoutMediator {
                        description: format!(
                            "node '{}' closes a feedback edge {} -> {} but is not a mediator",
                            fe.mediator, fe.from, fe.to
                        ),
                    })
                }
                None => {
                    return Err(DbspError::CycleWithoutMediator {
                        description: format!("feedback edge names unknown mediator '{}'", fe.mediator),
                    })
                }
            }
        }

        let feedback_pairs: std::collections::HashSet<(String, String)> = feedback_edges
            .iter()
            .map(|fe| (fe.from.clone(), fe.to.clone()))
            .collect();

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();
        for name in nodes.keys() {
            let idx = graph.add_node(name.clone());
            indices.insert(name.clone(), idx);
        }
        for (from, to) in &edges {
            if feedback_pairs.contains(&(from.clone(), to.clone())) {
                continue;
            }
            if let (Some(&f), Some(&t)) = (indices.get(from), indices.get(to)) {
                graph.add_edge(f, t, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| DbspError::CycleWithoutMediator {
            description: format!(
                "cycle through node '{}' not covered by a declared feedback edge",
                graph[cycle.node_id()]
            ),
        })?;

        let order_names: Vec<String> = order.into_iter().map(|idx| graph[idx].clone()).collect();

        let mut by_name: HashMap<String, ExecutableNode> =
            executables.into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut ordered_executables = Vec::with_capacity(by_name.len());
        for name in &order_names {
            if let Some(exec) = by_name.remove(name) {
                ordered_executables.push(exec);
            }
        }

        let runtime = CircuitRuntime::new(ordered_executables, clocks, maintenance, maintenance_every_steps);
        Ok(CircuitHandle::new(runtime))
    }
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_is_rejected() {
        let mut builder = CircuitBuilder::new();
        let _: StreamHandle<i32> = builder.add_input("x").unwrap();
        let err = builder.add_input::<i32>("x").unwrap_err();
        assert!(matches!(err, DbspError::DuplicateName { .. }));
    }

    #[test]
    fn cycle_without_declared_feedback_is_rejected() {
        let mut builder = CircuitBuilder::new();
        builder.add_executable("a", &["b"], || Ok(())).unwrap();
        builder.add_executable("b", &["a"], || Ok(())).unwrap();
        let err = builder.start().unwrap_err();
        assert!(matches!(err, DbspError::CycleWithoutMediator { .. }));
    }

    #[test]
    fn cycle_with_declared_mediator_starts_successfully() {
        let mut builder = CircuitBuilder::new();
        // Cycle: a -> mediator -> b -> a. The a -> mediator edge is
        // declared as feedback, mediated by "mediator" (an
        // integrate/differentiate closing the loop with an initial
        // value), so the remaining mediator -> b -> a chain is acyclic.
        builder.add_executable("mediator", &["a"], || Ok(())).unwrap();
        builder.mark_mediator("mediator").unwrap();
        builder.add_feedback_edge("mediator", "a", "mediator");
        builder.add_executable("b", &["mediator"], || Ok(())).unwrap();
        builder.add_executable("a", &["b"], || Ok(())).unwrap();
        assert!(builder.start().is_ok());
    }

    #[test]
    fn acyclic_graph_topologically_orders_nodes() {
        let mut builder = CircuitBuilder::new();
        let log: std::rc::Rc<std::cell::RefCell<Vec<&'static str>>> =
            std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log_a = log.clone();
        builder.add_executable("a", &[], move || {
            log_a.borrow_mut().push("a");
            Ok(())
        }).unwrap();
        let log_b = log.clone();
        builder.add_executable("b", &["a"], move || {
            log_b.borrow_mut().push("b");
            Ok(())
        }).unwrap();
        let mut handle = builder.start().unwrap();
        handle.step().unwrap();
        assert_eq!(&*log.borrow(), &["a", "b"]);
    }
}
