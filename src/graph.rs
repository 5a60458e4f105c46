//! The graph: node ownership, construction, inspection, and the execute
//! driver.
//!
//! The driver is reactive: `execute` seeds the pool with every node whose
//! pending count is already zero and then blocks on the all-finished
//! rendezvous. Everything downstream is driven by delivery: a finishing
//! parent decrements each child's counter, and the decrement that observes
//! zero submits that child. The calling thread never walks the graph during
//! the run and no worker ever spins on a counter.

use crate::{
    node::{ErasedNode, NodeHandle, NodeId},
    sched::Scheduler,
    task::{ArgList, TaskFn},
};
use derive_more::Debug;
use std::sync::Arc;

/// A user-assembled DAG of typed tasks and the machinery to run it.
///
/// The graph owns every node created through [`node`](Self::node) and the
/// worker pool that runs them. Construction (creating nodes, linking,
/// feeding) is single-threaded; [`execute`](Self::execute) then runs
/// independent tasks in parallel across the pool.
#[must_use]
#[derive(Debug)]
pub struct Graph {
    /// Insertion order here is the iteration order of every traversal.
    nodes: Vec<Arc<dyn ErasedNode>>,
    sched: Arc<Scheduler>,
}

impl Graph {
    /// Create a graph whose pool has `workers` threads. A worker count of
    /// zero is normalized to one.
    pub fn new(workers: usize) -> Self {
        Self {
            nodes: Vec::new(),
            sched: Arc::new(Scheduler::new(workers)),
        }
    }

    /// Create a node from `task` and register it with the graph.
    ///
    /// The callable's signature determines the node's shape: its arity
    /// (which also initializes the parent and pending counts) and its
    /// result type. The returned handle is the node's linking and
    /// retrieval surface; the graph keeps ownership of the node itself.
    pub fn node<F, Args>(&mut self, task: F) -> NodeHandle<Args, F::Output>
    where
        F: TaskFn<Args>,
        Args: ArgList,
    {
        let id = self.nodes.len();
        let mut task = task;
        let handle = NodeHandle::new(id, Box::new(move |args| task.invoke(args)));
        self.nodes.push(handle.erased());
        handle
    }

    /// Number of nodes registered in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the `parent -> child` relation contains a cycle.
    ///
    /// Three-color depth-first search from every node: a node is marked
    /// in-progress on entry and done on exit, and meeting an in-progress
    /// node again is a back edge. Nodes and their outgoing edges are
    /// visited in insertion order. O(V + E).
    ///
    /// The check is advisory; `execute` does not re-run it, and executing
    /// a cyclic graph blocks forever.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let children: Vec<Vec<NodeId>> = self.nodes.iter().map(|node| node.outgoing()).collect();
        let mut marks = vec![Mark::Unvisited; children.len()];

        for root in 0..children.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            // Iterative DFS; each frame remembers how far along its child
            // list it has descended.
            let mut stack = vec![(root, 0usize)];
            loop {
                let Some(&mut (node, ref mut cursor)) = stack.last_mut() else {
                    break;
                };
                let next = children[node].get(*cursor).copied();
                *cursor += 1;
                match next {
                    None => {
                        marks[node] = Mark::Done;
                        stack.pop();
                    }
                    Some(child) => match marks[child] {
                        Mark::InProgress => return true,
                        Mark::Unvisited => {
                            marks[child] = Mark::InProgress;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    },
                }
            }
        }
        false
    }

    /// Clear every result slot and restore every pending counter to its
    /// parent count.
    ///
    /// After a reset, a subsequent [`execute`](Self::execute) recomputes
    /// every node (re-arming the finished-node count as it starts);
    /// positions with no parent must be fed again first.
    pub fn reset(&mut self) {
        for node in &self.nodes {
            node.reset();
        }
    }

    /// Run the graph to completion, blocking until every registered node
    /// has finished.
    ///
    /// Roots (nodes whose pending count is already zero, whether parentless
    /// or fully fed) are submitted to the pool; each finishing node then
    /// releases its children. The ready set is snapshotted before anything
    /// is submitted, so a root finishing mid-seed cannot get a child
    /// submitted twice.
    ///
    /// Runs are not idempotent on their own: call [`reset`](Self::reset)
    /// before executing again. A task that panics is swallowed by the pool
    /// and its descendants never fire, leaving this call blocked.
    pub fn execute(&mut self) {
        let _span = tracing::debug_span!("execute", nodes = self.nodes.len()).entered();
        self.sched.begin(self.nodes.len());
        let ready: Vec<_> = self
            .nodes
            .iter()
            .filter(|node| node.pending() == 0)
            .map(Arc::clone)
            .collect();
        tracing::debug!(roots = ready.len(), "seeding ready nodes");
        for node in ready {
            Scheduler::submit(&self.sched, node);
        }
        self.sched.wait_all();
    }
}

impl Default for Graph {
    /// A graph with a single worker.
    fn default() -> Self {
        Self::new(1)
    }
}
