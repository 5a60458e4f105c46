//! Concurrent executor for user-assembled DAGs of typed tasks.
//!
//! This crate runs a directed acyclic graph of pure functions with
//! move-when-possible data passing and a fixed-size worker pool. It:
//! - Lets tasks of arbitrary signatures (arity 0 to 8, any `Send` types)
//!   coexist in one graph behind a non-generic scheduling interface.
//! - Carries values along typed edges into specific argument positions of
//!   the consumer, cloning only where fan-out demands it and moving
//!   move-only results into their single consumer.
//! - Schedules reactively: the parent delivery that satisfies a child's
//!   last input submits that child, so workers never wait on a counter.
//!
//! Key modules:
//! - `graph`: the [`Graph`](graph::Graph) owner with the node factory,
//!   cycle detection, reset, and the blocking execute driver.
//! - `node`: typed task nodes and the [`NodeHandle`](node::NodeHandle)
//!   linking/retrieval surface.
//! - `task`: the factory traits deducing a node's shape from its callable,
//!   plus the positional markers `P0`..`P7`.
//! - `error`: the [`GraphError`](error::GraphError) contract-violation and
//!   retrieval errors.
//!
//! Quick start:
//!
//! ```
//! use graphex::{graph::Graph, task::P0};
//!
//! let mut graph = Graph::new(2);
//! let base = graph.node(|| 21);
//! let double = graph.node(|x: i32| x * 2);
//! double.bind(P0, &base)?;
//! double.mark_output()?;
//! assert!(!graph.has_cycle());
//! graph.execute();
//! assert_eq!(double.collect()?, 42);
//! # Ok::<(), graphex::error::GraphError>(())
//! ```
//!
//! For any edge, the child's callable is never invoked before the parent's
//! has returned and delivered; siblings run in unspecified, possibly
//! simultaneous order. Each node executes exactly once per `execute`;
//! rerunning requires an explicit `reset` (and refeeding any parentless
//! positions).

#![warn(missing_docs)]

/// Contract-violation and retrieval errors surfaced to the host program.
pub mod error;
/// The graph: node ownership, construction primitives, cycle detection,
/// reset, and the blocking execute driver.
pub mod graph;
/// Task nodes and the typed handle used for linking, feeding, and result
/// retrieval.
pub mod node;
mod pool;
mod sched;
/// The typed factory surface: argument-list and callable traits plus the
/// positional markers `P0`..`P7`.
pub mod task;
