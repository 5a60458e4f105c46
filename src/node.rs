//! Task nodes: the typed holder for one callable and its plumbing.
//!
//! A node owns its callable, the pending-argument slots, an optional result
//! slot, and its subscriber lists. Typed data flow is hidden inside the
//! subscriber callbacks: linking a child at a position produces a closure of
//! the parent's output type that writes the child's slot and satisfies one
//! incoming edge. The scheduler only ever sees nodes through the
//! non-generic [`ErasedNode`] interface, which is what lets nodes of
//! different signatures coexist in one graph.
//!
//! Readiness protocol: `pending` counts unsatisfied incoming edges and is
//! decremented atomically as parents deliver. The decrement that observes
//! the transition to zero submits the node to the pool, so exactly one
//! parent performs the handoff and no worker ever waits on the counter.

use crate::{
    error::GraphError,
    sched::Scheduler,
    task::{ArgList, SlotAt},
};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use derive_more::Debug;
use std::sync::{Arc, Mutex, Weak};

/// Index of a node in its graph's insertion order.
pub(crate) type NodeId = usize;

/// The boxed callable stored inside a node, already adapted to take its
/// arguments as one tuple.
pub(crate) type BoxedTask<Args, R> = Box<dyn FnMut(Args) -> R + Send>;

/// Callback for one outgoing typed edge of a fanning-out producer. Receives
/// the result by reference and clones it into the child's argument slot.
type ValueSub<R> = Box<dyn Fn(&R, &Arc<Scheduler>) + Send>;

/// Callback for the single consumer of a moved result.
type MoveSub<R> = Box<dyn Fn(R, &Arc<Scheduler>) + Send>;

/// The non-generic face of a node, as seen by the graph and the scheduler.
pub(crate) trait ErasedNode: core::fmt::Debug + Send + Sync {
    /// Invoke the callable with the stored arguments and deliver the result
    /// to subscribers. Runs on a worker thread once `pending` hits zero.
    fn run(self: Arc<Self>, sched: &Arc<Scheduler>);

    /// Satisfy one incoming edge; the decrement that reaches zero owns the
    /// submission of this node to the pool.
    fn satisfy(self: Arc<Self>, sched: &Arc<Scheduler>);

    /// Remaining unsatisfied incoming edges.
    fn pending(&self) -> usize;

    /// Clear the result slot and restore the pending counter to the total
    /// number of incoming edges.
    fn reset(&self);

    /// Insertion-ordered ids of this node's children, both edge kinds.
    fn outgoing(&self) -> Vec<NodeId>;
}

/// Subscriber lists and edge bookkeeping. Mutated only during
/// single-threaded graph construction; read-only while the graph executes.
struct Links<R> {
    /// One cloning callback per outgoing typed edge.
    value_subs: Vec<ValueSub<R>>,
    /// The single consumer of a moved result, when claimed.
    move_sub: Option<MoveSub<R>>,
    /// Children connected by ordering edges.
    plain_subs: Vec<Weak<dyn ErasedNode>>,
    /// Child ids for graph traversal, both edge kinds, insertion order.
    outgoing: Vec<NodeId>,
    /// Bitmask of argument positions already claimed by a typed edge.
    bound: u32,
}

impl<R> Default for Links<R> {
    fn default() -> Self {
        Self {
            value_subs: Vec::new(),
            move_sub: None,
            plain_subs: Vec::new(),
            outgoing: Vec::new(),
            bound: 0,
        }
    }
}

/// Typed state of one task node. Owned by its graph through [`ErasedNode`]
/// and by every [`NodeHandle`] pointing at it.
#[derive(Debug)]
pub(crate) struct NodeInner<Args: ArgList, R> {
    id: NodeId,
    #[debug(skip)]
    task: Mutex<BoxedTask<Args, R>>,
    #[debug(skip)]
    slots: Mutex<Args::Slots>,
    #[debug(skip)]
    result: Mutex<Option<R>>,
    #[debug(skip)]
    links: Mutex<Links<R>>,
    /// Total number of incoming edges. Grows during construction only.
    parent_count: AtomicUsize,
    /// Unsatisfied incoming edges; decremented concurrently by finishing
    /// parents.
    pending: AtomicUsize,
    output_marker: AtomicBool,
}

impl<Args: ArgList, R: Send + 'static> NodeInner<Args, R> {
    fn new(id: NodeId, task: BoxedTask<Args, R>) -> Self {
        // Every argument position is an incoming edge from the start; typed
        // links claim positions that were already counted here.
        Self {
            id,
            task: Mutex::new(task),
            slots: Mutex::new(Args::Slots::default()),
            result: Mutex::new(None),
            links: Mutex::new(Links::default()),
            parent_count: AtomicUsize::new(Args::ARITY),
            pending: AtomicUsize::new(Args::ARITY),
            output_marker: AtomicBool::new(false),
        }
    }

    /// Write `value` into argument position `P` and satisfy one edge.
    /// Invoked by the subscriber closure a linking call produced.
    fn accept<P>(self: Arc<Self>, value: <Args as SlotAt<P>>::Elem, sched: &Arc<Scheduler>)
    where
        Args: SlotAt<P>,
    {
        <Args as SlotAt<P>>::put(
            &mut self.slots.lock().expect("NodeInner::accept: poisoned"),
            value,
        );
        self.satisfy(sched);
    }

    /// Hand the result to subscribers, retaining it per the output policy,
    /// then release ordering-edge children.
    fn deliver(&self, result: R, sched: &Arc<Scheduler>) {
        let links = self.links.lock().expect("NodeInner::deliver: poisoned");
        if let Some(consume) = &links.move_sub {
            // Single consumer claimed the result; the slot stays empty.
            consume(result, sched);
        } else if links.value_subs.is_empty() {
            *self.result.lock().expect("NodeInner::deliver: poisoned") = Some(result);
        } else {
            for sub in &links.value_subs {
                sub(&result, sched);
            }
            if self.output_marker.load(Ordering::Relaxed) {
                *self.result.lock().expect("NodeInner::deliver: poisoned") = Some(result);
            }
        }
        for child in &links.plain_subs {
            let child = child
                .upgrade()
                .expect("NodeInner::deliver: child dropped mid-execution");
            child.satisfy(sched);
        }
    }
}

impl<Args: ArgList, R: Send + 'static> ErasedNode for NodeInner<Args, R> {
    fn run(self: Arc<Self>, sched: &Arc<Scheduler>) {
        let args = {
            let mut slots = self.slots.lock().expect("NodeInner::run: poisoned");
            Args::take(&mut slots).expect("NodeInner::run: submitted with an undelivered argument")
        };
        let result = {
            let mut task = self.task.lock().expect("NodeInner::run: poisoned");
            (*task)(args)
        };
        self.deliver(result, sched);
        tracing::trace!(node = self.id, "task finished");
        sched.task_finished();
    }

    fn satisfy(self: Arc<Self>, sched: &Arc<Scheduler>) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "NodeInner::satisfy: counter underflow");
        if previous == 1 {
            Scheduler::submit(sched, self);
        }
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn reset(&self) {
        *self.result.lock().expect("NodeInner::reset: poisoned") = None;
        self.pending.store(
            self.parent_count.load(Ordering::Relaxed),
            Ordering::Release,
        );
    }

    fn outgoing(&self) -> Vec<NodeId> {
        self.links
            .lock()
            .expect("NodeInner::outgoing: poisoned")
            .outgoing
            .clone()
    }
}

/// Typed handle to one node of a [`Graph`](crate::graph::Graph).
///
/// Handles are cheap to clone and do not borrow the graph; they are the
/// linking and retrieval surface for the node they point at. `Args` is the
/// callable's argument tuple and `R` its result type.
#[must_use]
#[derive(Debug)]
pub struct NodeHandle<Args: ArgList, R> {
    inner: Arc<NodeInner<Args, R>>,
}

impl<Args: ArgList, R> Clone for NodeHandle<Args, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Args: ArgList, R: Send + 'static> NodeHandle<Args, R> {
    pub(crate) fn new(id: NodeId, task: BoxedTask<Args, R>) -> Self {
        Self {
            inner: Arc::new(NodeInner::new(id, task)),
        }
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedNode> {
        Arc::clone(&self.inner) as Arc<dyn ErasedNode>
    }

    /// Declare `parent`'s result as this node's input at `position`.
    ///
    /// The parent may fan out to any number of such edges; each child
    /// receives its own clone of the result. The value arrives as if by
    /// assignment: delivery happens when the parent's callable returns,
    /// and this node runs only after every position and ordering edge has
    /// been satisfied.
    ///
    /// # Errors
    /// [`GraphError::PositionAlreadyBound`] if `position` already has a
    /// parent, and [`GraphError::MoveFanOut`] if the parent's result was
    /// claimed by a [`bind_move`](Self::bind_move) edge.
    ///
    /// # Panics
    /// If `parent` is this node itself.
    pub fn bind<P, PA>(
        &self,
        _position: P,
        parent: &NodeHandle<PA, <Args as SlotAt<P>>::Elem>,
    ) -> Result<(), GraphError>
    where
        Args: SlotAt<P>,
        <Args as SlotAt<P>>::Elem: Clone,
        PA: ArgList,
    {
        assert_ne!(
            self.inner.id, parent.inner.id,
            "NodeHandle::bind: node linked to itself"
        );
        self.ensure_position_free::<P>()?;
        let mut plinks = parent
            .inner
            .links
            .lock()
            .expect("NodeHandle::bind: poisoned");
        if plinks.move_sub.is_some() {
            return Err(GraphError::MoveFanOut);
        }
        let child = Arc::downgrade(&self.inner);
        plinks.value_subs.push(Box::new(
            move |result: &<Args as SlotAt<P>>::Elem, sched: &Arc<Scheduler>| {
                let child = child
                    .upgrade()
                    .expect("NodeHandle::bind: child dropped mid-execution");
                child.accept::<P>(result.clone(), sched);
            },
        ));
        plinks.outgoing.push(self.inner.id);
        drop(plinks);
        self.record_position::<P>();
        Ok(())
    }

    /// Declare `parent`'s result as this node's input at `position`,
    /// transferring it by move.
    ///
    /// This is the only way to consume a result type that is not `Clone`,
    /// and it claims the parent's result exclusively: no further value
    /// edge may leave the parent, and after delivery the parent's result
    /// slot is empty.
    ///
    /// # Errors
    /// [`GraphError::PositionAlreadyBound`] if `position` already has a
    /// parent; [`GraphError::MoveFanOut`] if the parent already has any
    /// value edge; [`GraphError::OutputMoveConflict`] if the parent was
    /// marked as output.
    ///
    /// # Panics
    /// If `parent` is this node itself.
    pub fn bind_move<P, PA>(
        &self,
        _position: P,
        parent: &NodeHandle<PA, <Args as SlotAt<P>>::Elem>,
    ) -> Result<(), GraphError>
    where
        Args: SlotAt<P>,
        PA: ArgList,
    {
        assert_ne!(
            self.inner.id, parent.inner.id,
            "NodeHandle::bind_move: node linked to itself"
        );
        self.ensure_position_free::<P>()?;
        let mut plinks = parent
            .inner
            .links
            .lock()
            .expect("NodeHandle::bind_move: poisoned");
        if plinks.move_sub.is_some() || !plinks.value_subs.is_empty() {
            return Err(GraphError::MoveFanOut);
        }
        if parent.inner.output_marker.load(Ordering::Relaxed) {
            return Err(GraphError::OutputMoveConflict);
        }
        let child = Arc::downgrade(&self.inner);
        plinks.move_sub = Some(Box::new(
            move |result: <Args as SlotAt<P>>::Elem, sched: &Arc<Scheduler>| {
                let child = child
                    .upgrade()
                    .expect("NodeHandle::bind_move: child dropped mid-execution");
                child.accept::<P>(result, sched);
            },
        ));
        plinks.outgoing.push(self.inner.id);
        drop(plinks);
        self.record_position::<P>();
        Ok(())
    }

    /// Declare a pure ordering dependency: this node runs only after
    /// `parent` has finished. No value is transferred.
    ///
    /// # Panics
    /// If `parent` is this node itself.
    pub fn after<PA, PR>(&self, parent: &NodeHandle<PA, PR>)
    where
        PA: ArgList,
        PR: Send + 'static,
    {
        assert_ne!(
            self.inner.id, parent.inner.id,
            "NodeHandle::after: node linked to itself"
        );
        self.inner.parent_count.fetch_add(1, Ordering::Relaxed);
        self.inner.pending.fetch_add(1, Ordering::Relaxed);
        let inner_dyn: Arc<dyn ErasedNode> = self.inner.clone();
        let child: Weak<dyn ErasedNode> = Arc::downgrade(&inner_dyn);
        let mut plinks = parent
            .inner
            .links
            .lock()
            .expect("NodeHandle::after: poisoned");
        plinks.plain_subs.push(child);
        plinks.outgoing.push(self.inner.id);
    }

    /// Request that the result survive past delivery so it can be
    /// [`collect`](Self::collect)ed after the run.
    ///
    /// Without the marker, a result that was fanned out to children is
    /// dropped once they have been served. A result with no value edges is
    /// always retained, marker or not.
    ///
    /// # Errors
    /// [`GraphError::OutputMoveConflict`] if the result is already claimed
    /// by a [`bind_move`](Self::bind_move) edge: a moved result cannot also
    /// be retained.
    pub fn mark_output(&self) -> Result<(), GraphError> {
        let links = self
            .inner
            .links
            .lock()
            .expect("NodeHandle::mark_output: poisoned");
        if links.move_sub.is_some() {
            return Err(GraphError::OutputMoveConflict);
        }
        drop(links);
        self.inner.output_marker.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Inject a literal value into argument `position`, as if a parent had
    /// delivered it.
    ///
    /// Intended for positions that have no parent, to parameterize the
    /// graph before an [`execute`](crate::graph::Graph::execute) (and again
    /// between runs, after a [`reset`](crate::graph::Graph::reset)).
    ///
    /// # Panics
    /// If the node has no unsatisfied inputs left to feed.
    pub fn feed<P>(&self, _position: P, value: <Args as SlotAt<P>>::Elem)
    where
        Args: SlotAt<P>,
    {
        <Args as SlotAt<P>>::put(
            &mut self.inner.slots.lock().expect("NodeHandle::feed: poisoned"),
            value,
        );
        let previous = self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        assert!(
            previous > 0,
            "NodeHandle::feed: node has no unsatisfied inputs"
        );
    }

    /// Retrieve a copy of the stored result, leaving it in place for
    /// further retrieval.
    ///
    /// # Errors
    /// [`GraphError::NoResult`] if the slot is empty: the node has not run,
    /// its result was not retained (see [`mark_output`](Self::mark_output)),
    /// or the graph was reset.
    pub fn collect(&self) -> Result<R, GraphError>
    where
        R: Clone,
    {
        self.inner
            .result
            .lock()
            .expect("NodeHandle::collect: poisoned")
            .clone()
            .ok_or(GraphError::NoResult)
    }

    /// Move the stored result out, leaving the slot empty. The only
    /// retrieval for result types that are not `Clone`.
    ///
    /// # Errors
    /// [`GraphError::NoResult`] if the slot is empty, including on any call
    /// after a successful `take`.
    pub fn take(&self) -> Result<R, GraphError> {
        self.inner
            .result
            .lock()
            .expect("NodeHandle::take: poisoned")
            .take()
            .ok_or(GraphError::NoResult)
    }

    /// Reject a typed edge whose position is already claimed.
    fn ensure_position_free<P>(&self) -> Result<(), GraphError>
    where
        Args: SlotAt<P>,
    {
        let links = self
            .inner
            .links
            .lock()
            .expect("NodeHandle::ensure_position_free: poisoned");
        if links.bound & (1u32 << <Args as SlotAt<P>>::INDEX) != 0 {
            return Err(GraphError::PositionAlreadyBound {
                position: <Args as SlotAt<P>>::INDEX,
            });
        }
        Ok(())
    }

    /// Record the typed-edge claim on position `P` once the edge is wired.
    fn record_position<P>(&self)
    where
        Args: SlotAt<P>,
    {
        self.inner
            .links
            .lock()
            .expect("NodeHandle::record_position: poisoned")
            .bound |= 1u32 << <Args as SlotAt<P>>::INDEX;
    }
}
