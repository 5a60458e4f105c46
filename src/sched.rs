use crate::{node::ErasedNode, pool::WorkerPool};
use std::sync::{Arc, Condvar, Mutex};

/// Shared execution state: the submit side of the worker pool plus the
/// all-finished rendezvous that `Graph::execute` blocks on.
///
/// The scheduler is shared (via `Arc`) between the graph and every unit of
/// work in flight, so the final decrementer of a child's pending counter can
/// hand that child to the pool from whichever worker thread it happens to be
/// on.
#[derive(Debug)]
pub(crate) struct Scheduler {
    pool: WorkerPool,
    progress: Mutex<Progress>,
    done: Condvar,
}

#[derive(Debug, Default)]
struct Progress {
    finished: usize,
    target: usize,
}

impl Scheduler {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            pool: WorkerPool::new(workers),
            progress: Mutex::default(),
            done: Condvar::new(),
        }
    }

    /// Hand a ready node to the pool. Safe from any thread.
    pub(crate) fn submit(this: &Arc<Self>, node: Arc<dyn ErasedNode>) {
        let sched = Arc::clone(this);
        this.pool.submit(move || node.run(&sched));
    }

    /// Arm the completion predicate for a run over `target` nodes.
    pub(crate) fn begin(&self, target: usize) {
        let mut progress = self.progress.lock().expect("Scheduler::begin: poisoned");
        progress.finished = 0;
        progress.target = target;
    }

    /// Record one finished node; wakes the waiter once the predicate holds.
    pub(crate) fn task_finished(&self) {
        let mut progress = self
            .progress
            .lock()
            .expect("Scheduler::task_finished: poisoned");
        progress.finished += 1;
        if progress.finished >= progress.target {
            self.done.notify_all();
        }
    }

    /// Block until every node of the current run has finished.
    pub(crate) fn wait_all(&self) {
        let mut progress = self.progress.lock().expect("Scheduler::wait_all: poisoned");
        while progress.finished < progress.target {
            progress = self
                .done
                .wait(progress)
                .expect("Scheduler::wait_all: poisoned");
        }
    }
}
