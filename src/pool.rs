use derive_more::Debug;

/// Fixed-size pool of worker threads executing submitted closures.
///
/// The pool is a contract-level wrapper: a bounded set of `workers` threads,
/// a non-blocking `submit` that is safe from any thread including a running
/// worker, and shutdown on drop (intake stops, workers wind down once the
/// queue drains). A panicking closure terminates only its own unit of work;
/// the panic is intercepted by the pool's handler and the worker stays
/// alive.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    #[debug(skip)]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool of `workers` threads. A worker count of zero is
    /// normalized to one.
    pub(crate) fn new(workers: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("graphex-worker-{index}"))
            .panic_handler(|payload| {
                let message = if let Some(message) = payload.downcast_ref::<&str>() {
                    *message
                } else if let Some(message) = payload.downcast_ref::<String>() {
                    message.as_str()
                } else {
                    "opaque panic payload"
                };
                tracing::error!("task panicked inside the worker pool: {message}");
            })
            .build()
            .expect("WorkerPool::new: failed to build the worker pool");
        Self { pool }
    }

    /// Enqueue a closure for execution; never blocks.
    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.pool.spawn(job);
    }
}
