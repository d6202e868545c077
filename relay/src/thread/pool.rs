//! # Worker Pool
//!
//! Owns a fixed set of workers for its whole lifetime and turns method calls
//! into packets on a chosen worker's inbox.
//!
//! ```rust
//! use relay::thread::{PoolConfig, Worker, WorkerPool};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     records: Vec<String>,
//! }
//!
//! impl Recorder {
//!     fn record(&mut self, text: String) {
//!         self.records.push(text);
//!     }
//! }
//!
//! impl Worker for Recorder {}
//!
//! let pool = WorkerPool::new(PoolConfig::with_workers(2), |_| Recorder::default()).unwrap();
//! pool.start().unwrap();
//! assert!(pool.invoke(1, Recorder::record, ("abc".to_string(),)));
//! assert!(!pool.invoke(5, Recorder::record, ("lost".to_string(),)));
//!
//! let recorders = pool.shutdown().unwrap();
//! assert!(recorders[0].records.is_empty());
//! assert_eq!(recorders[1].records, vec!["abc"]);
//! ```
//!
//! Shutdown follows stop-all-before-join-any: every worker is told to stop
//! first, then each is joined in index order. Dropping the pool does the same.

use relay_api::{Message, Packet};
use tracing::debug;
use uuid::Uuid;

use crate::thread::call::{ClosureCall, Method, MethodCall};
use crate::thread::config::PoolConfig;
use crate::thread::error::PoolError;
use crate::thread::stats::StatsSnapshot;
use crate::thread::worker::{Worker, WorkerHandle, WorkerState};

/// A fixed-size pool of worker threads over state type `W`.
pub struct WorkerPool<W: Worker> {
    /// Unique id, recorded on every log span of this pool
    id: Uuid,
    config: PoolConfig,
    workers: Vec<WorkerHandle<W>>,
}

impl<W: Worker> std::fmt::Debug for WorkerPool<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("workers", &self.workers)
            .finish()
    }
}

impl<W: Worker> WorkerPool<W> {
    /// Creates `config.worker_count` workers, building each one's state with
    /// `factory(index)`.
    ///
    /// Threads are spawned here only when `config.autostart` is set; otherwise
    /// call [`start`](Self::start). Packets sent before start are queued.
    pub fn new<F>(config: PoolConfig, mut factory: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> W,
    {
        config.validate()?;

        let id = Uuid::new_v4();
        let span = crate::pool_span!(id, "create");
        let _enter = span.enter();

        let workers = (0..config.worker_count)
            .map(|index| WorkerHandle::new(index, id, &config, factory(index)))
            .collect();
        let pool = Self {
            id,
            config,
            workers,
        };
        crate::log_lifecycle!("pool", id, "created", workers = pool.workers.len());

        if pool.config.autostart {
            pool.start()?;
        }
        Ok(pool)
    }

    /// Shorthand for a default configuration with `worker_count` workers.
    pub fn with_workers<F>(worker_count: usize, factory: F) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> W,
    {
        Self::new(PoolConfig::with_workers(worker_count), factory)
    }

    /// Spawns every worker thread that has not been spawned yet.
    pub fn start(&self) -> Result<(), PoolError> {
        let span = crate::pool_span!(self.id, "start");
        let _enter = span.enter();

        for worker in &self.workers {
            if worker.state() == WorkerState::Created {
                worker.start()?;
            }
        }
        crate::log_lifecycle!("pool", self.id, "started");
        Ok(())
    }

    /// Runs `method(worker_state, args..)` on worker `index`.
    ///
    /// Fire-and-forget: returns `true` once the call is queued. Returns `false`
    /// when the index is out of range or the worker no longer accepts packets;
    /// the method and arguments are dropped before returning in that case.
    pub fn invoke<F, Args>(&self, index: usize, method: F, args: Args) -> bool
    where
        F: Method<W, Args>,
        Args: Send + 'static,
    {
        match self.try_invoke(index, method, args) {
            Ok(()) => true,
            Err(err) => {
                debug!(pool = %self.id, index, error = %err, "invoke rejected");
                false
            }
        }
    }

    /// [`invoke`](Self::invoke) reporting why a call was not queued.
    pub fn try_invoke<F, Args>(&self, index: usize, method: F, args: Args) -> Result<(), PoolError>
    where
        F: Method<W, Args>,
        Args: Send + 'static,
    {
        let worker = self.checked(index)?;
        worker.invoke(Box::new(MethodCall::<W, F, Args>::new(method, args)))
    }

    /// Runs a closure over worker `index`'s state on its thread.
    pub fn invoke_with<F>(&self, index: usize, call: F) -> bool
    where
        F: FnOnce(&mut W) + Send + 'static,
    {
        match self.try_invoke_with(index, call) {
            Ok(()) => true,
            Err(err) => {
                debug!(pool = %self.id, index, error = %err, "invoke rejected");
                false
            }
        }
    }

    pub fn try_invoke_with<F>(&self, index: usize, call: F) -> Result<(), PoolError>
    where
        F: FnOnce(&mut W) + Send + 'static,
    {
        self.checked(index)?.invoke(Box::new(ClosureCall::new(call)))
    }

    /// Serializes `message` onto worker `index`.
    pub fn send<M: Message>(&self, index: usize, message: M) -> Result<(), PoolError> {
        self.checked(index)?.send_message(message)
    }

    /// Enqueues a raw packet on worker `index`.
    pub fn push(&self, index: usize, packet: Packet) -> Result<(), PoolError> {
        self.checked(index)?.send(packet)
    }

    /// Registers a handler for `M` on worker `index` while it runs.
    ///
    /// Packets queued behind this request are routed with the new handler.
    pub fn bind<M, F>(&self, index: usize, handler: F) -> Result<(), PoolError>
    where
        M: Message,
        F: FnMut(&mut W, M) + Send + 'static,
    {
        self.checked(index)?.bind::<M, F>(handler)
    }

    /// Asks every worker to stop. Returns how many were not already stopping.
    pub fn stop_all(&self) -> usize {
        let span = crate::pool_span!(self.id, "stop");
        let _enter = span.enter();

        self.workers.iter().filter(|worker| worker.stop()).count()
    }

    /// Joins every worker in index order.
    ///
    /// All workers are joined even if one fails; the first error is returned.
    pub fn join_all(&self) -> Result<Vec<W>, PoolError> {
        let span = crate::pool_span!(self.id, "join");
        let _enter = span.enter();

        let mut states = Vec::with_capacity(self.workers.len());
        let mut first_error = None;
        for worker in &self.workers {
            match worker.join() {
                Ok(state) => states.push(state),
                Err(err) => {
                    crate::log_error!(err, pool = %self.id, index = worker.index());
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(states),
        }
    }

    /// Stops and joins every worker, returning their final states in index
    /// order.
    pub fn shutdown(self) -> Result<Vec<W>, PoolError> {
        self.stop_all();
        let states = self.join_all()?;
        crate::log_lifecycle!("pool", self.id, "shutdown");
        Ok(states)
    }

    fn checked(&self, index: usize) -> Result<&WorkerHandle<W>, PoolError> {
        self.workers.get(index).ok_or(PoolError::InvalidIndex {
            index,
            len: self.workers.len(),
        })
    }

    pub fn worker(&self, index: usize) -> Option<&WorkerHandle<W>> {
        self.workers.get(index)
    }

    pub fn workers(&self) -> &[WorkerHandle<W>] {
        &self.workers
    }

    /// Counters summed over all workers.
    pub fn stats(&self) -> StatsSnapshot {
        self.workers
            .iter()
            .map(WorkerHandle::stats)
            .fold(StatsSnapshot::default(), StatsSnapshot::merge)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<W: Worker> Drop for WorkerPool<W> {
    fn drop(&mut self) {
        self.stop_all();
        for worker in &self.workers {
            if worker.state() == WorkerState::Joined {
                continue;
            }
            if let Err(err) = worker.join() {
                crate::log_error!(err, pool = %self.id, index = worker.index());
            }
        }
    }
}
