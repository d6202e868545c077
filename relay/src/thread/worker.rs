//! # Worker Threads
//!
//! A worker is one OS thread that owns a piece of state `W`, a private
//! [`Inbox`] and a [`DispatchTable`] over `W`. Everything the thread does is
//! driven by packets: it blocks on the inbox, routes each packet through the
//! table, and exits when it reaches the stop marker.
//!
//! ## Key Concepts
//! - [`WorkerHandle`]: the pool-side handle. Pushes packets, stops and joins.
//! - `WorkerRuntime`: the thread-side half, moved onto the thread at start.
//! - [`Worker`]: the trait worker state implements to bind its own handlers.
//!
//! The thread returns `W` when it exits, so the owner can look at final state
//! after `join`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use relay_api::message::ids;
use relay_api::{Message, Packet};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::logging;
use crate::thread::call::BoxedCall;
use crate::thread::config::{PanicPolicy, PoolConfig};
use crate::thread::dispatch::{DispatchOutcome, DispatchTable};
use crate::thread::envelope::{Bind, Invoke};
use crate::thread::error::PoolError;
use crate::thread::inbox::{Inbox, LoopControl};
use crate::thread::stats::{StatsSnapshot, WorkerStats};

/// State owned by a worker thread.
///
/// Remote invocation works for any `W` without extra code; implement
/// `register` to route user messages as well.
pub trait Worker: Send + Sized + 'static {
    /// Binds this type's message handlers. Runs once per worker, before the
    /// thread starts.
    fn register(_table: &mut DispatchTable<Self>) {}

    /// Called on the worker thread before the first packet is handled.
    fn started(&mut self, _index: usize) {}

    /// Called on the worker thread after the last packet was handled.
    fn stopped(&mut self) {}
}

/// States a worker can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Worker has been created but its thread has not been spawned
    Created,
    /// Worker thread is running
    Running,
    /// Stop was requested; the thread drains its inbox and exits
    Stopping,
    /// Worker thread has been joined
    Joined,
}

/// Thread-side half of a worker.
struct WorkerRuntime<W: Worker> {
    index: usize,
    pool_id: Uuid,
    target: W,
    table: DispatchTable<W>,
    inbox: Arc<Inbox>,
    stats: Arc<WorkerStats>,
    /// Shared with the handle; moved to `Stopping` if the thread exits on its own
    state: Arc<Mutex<WorkerState>>,
    panic_policy: PanicPolicy,
}

/// Closes and empties the inbox when the worker thread leaves its loop,
/// including by unwinding, so queued adapters are freed and later pushes fail.
struct CloseOnExit<'a> {
    inbox: &'a Inbox,
    state: &'a Mutex<WorkerState>,
}

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        mark_stopping(self.state);
        self.inbox.close();
        let dropped = self.inbox.discard();
        if dropped > 0 {
            debug!(dropped, "discarded packets left in inbox");
        }
    }
}

impl<W: Worker> WorkerRuntime<W> {
    fn new(
        index: usize,
        pool_id: Uuid,
        target: W,
        inbox: Arc<Inbox>,
        stats: Arc<WorkerStats>,
        state: Arc<Mutex<WorkerState>>,
        panic_policy: PanicPolicy,
    ) -> Self {
        let mut table = DispatchTable::new();
        W::register(&mut table);
        let replaced = table.bind(|target: &mut W, invoke: Invoke<W>| {
            trace!(sequence = invoke.sequence, call = invoke.call.describe(), "invoke");
            invoke.call.invoke(target);
        });
        if replaced {
            warn!(index, "worker bound packet id 1 itself; using the invoke handler");
        }

        Self {
            index,
            pool_id,
            target,
            table,
            inbox,
            stats,
            state,
            panic_policy,
        }
    }

    /// Thread body. Returns the worker state once the loop has ended.
    fn run(mut self) -> W {
        let span = crate::worker_span!(self.pool_id, self.index);
        let _enter = span.enter();

        let inbox = Arc::clone(&self.inbox);
        let state = Arc::clone(&self.state);
        let _exit = CloseOnExit {
            inbox: &inbox,
            state: &state,
        };

        crate::log_lifecycle!("worker", self.index, "started");
        self.target.started(self.index);

        inbox.run(|packet| self.handle(packet));

        self.target.stopped();
        crate::log_lifecycle!("worker", self.index, "stopped");
        self.target
    }

    fn handle(&mut self, packet: Packet) -> LoopControl {
        self.stats.record_received();
        let type_id = packet.type_id;
        let span = crate::packet_span!(type_id);
        let _enter = span.enter();

        let result = if type_id == ids::WORKER_BIND_ID {
            panic::catch_unwind(AssertUnwindSafe(|| self.apply_bind(packet)))
        } else {
            panic::catch_unwind(AssertUnwindSafe(|| {
                self.table.route(&mut self.target, packet)
            }))
        };

        match result {
            Ok(DispatchOutcome::Handled) => {
                self.stats.record_dispatched();
                crate::log_packet!(type_id, "handled");
                LoopControl::Continue
            }
            Ok(DispatchOutcome::Dropped(err)) => {
                self.stats.record_malformed();
                warn!(index = self.index, type_id, error = %err, "malformed packet dropped");
                LoopControl::Continue
            }
            Ok(DispatchOutcome::Unhandled) => {
                self.stats.record_unhandled();
                crate::log_packet!(type_id, "unhandled");
                LoopControl::Continue
            }
            Err(payload) => {
                self.stats.record_panic();
                let message = panic_message(payload.as_ref());
                error!(index = self.index, type_id, panic = %message, "packet handler panicked");
                match self.panic_policy {
                    PanicPolicy::Continue => LoopControl::Continue,
                    PanicPolicy::StopWorker => {
                        mark_stopping(&self.state);
                        self.inbox.close();
                        LoopControl::Break
                    }
                }
            }
        }
    }

    fn apply_bind(&mut self, packet: Packet) -> DispatchOutcome {
        match Bind::<W>::deserialize(packet) {
            Ok(bind) => {
                (bind.registration)(&mut self.table);
                debug!(index = self.index, type_ids = ?self.table.type_ids(), "handlers bound");
                DispatchOutcome::Handled
            }
            Err(err) => DispatchOutcome::Dropped(err),
        }
    }
}

/// Records that the thread is on its way out without a `stop()` call.
fn mark_stopping(state: &Mutex<WorkerState>) {
    let mut state = recover(state);
    if *state == WorkerState::Running {
        *state = WorkerState::Stopping;
    }
}

/// Extracts the message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

/// Pool-side handle to one worker.
pub struct WorkerHandle<W: Worker> {
    /// Position in the pool
    index: usize,

    /// OS thread name
    thread_name: String,

    /// Optional stack size for the thread
    stack_size: Option<usize>,

    /// Inbox shared with the worker thread
    inbox: Arc<Inbox>,

    /// Counters shared with the worker thread
    stats: Arc<WorkerStats>,

    /// Next invoke sequence number
    sequence: AtomicU64,

    /// Current state of the worker, shared with the thread
    state: Arc<Mutex<WorkerState>>,

    /// Thread-side half, held until the thread is spawned
    pending: Mutex<Option<WorkerRuntime<W>>>,

    /// Handle to the worker thread
    thread: Mutex<Option<JoinHandle<W>>>,
}

impl<W: Worker> fmt::Debug for WorkerHandle<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("index", &self.index)
            .field("thread_name", &self.thread_name)
            .field("state", &self.state())
            .field("inbox", &self.inbox)
            .finish()
    }
}

fn recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<W: Worker> WorkerHandle<W> {
    pub(crate) fn new(index: usize, pool_id: Uuid, config: &PoolConfig, target: W) -> Self {
        let inbox = Arc::new(Inbox::new());
        let stats = Arc::new(WorkerStats::new());
        let state = Arc::new(Mutex::new(WorkerState::Created));
        let runtime = WorkerRuntime::new(
            index,
            pool_id,
            target,
            Arc::clone(&inbox),
            Arc::clone(&stats),
            Arc::clone(&state),
            config.panic_policy.clone(),
        );

        Self {
            index,
            thread_name: config.thread_name(index),
            stack_size: config.stack_size,
            inbox,
            stats,
            sequence: AtomicU64::new(0),
            state,
            pending: Mutex::new(Some(runtime)),
            thread: Mutex::new(None),
        }
    }

    /// Spawns the worker thread.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut state = recover(&self.state);
        if *state != WorkerState::Created {
            return Err(PoolError::InvalidState {
                index: self.index,
                operation: "start",
                state: *state,
            });
        }
        let Some(runtime) = recover(&self.pending).take() else {
            return Err(PoolError::InvalidState {
                index: self.index,
                operation: "start",
                state: *state,
            });
        };

        let mut builder = thread::Builder::new().name(self.thread_name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        // Carry the caller's subscriber onto the worker thread
        let dispatch = logging::current_subscriber();
        let spawned = builder.spawn(move || {
            tracing::dispatcher::with_default(&dispatch, move || runtime.run())
        });

        match spawned {
            Ok(handle) => {
                *recover(&self.thread) = Some(handle);
                *state = WorkerState::Running;
                Ok(())
            }
            Err(source) => {
                // The runtime, and with it the worker state, went down with the closure.
                self.inbox.close();
                self.inbox.discard();
                *state = WorkerState::Joined;
                Err(PoolError::ThreadSpawn {
                    index: self.index,
                    source,
                })
            }
        }
    }

    /// Asks the worker to finish what is queued and exit.
    ///
    /// Returns `false` if stop had already been requested.
    pub fn stop(&self) -> bool {
        let mut state = recover(&self.state);
        match *state {
            WorkerState::Created | WorkerState::Running => {
                *state = WorkerState::Stopping;
                self.inbox.close();
                crate::log_lifecycle!("worker", self.index, "stopping");
                true
            }
            WorkerState::Stopping | WorkerState::Joined => {
                debug!(index = self.index, state = ?*state, "stop ignored");
                false
            }
        }
    }

    /// Waits for the worker thread and returns the worker state.
    ///
    /// `stop()` must come first. A worker that was never started is not
    /// spawned; its queued packets are dropped and its state returned as is.
    ///
    /// The worker reads `Joined` as soon as the wait begins; the state lock is
    /// not held while the thread drains, so producers and the worker's own
    /// handlers are rejected instead of blocked.
    pub fn join(&self) -> Result<W, PoolError> {
        let mut state = recover(&self.state);
        match *state {
            WorkerState::Running | WorkerState::Joined => {
                return Err(PoolError::InvalidState {
                    index: self.index,
                    operation: "join",
                    state: *state,
                });
            }
            WorkerState::Created | WorkerState::Stopping => {}
        }

        if let Some(runtime) = recover(&self.pending).take() {
            self.inbox.close();
            let dropped = self.inbox.discard();
            *state = WorkerState::Joined;
            debug!(index = self.index, dropped, "worker joined without starting");
            return Ok(runtime.target);
        }

        let handle = recover(&self.thread).take();
        // A concurrent join sees Joined and backs off.
        *state = WorkerState::Joined;
        drop(state);
        let Some(handle) = handle else {
            return Err(PoolError::InvalidState {
                index: self.index,
                operation: "join",
                state: WorkerState::Joined,
            });
        };

        match handle.join() {
            Ok(target) => {
                crate::log_lifecycle!("worker", self.index, "joined");
                Ok(target)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                crate::log_error!(message, index = self.index, "worker thread panicked");
                Err(PoolError::WorkerPanicked {
                    index: self.index,
                    message,
                })
            }
        }
    }

    /// Enqueues a raw packet.
    pub fn send(&self, packet: Packet) -> Result<(), PoolError> {
        if !self.is_alive() {
            self.stats.record_rejected();
            return Err(PoolError::WorkerNotAlive {
                index: self.index,
                state: self.state(),
            });
        }
        self.inbox.push(packet).map_err(|source| {
            self.stats.record_rejected();
            PoolError::Inbox {
                index: self.index,
                source,
            }
        })
    }

    /// Serializes `message` and enqueues it.
    pub fn send_message<M: Message>(&self, message: M) -> Result<(), PoolError> {
        self.send(message.serialize())
    }

    /// Enqueues a call adapter for execution on the worker thread.
    pub fn invoke(&self, call: BoxedCall<W>) -> Result<(), PoolError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        trace!(index = self.index, sequence, call = call.describe(), "enqueue invoke");
        self.send(Invoke::new(sequence, call).serialize())
    }

    /// Registers a handler for `M` on the running worker. Takes effect once
    /// the worker reaches this request in its inbox.
    pub fn bind<M, F>(&self, handler: F) -> Result<(), PoolError>
    where
        M: Message,
        F: FnMut(&mut W, M) + Send + 'static,
    {
        self.send(
            Bind::<W>::new(move |table: &mut DispatchTable<W>| {
                table.bind::<M, F>(handler);
            })
            .serialize(),
        )
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn state(&self) -> WorkerState {
        *recover(&self.state)
    }

    /// Whether the worker still accepts packets.
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), WorkerState::Created | WorkerState::Running)
            && !self.inbox.is_closed()
    }

    /// Packets waiting in the inbox (snapshot).
    pub fn pending_packets(&self) -> usize {
        self.inbox.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::call::ClosureCall;

    #[derive(Default)]
    struct Tally {
        hits: u32,
        started_at: Option<usize>,
        stopped: bool,
    }

    impl Worker for Tally {
        fn started(&mut self, index: usize) {
            self.started_at = Some(index);
        }

        fn stopped(&mut self) {
            self.stopped = true;
        }
    }

    fn handle(config: &PoolConfig) -> WorkerHandle<Tally> {
        WorkerHandle::new(4, Uuid::new_v4(), config, Tally::default())
    }

    #[test]
    fn test_lifecycle() {
        let worker = handle(&PoolConfig::with_workers(1));
        assert_eq!(worker.state(), WorkerState::Created);
        assert_eq!(worker.thread_name(), "relay-worker-4");

        worker.start().unwrap();
        assert_eq!(worker.state(), WorkerState::Running);
        assert!(worker.start().is_err());

        for _ in 0..10 {
            worker
                .invoke(Box::new(ClosureCall::new(|t: &mut Tally| t.hits += 1)))
                .unwrap();
        }

        assert!(matches!(
            worker.join(),
            Err(PoolError::InvalidState { operation: "join", state: WorkerState::Running, .. })
        ));

        assert!(worker.stop());
        assert!(!worker.stop());
        let tally = worker.join().unwrap();
        assert_eq!(tally.hits, 10);
        assert_eq!(tally.started_at, Some(4));
        assert!(tally.stopped);
        assert_eq!(worker.state(), WorkerState::Joined);
        assert_eq!(worker.stats().dispatched, 10);
    }

    #[test]
    fn test_join_without_start() {
        let worker = handle(&PoolConfig::with_workers(1));
        worker
            .invoke(Box::new(ClosureCall::new(|t: &mut Tally| t.hits += 1)))
            .unwrap();
        assert_eq!(worker.pending_packets(), 1);

        let tally = worker.join().unwrap();
        assert_eq!(tally.hits, 0);
        assert_eq!(tally.started_at, None);
        assert!(worker.join().is_err());
        assert!(!worker.is_alive());
    }

    #[test]
    fn test_send_after_stop_rejected() {
        let worker = handle(&PoolConfig::with_workers(1));
        worker.start().unwrap();
        worker.stop();

        let err = worker.send(Packet::empty(20)).unwrap_err();
        assert!(matches!(err, PoolError::WorkerNotAlive { index: 4, .. }));
        worker.join().unwrap();
        assert_eq!(worker.stats().rejected, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(format!("boom {}", 7));
        assert_eq!(panic_message(payload.as_ref()), "boom 7");

        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
