use thiserror::Error;

use crate::thread::worker::WorkerState;

/// Errors related to Inbox operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InboxError {
    #[error("Inbox is closed")]
    Closed,
    #[error("Packet id {0} is reserved for the worker runtime")]
    Reserved(u32),
    #[error("Internal channel error: {0}")]
    ChannelError(String), // flume send failure; cannot happen while the inbox owns both ends
}

/// Errors related to the worker pool and individual workers.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker index {index} is out of range (pool size: {len})")]
    InvalidIndex { index: usize, len: usize },
    #[error("Worker {index} is not alive (state: {state:?})")]
    WorkerNotAlive { index: usize, state: WorkerState },
    #[error("Worker {index} cannot {operation} while {state:?}")]
    InvalidState {
        index: usize,
        operation: &'static str,
        state: WorkerState,
    },
    #[error("Failed to enqueue packet on worker {index}: {source}")]
    Inbox {
        index: usize,
        #[source]
        source: InboxError,
    },
    #[error("Failed to spawn thread for worker {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("Worker thread {index} panicked: {message}")]
    WorkerPanicked { index: usize, message: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Internal pool error: {0}")]
    Other(#[from] anyhow::Error),
}
