#![doc = " Thread-per-worker packet dispatch."]

pub mod call;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod inbox;
pub mod pool;
pub mod stats;
pub mod worker;

// Re-export key types for easier usage
pub use call::{BoxedCall, CallAdapter, ClosureCall, Method, MethodCall};
pub use config::{PanicPolicy, PoolConfig};
pub use dispatch::{DispatchOutcome, DispatchTable};
pub use error::{InboxError, PoolError};
pub use inbox::{Inbox, LoopControl};
pub use pool::WorkerPool;
pub use stats::{StatsSnapshot, WorkerStats};
pub use worker::{Worker, WorkerHandle, WorkerState};
