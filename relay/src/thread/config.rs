use crate::thread::error::PoolError;

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "relay-worker-";

// --- Configuration Enums ---

/// What a worker does when a packet handler panics.
///
/// Every dispatch runs under `catch_unwind`, so a panic never unwinds past the
/// worker loop. The policy only decides whether the loop keeps going.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Log the panic and keep draining the inbox.
    #[default]
    Continue,
    /// Log the panic, close the inbox, drop every packet still queued and
    /// let the worker thread exit. The worker then reports `Stopping` and
    /// can be joined without a `stop()` call.
    StopWorker,
}

// --- Pool Configuration ---

/// Configuration for a `WorkerPool`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers. Fixed for the lifetime of the pool.
    pub worker_count: usize,

    /// OS thread names are this prefix followed by the worker index.
    pub thread_name_prefix: String,

    /// Stack size for worker threads; the platform default when `None`.
    pub stack_size: Option<usize>,

    /// Reaction to a panicking packet handler.
    pub panic_policy: PanicPolicy,

    /// Start the worker threads as part of `WorkerPool::new`.
    pub autostart: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
            panic_policy: PanicPolicy::Continue,
            autostart: false,
        }
    }
}

impl PoolConfig {
    /// Default configuration with an explicit worker count.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Checks the configuration before any thread is created.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.stack_size == Some(0) {
            return Err(PoolError::InvalidConfig(
                "stack_size must be greater than 0".to_string(),
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::InvalidConfig(
                "thread_name_prefix may not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// OS thread name for the worker at `index`.
    pub fn thread_name(&self, index: usize) -> String {
        format!("{}{}", self.thread_name_prefix, index)
    }
}
