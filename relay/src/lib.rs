// Relay Worker Pool
//
// A fixed pool of long-lived worker threads, each owning a private inbox.
// Method calls are captured into call adapters, carried to the chosen worker
// inside packets, routed by packet id through the worker's dispatch table and
// run on the worker's own state.

pub mod logging;
pub mod thread;

// Re-export the packet API
pub use relay_api::{ids, DeserializeError, Message, Packet, PayloadReader, PayloadWriter, WireField};

pub use thread::{PoolConfig, PoolError, Worker, WorkerPool};
