// Integration tests for error types in relay::thread::error

use anyhow::anyhow;
use relay::thread::error::*;
use relay::thread::WorkerState;

#[test]
fn test_inbox_error_display() {
    assert_eq!(InboxError::Closed.to_string(), "Inbox is closed");
    assert_eq!(
        InboxError::Reserved(2).to_string(),
        "Packet id 2 is reserved for the worker runtime"
    );
    assert_eq!(
        InboxError::ChannelError("disconnected".to_string()).to_string(),
        "Internal channel error: disconnected"
    );
}

#[test]
fn test_pool_error_display() {
    assert_eq!(
        PoolError::InvalidIndex { index: 5, len: 3 }.to_string(),
        "Worker index 5 is out of range (pool size: 3)"
    );
    assert_eq!(
        PoolError::WorkerNotAlive { index: 1, state: WorkerState::Stopping }.to_string(),
        "Worker 1 is not alive (state: Stopping)"
    );
    assert_eq!(
        PoolError::InvalidState { index: 0, operation: "join", state: WorkerState::Running }
            .to_string(),
        "Worker 0 cannot join while Running"
    );
    assert_eq!(
        PoolError::Inbox { index: 2, source: InboxError::Closed }.to_string(),
        "Failed to enqueue packet on worker 2: Inbox is closed"
    );
    assert_eq!(
        PoolError::WorkerPanicked { index: 1, message: "boom".to_string() }.to_string(),
        "Worker thread 1 panicked: boom"
    );
    assert_eq!(
        PoolError::InvalidConfig("worker_count must be at least 1".to_string()).to_string(),
        "Invalid configuration: worker_count must be at least 1"
    );

    let spawn = PoolError::ThreadSpawn {
        index: 3,
        source: std::io::Error::other("no threads left"),
    };
    assert!(spawn.to_string().starts_with("Failed to spawn thread for worker 3"));

    let other = PoolError::Other(anyhow!("some internal issue"));
    assert!(other.to_string().contains("some internal issue"));
}

#[test]
fn test_pool_error_source_chain() {
    use std::error::Error;

    let err = PoolError::Inbox { index: 0, source: InboxError::Closed };
    let source = err.source().expect("inbox errors carry a source");
    assert_eq!(source.to_string(), "Inbox is closed");
}
