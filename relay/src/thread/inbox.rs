use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};
use relay_api::message::ids;
use relay_api::{Message, Packet};
use tracing::trace;

use crate::thread::envelope::Stop;
use crate::thread::error::InboxError;

/// Whether the consumer loop should keep going after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Open,
    Closed,
}

/// A worker's private FIFO of packets.
///
/// Any number of producers may push; exactly one thread (the owning worker)
/// may consume. The queue is unbounded.
///
/// Closing is gated: `close()` flips the gate and enqueues a single stop
/// marker while holding the gate lock, so every push that succeeded is
/// ordered before the marker and every push after it is rejected. The
/// consumer therefore drains everything accepted before shutting down.
pub struct Inbox {
    /// The sending half of the channel
    sender: Sender<Packet>,
    /// The receiving half of the channel
    receiver: Receiver<Packet>,
    /// Open/closed flag; held while sending so close cannot interleave a push
    gate: Mutex<Gate>,
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            gate: Mutex::new(Gate::Open),
        }
    }

    fn lock_gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a packet at the tail and wakes the consumer.
    ///
    /// A rejected packet is dropped before this returns, together with
    /// anything it owns through its attachment.
    pub fn push(&self, packet: Packet) -> Result<(), InboxError> {
        if packet.type_id == ids::WORKER_STOP_ID {
            return Err(InboxError::Reserved(packet.type_id));
        }

        let gate = self.lock_gate();
        if *gate == Gate::Closed {
            drop(gate);
            trace!(type_id = packet.type_id, "push rejected, inbox closed");
            return Err(InboxError::Closed);
        }
        self.sender
            .send(packet)
            .map_err(|e| InboxError::ChannelError(e.to_string()))
    }

    /// Closes the inbox and enqueues the stop marker.
    ///
    /// Returns `false` if the inbox was already closed.
    pub fn close(&self) -> bool {
        let mut gate = self.lock_gate();
        if *gate == Gate::Closed {
            return false;
        }
        *gate = Gate::Closed;
        // Sent under the gate lock: nothing can land behind the marker.
        let _ = self.sender.send(Stop.serialize());
        true
    }

    pub fn is_closed(&self) -> bool {
        *self.lock_gate() == Gate::Closed
    }

    /// Queued packets, including the stop marker if present (snapshot).
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Consumer loop. Must only be called from the owning thread.
    ///
    /// Blocks until a packet arrives, then hands every currently queued
    /// packet to `on_packet` front-to-back before blocking again. Returns
    /// when the stop marker is reached (everything pushed before `close()`
    /// has been handled by then) or when `on_packet` asks to break. On a
    /// break, packets already taken into the current batch are dropped.
    pub fn run<F>(&self, mut on_packet: F)
    where
        F: FnMut(Packet) -> LoopControl,
    {
        loop {
            let first = match self.receiver.recv() {
                Ok(packet) => packet,
                // Unreachable while `self` holds the sender.
                Err(_) => return,
            };

            for packet in std::iter::once(first).chain(self.receiver.drain()) {
                if packet.type_id == ids::WORKER_STOP_ID {
                    trace!("stop marker reached");
                    return;
                }
                if on_packet(packet) == LoopControl::Break {
                    return;
                }
            }
        }
    }

    /// Drops every queued packet without handling it. Returns how many
    /// packets were dropped, not counting the stop marker.
    pub fn discard(&self) -> usize {
        self.receiver
            .drain()
            .filter(|packet| packet.type_id != ids::WORKER_STOP_ID)
            .count()
    }
}
