//! # Message Contract
//!
//! A message is a typed view over a [`Packet`]. Each message type owns a
//! compile-time unique `TYPE_ID` and converts itself to and from a packet.
//! Decoding fails, instead of panicking, when the packet is too short for the
//! schema or is tagged with a different id.
//!
//! Fixed-width schemas are usually derived:
//!
//! ```rust
//! use relay_api::Message;
//!
//! #[derive(Message)]
//! #[message(id = 20)]
//! struct Heartbeat {
//!     sequence: u64,
//!     healthy: bool,
//! }
//!
//! assert_eq!(Heartbeat::TYPE_ID, 20);
//! assert_eq!(Heartbeat::WIRE_SIZE, 9);
//! ```

use crate::errors::DeserializeError;
use crate::packet::Packet;

/// Packet ids reserved by the worker runtime.
///
/// User schemas should start at [`FIRST_USER_ID`](ids::FIRST_USER_ID).
pub mod ids {
    /// Remote invocation of a worker method.
    pub const WORKER_FUNCTION_INVOKE_ID: u32 = 1;
    /// Stop marker enqueued when a worker is asked to shut down.
    pub const WORKER_STOP_ID: u32 = 2;
    /// Registration of a new handler on a running worker.
    pub const WORKER_BIND_ID: u32 = 3;
    /// First id not used by the runtime.
    pub const FIRST_USER_ID: u32 = 16;

    /// Whether `type_id` belongs to the runtime's reserved range.
    pub fn is_reserved(type_id: u32) -> bool {
        type_id < FIRST_USER_ID
    }
}

/// A typed schema that can be carried in a [`Packet`].
pub trait Message: Sized + Send + 'static {
    /// Tag written into every packet of this schema.
    const TYPE_ID: u32;

    /// Converts the message into a packet tagged with `TYPE_ID`.
    fn serialize(self) -> Packet;

    /// Rebuilds the message from a packet.
    fn deserialize(packet: Packet) -> Result<Self, DeserializeError>;

    /// Name used in logs.
    fn message_type(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Checks a packet's tag and minimum payload size before decoding.
pub fn expect_packet(packet: &Packet, type_id: u32, min_size: usize) -> Result<(), DeserializeError> {
    if packet.type_id != type_id {
        return Err(DeserializeError::WrongType {
            expected: type_id,
            actual: packet.type_id,
        });
    }
    if packet.payload.len() < min_size {
        return Err(DeserializeError::Truncated {
            type_id,
            expected: min_size,
            actual: packet.payload.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadReader;

    // Hand-written schema, the way messages look without the derive.
    #[derive(Debug, PartialEq)]
    struct Resize {
        width: u16,
        height: u16,
    }

    impl Message for Resize {
        const TYPE_ID: u32 = 40;

        fn serialize(self) -> Packet {
            let mut payload = Vec::with_capacity(4);
            payload.extend_from_slice(&self.width.to_le_bytes());
            payload.extend_from_slice(&self.height.to_le_bytes());
            Packet::new(Self::TYPE_ID, payload)
        }

        fn deserialize(packet: Packet) -> Result<Self, DeserializeError> {
            expect_packet(&packet, Self::TYPE_ID, 4)?;
            let mut reader = PayloadReader::new(&packet);
            Ok(Self {
                width: reader.read()?,
                height: reader.read()?,
            })
        }
    }

    #[test]
    fn test_hand_written_message() {
        let packet = Resize { width: 640, height: 480 }.serialize();
        assert_eq!(packet.type_id, 40);
        assert_eq!(Resize::deserialize(packet).unwrap(), Resize { width: 640, height: 480 });
    }

    #[test]
    fn test_short_payload_rejected() {
        let err = Resize::deserialize(Packet::new(40, vec![1, 2])).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::Truncated { type_id: 40, expected: 4, actual: 2 }
        ));
    }

    #[test]
    fn test_wrong_tag_rejected() {
        let err = Resize::deserialize(Packet::new(41, vec![0; 4])).unwrap_err();
        assert!(matches!(err, DeserializeError::WrongType { expected: 40, actual: 41 }));
    }

    #[test]
    fn test_longer_payload_accepted() {
        // Only the minimum size is enforced; trailing bytes are ignored.
        let decoded = Resize::deserialize(Packet::new(40, vec![1, 0, 2, 0, 0xff])).unwrap();
        assert_eq!(decoded, Resize { width: 1, height: 2 });
    }

    #[test]
    fn test_reserved_ids() {
        assert!(ids::is_reserved(ids::WORKER_FUNCTION_INVOKE_ID));
        assert!(ids::is_reserved(ids::WORKER_STOP_ID));
        assert!(ids::is_reserved(ids::WORKER_BIND_ID));
        assert!(!ids::is_reserved(ids::FIRST_USER_ID));
    }
}
