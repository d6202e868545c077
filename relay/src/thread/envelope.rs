use std::fmt;

use relay_api::message::{expect_packet, ids};
use relay_api::{DeserializeError, Message, Packet, PayloadReader, PayloadWriter};

use crate::thread::call::BoxedCall;
use crate::thread::dispatch::DispatchTable;

/// Remote invocation of a worker method.
///
/// The payload is the call's 8-byte sequence number; the boxed adapter
/// itself travels in the packet's attachment slot and is recovered with a
/// checked downcast, so no address is ever encoded into the payload.
pub struct Invoke<W: 'static> {
    /// Per-worker sequence number, used in logs
    pub sequence: u64,
    pub call: BoxedCall<W>,
}

impl<W: 'static> Invoke<W> {
    pub const WIRE_SIZE: usize = 8;

    pub fn new(sequence: u64, call: BoxedCall<W>) -> Self {
        Self { sequence, call }
    }
}

impl<W: 'static> fmt::Debug for Invoke<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoke")
            .field("sequence", &self.sequence)
            .field("call", &self.call.describe())
            .finish()
    }
}

impl<W: 'static> Message for Invoke<W> {
    const TYPE_ID: u32 = ids::WORKER_FUNCTION_INVOKE_ID;

    fn serialize(self) -> Packet {
        let mut writer = PayloadWriter::with_capacity(Self::WIRE_SIZE);
        writer.write(&self.sequence);
        writer.finish(Self::TYPE_ID).attach(self.call)
    }

    fn deserialize(mut packet: Packet) -> Result<Self, DeserializeError> {
        expect_packet(&packet, Self::TYPE_ID, Self::WIRE_SIZE)?;
        let sequence = PayloadReader::new(&packet).read::<u64>()?;
        match packet.take_attachment_as::<BoxedCall<W>>() {
            Some(Ok(call)) => Ok(Self { sequence, call }),
            Some(Err(_)) => Err(DeserializeError::AttachmentMismatch {
                type_id: Self::TYPE_ID,
                expected: std::any::type_name::<BoxedCall<W>>(),
            }),
            None => Err(DeserializeError::MissingAttachment {
                type_id: Self::TYPE_ID,
            }),
        }
    }
}

/// Registration closure applied to a running worker's dispatch table.
pub type Registration<W> = Box<dyn FnOnce(&mut DispatchTable<W>) + Send>;

/// Adds or replaces handlers on a worker that is already running.
///
/// Handled by the worker loop itself rather than through the table, since the
/// table cannot be borrowed mutably while one of its own handlers runs.
pub struct Bind<W: 'static> {
    pub registration: Registration<W>,
}

impl<W: 'static> Bind<W> {
    pub fn new<F>(registration: F) -> Self
    where
        F: FnOnce(&mut DispatchTable<W>) + Send + 'static,
    {
        Self {
            registration: Box::new(registration),
        }
    }
}

impl<W: 'static> fmt::Debug for Bind<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bind").finish_non_exhaustive()
    }
}

impl<W: 'static> Message for Bind<W> {
    const TYPE_ID: u32 = ids::WORKER_BIND_ID;

    fn serialize(self) -> Packet {
        Packet::empty(Self::TYPE_ID).attach(self.registration)
    }

    fn deserialize(mut packet: Packet) -> Result<Self, DeserializeError> {
        expect_packet(&packet, Self::TYPE_ID, 0)?;
        match packet.take_attachment_as::<Registration<W>>() {
            Some(Ok(registration)) => Ok(Self { registration }),
            Some(Err(_)) => Err(DeserializeError::AttachmentMismatch {
                type_id: Self::TYPE_ID,
                expected: std::any::type_name::<Registration<W>>(),
            }),
            None => Err(DeserializeError::MissingAttachment {
                type_id: Self::TYPE_ID,
            }),
        }
    }
}

/// Stop marker. Only ever enqueued by `Inbox::close`.
#[derive(relay_api::Message, Debug, Clone, Copy, PartialEq, Eq)]
#[message(id = 2)]
pub struct Stop;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::call::ClosureCall;

    struct Alpha(u32);
    struct Beta;

    #[test]
    fn test_stop_uses_reserved_id() {
        assert_eq!(Stop::TYPE_ID, ids::WORKER_STOP_ID);
        let packet = Stop.serialize();
        assert!(packet.is_empty());
        assert_eq!(Stop::deserialize(packet).unwrap(), Stop);
    }

    #[test]
    fn test_invoke_carries_call() {
        let invoke = Invoke::<Alpha>::new(
            42,
            Box::new(ClosureCall::new(|alpha: &mut Alpha| alpha.0 += 1)),
        );
        let packet = invoke.serialize();
        assert_eq!(packet.type_id, ids::WORKER_FUNCTION_INVOKE_ID);
        assert_eq!(packet.payload, 42u64.to_le_bytes().to_vec());
        assert!(packet.has_attachment());

        let decoded = Invoke::<Alpha>::deserialize(packet).unwrap();
        assert_eq!(decoded.sequence, 42);

        let mut alpha = Alpha(0);
        decoded.call.invoke(&mut alpha);
        assert_eq!(alpha.0, 1);
    }

    #[test]
    fn test_invoke_for_other_worker_type_rejected() {
        let packet = Invoke::<Alpha>::new(1, Box::new(ClosureCall::new(|_: &mut Alpha| {})))
            .serialize();
        let err = Invoke::<Beta>::deserialize(packet).unwrap_err();
        assert!(matches!(err, DeserializeError::AttachmentMismatch { type_id: 1, .. }));
    }

    #[test]
    fn test_invoke_without_attachment_rejected() {
        let packet = Packet::new(ids::WORKER_FUNCTION_INVOKE_ID, vec![0; 8]);
        let err = Invoke::<Alpha>::deserialize(packet).unwrap_err();
        assert!(matches!(err, DeserializeError::MissingAttachment { type_id: 1 }));
    }

    #[test]
    fn test_invoke_short_payload_rejected() {
        let packet = Packet::new(ids::WORKER_FUNCTION_INVOKE_ID, vec![0; 4])
            .attach(Box::new(ClosureCall::new(|_: &mut Alpha| {})) as BoxedCall<Alpha>);
        let err = Invoke::<Alpha>::deserialize(packet).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::Truncated { type_id: 1, expected: 8, actual: 4 }
        ));
    }

    #[test]
    fn test_bind_carries_registration() {
        let packet = Bind::<Alpha>::new(|table| {
            table.bind_raw(99, |alpha: &mut Alpha, _packet| alpha.0 = 99);
        })
        .serialize();
        assert_eq!(packet.type_id, ids::WORKER_BIND_ID);

        let bind = Bind::<Alpha>::deserialize(packet).unwrap();
        let mut table = DispatchTable::new();
        (bind.registration)(&mut table);
        assert!(table.contains(99));
    }
}
