use std::collections::HashMap;
use std::fmt;

use relay_api::{DeserializeError, Message, Packet};
use tracing::debug;

type Handler<W> = Box<dyn FnMut(&mut W, Packet) -> Result<(), DeserializeError> + Send>;

/// What happened to a routed packet.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Decoded and passed to its handler.
    Handled,
    /// A handler exists but the packet did not decode; it was dropped.
    Dropped(DeserializeError),
    /// No handler for the packet's id; it was dropped untouched.
    Unhandled,
}

impl DispatchOutcome {
    /// `true` when a handler was found, whether or not decoding succeeded.
    pub fn found_handler(&self) -> bool {
        !matches!(self, DispatchOutcome::Unhandled)
    }
}

/// Per-worker map from packet id to a decode-and-handle closure.
///
/// Owned by exactly one worker thread; nothing here is synchronized. The last
/// registration for an id wins.
pub struct DispatchTable<W> {
    handlers: HashMap<u32, Handler<W>>,
}

impl<W> Default for DispatchTable<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> fmt::Debug for DispatchTable<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("type_ids", &self.type_ids())
            .finish()
    }
}

impl<W> DispatchTable<W> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `M::TYPE_ID`.
    ///
    /// The stored closure deserializes the packet first and only calls
    /// `handler` when that succeeds. Returns `true` if an earlier handler for
    /// the same id was replaced.
    pub fn bind<M, F>(&mut self, mut handler: F) -> bool
    where
        M: Message,
        F: FnMut(&mut W, M) + Send + 'static,
    {
        self.insert(
            M::TYPE_ID,
            Box::new(move |target: &mut W, packet: Packet| {
                let message = M::deserialize(packet)?;
                handler(target, message);
                Ok(())
            }),
        )
    }

    /// Registers a handler over the raw packet. Returns `true` if an earlier
    /// handler was replaced.
    pub fn bind_raw<F>(&mut self, type_id: u32, mut handler: F) -> bool
    where
        F: FnMut(&mut W, Packet) + Send + 'static,
    {
        self.insert(
            type_id,
            Box::new(move |target: &mut W, packet: Packet| {
                handler(target, packet);
                Ok(())
            }),
        )
    }

    fn insert(&mut self, type_id: u32, handler: Handler<W>) -> bool {
        let replaced = self.handlers.insert(type_id, handler).is_some();
        if replaced {
            debug!(type_id, "handler replaced");
        }
        replaced
    }

    /// Removes the handler for `type_id`. Returns whether one was registered.
    pub fn unbind(&mut self, type_id: u32) -> bool {
        self.handlers.remove(&type_id).is_some()
    }

    pub fn contains(&self, type_id: u32) -> bool {
        self.handlers.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn type_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Looks up the handler for the packet's id and runs it.
    ///
    /// The packet is consumed on every path. Handler panics propagate to the
    /// caller.
    pub fn route(&mut self, target: &mut W, packet: Packet) -> DispatchOutcome {
        match self.handlers.get_mut(&packet.type_id) {
            Some(handler) => match handler(target, packet) {
                Ok(()) => DispatchOutcome::Handled,
                Err(err) => DispatchOutcome::Dropped(err),
            },
            None => DispatchOutcome::Unhandled,
        }
    }

    /// Like [`route`](Self::route), reduced to whether a handler existed.
    ///
    /// Returns `false` for an unknown id and `true` otherwise, including when
    /// the packet failed to decode and was dropped.
    pub fn dispatch(&mut self, target: &mut W, packet: Packet) -> bool {
        self.route(target, packet).found_handler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_api::{PayloadReader, PayloadWriter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Add(u32);

    impl Message for Add {
        const TYPE_ID: u32 = 40;

        fn serialize(self) -> Packet {
            let mut writer = PayloadWriter::new();
            writer.write(&self.0);
            writer.finish(Self::TYPE_ID)
        }

        fn deserialize(packet: Packet) -> Result<Self, DeserializeError> {
            relay_api::message::expect_packet(&packet, Self::TYPE_ID, 4)?;
            Ok(Add(PayloadReader::new(&packet).read()?))
        }
    }

    #[derive(Default)]
    struct Sum {
        total: u32,
        raw: Vec<u32>,
    }

    #[test]
    fn test_bind_and_dispatch() {
        let mut table = DispatchTable::<Sum>::new();
        assert!(table.is_empty());
        assert!(!table.bind(|sum: &mut Sum, add: Add| sum.total += add.0));
        assert!(table.contains(Add::TYPE_ID));
        assert_eq!(table.len(), 1);

        let mut sum = Sum::default();
        assert!(table.dispatch(&mut sum, Add(3).serialize()));
        assert!(table.dispatch(&mut sum, Add(4).serialize()));
        assert_eq!(sum.total, 7);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut table = DispatchTable::<Sum>::new();
        table.bind(|sum: &mut Sum, add: Add| sum.total += add.0);

        let mut sum = Sum::default();
        assert!(!table.dispatch(&mut sum, Packet::new(41, vec![1, 0, 0, 0])));
        assert!(matches!(
            table.route(&mut sum, Packet::empty(99)),
            DispatchOutcome::Unhandled
        ));
        assert_eq!(sum.total, 0);
    }

    #[test]
    fn test_malformed_packet_dropped() {
        let mut table = DispatchTable::<Sum>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        table.bind(move |_: &mut Sum, _: Add| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let mut sum = Sum::default();
        let short = Packet::new(Add::TYPE_ID, vec![1, 0]);
        match table.route(&mut sum, short) {
            DispatchOutcome::Dropped(DeserializeError::Truncated { expected, actual, .. }) => {
                assert_eq!((expected, actual), (4, 2));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Still counts as "found" for the boolean form.
        assert!(table.dispatch(&mut sum, Packet::empty(Add::TYPE_ID)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = DispatchTable::<Sum>::new();
        table.bind(|sum: &mut Sum, add: Add| sum.total += add.0);
        assert!(table.bind(|sum: &mut Sum, add: Add| sum.total += add.0 * 10));
        assert_eq!(table.len(), 1);

        let mut sum = Sum::default();
        table.dispatch(&mut sum, Add(2).serialize());
        assert_eq!(sum.total, 20);
    }

    #[test]
    fn test_bind_raw_and_unbind() {
        let mut table = DispatchTable::<Sum>::new();
        table.bind_raw(50, |sum: &mut Sum, packet: Packet| {
            sum.raw.push(packet.payload.len() as u32)
        });
        table.bind(|sum: &mut Sum, add: Add| sum.total += add.0);
        assert_eq!(table.type_ids(), vec![40, 50]);

        let mut sum = Sum::default();
        assert!(table.dispatch(&mut sum, Packet::new(50, vec![0; 3])));
        assert_eq!(sum.raw, vec![3]);

        assert!(table.unbind(50));
        assert!(!table.unbind(50));
        assert!(!table.dispatch(&mut sum, Packet::empty(50)));
        assert_eq!(sum.raw, vec![3]);
    }
}
