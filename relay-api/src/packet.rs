use std::any::Any;
use std::fmt;

/// Owned, type-erased object carried alongside a packet's bytes.
///
/// Used to hand heap objects (call adapters, registration closures) from a
/// producer thread to a worker thread. The receiving schema recovers the
/// concrete type with a checked downcast.
pub type Attachment = Box<dyn Any + Send>;

/// Tagged envelope moved between threads.
///
/// `type_id` selects the payload schema inside a dispatch table. `payload` is
/// the schema's fixed-width encoding. Packets that need to move ownership of a
/// heap object put it in the attachment slot instead of encoding an address.
pub struct Packet {
    /// Schema tag, unique within one dispatch table.
    pub type_id: u32,
    /// Raw fixed-width encoding of the message body.
    pub payload: Vec<u8>,
    attachment: Option<Attachment>,
}

impl Packet {
    /// Creates a packet from a tag and an already encoded payload.
    pub fn new(type_id: u32, payload: Vec<u8>) -> Self {
        Self {
            type_id,
            payload,
            attachment: None,
        }
    }

    /// Creates a packet with an empty payload.
    pub fn empty(type_id: u32) -> Self {
        Self::new(type_id, Vec::new())
    }

    /// Moves `value` into the attachment slot, replacing any previous one.
    pub fn attach<T: Any + Send>(mut self, value: T) -> Self {
        self.attachment = Some(Box::new(value));
        self
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Takes the attachment out of the packet, leaving the slot empty.
    pub fn take_attachment(&mut self) -> Option<Attachment> {
        self.attachment.take()
    }

    /// Takes the attachment and downcasts it to `T`.
    ///
    /// # Returns
    /// - `None` if there is no attachment
    /// - `Some(Err(attachment))` if it holds something other than `T`; the
    ///   attachment is handed back so the caller decides when it is dropped
    /// - `Some(Ok(value))` on success
    pub fn take_attachment_as<T: Any>(&mut self) -> Option<Result<T, Attachment>> {
        self.attachment
            .take()
            .map(|attachment| attachment.downcast::<T>().map(|boxed| *boxed))
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Copies a packet that carries plain bytes only.
    ///
    /// Attachments are owned and cannot be duplicated, so packets carrying one
    /// return `None`.
    pub fn try_clone(&self) -> Option<Packet> {
        if self.attachment.is_some() {
            return None;
        }
        Some(Packet::new(self.type_id, self.payload.clone()))
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type_id", &self.type_id)
            .field("payload_len", &self.payload.len())
            .field("attachment", &self.attachment.as_ref().map(|_| "<attachment>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_roundtrip() {
        let mut packet = Packet::empty(9).attach(String::from("payload"));
        assert!(packet.has_attachment());

        let value = packet.take_attachment_as::<String>().unwrap().unwrap();
        assert_eq!(value, "payload");
        assert!(!packet.has_attachment());
        assert!(packet.take_attachment_as::<String>().is_none());
    }

    #[test]
    fn test_attachment_wrong_type_is_returned() {
        let mut packet = Packet::empty(9).attach(42u64);

        let attachment = packet.take_attachment_as::<String>().unwrap().unwrap_err();
        assert_eq!(*attachment.downcast::<u64>().unwrap(), 42);
    }

    #[test]
    fn test_try_clone() {
        let packet = Packet::new(4, vec![1, 2, 3]);
        let copy = packet.try_clone().unwrap();
        assert_eq!(copy.type_id, 4);
        assert_eq!(copy.payload, vec![1, 2, 3]);

        let owned = Packet::empty(1).attach(());
        assert!(owned.try_clone().is_none());
    }

    #[test]
    fn test_debug_hides_attachment_contents() {
        let packet = Packet::new(2, vec![0; 8]).attach(String::from("secret"));
        let debug = format!("{:?}", packet);
        assert!(debug.contains("payload_len: 8"));
        assert!(debug.contains("<attachment>"));
        assert!(!debug.contains("secret"));
    }
}
