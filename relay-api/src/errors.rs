//! # Packet Decoding Errors
//!
//! Everything that can go wrong while turning a [`Packet`](crate::Packet) back
//! into a typed message. All of these are per-packet failures: the worker
//! drops the offending packet and keeps draining its inbox.

use thiserror::Error;

/// Error returned by [`Message::deserialize`](crate::Message::deserialize).
#[derive(Error, Debug)]
pub enum DeserializeError {
    /// The payload is shorter than the schema's fixed-size encoding.
    #[error("packet {type_id} payload too short: expected at least {expected} bytes, got {actual}")]
    Truncated {
        type_id: u32,
        expected: usize,
        actual: usize,
    },

    /// The packet carries a different type id than the schema it was decoded as.
    #[error("packet type mismatch: expected {expected}, got {actual}")]
    WrongType { expected: u32, actual: u32 },

    /// A field decoded to a value outside its domain (e.g. a `bool` byte of 7).
    #[error("invalid {type_name} value: {reason}")]
    InvalidValue {
        type_name: &'static str,
        reason: String,
    },

    /// The schema needs an owned attachment but the packet has none.
    #[error("packet {type_id} is missing its attachment")]
    MissingAttachment { type_id: u32 },

    /// The attachment could not be downcast to the type the schema expects.
    #[error("packet {type_id} attachment is not a {expected}")]
    AttachmentMismatch {
        type_id: u32,
        expected: &'static str,
    },

    /// Catch-all for hand-written schemas.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
