//! # Relay Packet API
//!
//! Contracts shared by everything that talks to a relay worker: the [`Packet`]
//! envelope, the [`Message`] serialize/deserialize contract, the fixed-width
//! field codec used by message schemas, and the errors raised when a packet
//! cannot be decoded.
//!
//! Packets never leave the process. The encoding is fixed-width little-endian
//! and only has to agree with itself inside one build of the program.
//!
//! ## Usage Example
//!
//! ```rust
//! use relay_api::{Message, Packet};
//!
//! #[derive(Message, Debug, PartialEq)]
//! #[message(id = 16)]
//! struct Move {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let packet = Move { x: 3, y: -4 }.serialize();
//! assert_eq!(packet.type_id, 16);
//! assert_eq!(packet.payload.len(), Move::WIRE_SIZE);
//!
//! let decoded = Move::deserialize(packet).unwrap();
//! assert_eq!(decoded, Move { x: 3, y: -4 });
//! ```
//!
//! ## Module Organization
//!
//! - [`packet`]: the tagged envelope and its owned attachment slot
//! - [`message`]: the `Message` trait, reserved ids, header checks
//! - [`codec`]: fixed-width field encoding
//! - [`errors`]: decoding errors

extern crate self as relay_api;

pub mod codec;
pub mod errors;
pub mod message;
pub mod packet;

pub use codec::{PayloadReader, PayloadWriter, WireField};
pub use errors::DeserializeError;
pub use message::{ids, Message};
pub use packet::{Attachment, Packet};

// Re-export the derive macro
pub use relay_api_derive::Message;
