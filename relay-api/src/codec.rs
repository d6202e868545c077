//! # Fixed-Width Field Codec
//!
//! Message schemas are flat sequences of fixed-width fields. Every field type
//! implements [`WireField`], which fixes its encoded width at compile time, so
//! a schema's total size is known before any bytes are read. Encoding is
//! little-endian with no padding.

use crate::errors::DeserializeError;
use crate::packet::Packet;

/// A value with a fixed-width binary encoding.
pub trait WireField: Sized {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Appends exactly `WIDTH` bytes to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Decodes from exactly `WIDTH` bytes.
    fn decode(bytes: &[u8]) -> Result<Self, DeserializeError>;
}

macro_rules! impl_wire_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireField for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn encode(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn decode(bytes: &[u8]) -> Result<Self, DeserializeError> {
                    let raw: [u8; std::mem::size_of::<$ty>()] =
                        bytes.try_into().map_err(|_| DeserializeError::InvalidValue {
                            type_name: stringify!($ty),
                            reason: format!("expected {} bytes, got {}", Self::WIDTH, bytes.len()),
                        })?;
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_wire_number!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

impl WireField for bool {
    const WIDTH: usize = 1;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn decode(bytes: &[u8]) -> Result<Self, DeserializeError> {
        match u8::decode(bytes)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DeserializeError::InvalidValue {
                type_name: "bool",
                reason: format!("byte {} is neither 0 nor 1", other),
            }),
        }
    }
}

impl WireField for char {
    const WIDTH: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        u32::from(*self).encode(out);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DeserializeError> {
        let scalar = u32::decode(bytes)?;
        char::from_u32(scalar).ok_or_else(|| DeserializeError::InvalidValue {
            type_name: "char",
            reason: format!("{:#x} is not a unicode scalar value", scalar),
        })
    }
}

impl<const N: usize> WireField for [u8; N] {
    const WIDTH: usize = N;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DeserializeError> {
        bytes.try_into().map_err(|_| DeserializeError::InvalidValue {
            type_name: "byte array",
            reason: format!("expected {} bytes, got {}", N, bytes.len()),
        })
    }
}

/// Builds a packet payload field by field.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write<T: WireField>(&mut self, value: &T) -> &mut Self {
        value.encode(&mut self.buf);
        self
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Wraps the written bytes into a packet tagged `type_id`.
    pub fn finish(self, type_id: u32) -> Packet {
        Packet::new(type_id, self.buf)
    }
}

/// Reads fields back out of a packet payload in declaration order.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    type_id: u32,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(packet: &'a Packet) -> Self {
        Self {
            type_id: packet.type_id,
            bytes: &packet.payload,
            offset: 0,
        }
    }

    /// Reads the next field.
    ///
    /// Fails with [`DeserializeError::Truncated`] if fewer than `T::WIDTH`
    /// bytes remain.
    pub fn read<T: WireField>(&mut self) -> Result<T, DeserializeError> {
        let end = self.offset + T::WIDTH;
        if end > self.bytes.len() {
            return Err(DeserializeError::Truncated {
                type_id: self.type_id,
                expected: end,
                actual: self.bytes.len(),
            });
        }
        let value = T::decode(&self.bytes[self.offset..end])?;
        self.offset = end;
        Ok(value)
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}
