use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod common;
mod message;

/// Derives `relay_api::Message` for a fixed-width struct.
///
/// Every field must implement `relay_api::WireField`. Fields are encoded in
/// declaration order, little-endian, with no padding. The macro also adds a
/// `WIRE_SIZE` associated constant holding the schema's encoded size, which is
/// the minimum payload length accepted by `deserialize`.
///
/// # Attributes
///
/// - `#[message(id = N)]` (required): the packet type id.
///
/// # Example
/// ```rust,ignore
/// # use relay_api::Message;
/// #[derive(Message)]
/// #[message(id = 17)]
/// struct Credit {
///     account: u64,
///     cents: i64,
/// }
///
/// assert_eq!(Credit::WIRE_SIZE, 16);
/// ```
///
/// Tuple and unit structs are accepted as well:
/// ```rust,ignore
/// # use relay_api::Message;
/// #[derive(Message)]
/// #[message(id = 18)]
/// struct Tick(u32);
///
/// #[derive(Message)]
/// #[message(id = 19)]
/// struct Flush;
/// ```
#[proc_macro_derive(Message, attributes(message))]
pub fn derive_message(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    message::expand(&input).into()
}
