use darling::FromAttributes;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Index};

use crate::common::format_error_span;

/// Options accepted by `#[message(...)]`
#[derive(Debug, FromAttributes)]
#[darling(attributes(message))]
pub struct MessageArgs {
    /// Packet type id written into every serialized packet
    id: u32,
}

/// Expands `#[derive(Message)]` into a `relay_api::Message` impl and a
/// `WIRE_SIZE` constant. Errors are returned as compile_error! tokens.
pub fn expand(input: &DeriveInput) -> TokenStream {
    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return format_error_span(
                &input.ident,
                "Message can only be derived for structs",
            );
        }
    };

    let args = match MessageArgs::from_attributes(&input.attrs) {
        Ok(args) => args,
        Err(error) => return error.write_errors(),
    };

    let name = &input.ident;
    let type_id = args.id;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_types: Vec<_> = fields.iter().map(|field| &field.ty).collect();

    // Field accessors in declaration order: `self.name` or `self.0`
    let accessors: Vec<TokenStream> = match fields {
        Fields::Named(named) => named
            .named
            .iter()
            .map(|field| {
                let ident = &field.ident;
                quote! { #ident }
            })
            .collect(),
        Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|index| {
                let index = Index::from(index);
                quote! { #index }
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let construct = match fields {
        Fields::Named(_) => quote! {
            Self { #( #accessors: reader.read::<#field_types>()?, )* }
        },
        Fields::Unnamed(_) => quote! {
            Self( #( reader.read::<#field_types>()?, )* )
        },
        Fields::Unit => quote! { Self },
    };

    // Unit structs never touch the reader
    let reader_binding = if matches!(fields, Fields::Unit) {
        quote! {}
    } else {
        quote! { let mut reader = ::relay_api::PayloadReader::new(&packet); }
    };

    quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Encoded payload size in bytes
            pub const WIRE_SIZE: usize = 0 #( + <#field_types as ::relay_api::WireField>::WIDTH )*;
        }

        impl #impl_generics ::relay_api::Message for #name #ty_generics #where_clause {
            const TYPE_ID: u32 = #type_id;

            fn serialize(self) -> ::relay_api::Packet {
                #[allow(unused_mut)]
                let mut writer = ::relay_api::PayloadWriter::with_capacity(Self::WIRE_SIZE);
                #( writer.write(&self.#accessors); )*
                writer.finish(<Self as ::relay_api::Message>::TYPE_ID)
            }

            fn deserialize(
                packet: ::relay_api::Packet,
            ) -> ::std::result::Result<Self, ::relay_api::DeserializeError> {
                ::relay_api::message::expect_packet(
                    &packet,
                    <Self as ::relay_api::Message>::TYPE_ID,
                    Self::WIRE_SIZE,
                )?;
                #reader_binding
                ::std::result::Result::Ok(#construct)
            }
        }
    }
}
