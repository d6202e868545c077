// Helpers shared by the derive implementations

/// Helper function for error handling in derived macros
pub fn format_error_span<T: quote::ToTokens>(
    item: &T,
    message: &str
) -> proc_macro2::TokenStream {
    syn::Error::new_spanned(item, message)
        .to_compile_error()
}
