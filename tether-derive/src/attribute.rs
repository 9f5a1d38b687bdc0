use syn::{
    Attribute,
    Field,
    Meta,
};

/// Whether a `#[tether(...)]` attribute list contains the given word.
fn has_word(attrs: &[Attribute], word: &str) -> bool {
    attrs.iter().any(|attr| {
        if let Meta::List(list) = &attr.meta {
            list.path.is_ident("tether")
                && list
                    .tokens
                    .clone()
                    .into_iter()
                    .any(|token| token.to_string() == word)
        } else {
            false
        }
    })
}

/// `#[tether(skip)]`: the member is not persisted and decodes to its
/// default value.
pub fn should_skip_field(field: &Field) -> bool {
    has_word(&field.attrs, "skip")
}

/// The integer representation of a fieldless enum, from `#[repr(..)]`.
pub fn int_repr(attrs: &[Attribute]) -> Option<syn::Ident> {
    const REPRS: [&str; 8] = ["u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64"];
    attrs.iter().find_map(|attr| {
        if let Meta::List(list) = &attr.meta {
            if list.path.is_ident("repr") {
                return list.tokens.clone().into_iter().find_map(|token| {
                    let name = token.to_string();
                    REPRS
                        .contains(&name.as_str())
                        .then(|| syn::Ident::new(&name, proc_macro2::Span::call_site()))
                })
            }
        }
        None
    })
}

/// Whether the type declares `#[repr(C)]`.
pub fn is_repr_c(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        if let Meta::List(list) = &attr.meta {
            list.path.is_ident("repr")
                && list
                    .tokens
                    .clone()
                    .into_iter()
                    .any(|token| token.to_string() == "C")
        } else {
            false
        }
    })
}
