use crate::attribute::should_skip_field;
use proc_macro2::TokenStream as TokenStream2;
use quote::{
    quote,
    ToTokens,
};

fn member_table(fields: &syn::Fields) -> Vec<TokenStream2> {
    let named = match fields {
        syn::Fields::Named(named) => &named.named,
        _ => return Vec::new(),
    };
    let mut members: Vec<_> = named
        .iter()
        .filter(|field| !should_skip_field(field))
        .map(|field| {
            let name = field.ident.as_ref().expect("named field").to_string();
            let type_name = field.ty.to_token_stream().to_string();
            (name, type_name)
        })
        .collect();
    members.sort();
    members
        .into_iter()
        .map(|(name, type_name)| {
            quote! {
                tether::reflect::MemberInfo {
                    name: #name,
                    type_name: #type_name,
                }
            }
        })
        .collect()
}

/// Derives `Describe` for the given `struct` or `enum`.
pub fn describe_derive(mut s: synstructure::Structure) -> TokenStream2 {
    s.add_bounds(synstructure::AddBounds::Generics)
        .underscore_const(true);
    let ast = s.ast();
    let name = &ast.ident;

    let kind = match &ast.data {
        syn::Data::Struct(_) => quote! { tether::reflect::TypeKind::Aggregate },
        syn::Data::Enum(_) => quote! { tether::reflect::TypeKind::Enum },
        syn::Data::Union(_) => panic!("can't derive `Describe` for `union`s"),
    };

    let members = match &ast.data {
        syn::Data::Struct(data) => member_table(&data.fields),
        _ => Vec::new(),
    };

    let definition = quote! {
        tether::ident::TypeIdent::Named {
            name: ::core::concat!(
                ::core::module_path!(), "::", ::core::stringify!(#name)
            )
            .to_string(),
            package: tether::reflect::cargo_package(
                ::core::env!("CARGO_PKG_NAME"),
                ::core::env!("CARGO_PKG_VERSION_MAJOR"),
                ::core::env!("CARGO_PKG_VERSION_MINOR"),
                ::core::env!("CARGO_PKG_VERSION_PATCH"),
            ),
        }
    };

    let type_params: Vec<_> = ast.generics.type_params().map(|p| p.ident.clone()).collect();
    let ident_expr = if type_params.is_empty() {
        definition
    } else {
        quote! {
            tether::ident::TypeIdent::Constructed {
                def: ::std::boxed::Box::new(#definition),
                args: ::std::vec![
                    #(<#type_params as tether::reflect::Describe>::ident()),*
                ],
            }
        }
    };

    s.gen_impl(quote! {
        gen impl tether::reflect::Describe for @Self {
            fn ident() -> tether::ident::TypeIdent {
                #ident_expr
            }

            fn kind() -> tether::reflect::TypeKind {
                #kind
            }

            fn members() -> &'static [tether::reflect::MemberInfo] {
                &[#(#members),*]
            }
        }
    })
}
