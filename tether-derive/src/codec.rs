use crate::attribute::{
    int_repr,
    is_repr_c,
    should_skip_field,
};
use proc_macro2::TokenStream as TokenStream2;
use quote::{
    format_ident,
    quote,
};

/// Stable member order: named members sort by identifier, positional
/// members keep their declaration order.
fn ordered_members(fields: &syn::Fields) -> Vec<(syn::Member, &syn::Field)> {
    match fields {
        syn::Fields::Named(named) => {
            let mut members: Vec<_> = named
                .named
                .iter()
                .map(|field| {
                    let ident = field.ident.clone().expect("named field");
                    (syn::Member::Named(ident), field)
                })
                .collect();
            members.sort_by_key(|(member, _)| match member {
                syn::Member::Named(ident) => ident.to_string(),
                syn::Member::Unnamed(_) => String::new(),
            });
            members
        }
        syn::Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(index, field)| {
                (
                    syn::Member::Unnamed(syn::Index::from(index)),
                    field,
                )
            })
            .collect(),
        syn::Fields::Unit => Vec::new(),
    }
}

fn local_for(member: &syn::Member) -> syn::Ident {
    match member {
        syn::Member::Named(ident) => format_ident!("__member_{}", ident),
        syn::Member::Unnamed(index) => format_ident!("__member_{}", index.index),
    }
}

/// Decode statements plus the construction expression for one set of
/// fields, evaluated in stable order but constructed in declaration shape.
fn decode_plan(path: TokenStream2, fields: &syn::Fields) -> TokenStream2 {
    let members = ordered_members(fields);
    let lets = members.iter().map(|(member, field)| {
        let local = local_for(member);
        let ty = &field.ty;
        if should_skip_field(field) {
            quote! { let #local: #ty = ::core::default::Default::default(); }
        } else {
            quote! { let #local = <#ty as tether::codec::Codec>::decode(cx, input)?; }
        }
    });
    let construct = match fields {
        syn::Fields::Named(_) => {
            let inits = members.iter().map(|(member, _)| {
                let local = local_for(member);
                quote! { #member: #local }
            });
            quote! { #path { #(#inits),* } }
        }
        syn::Fields::Unnamed(_) => {
            let inits = members.iter().map(|(member, _)| local_for(member));
            quote! { #path ( #(#inits),* ) }
        }
        syn::Fields::Unit => path,
    };
    quote! {
        #(#lets)*
        ::core::result::Result::Ok(#construct)
    }
}

fn blittable_const(ast: &syn::DeriveInput, fields: &syn::Fields) -> TokenStream2 {
    let members = ordered_members(fields);
    // A skipped member never reaches the wire, so the byte image cannot
    // cover the whole aggregate.
    if !is_repr_c(&ast.attrs) || members.iter().any(|(_, field)| should_skip_field(field))
    {
        return quote! { false }
    }
    let types: Vec<_> = members.iter().map(|(_, field)| &field.ty).collect();
    quote! {
        true #(&& <#types as tether::codec::Codec>::BLITTABLE)*
            && ::core::mem::size_of::<Self>()
                == 0 #(+ ::core::mem::size_of::<#types>())*
    }
}

fn codec_struct(s: &synstructure::Structure) -> TokenStream2 {
    let ast = s.ast();
    let fields = match &ast.data {
        syn::Data::Struct(data) => &data.fields,
        _ => unreachable!(),
    };

    let encode_stmts = ordered_members(fields)
        .into_iter()
        .filter(|(_, field)| !should_skip_field(field))
        .map(|(member, _)| {
            quote! { tether::codec::Codec::encode(&self.#member, cx, buffer)?; }
        });
    let decode_body = decode_plan(quote! { Self }, fields);
    let blittable = blittable_const(ast, fields);

    s.gen_impl(quote! {
        gen impl tether::codec::Codec for @Self {
            const BLITTABLE: bool = #blittable;

            #[inline(always)]
            fn encode<O: tether::wire::Output + ?Sized>(
                &self,
                cx: &mut tether::codec::EncodeCx<'_>,
                buffer: &mut O,
            ) -> ::core::result::Result<(), tether::error::Error> {
                #(#encode_stmts)*
                ::core::result::Result::Ok(())
            }

            fn decode<I: tether::wire::Input + ?Sized>(
                cx: &mut tether::codec::DecodeCx<'_>,
                input: &mut I,
            ) -> ::core::result::Result<Self, tether::error::Error> {
                #decode_body
            }
        }
    })
}

/// A fieldless enum with an integer representation travels as that integer.
fn codec_enum_underlying(
    s: &synstructure::Structure,
    repr: &syn::Ident,
) -> TokenStream2 {
    let names: Vec<_> = s.variants().iter().map(|v| v.ast().ident.clone()).collect();

    s.gen_impl(quote! {
        gen impl tether::codec::Codec for @Self {
            #[inline(always)]
            fn encode<O: tether::wire::Output + ?Sized>(
                &self,
                cx: &mut tether::codec::EncodeCx<'_>,
                buffer: &mut O,
            ) -> ::core::result::Result<(), tether::error::Error> {
                let raw: #repr = match self {
                    #(Self::#names => Self::#names as #repr,)*
                };
                tether::codec::Codec::encode(&raw, cx, buffer)
            }

            fn decode<I: tether::wire::Input + ?Sized>(
                cx: &mut tether::codec::DecodeCx<'_>,
                input: &mut I,
            ) -> ::core::result::Result<Self, tether::error::Error> {
                let raw = <#repr as tether::codec::Codec>::decode(cx, input)?;
                #(
                    if raw == Self::#names as #repr {
                        return ::core::result::Result::Ok(Self::#names)
                    }
                )*
                ::core::result::Result::Err(tether::error::Error::from(
                    tether::error::Malformed::UnknownDiscriminant { value: raw as u64 },
                ))
            }
        }
    })
}

/// Any other enum travels as a varuint discriminant (declaration index)
/// followed by the variant's members in stable order.
fn codec_enum_tagged(s: &synstructure::Structure) -> TokenStream2 {
    let encode_arms = s.variants().iter().enumerate().map(|(index, variant)| {
        let index = index as u64;
        let pat = variant.pat();
        let mut bindings: Vec<_> = variant.bindings().iter().collect();
        if matches!(variant.ast().fields, syn::Fields::Named(_)) {
            bindings.sort_by_key(|binding| {
                binding.ast().ident.as_ref().expect("named field").to_string()
            });
        }
        let writes = bindings.into_iter().map(|binding| {
            if should_skip_field(binding.ast()) {
                quote! { let _ = #binding; }
            } else {
                quote! { tether::codec::Codec::encode(#binding, cx, buffer)?; }
            }
        });
        quote! {
            #pat => {
                tether::wire::VarintWrite::write_varuint(buffer, #index)?;
                #(#writes)*
            }
        }
    });

    let decode_arms = s.variants().iter().enumerate().map(|(index, variant)| {
        let index = index as u64;
        let name = &variant.ast().ident;
        let body = decode_plan(quote! { Self::#name }, variant.ast().fields);
        quote! { #index => { #body } }
    });

    s.gen_impl(quote! {
        gen impl tether::codec::Codec for @Self {
            #[inline(always)]
            fn encode<O: tether::wire::Output + ?Sized>(
                &self,
                cx: &mut tether::codec::EncodeCx<'_>,
                buffer: &mut O,
            ) -> ::core::result::Result<(), tether::error::Error> {
                match self {
                    #(#encode_arms)*
                }
                ::core::result::Result::Ok(())
            }

            fn decode<I: tether::wire::Input + ?Sized>(
                cx: &mut tether::codec::DecodeCx<'_>,
                input: &mut I,
            ) -> ::core::result::Result<Self, tether::error::Error> {
                let discr = tether::wire::VarintRead::read_varuint64(input)?;
                match discr {
                    #(#decode_arms)*
                    value => ::core::result::Result::Err(tether::error::Error::from(
                        tether::error::Malformed::UnknownDiscriminant { value },
                    )),
                }
            }
        }
    })
}

/// Derives `Codec` for the given `struct` or `enum`.
pub fn codec_derive(mut s: synstructure::Structure) -> TokenStream2 {
    s.add_bounds(synstructure::AddBounds::Fields)
        .underscore_const(true);
    match &s.ast().data {
        syn::Data::Struct(_) => codec_struct(&s),
        syn::Data::Enum(data) => {
            let fieldless = data
                .variants
                .iter()
                .all(|variant| matches!(variant.fields, syn::Fields::Unit));
            match int_repr(&s.ast().attrs) {
                Some(repr) if fieldless => codec_enum_underlying(&s, &repr),
                _ => codec_enum_tagged(&s),
            }
        }
        syn::Data::Union(_) => panic!("can't derive `Codec` for `union`s"),
    }
}
