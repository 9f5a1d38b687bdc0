//! Bit-exact encoding of reflective identities.
//!
//! Every identity starts with a tag byte: the case kind in the low 3 bits,
//! a small inline number (array rank minus one, parameter index) in the
//! upper 5 bits. Operands follow in fixed order. Instantiated generics do
//! not transmit their argument count; it is derived from the definition's
//! arity at decode time.

use crate::{
    error::{
        Error,
        Malformed,
        TypeNotFound,
    },
    ident::{
        builtin,
        Matcher,
        MethodIdent,
        PackageIdent,
        TypeIdent,
        Version,
    },
    names::NameMap,
};
use tether_wire::{
    Input,
    Output,
    ScalarRead,
    ScalarWrite,
    VarintRead,
    VarintWrite,
};

/// Hard ceiling on identity nesting, applied while decoding.
pub const MAX_IDENT_DEPTH: usize = 64;

const KIND_MASK: u8 = 0b111;

mod type_kind {
    pub const SZ_ARRAY: u8 = 0;
    pub const ARRAY: u8 = 1;
    pub const TYPE_PARAM: u8 = 2;
    pub const METHOD_PARAM: u8 = 3;
    pub const CONSTRUCTED: u8 = 4;
    pub const BUILTIN: u8 = 5;
    pub const KNOWN: u8 = 6;
    pub const NAMED: u8 = 7;
}

mod method_kind {
    pub const CTOR: u8 = 0;
    pub const CONSTRUCTED: u8 = 1;
    pub const MEMBER: u8 = 2;
    pub const FREE: u8 = 3;
}

mod matcher_kind {
    pub const SZ_ARRAY: u8 = 0;
    pub const ARRAY: u8 = 1;
    pub const TYPE_PARAM: u8 = 2;
    pub const METHOD_PARAM: u8 = 3;
    pub const CONSTRUCTED: u8 = 4;
    pub const EXACT: u8 = 5;
}

fn pack_tag(kind: u8, inline: u32) -> Result<u8, Error> {
    if inline > 31 {
        return Err(Malformed::InlineNumberOverflow { value: inline }.into())
    }
    // Cannot truncate: limited to five bits by the check above.
    #[allow(clippy::cast_possible_truncation)]
    let tag = kind | ((inline as u8) << 3);
    Ok(tag)
}

/// Supplies the generic arity of open definitions during decode.
pub trait DefArity {
    /// Arity of a generic definition, `None` when the definition is unknown.
    fn arity_of(&self, def: &TypeIdent) -> Option<usize>;
}

/// Writes identities, compressing names found on the trust lists into their
/// stable 8-byte hashes.
pub struct IdentWriter<'a> {
    known_packages: &'a NameMap<String>,
    known_types: &'a NameMap<String>,
}

impl<'a> IdentWriter<'a> {
    /// Build a writer over the configured trust lists.
    pub fn new(
        known_packages: &'a NameMap<String>,
        known_types: &'a NameMap<String>,
    ) -> Self {
        Self {
            known_packages,
            known_types,
        }
    }

    /// Encode a type identity.
    pub fn write_type<O: Output + ?Sized>(
        &self,
        out: &mut O,
        ident: &TypeIdent,
    ) -> Result<(), Error> {
        match ident {
            TypeIdent::SzArray(elem) => {
                out.push_byte(pack_tag(type_kind::SZ_ARRAY, 0)?)?;
                self.write_type(out, elem)
            }
            TypeIdent::Array { rank, elem } => {
                if *rank == 0 {
                    return Err(Malformed::InlineNumberOverflow { value: 0 }.into())
                }
                let packed = u32::from(*rank).saturating_sub(1);
                out.push_byte(pack_tag(type_kind::ARRAY, packed)?)?;
                self.write_type(out, elem)
            }
            TypeIdent::TypeParam { index, parent } => {
                out.push_byte(pack_tag(type_kind::TYPE_PARAM, u32::from(*index))?)?;
                self.write_type(out, parent)
            }
            TypeIdent::MethodParam { index, parent } => {
                out.push_byte(pack_tag(type_kind::METHOD_PARAM, u32::from(*index))?)?;
                self.write_method(out, parent)
            }
            TypeIdent::Constructed { def, args } => {
                out.push_byte(pack_tag(type_kind::CONSTRUCTED, 0)?)?;
                self.write_type(out, def)?;
                for arg in args {
                    self.write_type(out, arg)?;
                }
                Ok(())
            }
            TypeIdent::Builtin(id) => {
                out.push_byte(pack_tag(type_kind::BUILTIN, 0)?)?;
                out.write_varuint(u64::from(*id))?;
                Ok(())
            }
            TypeIdent::Known(hash) => {
                out.push_byte(pack_tag(type_kind::KNOWN, 0)?)?;
                out.write_u64(*hash)?;
                Ok(())
            }
            TypeIdent::Named { name, package } => {
                // Types on the trust list travel as their stable hash.
                if let Some(hash) = self.known_types.hash_of(name) {
                    out.push_byte(pack_tag(type_kind::KNOWN, 0)?)?;
                    out.write_u64(hash)?;
                    return Ok(())
                }
                out.push_byte(pack_tag(type_kind::NAMED, 0)?)?;
                out.write_str(name)?;
                self.write_package(out, package)
            }
        }
    }

    /// Encode a package identity.
    pub fn write_package<O: Output + ?Sized>(
        &self,
        out: &mut O,
        ident: &PackageIdent,
    ) -> Result<(), Error> {
        match ident {
            PackageIdent::Known(hash) => {
                out.write_bool(true)?;
                out.write_u64(*hash)?;
            }
            PackageIdent::Named { name, version } => {
                if let Some(hash) = self.known_packages.hash_of(name) {
                    out.write_bool(true)?;
                    out.write_u64(hash)?;
                    return Ok(())
                }
                out.write_bool(false)?;
                out.write_str(name)?;
                out.write_varint(version.major)?;
                out.write_varint(version.minor)?;
                out.write_varint(version.build)?;
                out.write_varint(version.revision)?;
            }
        }
        Ok(())
    }

    /// Encode a method identity.
    pub fn write_method<O: Output + ?Sized>(
        &self,
        out: &mut O,
        ident: &MethodIdent,
    ) -> Result<(), Error> {
        match ident {
            MethodIdent::Ctor { declaring, params } => {
                out.push_byte(pack_tag(method_kind::CTOR, 0)?)?;
                self.write_type(out, declaring)?;
                self.write_matchers(out, params)
            }
            MethodIdent::Constructed { def, args } => {
                out.push_byte(pack_tag(method_kind::CONSTRUCTED, 0)?)?;
                self.write_method(out, def)?;
                for arg in args {
                    self.write_type(out, arg)?;
                }
                Ok(())
            }
            MethodIdent::Member {
                declaring,
                name,
                arity,
                params,
            } => {
                out.push_byte(pack_tag(method_kind::MEMBER, u32::from(*arity))?)?;
                self.write_type(out, declaring)?;
                out.write_str(name)?;
                self.write_matchers(out, params)
            }
            MethodIdent::Free {
                package,
                name,
                arity,
                params,
            } => {
                out.push_byte(pack_tag(method_kind::FREE, u32::from(*arity))?)?;
                self.write_package(out, package)?;
                out.write_str(name)?;
                self.write_matchers(out, params)
            }
        }
    }

    fn write_matchers<O: Output + ?Sized>(
        &self,
        out: &mut O,
        params: &[Matcher],
    ) -> Result<(), Error> {
        out.write_len(params.len())?;
        for param in params {
            self.write_matcher(out, param)?;
        }
        Ok(())
    }

    /// Encode a parameter matcher.
    pub fn write_matcher<O: Output + ?Sized>(
        &self,
        out: &mut O,
        matcher: &Matcher,
    ) -> Result<(), Error> {
        match matcher {
            Matcher::SzArray(elem) => {
                out.push_byte(pack_tag(matcher_kind::SZ_ARRAY, 0)?)?;
                self.write_matcher(out, elem)
            }
            Matcher::Array { rank, elem } => {
                if *rank == 0 {
                    return Err(Malformed::InlineNumberOverflow { value: 0 }.into())
                }
                let packed = u32::from(*rank).saturating_sub(1);
                out.push_byte(pack_tag(matcher_kind::ARRAY, packed)?)?;
                self.write_matcher(out, elem)
            }
            Matcher::TypeParam { index, parent } => {
                out.push_byte(pack_tag(matcher_kind::TYPE_PARAM, u32::from(*index))?)?;
                self.write_type(out, parent)
            }
            Matcher::MethodParam(index) => {
                out.push_byte(pack_tag(matcher_kind::METHOD_PARAM, u32::from(*index))?)?;
                Ok(())
            }
            Matcher::Constructed { def, args } => {
                out.push_byte(pack_tag(matcher_kind::CONSTRUCTED, 0)?)?;
                self.write_type(out, def)?;
                // Matcher trees resolve without the registry, so the count
                // travels on the wire.
                out.write_len(args.len())?;
                for arg in args {
                    self.write_matcher(out, arg)?;
                }
                Ok(())
            }
            Matcher::Exact(ident) => {
                out.push_byte(pack_tag(matcher_kind::EXACT, 0)?)?;
                self.write_type(out, ident)
            }
        }
    }
}

/// Reads identities back from the wire.
pub struct IdentReader<'a> {
    arity: &'a dyn DefArity,
}

impl<'a> IdentReader<'a> {
    /// Build a reader over a definition-arity source.
    pub fn new(arity: &'a dyn DefArity) -> Self {
        Self { arity }
    }

    /// Decode a type identity.
    pub fn read_type<I: Input + ?Sized>(&self, input: &mut I) -> Result<TypeIdent, Error> {
        self.read_type_at(input, 0)
    }

    fn read_type_at<I: Input + ?Sized>(
        &self,
        input: &mut I,
        depth: usize,
    ) -> Result<TypeIdent, Error> {
        if depth >= MAX_IDENT_DEPTH {
            return Err(Malformed::IdentTooDeep {
                limit: MAX_IDENT_DEPTH,
            }
            .into())
        }
        let depth = depth.saturating_add(1);
        let tag = input.read_byte()?;
        let inline = tag >> 3;
        match tag & KIND_MASK {
            type_kind::SZ_ARRAY if inline == 0 => Ok(TypeIdent::SzArray(Box::new(
                self.read_type_at(input, depth)?,
            ))),
            type_kind::ARRAY => Ok(TypeIdent::Array {
                rank: inline.saturating_add(1),
                elem: Box::new(self.read_type_at(input, depth)?),
            }),
            type_kind::TYPE_PARAM => Ok(TypeIdent::TypeParam {
                index: inline,
                parent: Box::new(self.read_type_at(input, depth)?),
            }),
            type_kind::METHOD_PARAM => Ok(TypeIdent::MethodParam {
                index: inline,
                parent: Box::new(self.read_method_at(input, depth)?),
            }),
            type_kind::CONSTRUCTED if inline == 0 => {
                let def = self.read_type_at(input, depth)?;
                let arity = match &def {
                    TypeIdent::Builtin(id) => builtin::arity(*id),
                    other => self.arity.arity_of(other),
                }
                .ok_or_else(|| Error::TypeNotFound(TypeNotFound::Type(def.clone())))?;
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.read_type_at(input, depth)?);
                }
                Ok(TypeIdent::Constructed {
                    def: Box::new(def),
                    args,
                })
            }
            type_kind::BUILTIN if inline == 0 => {
                Ok(TypeIdent::Builtin(input.read_varuint16()?))
            }
            type_kind::KNOWN if inline == 0 => Ok(TypeIdent::Known(input.read_u64()?)),
            type_kind::NAMED if inline == 0 => {
                let name = input.read_string()?;
                let package = self.read_package(input)?;
                Ok(TypeIdent::Named { name, package })
            }
            _ => Err(Malformed::BadIdentTag { tag }.into()),
        }
    }

    /// Decode a package identity.
    pub fn read_package<I: Input + ?Sized>(
        &self,
        input: &mut I,
    ) -> Result<PackageIdent, Error> {
        if input.read_bool()? {
            Ok(PackageIdent::Known(input.read_u64()?))
        } else {
            let name = input.read_string()?;
            let version = Version {
                major: input.read_varint64()?,
                minor: input.read_varint64()?,
                build: input.read_varint64()?,
                revision: input.read_varint64()?,
            };
            Ok(PackageIdent::Named { name, version })
        }
    }

    /// Decode a method identity.
    pub fn read_method<I: Input + ?Sized>(
        &self,
        input: &mut I,
    ) -> Result<MethodIdent, Error> {
        self.read_method_at(input, 0)
    }

    fn read_method_at<I: Input + ?Sized>(
        &self,
        input: &mut I,
        depth: usize,
    ) -> Result<MethodIdent, Error> {
        if depth >= MAX_IDENT_DEPTH {
            return Err(Malformed::IdentTooDeep {
                limit: MAX_IDENT_DEPTH,
            }
            .into())
        }
        let depth = depth.saturating_add(1);
        let tag = input.read_byte()?;
        let inline = tag >> 3;
        match tag & KIND_MASK {
            method_kind::CTOR if inline == 0 => Ok(MethodIdent::Ctor {
                declaring: self.read_type_at(input, depth)?,
                params: self.read_matchers(input, depth)?,
            }),
            method_kind::CONSTRUCTED if inline == 0 => {
                let def = self.read_method_at(input, depth)?;
                let arity = usize::from(def.arity());
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.read_type_at(input, depth)?);
                }
                Ok(MethodIdent::Constructed {
                    def: Box::new(def),
                    args,
                })
            }
            method_kind::MEMBER => Ok(MethodIdent::Member {
                declaring: self.read_type_at(input, depth)?,
                name: input.read_string()?,
                arity: inline,
                params: self.read_matchers(input, depth)?,
            }),
            method_kind::FREE => Ok(MethodIdent::Free {
                package: self.read_package(input)?,
                name: input.read_string()?,
                arity: inline,
                params: self.read_matchers(input, depth)?,
            }),
            _ => Err(Malformed::BadIdentTag { tag }.into()),
        }
    }

    fn read_matchers<I: Input + ?Sized>(
        &self,
        input: &mut I,
        depth: usize,
    ) -> Result<Vec<Matcher>, Error> {
        let count = input.read_len()?;
        if count > input.remaining() {
            return Err(tether_wire::Error::BufferTooShort.into())
        }
        let mut params = Vec::with_capacity(count);
        for _ in 0..count {
            params.push(self.read_matcher_at(input, depth)?);
        }
        Ok(params)
    }

    /// Decode a parameter matcher.
    pub fn read_matcher<I: Input + ?Sized>(&self, input: &mut I) -> Result<Matcher, Error> {
        self.read_matcher_at(input, 0)
    }

    fn read_matcher_at<I: Input + ?Sized>(
        &self,
        input: &mut I,
        depth: usize,
    ) -> Result<Matcher, Error> {
        if depth >= MAX_IDENT_DEPTH {
            return Err(Malformed::IdentTooDeep {
                limit: MAX_IDENT_DEPTH,
            }
            .into())
        }
        let depth = depth.saturating_add(1);
        let tag = input.read_byte()?;
        let inline = tag >> 3;
        match tag & KIND_MASK {
            matcher_kind::SZ_ARRAY if inline == 0 => Ok(Matcher::SzArray(Box::new(
                self.read_matcher_at(input, depth)?,
            ))),
            matcher_kind::ARRAY => Ok(Matcher::Array {
                rank: inline.saturating_add(1),
                elem: Box::new(self.read_matcher_at(input, depth)?),
            }),
            matcher_kind::TYPE_PARAM => Ok(Matcher::TypeParam {
                index: inline,
                parent: Box::new(self.read_type_at(input, depth)?),
            }),
            matcher_kind::METHOD_PARAM => Ok(Matcher::MethodParam(inline)),
            matcher_kind::CONSTRUCTED if inline == 0 => {
                let def = self.read_type_at(input, depth)?;
                let count = input.read_len()?;
                if count > input.remaining() {
                    return Err(tether_wire::Error::BufferTooShort.into())
                }
                let mut args = Vec::with_capacity(count);
                for _ in 0..count {
                    args.push(self.read_matcher_at(input, depth)?);
                }
                Ok(Matcher::Constructed {
                    def: Box::new(def),
                    args,
                })
            }
            matcher_kind::EXACT if inline == 0 => Ok(Matcher::Exact(Box::new(
                self.read_type_at(input, depth)?,
            ))),
            _ => Err(Malformed::BadIdentTag { tag }.into()),
        }
    }
}
