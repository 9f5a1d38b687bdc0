//! Reflective identities.
//!
//! A [`TypeIdent`] is a stable, structural description of a type: enough to
//! reconstruct the concrete type at decode time against the registry, and
//! bit-exact on the wire so two processes agree on every dynamic type tag.
//! [`MethodIdent`] identifies constructors and (possibly open generic)
//! methods; open generic methods are re-identified through a [`Matcher`]
//! tree because their parameter types may refer back to the method itself.

mod codec;
mod matcher;

pub use codec::{
    DefArity,
    IdentReader,
    IdentWriter,
    MAX_IDENT_DEPTH,
};
pub use matcher::Matcher;

/// Structural identity of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeIdent {
    /// Single-dimensional, zero-lower-bound array of an element type.
    SzArray(Box<TypeIdent>),
    /// Multi-dimensional array of a given rank.
    Array {
        /// Number of dimensions, 1..=32.
        rank: u8,
        /// Element type.
        elem: Box<TypeIdent>,
    },
    /// Formal parameter of a generic type definition.
    TypeParam {
        /// Position in the parent's formal parameter list.
        index: u8,
        /// The generic definition owning the parameter.
        parent: Box<TypeIdent>,
    },
    /// Formal parameter of a generic method definition.
    MethodParam {
        /// Position in the method's formal parameter list.
        index: u8,
        /// The method owning the parameter.
        parent: Box<MethodIdent>,
    },
    /// Instantiation of a generic definition.
    Constructed {
        /// The open definition; its arity fixes the argument count.
        def: Box<TypeIdent>,
        /// Type arguments, one per formal parameter.
        args: Vec<TypeIdent>,
    },
    /// A definition built into the serializer itself.
    Builtin(u16),
    /// A well-known definition, carried as the stable hash of its full name.
    Known(u64),
    /// A named definition inside a package.
    Named {
        /// Canonical full name (crate path plus type name).
        name: String,
        /// The owning package.
        package: PackageIdent,
    },
}

impl TypeIdent {
    /// Shorthand for a single-dimensional array identity.
    pub fn sz_array(elem: TypeIdent) -> Self {
        Self::SzArray(Box::new(elem))
    }

    /// Shorthand for an instantiated generic identity.
    pub fn constructed(def: TypeIdent, args: Vec<TypeIdent>) -> Self {
        Self::Constructed {
            def: Box::new(def),
            args,
        }
    }

    /// Shorthand for a named definition.
    pub fn named(name: impl Into<String>, package: PackageIdent) -> Self {
        Self::Named {
            name: name.into(),
            package,
        }
    }
}

/// Identity of a package: either the stable hash of a trusted name, or the
/// full name plus version quad.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageIdent {
    /// Hash of a name on the trust list.
    Known(u64),
    /// Full name and version.
    Named {
        /// Package name.
        name: String,
        /// Package version.
        version: Version,
    },
}

impl PackageIdent {
    /// Shorthand for the named form.
    pub fn named(name: impl Into<String>, version: Version) -> Self {
        Self::Named {
            name: name.into(),
            version,
        }
    }
}

/// Four-component package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    /// Major component.
    pub major: i64,
    /// Minor component.
    pub minor: i64,
    /// Build component.
    pub build: i64,
    /// Revision component.
    pub revision: i64,
}

impl Version {
    /// Build a version from its components.
    pub fn new(major: i64, minor: i64, build: i64, revision: i64) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

/// Structural identity of a constructor or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodIdent {
    /// Constructor of a type, identified by its parameter shapes.
    Ctor {
        /// The constructed type.
        declaring: TypeIdent,
        /// Parameter shapes.
        params: Vec<Matcher>,
    },
    /// Instantiation of an open generic method.
    Constructed {
        /// The open method; its arity fixes the argument count.
        def: Box<MethodIdent>,
        /// Generic arguments.
        args: Vec<TypeIdent>,
    },
    /// Method declared by a type. Open generic methods carry their
    /// parameters as matcher trees, since those may refer back to the
    /// method's own generic parameters.
    Member {
        /// Declaring type.
        declaring: TypeIdent,
        /// Method name.
        name: String,
        /// Generic parameter count, 0 for non-generic methods.
        arity: u8,
        /// Parameter shapes.
        params: Vec<Matcher>,
    },
    /// Free function scoped to a package.
    Free {
        /// Owning package.
        package: PackageIdent,
        /// Function name.
        name: String,
        /// Generic parameter count.
        arity: u8,
        /// Parameter shapes.
        params: Vec<Matcher>,
    },
}

impl MethodIdent {
    /// Generic arity of the identified method definition.
    pub fn arity(&self) -> u8 {
        match self {
            Self::Member { arity, .. } | Self::Free { arity, .. } => *arity,
            Self::Ctor { .. } | Self::Constructed { .. } => 0,
        }
    }
}

/// Identities of the definitions built into the serializer.
///
/// These numbers are part of the wire contract.
pub mod builtin {
    /// `bool`
    pub const BOOL: u16 = 0;
    /// `u8`
    pub const U8: u16 = 1;
    /// `u16`
    pub const U16: u16 = 2;
    /// `u32`
    pub const U32: u16 = 3;
    /// `u64`
    pub const U64: u16 = 4;
    /// `u128`
    pub const U128: u16 = 5;
    /// `i8`
    pub const I8: u16 = 6;
    /// `i16`
    pub const I16: u16 = 7;
    /// `i32`
    pub const I32: u16 = 8;
    /// `i64`
    pub const I64: u16 = 9;
    /// `i128`
    pub const I128: u16 = 10;
    /// `f32`
    pub const F32: u16 = 11;
    /// `f64`
    pub const F64: u16 = 12;
    /// `char`
    pub const CHAR: u16 = 13;
    /// `String`
    pub const STRING: u16 = 14;
    /// `Duration`
    pub const DURATION: u16 = 15;
    /// `Decimal128`
    pub const DECIMAL: u16 = 16;

    /// `VecDeque<T>` definition, arity 1.
    pub const DEQUE: u16 = 32;
    /// `HashMap<K, V>` definition, arity 2.
    pub const MAP: u16 = 33;
    /// `BTreeMap<K, V>` definition, arity 2.
    pub const ORDERED_MAP: u16 = 34;
    /// `HashSet<T>` definition, arity 1.
    pub const SET: u16 = 35;
    /// `BTreeSet<T>` definition, arity 1.
    pub const ORDERED_SET: u16 = 36;
    /// Two-element tuple definition.
    pub const TUPLE2: u16 = 37;
    /// Three-element tuple definition.
    pub const TUPLE3: u16 = 38;
    /// Four-element tuple definition.
    pub const TUPLE4: u16 = 39;

    /// Generic arity of a builtin definition.
    pub fn arity(id: u16) -> Option<usize> {
        match id {
            BOOL..=DECIMAL => Some(0),
            DEQUE | SET | ORDERED_SET => Some(1),
            MAP | ORDERED_MAP | TUPLE2 => Some(2),
            TUPLE3 => Some(3),
            TUPLE4 => Some(4),
            _ => None,
        }
    }
}
