//! The registered reflection surface.
//!
//! There is no ambient reflection to lean on, so every type that can appear
//! behind a polymorphic slot is registered up front: its structural identity,
//! its erased formatter, and the dispatch mode used to rebuild it inside a
//! slot. Packages group registrations under a name and version; packages on
//! the trust list get the compact hash encoding for themselves and their
//! types.

use crate::{
    codec::Codec,
    engine::{
        self,
        Dispatch,
    },
    error::{
        Error,
        TypeNotFound,
    },
    formatter::{
        BlitFormatter,
        Formatter,
        TypedFormatter,
    },
    ident::{
        builtin,
        DefArity,
        Matcher,
        MethodIdent,
        PackageIdent,
        TypeIdent,
        Version,
    },
    names::NameMap,
};
use core::any::TypeId;
use std::{
    collections::{
        BTreeMap,
        BTreeSet,
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::Arc,
    time::Duration,
};
use tether_wire::Decimal128;

pub use tether_derive::Describe;

/// Classification consumed by the resolver chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// A scalar with a singleton formatter.
    Primitive,
    /// A fieldless enumeration carried as its underlying integer.
    Enum,
    /// An ordered sequence of elements.
    Sequence,
    /// A keyed collection.
    Map,
    /// A user aggregate encoded member by member.
    Aggregate,
}

/// One persisted member of an aggregate.
#[derive(Debug, Clone, Copy)]
pub struct MemberInfo {
    /// Member identifier.
    pub name: &'static str,
    /// Diagnostic name of the member's static type.
    pub type_name: &'static str,
}

/// Supplies the runtime description of a type.
///
/// Derived for user aggregates; implemented by hand for the built-in
/// universe.
pub trait Describe: 'static {
    /// Structural identity of the type.
    fn ident() -> TypeIdent;

    /// Classification consumed by the resolver chain.
    fn kind() -> TypeKind {
        TypeKind::Aggregate
    }

    /// Persisted members, in their stable order. Empty for non-aggregates.
    fn members() -> &'static [MemberInfo] {
        &[]
    }
}

/// Build the package identity of the deriving crate from its Cargo
/// environment. Used by the `Describe` derive.
#[doc(hidden)]
pub fn cargo_package(name: &str, major: &str, minor: &str, patch: &str) -> PackageIdent {
    PackageIdent::Named {
        name: name.to_string(),
        version: Version::new(
            major.parse().unwrap_or(0),
            minor.parse().unwrap_or(0),
            patch.parse().unwrap_or(0),
            0,
        ),
    }
}

macro_rules! impl_describe_primitive {
    ($($t:ty => $id:expr),* $(,)?) => {$(
        impl Describe for $t {
            fn ident() -> TypeIdent {
                TypeIdent::Builtin($id)
            }

            fn kind() -> TypeKind {
                TypeKind::Primitive
            }
        }
    )*};
}

impl_describe_primitive!(
    bool => builtin::BOOL,
    u8 => builtin::U8,
    u16 => builtin::U16,
    u32 => builtin::U32,
    u64 => builtin::U64,
    u128 => builtin::U128,
    i8 => builtin::I8,
    i16 => builtin::I16,
    i32 => builtin::I32,
    i64 => builtin::I64,
    i128 => builtin::I128,
    f32 => builtin::F32,
    f64 => builtin::F64,
    char => builtin::CHAR,
    String => builtin::STRING,
    Duration => builtin::DURATION,
    Decimal128 => builtin::DECIMAL,
);

impl<T: Describe> Describe for Vec<T> {
    fn ident() -> TypeIdent {
        TypeIdent::sz_array(T::ident())
    }

    fn kind() -> TypeKind {
        TypeKind::Sequence
    }
}

impl<T: Describe, const R: usize> Describe for crate::codec::MdArray<T, R> {
    fn ident() -> TypeIdent {
        TypeIdent::Array {
            // Ranks beyond the tag range are rejected by the identity codec.
            rank: u8::try_from(R).unwrap_or(u8::MAX),
            elem: Box::new(T::ident()),
        }
    }

    fn kind() -> TypeKind {
        TypeKind::Sequence
    }
}

macro_rules! impl_describe_constructed {
    ($($t:ident<$($p:ident),+> => $def:expr, $kind:expr);* $(;)?) => {$(
        impl<$($p: Describe),+> Describe for $t<$($p),+> {
            fn ident() -> TypeIdent {
                TypeIdent::constructed(
                    TypeIdent::Builtin($def),
                    vec![$(<$p as Describe>::ident()),+],
                )
            }

            fn kind() -> TypeKind {
                $kind
            }
        }
    )*};
}

impl_describe_constructed!(
    VecDeque<T> => builtin::DEQUE, TypeKind::Sequence;
    HashMap<K, V> => builtin::MAP, TypeKind::Map;
    BTreeMap<K, V> => builtin::ORDERED_MAP, TypeKind::Map;
    HashSet<T> => builtin::SET, TypeKind::Sequence;
    BTreeSet<T> => builtin::ORDERED_SET, TypeKind::Sequence;
);

macro_rules! impl_describe_tuple {
    ($(($($p:ident),+) => $def:expr);* $(;)?) => {$(
        impl<$($p: Describe),+> Describe for ($($p,)+) {
            fn ident() -> TypeIdent {
                TypeIdent::constructed(
                    TypeIdent::Builtin($def),
                    vec![$(<$p as Describe>::ident()),+],
                )
            }
        }
    )*};
}

impl_describe_tuple!(
    (A, B) => builtin::TUPLE2;
    (A, B, C) => builtin::TUPLE3;
    (A, B, C, D) => builtin::TUPLE4;
);

/// Runtime description of one registered type.
pub struct RuntimeType {
    /// Canonical structural identity.
    pub ident: TypeIdent,
    /// Rust type identity.
    pub type_id: TypeId,
    /// Diagnostic type name.
    pub type_name: &'static str,
    /// Classification consumed by the resolver chain.
    pub kind: TypeKind,
    /// Whether the whole aggregate may be copied byte-for-byte.
    pub blittable: bool,
    /// Persisted members of an aggregate.
    pub members: &'static [MemberInfo],
    pub(crate) base: Arc<dyn Formatter>,
    pub(crate) blit: Option<Arc<dyn Formatter>>,
    pub(crate) nominated: Option<Arc<dyn Formatter>>,
    pub(crate) make_dispatch: fn(Arc<dyn Formatter>) -> Arc<dyn Dispatch>,
}

impl core::fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuntimeType")
            .field("ident", &self.ident)
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("blittable", &self.blittable)
            .finish()
    }
}

/// Where a registered method lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodScope {
    /// Declared by a type.
    Type(TypeIdent),
    /// Free function scoped to a package.
    Package(String),
}

/// A registered method candidate.
///
/// Register with canonical (named, not hashed) identities; resolution
/// canonicalizes the wire side before matching.
#[derive(Debug, Clone)]
pub struct MethodDesc {
    /// Declaring scope.
    pub scope: MethodScope,
    /// Method name.
    pub name: String,
    /// Whether this is a constructor.
    pub ctor: bool,
    /// Generic parameter count.
    pub arity: u8,
    /// Declared parameter shapes.
    pub params: Vec<Matcher>,
}

type RegApply = Box<dyn Fn(&mut Registry) + Send + Sync>;

/// A named, versioned group of type registrations: the unit of trust and of
/// deferred loading.
pub struct Package {
    name: String,
    version: Version,
    regs: Vec<RegApply>,
}

impl Package {
    /// Start an empty package.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            regs: Vec::new(),
        }
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Add a default-constructible type.
    pub fn register<T: Codec + Describe + Send + Default>(mut self) -> Self {
        self.regs.push(Box::new(|registry| registry.register::<T>()));
        self
    }

    /// Add a type without a default value; it decodes whole and therefore
    /// cannot sit on a cycle.
    pub fn register_frozen<T: Codec + Describe + Send>(mut self) -> Self {
        self.regs
            .push(Box::new(|registry| registry.register_frozen::<T>()));
        self
    }

    pub(crate) fn apply(&self, registry: &mut Registry) {
        for reg in &self.regs {
            reg(registry);
        }
    }
}

/// Resolves identities to runtime types and methods.
pub trait Reflector: Send + Sync {
    /// Resolve a type identity to its registered runtime type.
    fn resolve(&self, ident: &TypeIdent) -> Result<Arc<RuntimeType>, Error>;

    /// Resolve a method identity to the first satisfying candidate.
    fn resolve_method(&self, ident: &MethodIdent) -> Result<Arc<MethodDesc>, Error>;
}

/// The type table backing the kernel.
#[derive(Default)]
pub struct Registry {
    by_type: HashMap<TypeId, Arc<RuntimeType>>,
    by_ident: HashMap<TypeIdent, Arc<RuntimeType>>,
    type_hashes: HashMap<u64, Arc<RuntimeType>>,
    package_hashes: HashMap<u64, PackageIdent>,
    generic_defs: HashMap<TypeIdent, usize>,
    methods: Vec<Arc<MethodDesc>>,
    known_packages: NameMap<String>,
    known_types: NameMap<String>,
    trusted: std::collections::HashSet<String>,
}

impl Registry {
    /// Put a package name on the trust list. Types of trusted packages are
    /// encoded as stable hashes. Must happen before the package's types are
    /// registered.
    pub fn trust_package(&mut self, name: &str, version: Version) {
        if self.known_packages.insert(name.to_string(), name) {
            let hash = crate::names::name_hash(name);
            self.package_hashes
                .insert(hash, PackageIdent::named(name, version));
            self.trusted.insert(name.to_string());
        }
    }

    /// Register a default-constructible type. Registration is idempotent.
    pub fn register<T: Codec + Describe + Send + Default>(&mut self) {
        self.insert::<T>(engine::make_in_place::<T>, None);
    }

    /// Register a type without a default value.
    pub fn register_frozen<T: Codec + Describe + Send>(&mut self) {
        self.insert::<T>(engine::make_by_value::<T>, None);
    }

    /// Register a type with a user-nominated formatter that takes precedence
    /// over everything the built-in chain would produce.
    pub fn register_with<T: Codec + Describe + Send + Default>(
        &mut self,
        formatter: Arc<dyn Formatter>,
    ) {
        self.insert::<T>(engine::make_in_place::<T>, Some(formatter));
    }

    /// Register a method candidate.
    pub fn register_method(&mut self, desc: MethodDesc) {
        self.methods.push(Arc::new(desc));
    }

    fn insert<T: Codec + Describe + Send>(
        &mut self,
        make_dispatch: fn(Arc<dyn Formatter>) -> Arc<dyn Dispatch>,
        nominated: Option<Arc<dyn Formatter>>,
    ) {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return
        }
        let ident = T::ident();
        if let TypeIdent::Constructed { def, args } = &ident {
            self.generic_defs
                .entry((**def).clone())
                .or_insert(args.len());
        }
        let blittable = T::BLITTABLE;
        let entry = Arc::new(RuntimeType {
            ident: ident.clone(),
            type_id,
            type_name: core::any::type_name::<T>(),
            kind: T::kind(),
            blittable,
            members: T::members(),
            base: Arc::new(TypedFormatter::<T>::default()),
            blit: blittable
                .then(|| Arc::new(BlitFormatter::<T>::default()) as Arc<dyn Formatter>),
            nominated,
            make_dispatch,
        });
        tracing::debug!(ty = entry.type_name, "type registered");

        if let TypeIdent::Named {
            name,
            package: PackageIdent::Named { name: pkg, .. },
        } = &ident
        {
            if self.trusted.contains(pkg) && self.known_types.insert(name.clone(), name) {
                let hash = crate::names::name_hash(name);
                self.type_hashes.insert(hash, entry.clone());
            }
        }

        self.by_type.insert(type_id, entry.clone());
        self.by_ident.entry(ident).or_insert(entry);
    }

    /// Runtime type of a registered Rust type.
    pub fn entry_by_id(&self, type_id: TypeId) -> Option<Arc<RuntimeType>> {
        self.by_type.get(&type_id).cloned()
    }

    pub(crate) fn known_packages(&self) -> &NameMap<String> {
        &self.known_packages
    }

    pub(crate) fn known_types(&self) -> &NameMap<String> {
        &self.known_types
    }

    /// Replace every well-known hash in an identity with the named form it
    /// was registered under.
    pub fn canonicalize(&self, ident: &TypeIdent) -> Result<TypeIdent, Error> {
        Ok(match ident {
            TypeIdent::Known(hash) => self
                .type_hashes
                .get(hash)
                .map(|entry| entry.ident.clone())
                .ok_or(Error::TypeNotFound(TypeNotFound::Hash(*hash)))?,
            TypeIdent::SzArray(elem) => TypeIdent::sz_array(self.canonicalize(elem)?),
            TypeIdent::Array { rank, elem } => TypeIdent::Array {
                rank: *rank,
                elem: Box::new(self.canonicalize(elem)?),
            },
            TypeIdent::Constructed { def, args } => TypeIdent::Constructed {
                def: Box::new(self.canonicalize(def)?),
                args: args
                    .iter()
                    .map(|arg| self.canonicalize(arg))
                    .collect::<Result<_, _>>()?,
            },
            TypeIdent::Named { name, package } => TypeIdent::Named {
                name: name.clone(),
                package: self.canonicalize_package(package)?,
            },
            other => other.clone(),
        })
    }

    fn canonicalize_package(&self, package: &PackageIdent) -> Result<PackageIdent, Error> {
        match package {
            PackageIdent::Known(hash) => self
                .package_hashes
                .get(hash)
                .cloned()
                .ok_or(Error::TypeNotFound(TypeNotFound::Hash(*hash))),
            named => Ok(named.clone()),
        }
    }

    fn canonicalize_matcher(&self, matcher: &Matcher) -> Result<Matcher, Error> {
        Ok(match matcher {
            Matcher::SzArray(elem) => {
                Matcher::SzArray(Box::new(self.canonicalize_matcher(elem)?))
            }
            Matcher::Array { rank, elem } => Matcher::Array {
                rank: *rank,
                elem: Box::new(self.canonicalize_matcher(elem)?),
            },
            Matcher::TypeParam { index, parent } => Matcher::TypeParam {
                index: *index,
                parent: Box::new(self.canonicalize(parent)?),
            },
            Matcher::MethodParam(index) => Matcher::MethodParam(*index),
            Matcher::Constructed { def, args } => Matcher::Constructed {
                def: Box::new(self.canonicalize(def)?),
                args: args
                    .iter()
                    .map(|arg| self.canonicalize_matcher(arg))
                    .collect::<Result<_, _>>()?,
            },
            Matcher::Exact(ident) => Matcher::Exact(Box::new(self.canonicalize(ident)?)),
        })
    }

    /// Resolve a type identity against the table.
    pub fn resolve(&self, ident: &TypeIdent) -> Result<Arc<RuntimeType>, Error> {
        let canon = self.canonicalize(ident)?;
        self.by_ident
            .get(&canon)
            .cloned()
            .ok_or(Error::TypeNotFound(TypeNotFound::Type(canon)))
    }

    /// Resolve a method identity: the first registered candidate whose
    /// parameter shapes satisfy every matcher wins.
    pub fn resolve_method(&self, ident: &MethodIdent) -> Result<Arc<MethodDesc>, Error> {
        let not_found = || Error::TypeNotFound(TypeNotFound::Method(ident.clone()));
        let (scope, name, ctor, arity, params) = match ident {
            MethodIdent::Constructed { def, args } => {
                let desc = self.resolve_method(def)?;
                if usize::from(desc.arity) != args.len() {
                    return Err(not_found())
                }
                return Ok(desc)
            }
            MethodIdent::Ctor { declaring, params } => (
                MethodScope::Type(self.canonicalize(declaring)?),
                None,
                true,
                0u8,
                params,
            ),
            MethodIdent::Member {
                declaring,
                name,
                arity,
                params,
            } => (
                MethodScope::Type(self.canonicalize(declaring)?),
                Some(name.as_str()),
                false,
                *arity,
                params,
            ),
            MethodIdent::Free {
                package,
                name,
                arity,
                params,
            } => {
                let package = match self.canonicalize_package(package)? {
                    PackageIdent::Named { name, .. } => name,
                    PackageIdent::Known(hash) => {
                        return Err(Error::TypeNotFound(TypeNotFound::Hash(hash)))
                    }
                };
                (
                    MethodScope::Package(package),
                    Some(name.as_str()),
                    false,
                    *arity,
                    params,
                )
            }
        };

        let params = params
            .iter()
            .map(|param| self.canonicalize_matcher(param))
            .collect::<Result<Vec<_>, _>>()?;

        self.methods
            .iter()
            .find(|candidate| {
                candidate.ctor == ctor
                    && candidate.scope == scope
                    && name.map_or(true, |n| candidate.name == n)
                    && candidate.arity == arity
                    && candidate.params.len() == params.len()
                    && params
                        .iter()
                        .zip(&candidate.params)
                        .all(|(wire, declared)| wire.satisfied_by(declared))
            })
            .cloned()
            .ok_or_else(not_found)
    }
}

impl DefArity for Registry {
    fn arity_of(&self, def: &TypeIdent) -> Option<usize> {
        let canon = self.canonicalize(def).ok()?;
        self.generic_defs.get(&canon).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::name_hash;

    fn registry_with_builtins() -> Registry {
        let mut registry = Registry::default();
        registry.register::<u32>();
        registry.register::<String>();
        registry.register::<Vec<u32>>();
        registry
    }

    #[test]
    fn registration_is_idempotent_and_resolvable() {
        let mut registry = registry_with_builtins();
        registry.register::<u32>();
        let entry = registry.resolve(&TypeIdent::Builtin(builtin::U32)).unwrap();
        assert_eq!(entry.type_id, TypeId::of::<u32>());
        assert_eq!(entry.kind, TypeKind::Primitive);

        let array = registry
            .resolve(&TypeIdent::sz_array(TypeIdent::Builtin(builtin::U32)))
            .unwrap();
        assert_eq!(array.type_id, TypeId::of::<Vec<u32>>());
    }

    #[test]
    fn unknown_identities_fail() {
        let registry = registry_with_builtins();
        assert!(matches!(
            registry.resolve(&TypeIdent::Builtin(builtin::I8)),
            Err(Error::TypeNotFound(TypeNotFound::Type(_)))
        ));
        assert!(matches!(
            registry.resolve(&TypeIdent::Known(42)),
            Err(Error::TypeNotFound(TypeNotFound::Hash(42)))
        ));
    }

    #[test]
    fn trusted_packages_hash_their_types() {
        #[derive(Default)]
        struct Marker;

        impl Codec for Marker {
            fn encode<O: tether_wire::Output + ?Sized>(
                &self,
                _cx: &mut crate::codec::EncodeCx<'_>,
                _out: &mut O,
            ) -> Result<(), Error> {
                Ok(())
            }

            fn decode<I: tether_wire::Input + ?Sized>(
                _cx: &mut crate::codec::DecodeCx<'_>,
                _input: &mut I,
            ) -> Result<Self, Error> {
                Ok(Marker)
            }
        }

        impl Describe for Marker {
            fn ident() -> TypeIdent {
                TypeIdent::named(
                    "demo::Marker",
                    PackageIdent::named("demo", Version::new(1, 0, 0, 0)),
                )
            }
        }

        let mut registry = Registry::default();
        registry.trust_package("demo", Version::new(1, 0, 0, 0));
        registry.register::<Marker>();

        let hash = name_hash("demo::Marker");
        let entry = registry.resolve(&TypeIdent::Known(hash)).unwrap();
        assert_eq!(entry.type_id, TypeId::of::<Marker>());
        assert_eq!(registry.known_types().hash_of(&"demo::Marker".to_string()), Some(hash));
    }

    #[test]
    fn first_satisfying_method_candidate_wins() {
        let declaring = TypeIdent::named(
            "demo::Calc",
            PackageIdent::named("demo", Version::default()),
        );
        let mut registry = Registry::default();
        for (name, param) in [
            ("combine", Matcher::MethodParam(1)),
            ("combine", Matcher::MethodParam(0)),
            ("combine", Matcher::MethodParam(0)),
        ] {
            registry.register_method(MethodDesc {
                scope: MethodScope::Type(declaring.clone()),
                name: name.to_string(),
                ctor: false,
                arity: 1,
                params: vec![param],
            });
        }

        let ident = MethodIdent::Member {
            declaring,
            name: "combine".into(),
            arity: 1,
            params: vec![Matcher::MethodParam(0)],
        };
        let desc = registry.resolve_method(&ident).unwrap();
        // The first candidate does not satisfy the matcher, the second does;
        // the third is never consulted.
        assert_eq!(desc.params, vec![Matcher::MethodParam(0)]);

        let miss = MethodIdent::Member {
            declaring: TypeIdent::named(
                "demo::Other",
                PackageIdent::named("demo", Version::default()),
            ),
            name: "combine".into(),
            arity: 1,
            params: vec![Matcher::MethodParam(0)],
        };
        assert!(matches!(
            registry.resolve_method(&miss),
            Err(Error::TypeNotFound(TypeNotFound::Method(_)))
        ));
    }
}
