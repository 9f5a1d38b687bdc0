//! The kernel facade.
//!
//! One [`Tether`] owns the configuration, the registry, the formatter and
//! dispatcher caches, and the session pools. It may be shared freely across
//! threads: caches are insert-only and idempotent, and every top-level call
//! borrows its own session.

use crate::{
    codec::{
        Codec,
        DecodeCx,
        EncodeCx,
    },
    config::Config,
    engine::Dispatch,
    error::{
        Error,
        Malformed,
    },
    formatter::Formatter,
    ident::{
        IdentReader,
        IdentWriter,
        MethodIdent,
        PackageIdent,
        TypeIdent,
    },
    reflect::{
        MethodDesc,
        Reflector,
        Registry,
        RuntimeType,
    },
    resolve::{
        self,
        Resolver,
    },
    session::{
        DecodeSession,
        EncodeSession,
        SessionPool,
    },
};
use core::any::TypeId;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        RwLock,
    },
};
use tether_wire::{
    Input,
    Output,
};

/// The serializer kernel.
///
/// Concurrent encode of a graph that is being mutated is not an error, but
/// the stream may describe an object state that never existed as a whole:
/// each node is locked exactly once while its members are encoded, so every
/// individual node snapshot is consistent, and the stream always decodes
/// structurally.
pub struct Tether {
    budget: usize,
    registry: RwLock<Registry>,
    loader: Option<crate::config::PackageLoader>,
    resolvers: Vec<Arc<dyn Resolver>>,
    formatters: RwLock<HashMap<TypeId, Arc<dyn Formatter>>>,
    dispatchers: RwLock<HashMap<TypeId, Arc<dyn Dispatch>>>,
    encode_pool: SessionPool<EncodeSession>,
    decode_pool: SessionPool<DecodeSession>,
}

impl Tether {
    /// Build a kernel from a configuration.
    ///
    /// The trust list is applied before any registration, so every type of a
    /// trusted package receives its compact hash encoding. The built-in
    /// scalar universe is always registered.
    pub fn new(config: Config) -> Result<Self, Error> {
        let Config {
            max_allocated_bytes,
            trusted_packages,
            resolvers: user_resolvers,
            templates,
            loader,
            registrations,
            methods,
        } = config;

        let mut registry = Registry::default();
        for (name, version) in &trusted_packages {
            registry.trust_package(name, *version);
        }
        register_builtins(&mut registry);
        for registration in &registrations {
            registration(&mut registry);
        }
        for method in methods {
            registry.register_method(method);
        }

        let mut resolvers = user_resolvers;
        resolvers.extend(resolve::builtin_chain(templates));

        tracing::debug!(
            budget = max_allocated_bytes,
            trusted = trusted_packages.len(),
            "kernel ready"
        );

        Ok(Self {
            budget: max_allocated_bytes,
            registry: RwLock::new(registry),
            loader,
            resolvers,
            formatters: RwLock::default(),
            dispatchers: RwLock::default(),
            encode_pool: SessionPool::default(),
            decode_pool: SessionPool::default(),
        })
    }

    /// Encode a value into a byte sink.
    pub fn encode<T: Codec, O: Output + ?Sized>(
        &self,
        value: &T,
        out: &mut O,
    ) -> Result<(), Error> {
        let _span =
            tracing::debug_span!("encode", ty = core::any::type_name::<T>()).entered();
        let mut session = self.encode_pool.take();
        let mut cx = EncodeCx {
            kernel: self,
            session: &mut *session,
        };
        value.encode(&mut cx, out)
    }

    /// Encode a value into a fresh byte vector.
    pub fn to_bytes<T: Codec>(&self, value: &T) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.encode(value, &mut out)?;
        Ok(out)
    }

    /// Number of bytes [`Self::encode`] would produce, without storing them.
    pub fn encoded_size<T: Codec>(&self, value: &T) -> Result<usize, Error> {
        let mut counter = tether_wire::SizeCounter::default();
        self.encode(value, &mut counter)?;
        Ok(counter.size())
    }

    /// Decode a value from a full buffer; trailing bytes are an error.
    pub fn decode<T: Codec>(&self, bytes: &[u8]) -> Result<T, Error> {
        let _span =
            tracing::debug_span!("decode", ty = core::any::type_name::<T>()).entered();
        let total = bytes.len();
        let mut input: &[u8] = bytes;
        let mut session = self.decode_pool.take();
        session.set_budget(self.budget);
        let mut cx = DecodeCx {
            kernel: self,
            session: &mut *session,
        };
        match T::decode(&mut cx, &mut input) {
            Ok(value) => {
                let remaining = input.remaining();
                if remaining > 0 {
                    return Err(Malformed::TrailingData { remaining }.into())
                }
                Ok(value)
            }
            Err(err) => Err(err.with_offset(total.saturating_sub(input.remaining()))),
        }
    }

    /// Decode a value from a byte source, leaving any following bytes in
    /// place.
    pub fn decode_from<T: Codec, I: Input + ?Sized>(
        &self,
        input: &mut I,
    ) -> Result<T, Error> {
        let _span =
            tracing::debug_span!("decode_from", ty = core::any::type_name::<T>()).entered();
        let mut session = self.decode_pool.take();
        session.set_budget(self.budget);
        let mut cx = DecodeCx {
            kernel: self,
            session: &mut *session,
        };
        T::decode(&mut cx, input)
    }

    /// The formatter the resolver chain materializes for a registered type,
    /// or `None` when the type is not registered.
    pub fn formatter_of<T: 'static>(&self) -> Result<Option<Arc<dyn Formatter>>, Error> {
        self.content_formatter_by_id(TypeId::of::<T>())
    }

    pub(crate) fn entry_by_id(&self, type_id: TypeId) -> Option<Arc<RuntimeType>> {
        self.registry.read().expect("poisoned").entry_by_id(type_id)
    }

    pub(crate) fn content_formatter_by_id(
        &self,
        type_id: TypeId,
    ) -> Result<Option<Arc<dyn Formatter>>, Error> {
        match self.entry_by_id(type_id) {
            Some(entry) => Ok(Some(self.formatter_for(&entry)?)),
            None => Ok(None),
        }
    }

    /// Run the resolver chain for a runtime type, caching the winner.
    pub(crate) fn formatter_for(
        &self,
        entry: &Arc<RuntimeType>,
    ) -> Result<Arc<dyn Formatter>, Error> {
        if let Some(found) = self
            .formatters
            .read()
            .expect("poisoned")
            .get(&entry.type_id)
        {
            return Ok(found.clone())
        }
        let formatter = self
            .resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(self, entry))
            .ok_or_else(|| Error::missing_formatter(entry.type_name))?;
        // Idempotent insert: a concurrent materialization of the same type
        // wins or loses as a whole, never mixes.
        Ok(self
            .formatters
            .write()
            .expect("poisoned")
            .entry(entry.type_id)
            .or_insert(formatter)
            .clone())
    }

    pub(crate) fn dispatcher_for(
        &self,
        entry: &Arc<RuntimeType>,
    ) -> Result<Arc<dyn Dispatch>, Error> {
        if let Some(found) = self
            .dispatchers
            .read()
            .expect("poisoned")
            .get(&entry.type_id)
        {
            return Ok(found.clone())
        }
        let formatter = self.formatter_for(entry)?;
        let dispatch = (entry.make_dispatch)(formatter);
        Ok(self
            .dispatchers
            .write()
            .expect("poisoned")
            .entry(entry.type_id)
            .or_insert(dispatch)
            .clone())
    }

    /// Resolve a type identity, consulting the package loader when a named
    /// package is missing from the registry.
    pub(crate) fn resolve_entry(
        &self,
        ident: &TypeIdent,
    ) -> Result<Arc<RuntimeType>, Error> {
        let miss = {
            let registry = self.registry.read().expect("poisoned");
            match registry.resolve(ident) {
                Ok(entry) => return Ok(entry),
                Err(miss @ Error::TypeNotFound(_)) => miss,
                Err(err) => return Err(err),
            }
        };

        let Some(loader) = &self.loader else {
            return Err(miss)
        };
        let TypeIdent::Named {
            package:
                PackageIdent::Named {
                    name: package_name,
                    version,
                },
            ..
        } = ident
        else {
            return Err(miss)
        };
        let Some(package) = loader(package_name, version) else {
            return Err(miss)
        };
        tracing::debug!(package = package.name(), "package loaded on demand");
        let mut registry = self.registry.write().expect("poisoned");
        package.apply(&mut registry);
        registry.resolve(ident)
    }

    pub(crate) fn write_type_ident(
        &self,
        out: &mut dyn Output,
        ident: &TypeIdent,
    ) -> Result<(), Error> {
        let registry = self.registry.read().expect("poisoned");
        let writer = IdentWriter::new(registry.known_packages(), registry.known_types());
        writer.write_type(out, ident)
    }

    pub(crate) fn read_type_ident(&self, input: &mut dyn Input) -> Result<TypeIdent, Error> {
        let registry = self.registry.read().expect("poisoned");
        let reader = IdentReader::new(&*registry);
        reader.read_type(input)
    }
}

impl Reflector for Tether {
    fn resolve(&self, ident: &TypeIdent) -> Result<Arc<RuntimeType>, Error> {
        self.resolve_entry(ident)
    }

    fn resolve_method(&self, ident: &MethodIdent) -> Result<Arc<MethodDesc>, Error> {
        self.registry.read().expect("poisoned").resolve_method(ident)
    }
}

impl core::fmt::Debug for Tether {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tether")
            .field("budget", &self.budget)
            .finish()
    }
}

/// The scalar universe is always available behind polymorphic slots.
fn register_builtins(registry: &mut Registry) {
    registry.register::<bool>();
    registry.register::<u8>();
    registry.register::<u16>();
    registry.register::<u32>();
    registry.register::<u64>();
    registry.register::<u128>();
    registry.register::<i8>();
    registry.register::<i16>();
    registry.register::<i32>();
    registry.register::<i64>();
    registry.register::<i128>();
    registry.register::<f32>();
    registry.register::<f64>();
    registry.register_frozen::<char>();
    registry.register::<String>();
    registry.register::<std::time::Duration>();
    registry.register::<tether_wire::Decimal128>();
}
