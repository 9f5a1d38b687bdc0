//! Kernel configuration.

use crate::{
    codec::Codec,
    formatter::Formatter,
    ident::Version,
    reflect::{
        Describe,
        MethodDesc,
        Package,
        Registry,
    },
    resolve::{
        FormatterTemplate,
        Resolver,
    },
};
use std::sync::Arc;

/// Default ceiling of the per-decode allocation approximation.
pub const DEFAULT_ALLOCATION_BUDGET: usize = 100 * (1 << 20); // 100 MiB

/// Callback used on decode when a named package is not registered.
pub type PackageLoader = Arc<dyn Fn(&str, &Version) -> Option<Package> + Send + Sync>;

type RegFn = Box<dyn Fn(&mut Registry) + Send + Sync>;

/// Everything a kernel is built from: the trust list, registrations, the
/// allocation budget, and user extensions to the resolver chain.
pub struct Config {
    pub(crate) max_allocated_bytes: usize,
    pub(crate) trusted_packages: Vec<(String, Version)>,
    pub(crate) resolvers: Vec<Arc<dyn Resolver>>,
    pub(crate) templates: Vec<FormatterTemplate>,
    pub(crate) loader: Option<PackageLoader>,
    pub(crate) registrations: Vec<RegFn>,
    pub(crate) methods: Vec<MethodDesc>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_allocated_bytes: DEFAULT_ALLOCATION_BUDGET,
            trusted_packages: Vec::new(),
            resolvers: Vec::new(),
            templates: Vec::new(),
            loader: None,
            registrations: Vec::new(),
            methods: Vec::new(),
        }
    }
}

impl Config {
    /// Set the hard ceiling for the per-decode allocation approximation.
    pub fn with_budget(mut self, max_allocated_bytes: usize) -> Self {
        self.max_allocated_bytes = max_allocated_bytes;
        self
    }

    /// Put a package on the trust list: it and its types are encoded as
    /// stable 8-byte hashes instead of names.
    pub fn trust_package(mut self, name: impl Into<String>, version: Version) -> Self {
        self.trusted_packages.push((name.into(), version));
        self
    }

    /// Prepend a resolver to the built-in chain.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Add a generic formatter template, consulted by structural
    /// unification.
    pub fn with_template(mut self, template: FormatterTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Install the loader consulted when a named package is not registered
    /// at decode time.
    pub fn with_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str, &Version) -> Option<Package> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Register a default-constructible type for polymorphic use.
    pub fn register<T: Codec + Describe + Send + Default>(mut self) -> Self {
        self.registrations
            .push(Box::new(|registry| registry.register::<T>()));
        self
    }

    /// Register a type without a default value. It decodes whole, so it
    /// cannot sit on a reference cycle.
    pub fn register_frozen<T: Codec + Describe + Send>(mut self) -> Self {
        self.registrations
            .push(Box::new(|registry| registry.register_frozen::<T>()));
        self
    }

    /// Register a type with a nominated formatter that wins over the
    /// built-in chain.
    pub fn register_with<T: Codec + Describe + Send + Default>(
        mut self,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        self.registrations.push(Box::new(move |registry| {
            registry.register_with::<T>(formatter.clone())
        }));
        self
    }

    /// Register a method candidate for identity resolution.
    pub fn register_method(mut self, desc: MethodDesc) -> Self {
        self.methods.push(desc);
        self
    }
}
