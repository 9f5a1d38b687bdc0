//! Graph-preserving binary serializer.
//!
//! Tether converts rich, reference-typed object graphs to and from compact
//! byte sequences. The whole graph is preserved exactly: shared sub-objects
//! remain shared after the round-trip, cycles round-trip, polymorphic
//! references carry enough identity to reconstruct their dynamic type, and
//! aggregates that are provably safe to copy byte-for-byte may be.
//!
//! ```
//! use tether::prelude::*;
//!
//! let kernel = Tether::new(Config::default()).unwrap();
//!
//! let shared = Ref::new(String::from("shared"));
//! let pair = (shared.clone(), shared.clone());
//! let bytes = kernel.to_bytes(&pair).unwrap();
//!
//! let out: (Ref<String>, Ref<String>) = kernel.decode(&bytes).unwrap();
//! assert!(out.0.ptr_eq(&out.1));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_crate_dependencies)]
#![deny(
    clippy::arithmetic_side_effects,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::string_slice
)]

// Used by the integration suites only.
#[cfg(test)]
use quickcheck as _;
#[cfg(test)]
use quickcheck_macros as _;

mod blit;
mod engine;

pub mod codec;
pub mod config;
pub mod error;
pub mod formatter;
pub mod graph;
pub mod ident;
pub mod kernel;
pub mod names;
pub mod reflect;
pub mod resolve;
pub mod session;

#[doc(no_inline)]
pub use tether_wire as wire;

pub use codec::{
    Codec,
    Decimal128,
    DecodeCx,
    EncodeCx,
    MdArray,
};
pub use config::Config;
pub use error::{
    Error,
    Malformed,
};
pub use graph::{
    ObjRef,
    Ref,
};
pub use kernel::Tether;
pub use reflect::Describe;

pub mod prelude {
    //! Everything a typical user needs in scope.
    #[doc(no_inline)]
    pub use crate::{
        codec::{
            Codec,
            Decimal128,
            MdArray,
        },
        config::Config,
        error::Error,
        formatter::Formatter,
        graph::{
            ObjRef,
            Ref,
        },
        ident::{
            PackageIdent,
            TypeIdent,
            Version,
        },
        kernel::Tether,
        reflect::{
            Describe,
            Package,
        },
        resolve::Resolver,
    };
}
