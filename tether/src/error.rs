//! Serializer error kinds.
//!
//! Five disjoint kinds cover every failure the kernel can surface. There is
//! no local recovery: failures unwind to the top-level entry point, which
//! still returns the borrowed session to its pool.

use crate::ident::{
    MethodIdent,
    TypeIdent,
};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Top-level serializer error.
#[derive(Error, Debug)]
pub enum Error {
    /// Wire-format violation: truncated data, bad scalar, bad tag, bad
    /// back-reference, trailing bytes.
    #[error("malformed input: {0}")]
    Malformed(#[from] Malformed),

    /// A type or method identity could not be resolved against the registry
    /// or any loadable package.
    #[error("type not found: {0}")]
    TypeNotFound(TypeNotFound),

    /// The resolver chain produced no formatter for the requested type.
    #[error("no formatter for type `{type_name}`")]
    MissingFormatter {
        /// Name of the type that has no formatter.
        type_name: String,
    },

    /// The running allocation approximation surpassed the configured ceiling.
    #[error("allocation budget exceeded: {allocated} of {budget} bytes")]
    QuotaExceeded {
        /// Bytes the decode would have allocated so far.
        allocated: usize,
        /// Configured ceiling.
        budget: usize,
    },

    /// The host cannot synthesize codec routines at runtime.
    #[error("host cannot synthesize codec routines")]
    UnsupportedHost,
}

/// Wire-format violations.
#[derive(Error, Debug)]
pub enum Malformed {
    /// Error raised by the wire primitive layer.
    #[error("{source} at offset {offset}")]
    Wire {
        /// The primitive-layer error, carrying the offending value.
        source: tether_wire::Error,
        /// Byte offset of the failure within the top-level input.
        offset: usize,
    },

    /// Bytes remained after a full-buffer decode.
    #[error("{remaining} trailing bytes after decode")]
    TrailingData {
        /// Number of unconsumed bytes.
        remaining: usize,
    },

    /// A back-reference pointed at a slot that has not been written yet.
    #[error("back-reference to slot {index} before initialization")]
    CyclicBeforeInit {
        /// The referenced slot.
        index: usize,
    },

    /// A back-reference index exceeded the current slot count.
    #[error("back-reference index {index} out of range ({count} slots)")]
    BadIndex {
        /// The referenced slot.
        index: usize,
        /// Slots allocated so far.
        count: usize,
    },

    /// A back-reference resolved to an object of a different type than the
    /// slot's static type.
    #[error("back-reference to slot {index} has unexpected type")]
    SlotTypeMismatch {
        /// The referenced slot.
        index: usize,
    },

    /// The null tag appeared in a slot that cannot hold null.
    #[error("null reference in a non-nullable slot")]
    UnexpectedNull,

    /// A content formatter returned without writing its slot.
    #[error("slot {index} left unwritten by its content formatter")]
    SlotNotWritten {
        /// The unwritten slot.
        index: usize,
    },

    /// A scalar carried a value outside its domain.
    #[error("scalar value {value} out of range")]
    OutOfRange {
        /// The decoded value.
        value: u64,
    },

    /// An enum discriminant matched no variant.
    #[error("unknown discriminant {value}")]
    UnknownDiscriminant {
        /// The decoded discriminant.
        value: u64,
    },

    /// An identity tag byte matched no case.
    #[error("unknown identity tag {tag:#04x}")]
    BadIdentTag {
        /// The offending tag byte.
        tag: u8,
    },

    /// An inline tag number (array rank, parameter index) is outside the
    /// five-bit range the tag byte can carry.
    #[error("inline tag number {value} does not fit in five bits")]
    InlineNumberOverflow {
        /// The value that did not fit.
        value: u32,
    },

    /// Identity trees nested deeper than the hard ceiling.
    #[error("identity nesting exceeds depth {limit}")]
    IdentTooDeep {
        /// The nesting ceiling.
        limit: usize,
    },
}

impl From<tether_wire::Error> for Error {
    fn from(source: tether_wire::Error) -> Self {
        // The offset is patched in by the facade once the total consumed
        // byte count at the failure point is known.
        Self::Malformed(Malformed::Wire { source, offset: 0 })
    }
}

/// Unresolvable identity details.
#[derive(Debug)]
pub enum TypeNotFound {
    /// No registered type matches the identity.
    Type(TypeIdent),
    /// No registered package matches the name.
    Package(String),
    /// No well-known entry matches the hash.
    Hash(u64),
    /// No registered method satisfies the identity.
    Method(MethodIdent),
}

impl core::fmt::Display for TypeNotFound {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Type(ident) => write!(f, "no type registered for {ident:?}"),
            Self::Package(name) => write!(f, "no package registered as `{name}`"),
            Self::Hash(hash) => write!(f, "no well-known entry for hash {hash:#018x}"),
            Self::Method(ident) => write!(f, "no method satisfies {ident:?}"),
        }
    }
}

impl Error {
    /// Attach the consumed-byte offset to a wire-layer failure.
    pub(crate) fn with_offset(self, offset: usize) -> Self {
        match self {
            Self::Malformed(Malformed::Wire { source, .. }) => {
                Self::Malformed(Malformed::Wire { source, offset })
            }
            other => other,
        }
    }

    /// Shorthand for the missing-formatter kind.
    pub(crate) fn missing_formatter(type_name: &str) -> Self {
        Self::MissingFormatter {
            type_name: type_name.into(),
        }
    }
}
