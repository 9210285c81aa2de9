//! Error types for the protoschema-core library.
//!
//! Every failure of a generation call is surfaced through [`Error`]. Nothing is
//! logged and swallowed: generation is pure, so the same input always fails
//! the same way.

use crate::descriptor::{IntegerEncoding, PrimitiveKind};
use thiserror::Error;

/// Result type alias for protoschema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all protoschema operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The target package name is not a valid dotted proto identifier
    #[error("invalid package name '{name}': {reason}")]
    InvalidPackageName {
        /// The rejected package name
        name: String,
        /// Which composition rule was broken
        reason: &'static str,
    },

    /// Two fields of one message resolved to the same field number
    #[error("duplicate field number {number} in message '{message}': '{first}' and '{second}'")]
    DuplicateFieldNumber {
        /// Message that owns both fields
        message: String,
        /// The clashing number
        number: u32,
        /// Field that claimed the number first
        first: String,
        /// Field that claimed it again
        second: String,
    },

    /// Two fields of one message resolved to the same name
    #[error("duplicate field name '{name}' in message '{message}'")]
    DuplicateFieldName {
        /// Message that owns both fields
        message: String,
        /// The clashing field name
        name: String,
    },

    /// An explicit field number lies outside the usable range
    #[error("invalid field number {number} for '{message}.{field}': must be between 1 and {max}, outside 19000 to 19999")]
    InvalidFieldNumber {
        /// Message that owns the field
        message: String,
        /// The offending field
        field: String,
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// A signed or fixed integer encoding was requested for a non-integer scalar
    #[error("encoding {encoding:?} cannot be applied to {kind:?} field '{field}'")]
    InvalidEncodingHint {
        /// Qualified field name (`Message.field`)
        field: String,
        /// The scalar kind the hint was attached to
        kind: PrimitiveKind,
        /// The requested encoding
        encoding: IntegerEncoding,
    },

    /// Two distinct types map to the same identifier inside one top-level
    /// message, or two top-level types share a name in the package
    #[error("type name '{name}' in '{scope}' is used by both '{first}' and '{second}'")]
    DuplicateTypeName {
        /// Top-level message or package the names collide in
        scope: String,
        /// The clashing identifier
        name: String,
        /// Serial name of the type that claimed the identifier first
        first: String,
        /// Serial name of the type that claimed it again
        second: String,
    },

    /// Two declarations share a name in one proto scope. Enum values live in
    /// the scope enclosing their enum, next to fields and nested types.
    #[error("name '{name}' is declared twice in '{scope}': by {first} and by {second}")]
    DuplicateSymbol {
        /// Message or package the names collide in
        scope: String,
        /// The clashing name
        name: String,
        /// What declared the name first
        first: String,
        /// What declared it again
        second: String,
    },

    /// A descriptor has a shape the classifier cannot map to proto2
    #[error("unsupported descriptor '{name}': {reason}")]
    UnsupportedDescriptorKind {
        /// Descriptor or qualified field name
        name: String,
        /// Why the shape cannot be expressed
        reason: String,
    },

    /// The exported descriptor set was rejected by prost-reflect
    #[error("failed to build file descriptor: {0}")]
    DescriptorBuild(String),

    /// Writing schema text failed
    #[error("failed to render schema text")]
    Render(#[from] std::fmt::Error),
}

impl Error {
    /// Creates a new invalid package name error
    pub fn invalid_package_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPackageName {
            name: name.into(),
            reason,
        }
    }

    /// Creates a new unsupported descriptor error
    pub fn unsupported(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedDescriptorKind {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Returns true if this error signals a bug rather than bad input.
    ///
    /// Input errors (package names, descriptor integrity) are fixed by the
    /// caller; internal errors mean the generator met a shape it cannot map.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDescriptorKind { .. } | Self::DescriptorBuild(_) | Self::Render(_)
        )
    }
}
