//! # protoschema-core
//!
//! A library for generating Protocol Buffers (proto2) schemas from
//! serialization type descriptors.
//!
//! This crate provides the core functionality for:
//! - Describing serializable types as [`Descriptor`] trees
//! - Translating them into proto2 messages, enums and `oneof` unions
//! - Rendering `.proto` text, or exporting a `FileDescriptorProto`
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`descriptor`]: The input model
//! - [`package`]: Package name validation
//! - [`proto`]: Classification, emission, rendering and export
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use protoschema_core::{generate, Descriptor, Element, IntegerEncoding, PrimitiveKind};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let holder = Arc::new(
//!     Descriptor::class("Holder")
//!         .field(Element::new("id", Descriptor::primitive(PrimitiveKind::Long)))
//!         .field(
//!             Element::new("delta", Descriptor::primitive(PrimitiveKind::Int))
//!                 .encoding(IntegerEncoding::Signed),
//!         ),
//! );
//!
//! let text = generate(&[holder], "api.v1", &BTreeMap::new())?;
//! assert_eq!(
//!     text,
//!     "syntax = \"proto2\";\n\npackage api.v1;\n\nmessage Holder {\n  \
//!      optional int64 id = 1;\n  optional sint32 delta = 2;\n}\n"
//! );
//! # Ok::<(), protoschema_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`SchemaWriter`]: Visit a generated schema element by element
//! - [`GeneratorConfig`]: Indentation, comments, the contextual placeholder
//!   and map entry rendering
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod descriptor;
pub mod error;
mod naming;
pub mod package;
pub mod proto;

// Re-export primary types for convenience
pub use descriptor::{Descriptor, DescriptorRef, Element, IntegerEncoding, PrimitiveKind, SerialKind};
pub use error::{Error, Result};
pub use proto::{
    generate, Generator, GeneratorConfig, NullWriter, ScalarType, SchemaWriter, StatsWriter,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
