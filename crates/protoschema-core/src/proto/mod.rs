//! Proto2 schema generation module.
//!
//! This module turns descriptor trees into proto2 schemas.
//!
//! ## Architecture
//!
//! Generation is a single downward pass handled by [`Generator`]:
//!
//! 1. The package name is validated before anything else runs
//! 2. Each top-level descriptor is emitted into a [`GeneratedMessage`] or
//!    [`GeneratedEnum`] tree; the emitter classifies ([`classify`]) and
//!    translates every field on the way down
//! 3. Top-level names and the values of top-level enums are checked for
//!    clashes in the package scope
//! 4. The resulting [`GeneratedFile`] is rendered as `.proto` text, or
//!    exported as a `FileDescriptorProto`
//!
//! ## Extensibility
//!
//! The [`SchemaWriter`] trait walks a [`GeneratedFile`] element by element,
//! which is how statistics and alternative outputs are produced.

mod classify;
mod emit;
mod export;
mod field;
mod model;
mod render;
mod writer;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::package;
use bytes::Bytes;
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorProto;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as FmtWrite;
use std::sync::Arc;
use tracing::debug;

pub use classify::{classify, TypeKind};
pub use model::{
    Definition, EnumValue, FieldSlot, FieldType, FileOption, GeneratedEnum, GeneratedFile,
    GeneratedMessage, Label, OneofGroup, ScalarType, TypePath,
};
pub use writer::{walk, NullWriter, SchemaWriter, StatsWriter};

/// File options that are written when present; other keys are ignored.
///
/// Options are always emitted in this order, whatever the order of the
/// caller's map.
pub const FILE_OPTIONS: &[&str] = &[
    "java_package",
    "java_outer_classname",
    "go_package",
    "objc_class_prefix",
    "csharp_namespace",
    "swift_prefix",
    "php_class_prefix",
    "php_namespace",
    "php_metadata_namespace",
    "ruby_package",
];

/// Configuration for schema generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Write `// serial name '...'` above identifiers that had to be sanitized
    pub include_comments: bool,
    /// Placeholder scalar for contextual descriptors (default: `bytes`)
    pub contextual_type: ScalarType,
    /// Render the synthesized `<field>Entry` messages of map fields
    pub emit_map_entries: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            include_comments: true,
            contextual_type: ScalarType::Bytes,
            emit_map_entries: true,
        }
    }
}

impl GeneratorConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether to include serial name comments
    pub fn include_comments(mut self, include: bool) -> Self {
        self.include_comments = include;
        self
    }

    /// Sets the placeholder scalar for contextual descriptors
    pub fn contextual_type(mut self, scalar: ScalarType) -> Self {
        self.contextual_type = scalar;
        self
    }

    /// Sets whether map entry messages are rendered
    pub fn emit_map_entries(mut self, emit: bool) -> Self {
        self.emit_map_entries = emit;
        self
    }
}

/// Generates proto2 schemas from descriptors
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Creates a generator with the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the config
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the config
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Builds the schema model for `descriptors` in package `package`.
    ///
    /// Fails before doing any other work when the package name is invalid.
    pub fn build(
        &self,
        descriptors: &[Arc<Descriptor>],
        package: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<GeneratedFile> {
        package::validate(package)?;

        for key in options.keys() {
            if !FILE_OPTIONS.contains(&key.as_str()) {
                debug!("Ignoring unrecognized file option '{}'", key);
            }
        }
        let options = FILE_OPTIONS
            .iter()
            .filter_map(|&key| {
                options.get(key).map(|value| FileOption {
                    key,
                    value: value.clone(),
                })
            })
            .collect();

        let definitions = descriptors
            .iter()
            .map(|descriptor| emit::emit(descriptor, &self.config))
            .collect::<Result<Vec<_>>>()?;
        check_package_scope(package, descriptors, &definitions)?;

        Ok(GeneratedFile {
            package: package.to_string(),
            options,
            definitions,
        })
    }

    /// Generates the `.proto` text for `descriptors`
    pub fn generate(
        &self,
        descriptors: &[Arc<Descriptor>],
        package: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<String> {
        let file = self.build(descriptors, package, options)?;
        self.render(&file)
    }

    /// Renders a built schema as `.proto` text
    pub fn render(&self, file: &GeneratedFile) -> Result<String> {
        let mut output = String::new();
        self.write_to(file, &mut output)?;
        Ok(output)
    }

    /// Writes a built schema as `.proto` text
    pub fn write_to(&self, file: &GeneratedFile, w: &mut impl FmtWrite) -> std::fmt::Result {
        render::TextRenderer::new(w, &self.config).write_file(file)
    }

    /// Generates the schema as a `FileDescriptorProto`
    pub fn generate_descriptor(
        &self,
        descriptors: &[Arc<Descriptor>],
        package: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<FileDescriptorProto> {
        let file = self.build(descriptors, package, options)?;
        Ok(self.to_file_descriptor(&file))
    }

    /// Exports a built schema as the descriptor protoc would produce for its text
    pub fn to_file_descriptor(&self, file: &GeneratedFile) -> FileDescriptorProto {
        export::file_descriptor(file, &self.config)
    }

    /// Encodes a built schema as a serialized `FileDescriptorSet`
    pub fn encode_descriptor_set(&self, file: &GeneratedFile) -> Bytes {
        export::encode_descriptor_set(self.to_file_descriptor(file))
    }

    /// Loads a built schema into a prost-reflect pool, which resolves every
    /// type reference and rejects malformed definitions
    pub fn descriptor_pool(&self, file: &GeneratedFile) -> Result<DescriptorPool> {
        DescriptorPool::decode(self.encode_descriptor_set(file))
            .map_err(|e| Error::descriptor_build(e.to_string()))
    }
}

/// Top-level types and the values of top-level enums share the package scope
fn check_package_scope(
    package: &str,
    descriptors: &[Arc<Descriptor>],
    definitions: &[Definition],
) -> Result<()> {
    let mut types: HashMap<&str, &str> = HashMap::new();
    let mut symbols = emit::Symbols::default();
    for (descriptor, definition) in descriptors.iter().zip(definitions) {
        let name = definition.name();
        let serial = descriptor.serial_name();
        if let Some(first) = types.insert(name, serial) {
            return Err(Error::DuplicateTypeName {
                scope: package.to_string(),
                name: name.to_string(),
                first: first.to_string(),
                second: serial.to_string(),
            });
        }
        symbols.declare(package, name, format!("type '{}'", serial))?;
        if let Definition::Enum(enumeration) = definition {
            for value in &enumeration.values {
                symbols.declare(
                    package,
                    &value.name,
                    format!("a value of enum '{}'", enumeration.name),
                )?;
            }
        }
    }
    Ok(())
}

/// Generates the `.proto` text for `descriptors` with the default config.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
/// use protoschema_core::{generate, Descriptor, Element, PrimitiveKind};
///
/// let options_class = Arc::new(
///     Descriptor::class("OptionsClass")
///         .field(Element::new("i", Descriptor::primitive(PrimitiveKind::Int))),
/// );
/// let text = generate(&[options_class], "api.v1", &BTreeMap::new())?;
/// assert!(text.contains("optional int32 i = 1;"));
/// # Ok::<(), protoschema_core::Error>(())
/// ```
pub fn generate(
    descriptors: &[Arc<Descriptor>],
    package: &str,
    options: &BTreeMap<String, String>,
) -> Result<String> {
    Generator::new().generate(descriptors, package, options)
}
