//! Extensible schema writing traits.
//!
//! This module provides the [`SchemaWriter`] trait for consuming a generated
//! schema element by element, and [`walk`] to drive one over a file.

use crate::proto::model::{
    Definition, FieldSlot, GeneratedEnum, GeneratedFile, GeneratedMessage, OneofGroup,
};
use std::fmt::Result;

/// Trait for visiting the elements of a generated schema.
///
/// Every method defaults to a no-op, so implementors only override what they
/// need. [`walk`] calls them in document order: the file, then each message
/// before its fields, oneof branches and nested definitions.
///
/// # Example
///
/// ```
/// use protoschema_core::proto::{walk, FieldSlot, SchemaWriter};
/// use protoschema_core::{Descriptor, Element, Generator, PrimitiveKind};
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct FieldNames(Vec<String>);
///
/// impl SchemaWriter for FieldNames {
///     fn write_field(&mut self, field: &FieldSlot) -> std::fmt::Result {
///         self.0.push(field.name.clone());
///         Ok(())
///     }
/// }
///
/// let holder = Arc::new(
///     Descriptor::class("Holder")
///         .field(Element::new("a", Descriptor::primitive(PrimitiveKind::Int)))
///         .field(Element::new("b", Descriptor::primitive(PrimitiveKind::String))),
/// );
/// let file = Generator::new().build(&[holder], "api", &BTreeMap::new())?;
///
/// let mut names = FieldNames::default();
/// walk(&file, &mut names)?;
/// assert_eq!(names.0, ["a", "b"]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait SchemaWriter {
    /// Write the complete file
    fn write_file(&mut self, file: &GeneratedFile) -> Result {
        let _ = file;
        Ok(())
    }

    /// Write a message definition
    fn write_message(&mut self, message: &GeneratedMessage) -> Result {
        let _ = message;
        Ok(())
    }

    /// Write a field, including oneof branches and map entry fields
    fn write_field(&mut self, field: &FieldSlot) -> Result {
        let _ = field;
        Ok(())
    }

    /// Write an enum definition
    fn write_enum(&mut self, enum_type: &GeneratedEnum) -> Result {
        let _ = enum_type;
        Ok(())
    }

    /// Write a oneof group
    fn write_oneof(&mut self, oneof: &OneofGroup) -> Result {
        let _ = oneof;
        Ok(())
    }
}

/// Drives `writer` over every element of `file`
pub fn walk(file: &GeneratedFile, writer: &mut impl SchemaWriter) -> Result {
    writer.write_file(file)?;
    for definition in &file.definitions {
        walk_definition(definition, writer)?;
    }
    Ok(())
}

fn walk_definition(definition: &Definition, writer: &mut impl SchemaWriter) -> Result {
    match definition {
        Definition::Message(message) => {
            writer.write_message(message)?;
            for field in &message.fields {
                writer.write_field(field)?;
            }
            if let Some(oneof) = &message.oneof {
                writer.write_oneof(oneof)?;
                for branch in &oneof.branches {
                    writer.write_field(branch)?;
                }
            }
            for nested in &message.nested {
                walk_definition(nested, writer)?;
            }
            Ok(())
        }
        Definition::Enum(enum_type) => writer.write_enum(enum_type),
    }
}

/// A no-op writer that discards all output
pub struct NullWriter;

impl SchemaWriter for NullWriter {}

/// A writer that collects statistics about the generated schema
#[derive(Debug, Default)]
pub struct StatsWriter {
    /// Number of messages, map entries included
    pub message_count: usize,
    /// Number of fields
    pub field_count: usize,
    /// Number of enums
    pub enum_count: usize,
    /// Number of oneof groups
    pub oneof_count: usize,
    /// Number of synthesized map entry messages
    pub map_entry_count: usize,
}

impl SchemaWriter for StatsWriter {
    fn write_message(&mut self, message: &GeneratedMessage) -> Result {
        self.message_count += 1;
        if message.map_entry {
            self.map_entry_count += 1;
        }
        Ok(())
    }

    fn write_field(&mut self, _field: &FieldSlot) -> Result {
        self.field_count += 1;
        Ok(())
    }

    fn write_enum(&mut self, _enum_type: &GeneratedEnum) -> Result {
        self.enum_count += 1;
        Ok(())
    }

    fn write_oneof(&mut self, _oneof: &OneofGroup) -> Result {
        self.oneof_count += 1;
        Ok(())
    }
}
