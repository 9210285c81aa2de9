//! Intermediate schema model produced by the emitter.
//!
//! Everything here lives for a single generation call: the emitter builds a
//! [`GeneratedFile`], the renderer turns it into text and the exporter into a
//! `FileDescriptorProto`.

use std::fmt;

/// Scalar type keywords of proto2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `bool`
    Bool,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `string`
    String,
    /// `bytes`
    Bytes,
}

impl ScalarType {
    /// The proto keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Bool => "bool",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Whether proto allows this type as a map key
    pub fn is_valid_map_key(&self) -> bool {
        !matches!(self, ScalarType::Float | ScalarType::Double | ScalarType::Bytes)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Location of a generated type, outermost definition first
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypePath(Vec<String>);

impl TypePath {
    pub(crate) fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub(crate) fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Path of the enclosing type; `None` for a top-level type
    pub(crate) fn parent(&self) -> Option<TypePath> {
        match self.0.split_last() {
            Some((_, rest)) if !rest.is_empty() => Some(Self(rest.to_vec())),
            _ => None,
        }
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Name of the type itself
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    /// Reference usable anywhere inside the enclosing top-level definition.
    ///
    /// Nested paths drop the top-level segment; the top-level type itself is
    /// referenced by its bare name.
    pub fn relative(&self) -> String {
        match self.0.split_first() {
            Some((top, [])) => top.clone(),
            Some((_, rest)) => rest.join("."),
            None => String::new(),
        }
    }

    /// Fully qualified reference, as used in descriptor protos
    pub fn qualified(&self, package: &str) -> String {
        format!(".{}.{}", package, self.0.join("."))
    }
}

/// Type of a rendered field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// A scalar keyword
    Scalar(ScalarType),
    /// A reference to a generated message
    Message(TypePath),
    /// A reference to a generated enum
    Enum(TypePath),
    /// `map<K, V>` sugar
    Map {
        /// Key type, always a scalar
        key: Box<FieldType>,
        /// Value type
        value: Box<FieldType>,
    },
}

impl FieldType {
    /// The type as written in proto text
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Scalar(scalar) => scalar.keyword().to_string(),
            FieldType::Message(path) | FieldType::Enum(path) => path.relative(),
            FieldType::Map { key, value } => {
                format!("map<{}, {}>", key.type_name(), value.type_name())
            }
        }
    }
}

/// Field label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// `optional`
    Optional,
    /// `repeated`
    Repeated,
    /// No keyword; the type is `map<K, V>` sugar
    Map,
}

impl Label {
    /// Keyword written before the type, if any
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Label::Optional => Some("optional"),
            Label::Repeated => Some("repeated"),
            Label::Map => None,
        }
    }
}

/// One rendered field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    /// Proto label
    pub label: Label,
    /// Proto type
    pub ty: FieldType,
    /// Field identifier
    pub name: String,
    /// Original serial name when `name` had to be sanitized
    pub serial_name: Option<String>,
    /// Field number
    pub number: u32,
    /// Source-side nullability, not visible on the wire
    pub nullable: bool,
    /// Source-side default, not visible on the wire
    pub has_default: bool,
}

/// A `oneof` group of a union message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofGroup {
    /// Group name
    pub name: String,
    /// One branch per subtype
    pub branches: Vec<FieldSlot>,
}

/// A generated `message` block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedMessage {
    /// Message identifier
    pub name: String,
    /// Original serial name when `name` had to be sanitized
    pub serial_name: Option<String>,
    /// Fields in declaration order
    pub fields: Vec<FieldSlot>,
    /// The union group, for messages generated from polymorphic bases
    pub oneof: Option<OneofGroup>,
    /// Nested messages and enums
    pub nested: Vec<Definition>,
    /// Whether this message is a synthesized map entry
    pub map_entry: bool,
}

/// One enum constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Constant identifier
    pub name: String,
    /// Original serial name when `name` had to be sanitized
    pub serial_name: Option<String>,
    /// Ordinal
    pub number: i32,
}

/// A generated `enum` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEnum {
    /// Enum identifier
    pub name: String,
    /// Original serial name when `name` had to be sanitized
    pub serial_name: Option<String>,
    /// Constants in declaration order
    pub values: Vec<EnumValue>,
}

/// A message or enum definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// `message` block
    Message(GeneratedMessage),
    /// `enum` block
    Enum(GeneratedEnum),
}

impl Definition {
    /// Identifier of the definition
    pub fn name(&self) -> &str {
        match self {
            Definition::Message(message) => &message.name,
            Definition::Enum(enum_type) => &enum_type.name,
        }
    }
}

/// A file-level `option` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOption {
    /// Allow-listed option name
    pub key: &'static str,
    /// String value
    pub value: String,
}

/// The complete generated schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Validated package name
    pub package: String,
    /// File options in allow-list order
    pub options: Vec<FileOption>,
    /// Top-level definitions in caller order
    pub definitions: Vec<Definition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_path_references() {
        let top = TypePath::root("SealedHolder");
        let union = top.child("SealedClass");
        let branch = union.child("Impl1");

        assert_eq!(top.relative(), "SealedHolder");
        assert_eq!(union.relative(), "SealedClass");
        assert_eq!(branch.relative(), "SealedClass.Impl1");
        assert_eq!(branch.name(), "Impl1");
        assert_eq!(
            branch.qualified("api.v1"),
            ".api.v1.SealedHolder.SealedClass.Impl1"
        );
    }

    #[test]
    fn test_map_type_name() {
        let ty = FieldType::Map {
            key: Box::new(FieldType::Scalar(ScalarType::String)),
            value: Box::new(FieldType::Message(TypePath::root("Top").child("OptionsClass"))),
        };
        assert_eq!(ty.type_name(), "map<string, OptionsClass>");
    }

    #[test]
    fn test_map_keys() {
        assert!(ScalarType::Int32.is_valid_map_key());
        assert!(ScalarType::String.is_valid_map_key());
        assert!(!ScalarType::Bytes.is_valid_map_key());
        assert!(!ScalarType::Double.is_valid_map_key());
    }
}
