//! Structural type descriptors consumed by the generator.
//!
//! A [`Descriptor`] describes the shape of one serializable type: its kind,
//! its serial name and its ordered elements. Descriptors are immutable once
//! built and shared through [`Arc`], so a single tree can feed any number of
//! concurrent generation calls.
//!
//! Recursive types cannot be expressed with plain `Arc` ownership, so element
//! types are held as [`DescriptorRef`]s, which may defer construction of the
//! referenced descriptor until the generator asks for it:
//!
//! ```
//! use std::sync::Arc;
//! use protoschema_core::{Descriptor, DescriptorRef, Element, PrimitiveKind};
//!
//! fn node() -> Arc<Descriptor> {
//!     Arc::new(
//!         Descriptor::class("Node")
//!             .field(Element::new("value", Descriptor::primitive(PrimitiveKind::Int)))
//!             .field(Element::new("next", DescriptorRef::lazy(node)).nullable()),
//!     )
//! }
//!
//! assert_eq!(node().elements().len(), 2);
//! ```

use crate::naming::{simple_name, to_snake_case};
use std::fmt;
use std::sync::Arc;

/// Leaf value kinds of the serialization framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// `Boolean`
    Boolean,
    /// 8-bit integer
    Byte,
    /// 16-bit integer
    Short,
    /// UTF-16 code unit
    Char,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// UTF-8 string
    String,
}

impl PrimitiveKind {
    /// Returns true for the integral kinds that accept an [`IntegerEncoding`]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Long
        )
    }

    fn type_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::String => "String",
        }
    }
}

/// The kind tag of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialKind {
    /// A leaf value
    Primitive(PrimitiveKind),
    /// An enumeration; elements are its constants
    Enum,
    /// An ordinary composite; elements are its fields
    Class,
    /// A singleton with no fields
    Object,
    /// A list or array; the single element is the item type
    List,
    /// A map; elements are the key and the value type
    Map,
    /// A sealed hierarchy base; elements are the concrete subtypes
    Sealed,
    /// An open polymorphic base; elements are the known subtypes, if any
    Open,
    /// A placeholder whose type is resolved by the caller at runtime
    Contextual,
}

impl SerialKind {
    /// Kinds that generate a named proto type
    fn is_named(&self) -> bool {
        matches!(
            self,
            SerialKind::Enum
                | SerialKind::Class
                | SerialKind::Object
                | SerialKind::Sealed
                | SerialKind::Open
        )
    }
}

/// Integer wire encoding requested for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegerEncoding {
    /// Plain varint (`int32`/`int64`)
    #[default]
    Default,
    /// Zig-zag varint (`sint32`/`sint64`)
    Signed,
    /// Fixed width (`fixed32`/`fixed64`)
    Fixed,
}

/// A reference from an element to the descriptor of its type.
///
/// Either holds the descriptor directly or a constructor that produces it on
/// demand, which is how self-referencing types are described.
#[derive(Clone)]
pub struct DescriptorRef(Source);

#[derive(Clone)]
enum Source {
    Resolved(Arc<Descriptor>),
    Deferred(Arc<dyn Fn() -> Arc<Descriptor> + Send + Sync>),
}

impl DescriptorRef {
    /// Creates a reference that builds its descriptor when first resolved
    pub fn lazy<F>(build: F) -> Self
    where
        F: Fn() -> Arc<Descriptor> + Send + Sync + 'static,
    {
        Self(Source::Deferred(Arc::new(build)))
    }

    /// Returns the referenced descriptor
    pub fn resolve(&self) -> Arc<Descriptor> {
        match &self.0 {
            Source::Resolved(descriptor) => Arc::clone(descriptor),
            Source::Deferred(build) => build(),
        }
    }
}

impl fmt::Debug for DescriptorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Source::Resolved(descriptor) => descriptor.fmt(f),
            Source::Deferred(_) => f.write_str("DescriptorRef(<deferred>)"),
        }
    }
}

impl From<Arc<Descriptor>> for DescriptorRef {
    fn from(descriptor: Arc<Descriptor>) -> Self {
        Self(Source::Resolved(descriptor))
    }
}

impl From<Descriptor> for DescriptorRef {
    fn from(descriptor: Descriptor) -> Self {
        Arc::new(descriptor).into()
    }
}

/// One element of a descriptor: a field, an enum constant, a container
/// component or a union subtype.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    serial_name: Option<String>,
    descriptor: Option<DescriptorRef>,
    nullable: bool,
    number: Option<u32>,
    encoding: Option<IntegerEncoding>,
    has_default: bool,
}

impl Element {
    /// Creates a typed element (a field, container component or subtype)
    pub fn new(name: impl Into<String>, descriptor: impl Into<DescriptorRef>) -> Self {
        Self {
            name: name.into(),
            serial_name: None,
            descriptor: Some(descriptor.into()),
            nullable: false,
            number: None,
            encoding: None,
            has_default: false,
        }
    }

    /// Creates a union branch named after the subtype: `com.example.CreditCard`
    /// becomes `credit_card`
    pub fn branch(subtype: impl Into<DescriptorRef>) -> Self {
        let subtype = subtype.into();
        let name = to_snake_case(simple_name(subtype.resolve().serial_name()));
        Self::new(name, subtype)
    }

    /// Creates an untyped enum constant
    pub fn constant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serial_name: None,
            descriptor: None,
            nullable: false,
            number: None,
            encoding: None,
            has_default: false,
        }
    }

    /// Overrides the name the element is serialized under
    pub fn with_serial_name(mut self, name: impl Into<String>) -> Self {
        self.serial_name = Some(name.into());
        self
    }

    /// Marks the element as nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Pins the element to an explicit field number
    pub fn number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    /// Requests an integer wire encoding
    pub fn encoding(mut self, encoding: IntegerEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Records that the source declares a non-null default value
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Declared name of the element
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the element is serialized under: the override when present
    pub fn effective_name(&self) -> &str {
        self.serial_name.as_deref().unwrap_or(&self.name)
    }

    /// Type of the element; `None` for enum constants
    pub fn descriptor(&self) -> Option<&DescriptorRef> {
        self.descriptor.as_ref()
    }

    /// Whether the element accepts null
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Explicit field number, if pinned
    pub fn explicit_number(&self) -> Option<u32> {
        self.number
    }

    /// Requested integer encoding, if any
    pub fn integer_encoding(&self) -> Option<IntegerEncoding> {
        self.encoding
    }

    /// Whether the source declares a default value
    pub fn has_default(&self) -> bool {
        self.has_default
    }

    fn same_shape(&self, other: &Element) -> bool {
        let same_type = match (&self.descriptor, &other.descriptor) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                let (a, b) = (a.resolve(), b.resolve());
                // Named types are compared by identity only; their own
                // elements are checked where they are generated
                Arc::ptr_eq(&a, &b)
                    || if a.kind.is_named() {
                        a.kind == b.kind && a.serial_name() == b.serial_name()
                    } else {
                        a.same_shape(&b)
                    }
            }
            _ => false,
        };
        same_type
            && self.name == other.name
            && self.serial_name == other.serial_name
            && self.nullable == other.nullable
            && self.number == other.number
            && self.encoding == other.encoding
            && self.has_default == other.has_default
    }
}

/// Structural description of one serializable type
#[derive(Debug, Clone)]
pub struct Descriptor {
    kind: SerialKind,
    name: String,
    serial_name: Option<String>,
    elements: Vec<Element>,
}

impl Descriptor {
    fn new(kind: SerialKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            serial_name: None,
            elements: Vec::new(),
        }
    }

    /// Creates a leaf descriptor
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(SerialKind::Primitive(kind), kind.type_name())
    }

    /// Creates a byte sequence descriptor (a list of `Byte`)
    pub fn byte_array() -> Self {
        Self::list(Descriptor::primitive(PrimitiveKind::Byte)).named("ByteArray")
    }

    /// Creates a list descriptor
    pub fn list(item: impl Into<DescriptorRef>) -> Self {
        let mut list = Self::new(SerialKind::List, "List");
        list.elements.push(Element::new("item", item));
        list
    }

    /// Creates a map descriptor
    pub fn map(key: impl Into<DescriptorRef>, value: impl Into<DescriptorRef>) -> Self {
        let mut map = Self::new(SerialKind::Map, "Map");
        map.elements.push(Element::new("key", key));
        map.elements.push(Element::new("value", value));
        map
    }

    /// Creates an ordinary composite descriptor
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Class, name)
    }

    /// Creates a singleton descriptor
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Object, name)
    }

    /// Creates an enumeration descriptor
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Enum, name)
    }

    /// Creates a sealed hierarchy base
    pub fn sealed(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Sealed, name)
    }

    /// Creates an open polymorphic base
    pub fn open(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Open, name)
    }

    /// Creates a contextual placeholder
    pub fn contextual(name: impl Into<String>) -> Self {
        Self::new(SerialKind::Contextual, name)
    }

    fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Overrides the serial name of the type
    pub fn with_serial_name(mut self, name: impl Into<String>) -> Self {
        self.serial_name = Some(name.into());
        self
    }

    /// Appends a field
    pub fn field(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Appends an enum constant by name
    pub fn constant(mut self, name: impl Into<String>) -> Self {
        self.elements.push(Element::constant(name));
        self
    }

    /// Appends an enum constant carrying its own overrides
    pub fn constant_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Appends a union subtype, naming its branch after the subtype
    pub fn subtype(mut self, subtype: impl Into<DescriptorRef>) -> Self {
        self.elements.push(Element::branch(subtype));
        self
    }

    /// Appends a union subtype with an explicit branch element
    pub fn subtype_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Kind tag of the descriptor
    pub fn kind(&self) -> SerialKind {
        self.kind
    }

    /// Declared name of the type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name the type is serialized under: the override when present.
    ///
    /// This is also the identity of the type inside one generation call.
    pub fn serial_name(&self) -> &str {
        self.serial_name.as_deref().unwrap_or(&self.name)
    }

    /// Elements in declaration order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Whether `other` describes the same type: same kind, names and
    /// elements, with element types compared down to the first named type.
    pub(crate) fn same_shape(&self, other: &Descriptor) -> bool {
        self.kind == other.kind
            && self.serial_name() == other.serial_name()
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.same_shape(b))
    }
}
