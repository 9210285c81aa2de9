//! Descriptor classification.
//!
//! [`classify`] decides how a descriptor is represented in proto2 by looking
//! at its shape only. Named kinds (enums, unions, messages) carry the
//! descriptor along so the emitter can generate their definitions.

use crate::descriptor::{Descriptor, IntegerEncoding, PrimitiveKind, SerialKind};
use crate::error::{Error, Result};
use crate::proto::model::ScalarType;
use std::sync::Arc;

/// Proto2 representation of a descriptor
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// A scalar keyword
    Scalar(ScalarType),
    /// A caller-provided placeholder, emitted as the configured scalar
    Contextual(ScalarType),
    /// A `repeated` field of the item kind
    Repeated(Box<TypeKind>),
    /// `map<K, V>` backed by a synthesized entry message
    Map {
        /// Key kind, always a map-key scalar
        key: Box<TypeKind>,
        /// Value kind
        value: Box<TypeKind>,
    },
    /// An enumeration
    Enum(Arc<Descriptor>),
    /// A polymorphic base rendered as a `oneof` message
    Union(Arc<Descriptor>),
    /// An ordinary composite
    Message(Arc<Descriptor>),
}

/// Classifies `descriptor` for the field named `field`.
///
/// `encoding` only affects integral scalars (directly, as list items, or as
/// map keys and values); `contextual` is the placeholder for contextual
/// descriptors.
pub fn classify(
    descriptor: &Arc<Descriptor>,
    field: &str,
    encoding: Option<IntegerEncoding>,
    contextual: ScalarType,
) -> Result<TypeKind> {
    match descriptor.kind() {
        SerialKind::Contextual => Ok(TypeKind::Contextual(contextual)),
        SerialKind::List => {
            let item = component(descriptor, 0, 1, field)?;
            if item.kind() == SerialKind::Primitive(PrimitiveKind::Byte) {
                return Ok(TypeKind::Scalar(ScalarType::Bytes));
            }
            match classify(&item, field, encoding, contextual)? {
                TypeKind::Repeated(_) | TypeKind::Map { .. } => Err(Error::unsupported(
                    field,
                    "a list item cannot itself be a list or a map",
                )),
                item => Ok(TypeKind::Repeated(Box::new(item))),
            }
        }
        SerialKind::Map => {
            let key = component(descriptor, 0, 2, field)?;
            let value = component(descriptor, 1, 2, field)?;

            let key_kind = classify(&key, field, integral_only(encoding, &key), contextual)?;
            if !matches!(key_kind, TypeKind::Scalar(scalar) if scalar.is_valid_map_key()) {
                return Err(Error::unsupported(
                    field,
                    "map keys must be integral, bool or string scalars",
                ));
            }

            let value_kind = classify(&value, field, integral_only(encoding, &value), contextual)?;
            if matches!(value_kind, TypeKind::Repeated(_) | TypeKind::Map { .. }) {
                return Err(Error::unsupported(
                    field,
                    "a map value cannot be a list or a map",
                ));
            }

            Ok(TypeKind::Map {
                key: Box::new(key_kind),
                value: Box::new(value_kind),
            })
        }
        SerialKind::Enum => Ok(TypeKind::Enum(Arc::clone(descriptor))),
        SerialKind::Sealed | SerialKind::Open => Ok(TypeKind::Union(Arc::clone(descriptor))),
        SerialKind::Class | SerialKind::Object => Ok(TypeKind::Message(Arc::clone(descriptor))),
        SerialKind::Primitive(kind) => {
            let encoding = encoding.unwrap_or_default();
            scalar_type(kind, encoding)
                .map(TypeKind::Scalar)
                .ok_or_else(|| Error::InvalidEncodingHint {
                    field: field.to_string(),
                    kind,
                    encoding,
                })
        }
    }
}

/// The fixed scalar table. `None` marks a hint that cannot apply to the kind.
fn scalar_type(kind: PrimitiveKind, encoding: IntegerEncoding) -> Option<ScalarType> {
    let scalar = match (kind, encoding) {
        (PrimitiveKind::Long, IntegerEncoding::Default) => ScalarType::Int64,
        (PrimitiveKind::Long, IntegerEncoding::Signed) => ScalarType::Sint64,
        (PrimitiveKind::Long, IntegerEncoding::Fixed) => ScalarType::Fixed64,
        (
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char | PrimitiveKind::Int,
            IntegerEncoding::Default,
        ) => ScalarType::Int32,
        (
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char | PrimitiveKind::Int,
            IntegerEncoding::Signed,
        ) => ScalarType::Sint32,
        (
            PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char | PrimitiveKind::Int,
            IntegerEncoding::Fixed,
        ) => ScalarType::Fixed32,
        (PrimitiveKind::Boolean, IntegerEncoding::Default) => ScalarType::Bool,
        (PrimitiveKind::Float, IntegerEncoding::Default) => ScalarType::Float,
        (PrimitiveKind::Double, IntegerEncoding::Default) => ScalarType::Double,
        (PrimitiveKind::String, IntegerEncoding::Default) => ScalarType::String,
        (
            PrimitiveKind::Boolean | PrimitiveKind::Float | PrimitiveKind::Double | PrimitiveKind::String,
            IntegerEncoding::Signed | IntegerEncoding::Fixed,
        ) => return None,
    };
    Some(scalar)
}

/// Keeps the hint only for components it can apply to
fn integral_only(encoding: Option<IntegerEncoding>, component: &Descriptor) -> Option<IntegerEncoding> {
    encoding.filter(|_| matches!(component.kind(), SerialKind::Primitive(kind) if kind.is_integral()))
}

/// Resolves element `index` of a container that must have `expected` elements
fn component(
    container: &Descriptor,
    index: usize,
    expected: usize,
    field: &str,
) -> Result<Arc<Descriptor>> {
    let elements = container.elements();
    if elements.len() != expected {
        return Err(Error::unsupported(
            field,
            format!(
                "{:?} descriptor has {} elements, expected {}",
                container.kind(),
                elements.len(),
                expected
            ),
        ));
    }
    elements[index]
        .descriptor()
        .map(|d| d.resolve())
        .ok_or_else(|| Error::unsupported(field, "container component has no type"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Element;

    fn int() -> Descriptor {
        Descriptor::primitive(PrimitiveKind::Int)
    }

    fn run(descriptor: Descriptor, encoding: Option<IntegerEncoding>) -> Result<TypeKind> {
        classify(&Arc::new(descriptor), "Holder.field", encoding, ScalarType::Bytes)
    }

    fn scalar(descriptor: Descriptor, encoding: Option<IntegerEncoding>) -> ScalarType {
        match run(descriptor, encoding).unwrap() {
            TypeKind::Scalar(scalar) => scalar,
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_encodings() {
        let long = || Descriptor::primitive(PrimitiveKind::Long);

        assert_eq!(scalar(int(), None), ScalarType::Int32);
        assert_eq!(scalar(int(), Some(IntegerEncoding::Default)), ScalarType::Int32);
        assert_eq!(scalar(int(), Some(IntegerEncoding::Signed)), ScalarType::Sint32);
        assert_eq!(scalar(int(), Some(IntegerEncoding::Fixed)), ScalarType::Fixed32);
        assert_eq!(scalar(long(), None), ScalarType::Int64);
        assert_eq!(scalar(long(), Some(IntegerEncoding::Signed)), ScalarType::Sint64);
        assert_eq!(scalar(long(), Some(IntegerEncoding::Fixed)), ScalarType::Fixed64);
    }

    #[test]
    fn test_other_scalars() {
        let table = [
            (PrimitiveKind::Boolean, ScalarType::Bool),
            (PrimitiveKind::Byte, ScalarType::Int32),
            (PrimitiveKind::Short, ScalarType::Int32),
            (PrimitiveKind::Char, ScalarType::Int32),
            (PrimitiveKind::Float, ScalarType::Float),
            (PrimitiveKind::Double, ScalarType::Double),
            (PrimitiveKind::String, ScalarType::String),
        ];
        for (kind, expected) in table {
            assert_eq!(scalar(Descriptor::primitive(kind), None), expected);
        }
    }

    #[test]
    fn test_hint_on_non_integer_is_rejected() {
        let err = run(
            Descriptor::primitive(PrimitiveKind::String),
            Some(IntegerEncoding::Fixed),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidEncodingHint { .. }));
    }

    #[test]
    fn test_byte_sequences_are_bytes() {
        assert_eq!(scalar(Descriptor::byte_array(), None), ScalarType::Bytes);
        // A boxed array of nullable bytes has the same shape
        let boxed = Descriptor::list(Descriptor::primitive(PrimitiveKind::Byte));
        assert_eq!(scalar(boxed, None), ScalarType::Bytes);
    }

    #[test]
    fn test_list_carries_item_encoding() {
        match run(Descriptor::list(int()), Some(IntegerEncoding::Signed)).unwrap() {
            TypeKind::Repeated(item) => {
                assert!(matches!(*item, TypeKind::Scalar(ScalarType::Sint32)))
            }
            other => panic!("expected repeated, got {:?}", other),
        }
    }

    #[test]
    fn test_list_of_byte_arrays_is_repeated_bytes() {
        let kind = run(Descriptor::list(Descriptor::byte_array()), None).unwrap();
        assert!(
            matches!(kind, TypeKind::Repeated(item) if matches!(*item, TypeKind::Scalar(ScalarType::Bytes)))
        );
    }

    #[test]
    fn test_nested_lists_are_unsupported() {
        let err = run(Descriptor::list(Descriptor::list(int())), None).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("Holder.field"));
    }

    #[test]
    fn test_map_shapes() {
        let kind = run(
            Descriptor::map(Descriptor::primitive(PrimitiveKind::String), int()),
            Some(IntegerEncoding::Fixed),
        )
        .unwrap();
        match kind {
            TypeKind::Map { key, value } => {
                assert!(matches!(*key, TypeKind::Scalar(ScalarType::String)));
                assert!(matches!(*value, TypeKind::Scalar(ScalarType::Fixed32)));
            }
            other => panic!("expected map, got {:?}", other),
        }

        let bytes_value = run(Descriptor::map(int(), Descriptor::byte_array()), None).unwrap();
        assert!(
            matches!(bytes_value, TypeKind::Map { value, .. } if matches!(*value, TypeKind::Scalar(ScalarType::Bytes)))
        );

        let float_key = run(Descriptor::map(Descriptor::primitive(PrimitiveKind::Float), int()), None);
        assert!(float_key.is_err());

        let list_value = run(Descriptor::map(int(), Descriptor::list(int())), None);
        assert!(list_value.is_err());
    }

    #[test]
    fn test_malformed_containers() {
        let err = run(Descriptor::map(int(), int()).field(Element::new("extra", int())), None)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDescriptorKind { .. }));
    }

    #[test]
    fn test_named_kinds() {
        assert!(matches!(
            run(Descriptor::enumeration("E").constant("A"), None).unwrap(),
            TypeKind::Enum(_)
        ));
        assert!(matches!(
            run(Descriptor::sealed("S"), None).unwrap(),
            TypeKind::Union(_)
        ));
        assert!(matches!(
            run(Descriptor::open("O"), None).unwrap(),
            TypeKind::Union(_)
        ));
        assert!(matches!(
            run(Descriptor::object("Unit"), None).unwrap(),
            TypeKind::Message(_)
        ));
        assert!(matches!(
            run(Descriptor::contextual("Ctx"), Some(IntegerEncoding::Signed)).unwrap(),
            TypeKind::Contextual(ScalarType::Bytes)
        ));
    }
}
