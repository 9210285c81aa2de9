//! Message emission.
//!
//! One [`emit`] call turns a top-level descriptor into a [`Definition`],
//! generating every type it transitively references. Placement rules:
//!
//! - ordinary messages, enums and unions reached through fields are nested
//!   directly inside the top-level definition, in order of first reference;
//! - map entries are nested inside the message owning the map field;
//! - union branch messages are nested inside the union message.
//!
//! Every named type is generated once per top-level definition. Later
//! references, including references back to a type still being generated,
//! name the existing definition instead.
//!
//! Each message is a proto scope: its fields, its oneof, the types nested in
//! it and the values of the enums nested in it all share one namespace.

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::naming::{identifier, map_entry_name, simple_name, to_snake_case, type_identifier};
use crate::proto::classify::{classify, TypeKind};
use crate::proto::field::{translate, FieldRegistry, ResolveType};
use crate::proto::model::{
    Definition, EnumValue, FieldSlot, FieldType, GeneratedEnum, GeneratedMessage, Label,
    OneofGroup, ScalarType, TypePath,
};
use crate::proto::GeneratorConfig;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
enum Named {
    Message,
    Union,
    Enum,
}

/// Names declared directly in one proto scope
#[derive(Debug, Default)]
pub(crate) struct Symbols {
    /// Name -> what declared it
    declared: HashMap<String, String>,
}

impl Symbols {
    /// Declares `name` in `scope`; `what` describes the declaration for errors
    pub(crate) fn declare(&mut self, scope: &str, name: &str, what: impl Into<String>) -> Result<()> {
        let what = what.into();
        if let Some(first) = self.declared.get(name) {
            return Err(Error::DuplicateSymbol {
                scope: scope.to_string(),
                name: name.to_string(),
                first: first.clone(),
                second: what,
            });
        }
        self.declared.insert(name.to_string(), what);
        Ok(())
    }
}

/// Per top-level generation state
struct Emitter<'c> {
    config: &'c GeneratorConfig,
    top: TypePath,
    /// Serial name -> where the type was generated, and from which descriptor
    visited: HashMap<String, (TypePath, Arc<Descriptor>)>,
    /// Identifier -> serial name of the type that owns it
    names: HashMap<String, String>,
    /// Symbols of every message scope inside the top-level definition
    scopes: HashMap<TypePath, Symbols>,
    /// Definitions nested directly in the top-level one; a slot is reserved
    /// before its body is built so order follows first reference
    hoisted: Vec<Option<Definition>>,
}

/// Emits the definition for one top-level descriptor.
pub(crate) fn emit(descriptor: &Arc<Descriptor>, config: &GeneratorConfig) -> Result<Definition> {
    let serial = descriptor.serial_name();
    let top = TypePath::root(type_identifier(serial));
    let mut emitter = Emitter {
        config,
        top: top.clone(),
        visited: HashMap::new(),
        names: HashMap::new(),
        scopes: HashMap::new(),
        hoisted: Vec::new(),
    };
    emitter.claim(descriptor, &top)?;

    let mut definition = match classify(descriptor, serial, None, config.contextual_type)? {
        TypeKind::Message(d) => Definition::Message(emitter.message_body(&d, &top)?),
        TypeKind::Union(d) => Definition::Message(emitter.union_body(&d, &top)?),
        TypeKind::Enum(d) => Definition::Enum(emitter.enum_body(&d, &top)?),
        _ => {
            return Err(Error::unsupported(
                serial,
                "top-level descriptors must be classes, objects, enums or polymorphic bases",
            ))
        }
    };

    if let Definition::Message(message) = &mut definition {
        message.nested.extend(emitter.hoisted.into_iter().flatten());
        debug!(
            "Emitted message {} ({} fields, {} nested definitions)",
            message.name,
            message.fields.len(),
            message.nested.len()
        );
    } else {
        debug!("Emitted enum {}", definition.name());
    }

    Ok(definition)
}

impl<'c> Emitter<'c> {
    /// Records `descriptor` as generated at `path`
    fn claim(&mut self, descriptor: &Arc<Descriptor>, path: &TypePath) -> Result<()> {
        let serial = descriptor.serial_name();
        if let Some(first) = self.names.get(path.name()) {
            return Err(Error::DuplicateTypeName {
                scope: self.top.name().to_string(),
                name: path.name().to_string(),
                first: first.clone(),
                second: serial.to_string(),
            });
        }
        if let Some(parent) = path.parent() {
            self.declare(&parent, path.name(), format!("type '{}'", serial))?;
        }
        self.names.insert(path.name().to_string(), serial.to_string());
        self.visited
            .insert(serial.to_string(), (path.clone(), Arc::clone(descriptor)));
        Ok(())
    }

    /// Declares `name` in the message scope at `scope`
    fn declare(&mut self, scope: &TypePath, name: &str, what: impl Into<String>) -> Result<()> {
        self.scopes
            .entry(scope.clone())
            .or_default()
            .declare(&scope.segments().join("."), name, what)
    }

    /// Where `descriptor` was already generated, if it was.
    ///
    /// A serial name may only stand for one shape: a different descriptor
    /// under a generated serial name is a collision, not a reference.
    fn seen(&self, descriptor: &Arc<Descriptor>) -> Result<Option<TypePath>> {
        let serial = descriptor.serial_name();
        let Some((path, first)) = self.visited.get(serial) else {
            return Ok(None);
        };
        if Arc::ptr_eq(first, descriptor) || first.same_shape(descriptor) {
            return Ok(Some(path.clone()));
        }
        Err(Error::DuplicateTypeName {
            scope: self.top.name().to_string(),
            name: path.name().to_string(),
            first: serial.to_string(),
            second: format!("{} (different elements)", serial),
        })
    }

    /// Generates `descriptor` directly inside the top-level definition
    fn hoist(&mut self, descriptor: &Arc<Descriptor>, named: Named) -> Result<TypePath> {
        if let Some(path) = self.seen(descriptor)? {
            return Ok(path);
        }

        let path = self.top.child(type_identifier(descriptor.serial_name()));
        self.claim(descriptor, &path)?;

        let slot = self.hoisted.len();
        self.hoisted.push(None);
        let definition = match named {
            Named::Message => Definition::Message(self.message_body(descriptor, &path)?),
            Named::Union => Definition::Message(self.union_body(descriptor, &path)?),
            Named::Enum => Definition::Enum(self.enum_body(descriptor, &path)?),
        };
        self.hoisted[slot] = Some(definition);

        Ok(path)
    }

    fn message_body(
        &mut self,
        descriptor: &Arc<Descriptor>,
        path: &TypePath,
    ) -> Result<GeneratedMessage> {
        let owner = path.name().to_string();
        let contextual = self.config.contextual_type;
        let mut scope = MessageScope {
            emitter: self,
            path,
            nested: Vec::new(),
        };

        let mut registry = FieldRegistry::new(owner.as_str());
        let mut fields = Vec::with_capacity(descriptor.elements().len());
        for (index, element) in descriptor.elements().iter().enumerate() {
            let slot = translate(&owner, index, element, contextual, &mut scope)?;
            registry.claim(&slot)?;
            scope
                .emitter
                .declare(path, &slot.name, format!("field '{}'", slot.name))?;
            fields.push(slot);
        }

        Ok(GeneratedMessage {
            serial_name: original_name(descriptor, &owner),
            name: owner,
            fields,
            oneof: None,
            nested: scope.nested,
            map_entry: false,
        })
    }

    fn union_body(
        &mut self,
        descriptor: &Arc<Descriptor>,
        path: &TypePath,
    ) -> Result<GeneratedMessage> {
        let owner = path.name().to_string();
        let serial_name = original_name(descriptor, &owner);

        // An empty oneof is not valid proto; describe the value as an envelope
        if descriptor.elements().is_empty() {
            return Ok(GeneratedMessage {
                name: owner,
                serial_name,
                fields: envelope_fields(),
                ..GeneratedMessage::default()
            });
        }

        let contextual = self.config.contextual_type;
        let mut scope = UnionScope {
            emitter: self,
            path,
            nested: Vec::new(),
        };

        let oneof = to_snake_case(&owner);
        scope
            .emitter
            .declare(path, &oneof, format!("oneof '{}'", oneof))?;

        let mut registry = FieldRegistry::new(owner.as_str());
        let mut branches = Vec::with_capacity(descriptor.elements().len());
        for (index, element) in descriptor.elements().iter().enumerate() {
            let slot = translate(&owner, index, element, contextual, &mut scope)?;
            if slot.label != Label::Optional {
                return Err(Error::unsupported(
                    format!("{}.{}", owner, slot.name),
                    "a oneof branch cannot be repeated",
                ));
            }
            registry.claim(&slot)?;
            scope
                .emitter
                .declare(path, &slot.name, format!("field '{}'", slot.name))?;
            branches.push(slot);
        }

        Ok(GeneratedMessage {
            oneof: Some(OneofGroup {
                name: oneof,
                branches,
            }),
            name: owner,
            serial_name,
            fields: Vec::new(),
            nested: scope.nested,
            map_entry: false,
        })
    }
}

/// Resolves the field types of an ordinary message
struct MessageScope<'e, 'c> {
    emitter: &'e mut Emitter<'c>,
    path: &'e TypePath,
    nested: Vec<Definition>,
}

impl ResolveType for MessageScope<'_, '_> {
    fn message(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        self.emitter.hoist(descriptor, Named::Message)
    }

    fn enumeration(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        self.emitter.hoist(descriptor, Named::Enum)
    }

    fn union(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        self.emitter.hoist(descriptor, Named::Union)
    }

    fn map_entry(&mut self, field: &str, key: &FieldType, value: &FieldType) -> Result<()> {
        // protoc declares its own entry message for every map field
        self.emitter.declare(
            self.path,
            &map_entry_name(field),
            format!("the implicit entry of map field '{}'", field),
        )?;
        let name = format!("{}Entry", field);
        if self.emitter.config.emit_map_entries {
            self.emitter.declare(
                self.path,
                &name,
                format!("the entry message of map field '{}'", field),
            )?;
        }

        self.nested.push(Definition::Message(GeneratedMessage {
            name,
            fields: vec![
                entry_field("key", key.clone(), 1),
                entry_field("value", value.clone(), 2),
            ],
            map_entry: true,
            ..GeneratedMessage::default()
        }));
        Ok(())
    }
}

/// Resolves the branch types of a union message; subtype messages are
/// nested inside the union
struct UnionScope<'e, 'c> {
    emitter: &'e mut Emitter<'c>,
    path: &'e TypePath,
    nested: Vec<Definition>,
}

impl ResolveType for UnionScope<'_, '_> {
    fn message(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        if let Some(path) = self.emitter.seen(descriptor)? {
            return Ok(path);
        }

        let path = self.path.child(type_identifier(descriptor.serial_name()));
        self.emitter.claim(descriptor, &path)?;
        let branch = self.emitter.message_body(descriptor, &path)?;
        self.nested.push(Definition::Message(branch));
        Ok(path)
    }

    fn enumeration(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        self.emitter.hoist(descriptor, Named::Enum)
    }

    fn union(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath> {
        self.emitter.hoist(descriptor, Named::Union)
    }

    fn map_entry(&mut self, field: &str, _key: &FieldType, _value: &FieldType) -> Result<()> {
        Err(Error::unsupported(
            format!("{}.{}", self.path.name(), field),
            "a oneof branch cannot be a map",
        ))
    }
}

impl Emitter<'_> {
    /// Values are declared in the scope enclosing the enum; values of a
    /// top-level enum are checked against the package when the file is built
    fn enum_body(&mut self, descriptor: &Descriptor, path: &TypePath) -> Result<GeneratedEnum> {
        let name = path.name().to_string();
        if descriptor.elements().is_empty() {
            return Err(Error::unsupported(
                descriptor.serial_name(),
                "an enum needs at least one constant",
            ));
        }

        let parent = path.parent();
        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(descriptor.elements().len());
        for (ordinal, constant) in descriptor.elements().iter().enumerate() {
            let serial = constant.effective_name();
            let constant_name = identifier(serial);
            if !seen.insert(constant_name.clone()) {
                return Err(Error::DuplicateFieldName {
                    message: name,
                    name: constant_name,
                });
            }
            if let Some(parent) = &parent {
                self.declare(parent, &constant_name, format!("a value of enum '{}'", name))?;
            }
            values.push(EnumValue {
                serial_name: (constant_name != serial).then(|| serial.to_string()),
                name: constant_name,
                number: ordinal as i32,
            });
        }

        Ok(GeneratedEnum {
            serial_name: original_name(descriptor, &name),
            name,
            values,
        })
    }
}

/// The serial name, when its last segment had to be sanitized
fn original_name(descriptor: &Descriptor, identifier: &str) -> Option<String> {
    let serial = descriptor.serial_name();
    (simple_name(serial) != identifier).then(|| serial.to_string())
}

fn entry_field(name: &str, ty: FieldType, number: u32) -> FieldSlot {
    FieldSlot {
        label: Label::Optional,
        ty,
        name: name.to_string(),
        serial_name: None,
        number,
        nullable: false,
        has_default: false,
    }
}

/// `{ optional string type = 1; optional bytes value = 2; }`
fn envelope_fields() -> Vec<FieldSlot> {
    vec![
        entry_field("type", FieldType::Scalar(ScalarType::String), 1),
        entry_field("value", FieldType::Scalar(ScalarType::Bytes), 2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorRef, Element, PrimitiveKind};

    fn int() -> Descriptor {
        Descriptor::primitive(PrimitiveKind::Int)
    }

    fn emit_message(descriptor: Descriptor) -> GeneratedMessage {
        match emit(&Arc::new(descriptor), &GeneratorConfig::default()).unwrap() {
            Definition::Message(message) => message,
            other => panic!("expected message, got {:?}", other),
        }
    }

    fn nested_names(message: &GeneratedMessage) -> Vec<&str> {
        message.nested.iter().map(Definition::name).collect()
    }

    #[test]
    fn test_shared_type_is_emitted_once() {
        let point = Arc::new(Descriptor::class("Point").field(Element::new("x", int())));
        let line = Descriptor::class("Line")
            .field(Element::new("from", Arc::clone(&point)))
            .field(Element::new("to", Arc::clone(&point)))
            .field(Element::new("points", Descriptor::list(Arc::clone(&point))));

        let message = emit_message(line);
        assert_eq!(nested_names(&message), ["Point"]);
        let types: Vec<_> = message.fields.iter().map(|f| f.ty.type_name()).collect();
        assert_eq!(types, ["Point", "Point", "Point"]);
    }

    #[test]
    fn test_transitive_types_are_hoisted_in_reference_order() {
        let color = Descriptor::enumeration("Color").constant("RED");
        let style = Descriptor::class("Style").field(Element::new("color", color.clone()));
        let shape = Descriptor::class("Shape")
            .field(Element::new("style", style))
            .field(Element::new("fill", color));

        let message = emit_message(shape);
        assert_eq!(nested_names(&message), ["Style", "Color"]);
        assert_eq!(message.fields[1].ty.type_name(), "Color");
    }

    #[test]
    fn test_self_reference_is_named_not_expanded() {
        fn node() -> Arc<Descriptor> {
            Arc::new(
                Descriptor::class("Node")
                    .field(Element::new("value", Descriptor::primitive(PrimitiveKind::Int)))
                    .field(Element::new("next", DescriptorRef::lazy(node)).nullable())
                    .field(Element::new("children", Descriptor::list(DescriptorRef::lazy(node)))),
            )
        }

        let message = match emit(&node(), &GeneratorConfig::default()).unwrap() {
            Definition::Message(message) => message,
            other => panic!("expected message, got {:?}", other),
        };
        assert!(message.nested.is_empty());
        assert_eq!(message.fields[1].ty.type_name(), "Node");
        assert_eq!(message.fields[2].label, Label::Repeated);
    }

    #[test]
    fn test_mutual_recursion() {
        fn parent() -> Arc<Descriptor> {
            Arc::new(Descriptor::class("Parent").field(Element::new(
                "children",
                Descriptor::list(DescriptorRef::lazy(child)),
            )))
        }
        fn child() -> Arc<Descriptor> {
            Arc::new(Descriptor::class("Child").field(Element::new("parent", DescriptorRef::lazy(parent))))
        }

        let message = match emit(&parent(), &GeneratorConfig::default()).unwrap() {
            Definition::Message(message) => message,
            other => panic!("expected message, got {:?}", other),
        };
        assert_eq!(nested_names(&message), ["Child"]);
        let Definition::Message(child) = &message.nested[0] else {
            panic!("expected nested message");
        };
        assert_eq!(child.fields[0].ty.type_name(), "Parent");
    }

    #[test]
    fn test_map_entry_is_nested_in_owner() {
        let holder = Descriptor::class("MapHolder").field(Element::new(
            "scores",
            Descriptor::map(Descriptor::primitive(PrimitiveKind::String), int()),
        ));

        let message = emit_message(holder);
        let Definition::Message(entry) = &message.nested[0] else {
            panic!("expected map entry");
        };
        assert!(entry.map_entry);
        assert_eq!(entry.name, "scoresEntry");
        let numbers: Vec<_> = entry.fields.iter().map(|f| (f.name.as_str(), f.number)).collect();
        assert_eq!(numbers, [("key", 1), ("value", 2)]);
    }

    #[test]
    fn test_union_branches_nest_in_union() {
        let sealed = Descriptor::sealed("Shape")
            .subtype(Descriptor::class("Circle").field(Element::new("radius", int())))
            .subtype(Descriptor::object("Empty"));
        let holder = Descriptor::class("Holder").field(Element::new("shape", sealed));

        let message = emit_message(holder);
        assert_eq!(message.fields[0].ty.type_name(), "Shape");
        let Definition::Message(union) = &message.nested[0] else {
            panic!("expected union message");
        };
        let oneof = union.oneof.as_ref().unwrap();
        assert_eq!(oneof.name, "shape");
        let branches: Vec<_> = oneof
            .branches
            .iter()
            .map(|b| (b.name.as_str(), b.ty.type_name(), b.number))
            .collect();
        assert_eq!(
            branches,
            [
                ("circle", "Shape.Circle".to_string(), 1),
                ("empty", "Shape.Empty".to_string(), 2)
            ]
        );
        assert_eq!(nested_names(union), ["Circle", "Empty"]);
    }

    #[test]
    fn test_open_union_without_subtypes_is_an_envelope() {
        let holder = Descriptor::class("Holder").field(Element::new("abs", Descriptor::open("AbstractClass")));
        let message = emit_message(holder);
        let Definition::Message(envelope) = &message.nested[0] else {
            panic!("expected envelope message");
        };
        assert!(envelope.oneof.is_none());
        let fields: Vec<_> = envelope.fields.iter().map(|f| f.ty.type_name()).collect();
        assert_eq!(fields, ["string", "bytes"]);
    }

    #[test]
    fn test_distinct_types_with_one_identifier_collide() {
        let holder = Descriptor::class("Holder")
            .field(Element::new("a", Descriptor::class("com.a.Item")))
            .field(Element::new("b", Descriptor::class("com.b.Item")));
        let err = emit(&Arc::new(holder), &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateTypeName { .. }));
    }

    #[test]
    fn test_enum_values_share_the_enclosing_scope() {
        let holder = Descriptor::class("Holder")
            .field(Element::new("status", Descriptor::enumeration("Status").constant("UNKNOWN").constant("OK")))
            .field(Element::new("kind", Descriptor::enumeration("Kind").constant("UNKNOWN").constant("A")));
        let err = emit(&Arc::new(holder), &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "name 'UNKNOWN' is declared twice in 'Holder': by a value of enum 'Status' and by a value of enum 'Kind'"
        );
    }

    #[test]
    fn test_enum_value_clashes_with_nested_type() {
        let holder = Descriptor::class("Holder")
            .field(Element::new("color", Descriptor::enumeration("Color").constant("Point")))
            .field(Element::new("point", Descriptor::class("Point")));
        let err = emit(&Arc::new(holder), &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "name 'Point' is declared twice in 'Holder': by a value of enum 'Color' and by type 'Point'"
        );
    }

    #[test]
    fn test_field_clashes_with_nested_type() {
        let holder = Descriptor::class("Holder").field(Element::new("Point", Descriptor::class("Point")));
        let err = emit(&Arc::new(holder), &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateSymbol { ref name, .. } if name == "Point"));
    }

    #[test]
    fn test_one_serial_name_with_two_shapes() {
        let boxed = |value: PrimitiveKind| {
            Descriptor::class("Box").field(Element::new("value", Descriptor::primitive(value)))
        };
        let holder = Descriptor::class("Holder")
            .field(Element::new("a", boxed(PrimitiveKind::Int)))
            .field(Element::new("b", boxed(PrimitiveKind::String)));
        let err = emit(&Arc::new(holder), &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type name 'Box' in 'Holder' is used by both 'Box' and 'Box (different elements)'"
        );
    }

    #[test]
    fn test_equal_descriptors_are_one_type() {
        let boxed = || Descriptor::class("Box").field(Element::new("value", int()));
        let holder = Descriptor::class("Holder")
            .field(Element::new("a", boxed()))
            .field(Element::new("b", boxed()));
        let message = emit_message(holder);
        assert_eq!(nested_names(&message), ["Box"]);
    }

    #[test]
    fn test_capitalized_map_field_clashes_with_implicit_entry() {
        let holder = || {
            Descriptor::class("Holder").field(Element::new(
                "Items",
                Descriptor::map(Descriptor::primitive(PrimitiveKind::String), int()),
            ))
        };
        let err = emit(&Arc::new(holder()), &GeneratorConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "name 'ItemsEntry' is declared twice in 'Holder': by the implicit entry of map field 'Items' \
             and by the entry message of map field 'Items'"
        );

        // Without the rendered entry only protoc's implicit one exists
        let config = GeneratorConfig::default().emit_map_entries(false);
        assert!(emit(&Arc::new(holder()), &config).is_ok());
    }

    #[test]
    fn test_duplicate_enum_constants() {
        let color = Descriptor::enumeration("Color")
            .constant("RED")
            .constant_element(Element::constant("CRIMSON").with_serial_name("RED"));
        let err = emit(&Arc::new(color), &GeneratorConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_top_level_must_be_named() {
        let err = emit(&Arc::new(Descriptor::list(int())), &GeneratorConfig::default()).unwrap_err();
        assert!(err.is_internal());
    }
}
