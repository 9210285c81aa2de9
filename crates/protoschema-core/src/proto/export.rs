//! Descriptor export.
//!
//! Converts a [`GeneratedFile`] into the `FileDescriptorProto` protoc would
//! build from the rendered text. Map fields get protoc's implicit entry
//! message (`scalarMap` -> `ScalarMapEntry`) so the result loads into a
//! `prost_reflect::DescriptorPool`.

use crate::naming::{json_name, map_entry_name};
use crate::proto::model::{
    Definition, FieldSlot, FieldType, GeneratedEnum, GeneratedFile, GeneratedMessage, Label,
    ScalarType, TypePath,
};
use crate::proto::GeneratorConfig;
use bytes::Bytes;
use prost::Message;
use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, FileOptions, MessageOptions, OneofDescriptorProto,
};

/// Builds the file descriptor for `file`
pub(crate) fn file_descriptor(file: &GeneratedFile, config: &GeneratorConfig) -> FileDescriptorProto {
    let exporter = Exporter {
        package: &file.package,
        config,
    };

    let mut proto = FileDescriptorProto {
        name: Some(file_name(&file.package)),
        package: Some(file.package.clone()),
        syntax: Some("proto2".to_string()),
        options: file_options(file),
        ..Default::default()
    };

    for definition in &file.definitions {
        let path = TypePath::root(definition.name());
        match definition {
            Definition::Message(message) => {
                proto.message_type.push(exporter.message(message, &path))
            }
            Definition::Enum(enum_type) => proto.enum_type.push(enum_descriptor(enum_type)),
        }
    }

    proto
}

/// Encodes `proto` as a single-file `FileDescriptorSet`
pub(crate) fn encode_descriptor_set(proto: FileDescriptorProto) -> Bytes {
    let set = FileDescriptorSet { file: vec![proto] };
    Bytes::from(set.encode_to_vec())
}

/// `api.v1` is written to `api/v1.proto`
fn file_name(package: &str) -> String {
    format!("{}.proto", package.replace('.', "/"))
}

fn file_options(file: &GeneratedFile) -> Option<FileOptions> {
    if file.options.is_empty() {
        return None;
    }

    let mut options = FileOptions::default();
    for option in &file.options {
        let value = Some(option.value.clone());
        match option.key {
            "java_package" => options.java_package = value,
            "java_outer_classname" => options.java_outer_classname = value,
            "go_package" => options.go_package = value,
            "objc_class_prefix" => options.objc_class_prefix = value,
            "csharp_namespace" => options.csharp_namespace = value,
            "swift_prefix" => options.swift_prefix = value,
            "php_class_prefix" => options.php_class_prefix = value,
            "php_namespace" => options.php_namespace = value,
            "php_metadata_namespace" => options.php_metadata_namespace = value,
            "ruby_package" => options.ruby_package = value,
            _ => {}
        }
    }
    Some(options)
}

struct Exporter<'a> {
    package: &'a str,
    config: &'a GeneratorConfig,
}

impl Exporter<'_> {
    fn message(&self, message: &GeneratedMessage, path: &TypePath) -> DescriptorProto {
        let mut proto = DescriptorProto {
            name: Some(message.name.clone()),
            ..Default::default()
        };

        for slot in &message.fields {
            if let FieldType::Map { key, value } = &slot.ty {
                let entry = path.child(map_entry_name(&slot.name));
                proto.nested_type.push(self.map_entry(entry.name(), key, value));
                proto.field.push(FieldDescriptorProto {
                    label: Some(ProtoLabel::Repeated as i32),
                    r#type: Some(Type::Message as i32),
                    type_name: Some(entry.qualified(self.package)),
                    ..named_field(slot)
                });
            } else {
                proto.field.push(self.field(slot));
            }
        }

        if let Some(oneof) = &message.oneof {
            let index = proto.oneof_decl.len() as i32;
            proto.oneof_decl.push(OneofDescriptorProto {
                name: Some(oneof.name.clone()),
                ..Default::default()
            });
            for branch in &oneof.branches {
                proto.field.push(FieldDescriptorProto {
                    oneof_index: Some(index),
                    ..self.field(branch)
                });
            }
        }

        for nested in &message.nested {
            match nested {
                Definition::Message(entry) if entry.map_entry => {
                    // The rendered entry only exists in text when it is printed,
                    // and it coincides with protoc's own entry when the names match
                    if self.config.emit_map_entries && !proto_has_nested(&proto, &entry.name) {
                        let plain = GeneratedMessage {
                            map_entry: false,
                            ..entry.clone()
                        };
                        proto
                            .nested_type
                            .push(self.message(&plain, &path.child(&entry.name)));
                    }
                }
                Definition::Message(child) => {
                    proto
                        .nested_type
                        .push(self.message(child, &path.child(&child.name)));
                }
                Definition::Enum(enum_type) => proto.enum_type.push(enum_descriptor(enum_type)),
            }
        }

        proto
    }

    fn map_entry(&self, name: &str, key: &FieldType, value: &FieldType) -> DescriptorProto {
        let entry_field = |name: &str, ty: &FieldType, number: i32| FieldDescriptorProto {
            name: Some(name.to_string()),
            json_name: Some(name.to_string()),
            number: Some(number),
            label: Some(ProtoLabel::Optional as i32),
            ..self.field_type(ty)
        };

        DescriptorProto {
            name: Some(name.to_string()),
            field: vec![entry_field("key", key, 1), entry_field("value", value, 2)],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn field(&self, slot: &FieldSlot) -> FieldDescriptorProto {
        let label = match slot.label {
            Label::Repeated => ProtoLabel::Repeated,
            Label::Optional | Label::Map => ProtoLabel::Optional,
        };
        let typed = self.field_type(&slot.ty);
        FieldDescriptorProto {
            label: Some(label as i32),
            r#type: typed.r#type,
            type_name: typed.type_name,
            ..named_field(slot)
        }
    }

    /// Only `type` and `type_name` are set
    fn field_type(&self, ty: &FieldType) -> FieldDescriptorProto {
        let (kind, type_name) = match ty {
            FieldType::Scalar(scalar) => (scalar_type(*scalar), None),
            FieldType::Message(path) => (Type::Message, Some(path.qualified(self.package))),
            FieldType::Enum(path) => (Type::Enum, Some(path.qualified(self.package))),
            // Map values never nest maps; callers handle the map itself
            FieldType::Map { .. } => (Type::Message, None),
        };
        FieldDescriptorProto {
            r#type: Some(kind as i32),
            type_name,
            ..Default::default()
        }
    }
}

/// Name, JSON name and number of `slot`
fn named_field(slot: &FieldSlot) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(slot.name.clone()),
        json_name: Some(json_name(&slot.name)),
        number: Some(slot.number as i32),
        ..Default::default()
    }
}

fn proto_has_nested(proto: &DescriptorProto, name: &str) -> bool {
    proto.nested_type.iter().any(|nested| nested.name() == name)
}

fn enum_descriptor(enum_type: &GeneratedEnum) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(enum_type.name.clone()),
        value: enum_type
            .values
            .iter()
            .map(|value| EnumValueDescriptorProto {
                name: Some(value.name.clone()),
                number: Some(value.number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

fn scalar_type(scalar: ScalarType) -> Type {
    match scalar {
        ScalarType::Int32 => Type::Int32,
        ScalarType::Int64 => Type::Int64,
        ScalarType::Sint32 => Type::Sint32,
        ScalarType::Sint64 => Type::Sint64,
        ScalarType::Fixed32 => Type::Fixed32,
        ScalarType::Fixed64 => Type::Fixed64,
        ScalarType::Bool => Type::Bool,
        ScalarType::Float => Type::Float,
        ScalarType::Double => Type::Double,
        ScalarType::String => Type::String,
        ScalarType::Bytes => Type::Bytes,
    }
}
