//! JSON manifests describing the types to generate.
//!
//! ```json
//! {
//!   "package": "api.v1",
//!   "options": { "java_package": "api.proto" },
//!   "roots": ["Holder"],
//!   "types": {
//!     "Holder": {
//!       "kind": "class",
//!       "fields": [
//!         { "name": "id", "type": "long", "encoding": "signed" },
//!         { "name": "tags", "type": { "map": ["string", "Tag"] } },
//!         { "name": "next", "type": "Holder", "nullable": true }
//!       ]
//!     },
//!     "Tag": { "kind": "enum", "constants": ["RED", { "name": "GREEN", "serial_name": "green!" }] }
//!   }
//! }
//! ```
//!
//! Type names are resolved lazily, so types may reference themselves or each
//! other.

use anyhow::{bail, Context, Result};
use protoschema_core::{Descriptor, DescriptorRef, Element, IntegerEncoding, PrimitiveKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A parsed manifest
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub package: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Top-level types, in output order
    pub roots: Vec<String>,
    pub types: BTreeMap<String, TypeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    Class {
        #[serde(default)]
        serial_name: Option<String>,
        #[serde(default)]
        fields: Vec<FieldDef>,
    },
    Object {
        #[serde(default)]
        serial_name: Option<String>,
    },
    Enum {
        #[serde(default)]
        serial_name: Option<String>,
        constants: Vec<ConstantDef>,
    },
    Sealed {
        #[serde(default)]
        serial_name: Option<String>,
        subtypes: Vec<SubtypeDef>,
    },
    Open {
        #[serde(default)]
        serial_name: Option<String>,
        #[serde(default)]
        subtypes: Vec<SubtypeDef>,
    },
}

#[derive(Debug, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub serial_name: Option<String>,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub encoding: Option<EncodingDef>,
    #[serde(default)]
    pub nullable: bool,
    /// Whether the source type declares a default value
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConstantDef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        serial_name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubtypeDef {
    Name(String),
    Detailed {
        #[serde(rename = "type")]
        ty: String,
        /// Branch field name; derived from the subtype when absent
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        number: Option<u32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    Name(String),
    List { list: Box<TypeExpr> },
    Map { map: (Box<TypeExpr>, Box<TypeExpr>) },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingDef {
    Default,
    Signed,
    Fixed,
}

impl From<EncodingDef> for IntegerEncoding {
    fn from(encoding: EncodingDef) -> Self {
        match encoding {
            EncodingDef::Default => IntegerEncoding::Default,
            EncodingDef::Signed => IntegerEncoding::Signed,
            EncodingDef::Fixed => IntegerEncoding::Fixed,
        }
    }
}

impl Manifest {
    /// Reads and parses the manifest at `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the descriptors of `roots`, in order
    pub fn descriptors(&self) -> Result<Vec<Arc<Descriptor>>> {
        let catalog = Arc::new(Catalog::compile(&self.types)?);
        self.roots
            .iter()
            .map(|root| match catalog.index.get(root) {
                Some(&index) => Ok(catalog.descriptor(index)),
                None => bail!("Root type '{}' is not defined", root),
            })
            .collect()
    }
}

/// Type expression with every name resolved to a catalog index
#[derive(Debug, Clone)]
enum Shape {
    Primitive(PrimitiveKind),
    ByteArray,
    Contextual,
    Named(usize),
    List(Box<Shape>),
    Map(Box<Shape>, Box<Shape>),
}

#[derive(Debug)]
struct CompiledField {
    name: String,
    serial_name: Option<String>,
    shape: Shape,
    number: Option<u32>,
    encoding: Option<IntegerEncoding>,
    nullable: bool,
    default: bool,
}

#[derive(Debug)]
struct CompiledSubtype {
    index: usize,
    name: Option<String>,
    number: Option<u32>,
}

#[derive(Debug)]
enum Compiled {
    Class {
        object: bool,
        fields: Vec<CompiledField>,
    },
    Enum(Vec<(String, Option<String>)>),
    Union {
        open: bool,
        subtypes: Vec<CompiledSubtype>,
    },
}

#[derive(Debug)]
struct CompiledType {
    name: String,
    serial_name: Option<String>,
    body: Compiled,
}

/// Validated manifest types. Every [`Shape::Named`] index is in bounds.
#[derive(Debug)]
struct Catalog {
    index: HashMap<String, usize>,
    types: Vec<CompiledType>,
}

impl Catalog {
    fn compile(defs: &BTreeMap<String, TypeDef>) -> Result<Self> {
        let index: HashMap<String, usize> = defs
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut types = Vec::with_capacity(defs.len());
        for (name, def) in defs {
            let (serial_name, body) = match def {
                TypeDef::Class { serial_name, fields } => {
                    let fields = fields
                        .iter()
                        .map(|field| compile_field(&index, name, field))
                        .collect::<Result<_>>()?;
                    (serial_name, Compiled::Class { object: false, fields })
                }
                TypeDef::Object { serial_name } => (
                    serial_name,
                    Compiled::Class {
                        object: true,
                        fields: Vec::new(),
                    },
                ),
                TypeDef::Enum {
                    serial_name,
                    constants,
                } => {
                    let constants = constants
                        .iter()
                        .map(|constant| match constant {
                            ConstantDef::Name(name) => (name.clone(), None),
                            ConstantDef::Detailed { name, serial_name } => {
                                (name.clone(), serial_name.clone())
                            }
                        })
                        .collect();
                    (serial_name, Compiled::Enum(constants))
                }
                TypeDef::Sealed {
                    serial_name,
                    subtypes,
                } => (serial_name, compile_union(&index, name, subtypes, false)?),
                TypeDef::Open {
                    serial_name,
                    subtypes,
                } => (serial_name, compile_union(&index, name, subtypes, true)?),
            };
            types.push(CompiledType {
                name: name.clone(),
                serial_name: serial_name.clone(),
                body,
            });
        }

        Ok(Self { index, types })
    }

    /// Builds the descriptor of type `index`; named references stay lazy
    fn descriptor(self: &Arc<Self>, index: usize) -> Arc<Descriptor> {
        let compiled = &self.types[index];
        let mut descriptor = match &compiled.body {
            Compiled::Class { object: true, .. } => Descriptor::object(&compiled.name),
            Compiled::Class { object: false, fields } => {
                fields.iter().fold(Descriptor::class(&compiled.name), |d, field| {
                    d.field(self.element(field))
                })
            }
            Compiled::Enum(constants) => constants.iter().fold(
                Descriptor::enumeration(&compiled.name),
                |d, (name, serial_name)| {
                    let mut constant = Element::constant(name);
                    if let Some(serial_name) = serial_name {
                        constant = constant.with_serial_name(serial_name);
                    }
                    d.constant_element(constant)
                },
            ),
            Compiled::Union { open, subtypes } => {
                let base = if *open {
                    Descriptor::open(&compiled.name)
                } else {
                    Descriptor::sealed(&compiled.name)
                };
                subtypes
                    .iter()
                    .fold(base, |d, subtype| d.subtype_element(self.subtype_element(subtype)))
            }
        };
        if let Some(serial_name) = &compiled.serial_name {
            descriptor = descriptor.with_serial_name(serial_name);
        }
        Arc::new(descriptor)
    }

    fn named(self: &Arc<Self>, index: usize) -> DescriptorRef {
        let catalog = Arc::clone(self);
        DescriptorRef::lazy(move || catalog.descriptor(index))
    }

    fn shape(self: &Arc<Self>, shape: &Shape) -> DescriptorRef {
        match shape {
            Shape::Primitive(kind) => Descriptor::primitive(*kind).into(),
            Shape::ByteArray => Descriptor::byte_array().into(),
            Shape::Contextual => Descriptor::contextual("Contextual").into(),
            Shape::Named(index) => self.named(*index),
            Shape::List(item) => Descriptor::list(self.shape(item)).into(),
            Shape::Map(key, value) => Descriptor::map(self.shape(key), self.shape(value)).into(),
        }
    }

    fn element(self: &Arc<Self>, field: &CompiledField) -> Element {
        let mut element = Element::new(&field.name, self.shape(&field.shape));
        if let Some(serial_name) = &field.serial_name {
            element = element.with_serial_name(serial_name);
        }
        if let Some(number) = field.number {
            element = element.number(number);
        }
        if let Some(encoding) = field.encoding {
            element = element.encoding(encoding);
        }
        if field.nullable {
            element = element.nullable();
        }
        if field.default {
            element = element.with_default();
        }
        element
    }

    fn subtype_element(self: &Arc<Self>, subtype: &CompiledSubtype) -> Element {
        let reference = self.named(subtype.index);
        let element = match &subtype.name {
            Some(name) => Element::new(name, reference),
            None => Element::branch(reference),
        };
        match subtype.number {
            Some(number) => element.number(number),
            None => element,
        }
    }
}

fn compile_field(index: &HashMap<String, usize>, owner: &str, field: &FieldDef) -> Result<CompiledField> {
    let shape = compile_shape(index, &field.ty)
        .with_context(|| format!("In field '{}.{}'", owner, field.name))?;
    Ok(CompiledField {
        name: field.name.clone(),
        serial_name: field.serial_name.clone(),
        shape,
        number: field.number,
        encoding: field.encoding.map(Into::into),
        nullable: field.nullable,
        default: field.default,
    })
}

fn compile_union(
    index: &HashMap<String, usize>,
    owner: &str,
    subtypes: &[SubtypeDef],
    open: bool,
) -> Result<Compiled> {
    let subtypes = subtypes
        .iter()
        .map(|subtype| {
            let (ty, name, number) = match subtype {
                SubtypeDef::Name(ty) => (ty, None, None),
                SubtypeDef::Detailed { ty, name, number } => (ty, name.clone(), *number),
            };
            match index.get(ty) {
                Some(&index) => Ok(CompiledSubtype { index, name, number }),
                None => bail!("Subtype '{}' of '{}' is not defined", ty, owner),
            }
        })
        .collect::<Result<_>>()?;
    Ok(Compiled::Union { open, subtypes })
}

fn compile_shape(index: &HashMap<String, usize>, expr: &TypeExpr) -> Result<Shape> {
    Ok(match expr {
        TypeExpr::Name(name) => match name.as_str() {
            "bool" => Shape::Primitive(PrimitiveKind::Boolean),
            "byte" => Shape::Primitive(PrimitiveKind::Byte),
            "short" => Shape::Primitive(PrimitiveKind::Short),
            "char" => Shape::Primitive(PrimitiveKind::Char),
            "int" => Shape::Primitive(PrimitiveKind::Int),
            "long" => Shape::Primitive(PrimitiveKind::Long),
            "float" => Shape::Primitive(PrimitiveKind::Float),
            "double" => Shape::Primitive(PrimitiveKind::Double),
            "string" => Shape::Primitive(PrimitiveKind::String),
            "bytes" => Shape::ByteArray,
            "contextual" => Shape::Contextual,
            other => match index.get(other) {
                Some(&index) => Shape::Named(index),
                None => bail!("Type '{}' is not defined", other),
            },
        },
        TypeExpr::List { list } => Shape::List(Box::new(compile_shape(index, list)?)),
        TypeExpr::Map { map: (key, value) } => Shape::Map(
            Box::new(compile_shape(index, key)?),
            Box::new(compile_shape(index, value)?),
        ),
    })
}
