//! Field translation: label, type, name and number of one element.

use crate::descriptor::{Descriptor, Element};
use crate::error::{Error, Result};
use crate::naming::identifier;
use crate::proto::classify::{classify, TypeKind};
use crate::proto::model::{FieldSlot, FieldType, Label, ScalarType, TypePath};
use crate::MAX_FIELD_NUMBER;
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::trace;

/// Field numbers protobuf keeps for its own implementation
const RESERVED_NUMBERS: RangeInclusive<u32> = 19_000..=19_999;

/// Resolves named types to the place they are generated at.
///
/// Implemented by the emitter; the translator never decides where a type's
/// definition lives.
pub(crate) trait ResolveType {
    /// Returns the path of the message generated for `descriptor`
    fn message(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath>;

    /// Returns the path of the enum generated for `descriptor`
    fn enumeration(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath>;

    /// Returns the path of the union message generated for `descriptor`
    fn union(&mut self, descriptor: &Arc<Descriptor>) -> Result<TypePath>;

    /// Synthesizes the entry message of the map field `field`
    fn map_entry(&mut self, field: &str, key: &FieldType, value: &FieldType) -> Result<()>;
}

/// Translates element `index` of the message `owner` into a field.
pub(crate) fn translate(
    owner: &str,
    index: usize,
    element: &Element,
    contextual: ScalarType,
    resolver: &mut impl ResolveType,
) -> Result<FieldSlot> {
    let serial = element.effective_name();
    let name = identifier(serial);
    let qualified = format!("{}.{}", owner, serial);
    let number = field_number(owner, &name, index, element.explicit_number())?;

    let descriptor = element
        .descriptor()
        .ok_or_else(|| Error::unsupported(&qualified, "field has no type"))?
        .resolve();
    let kind = classify(&descriptor, &qualified, element.integer_encoding(), contextual)?;

    let (label, ty) = match kind {
        TypeKind::Repeated(item) => (Label::Repeated, resolve(*item, &qualified, resolver)?),
        TypeKind::Map { key, value } => {
            let key = resolve(*key, &qualified, resolver)?;
            let value = resolve(*value, &qualified, resolver)?;
            resolver.map_entry(&name, &key, &value)?;
            (
                Label::Map,
                FieldType::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                },
            )
        }
        other => (Label::Optional, resolve(other, &qualified, resolver)?),
    };

    trace!(
        "{} -> {} {} = {}",
        qualified,
        label.keyword().unwrap_or("map"),
        ty.type_name(),
        number
    );

    Ok(FieldSlot {
        label,
        ty,
        serial_name: (name != serial).then(|| serial.to_string()),
        name,
        number,
        nullable: element.is_nullable(),
        has_default: element.has_default(),
    })
}

/// Turns a single-valued kind into a field type
fn resolve(kind: TypeKind, field: &str, resolver: &mut impl ResolveType) -> Result<FieldType> {
    match kind {
        TypeKind::Scalar(scalar) | TypeKind::Contextual(scalar) => Ok(FieldType::Scalar(scalar)),
        TypeKind::Enum(descriptor) => resolver.enumeration(&descriptor).map(FieldType::Enum),
        TypeKind::Union(descriptor) => resolver.union(&descriptor).map(FieldType::Message),
        TypeKind::Message(descriptor) => resolver.message(&descriptor).map(FieldType::Message),
        TypeKind::Repeated(_) | TypeKind::Map { .. } => Err(Error::unsupported(
            field,
            "nested containers have no proto2 form",
        )),
    }
}

/// Explicit number when pinned, else the 1-based position
fn field_number(owner: &str, field: &str, index: usize, explicit: Option<u32>) -> Result<u32> {
    let Some(number) = explicit else {
        return Ok(index as u32 + 1);
    };

    if number == 0 || number > MAX_FIELD_NUMBER || RESERVED_NUMBERS.contains(&number) {
        return Err(Error::InvalidFieldNumber {
            message: owner.to_string(),
            field: field.to_string(),
            number,
            max: MAX_FIELD_NUMBER,
        });
    }
    Ok(number)
}

/// Tracks the names and numbers already claimed inside one message
#[derive(Debug)]
pub(crate) struct FieldRegistry {
    owner: String,
    numbers: HashMap<u32, String>,
    names: HashSet<String>,
}

impl FieldRegistry {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            numbers: HashMap::new(),
            names: HashSet::new(),
        }
    }

    /// Claims the slot's name and number, failing on a clash
    pub(crate) fn claim(&mut self, slot: &FieldSlot) -> Result<()> {
        if !self.names.insert(slot.name.clone()) {
            return Err(Error::DuplicateFieldName {
                message: self.owner.clone(),
                name: slot.name.clone(),
            });
        }
        if let Some(first) = self.numbers.get(&slot.number) {
            return Err(Error::DuplicateFieldNumber {
                message: self.owner.clone(),
                number: slot.number,
                first: first.clone(),
                second: slot.name.clone(),
            });
        }
        self.numbers.insert(slot.number, slot.name.clone());
        Ok(())
    }
}
