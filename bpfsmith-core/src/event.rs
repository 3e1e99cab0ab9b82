//! Declarative ring-buffer event descriptors with auto-offsetting fields
//! (spec.md §4.4, component C5).

use std::collections::HashMap;

use crate::assembler::Item;
use crate::error::ConstructionError;
use crate::ops;
use crate::reg::IntoReg;

/// Scalar field types a ring-buffer event may contain. `count` lets a
/// field declare itself as a fixed-size array of the base type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Char,
    Ptr,
}

impl FieldType {
    const fn byte_size(self) -> u8 {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Char => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::Ptr => 8,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct FieldEntry {
    offset: u32,
    size: u32,
    ty: FieldType,
}

/// An ordered field list with a name-keyed offset/size/type index and a
/// total size, computed by ascending accumulation over declaration order.
/// Packing is tight: the descriptor never inserts padding of its own.
///
/// Serializable behind the `serde` feature so a descriptor built in one
/// process (e.g. a loader) can be shipped to another that only needs to
/// decode events against it, without relinking this crate's builders.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventDescriptor {
    name: String,
    total_size: u32,
    index: HashMap<String, FieldEntry>,
    order: Vec<String>,
}

/// One field declaration: `(name, type, count)`. `count` must be `>= 1`.
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub count: u32,
}

impl FieldSpec {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, count: 1 }
    }

    pub const fn array(name: &'static str, ty: FieldType, count: u32) -> Self {
        Self { name, ty, count }
    }
}

impl EventDescriptor {
    /// Build a descriptor from an ordered field list, computing each
    /// field's byte offset by ascending accumulation of prior field
    /// sizes.
    pub fn define(name: impl Into<String>, fields: &[FieldSpec]) -> Result<Self, ConstructionError> {
        let mut offset = 0u32;
        let mut index = HashMap::with_capacity(fields.len());
        let mut order = Vec::with_capacity(fields.len());
        for field in fields {
            if field.count == 0 {
                return Err(ConstructionError::InvalidSize(0));
            }
            let size = field.ty.byte_size() as u32 * field.count;
            index.insert(
                field.name.to_string(),
                FieldEntry {
                    offset,
                    size,
                    ty: field.ty,
                },
            );
            order.push(field.name.to_string());
            offset += size;
        }
        Ok(Self {
            name: name.into(),
            total_size: offset,
            index,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn entry(&self, field: &str) -> Result<&FieldEntry, ConstructionError> {
        self.index
            .get(field)
            .ok_or_else(|| ConstructionError::UnknownField(field.to_string()))
    }

    pub fn field_offset(&self, field: &str) -> Result<u32, ConstructionError> {
        Ok(self.entry(field)?.offset)
    }

    pub fn field_size(&self, field: &str) -> Result<u32, ConstructionError> {
        Ok(self.entry(field)?.size)
    }

    pub fn field_type(&self, field: &str) -> Result<FieldType, ConstructionError> {
        Ok(self.entry(field)?.ty)
    }

    /// Emit one `stx` storing `value_reg` into `field` of the event
    /// pointed to by `event_reg`, sized according to the field's type.
    pub fn store_field(
        &self,
        event_reg: impl IntoReg,
        field: &str,
        value_reg: impl IntoReg,
    ) -> Result<Item, ConstructionError> {
        let entry = self.entry(field)?;
        let event_reg = event_reg.into_reg()?;
        ops::stx(event_reg, entry.offset as i16, value_reg, entry.ty.byte_size())
    }

    /// Emit one `st` storing immediate `imm` into `field`.
    pub fn store_imm(
        &self,
        event_reg: impl IntoReg,
        field: &str,
        imm: i32,
    ) -> Result<Item, ConstructionError> {
        let entry = self.entry(field)?;
        let event_reg = event_reg.into_reg()?;
        ops::st(event_reg, entry.offset as i16, imm, entry.ty.byte_size())
    }
}

/// A field value to store: either a register or an immediate.
pub enum FieldValue<R> {
    Reg(R),
    Imm(i32),
}

impl EventDescriptor {
    /// Compose several field stores into one sequence, in iteration
    /// order of `values`.
    pub fn store_fields<R: IntoReg + Copy>(
        &self,
        event_reg: impl IntoReg + Copy,
        values: &[(&str, FieldValue<R>)],
    ) -> Result<Vec<Item>, ConstructionError> {
        let mut items = Vec::with_capacity(values.len());
        for (field, value) in values {
            let item = match value {
                FieldValue::Reg(r) => self.store_field(event_reg, field, *r)?,
                FieldValue::Imm(imm) => self.store_imm(event_reg, field, *imm)?,
            };
            items.push(item);
        }
        Ok(items)
    }
}
