//! Binary record marshaling.
//!
//! Native structures are fixed-layout byte records read by offset, not by
//! name. Each layout is an explicitly declared, ordered table of fields,
//! never inferred from a value's shape, because any deviation from the
//! engine's declared order or widths is undefined behavior on the native
//! side, not a catchable error. Layout tables live in
//! [`layouts`](crate::layouts) and are checked against their expected total
//! sizes at compile time.
//!
//! All integer fields are little-endian, matching the engine's on-disk and
//! in-memory representation.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{GroveError, GroveResult};

/// Declared type of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    /// Fixed-size byte sub-array.
    Bytes(usize),
    /// Reserved space, zero-filled on encode, skipped on decode.
    Spare(usize),
}

impl FieldKind {
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 => 4,
            FieldKind::U64 => 8,
            FieldKind::Bytes(n) | FieldKind::Spare(n) => *n,
        }
    }
}

/// One field in a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A versioned native record layout: an ordered field table.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl RecordLayout {
    /// Total declared size in bytes.
    pub const fn byte_len(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].kind.width();
            i += 1;
        }
        total
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A decoded or under-construction field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
    /// Placeholder for reserved space; carries no data.
    Spare,
}

impl FieldValue {
    fn zero_of(kind: FieldKind) -> Self {
        match kind {
            FieldKind::U8 => FieldValue::U8(0),
            FieldKind::U16 => FieldValue::U16(0),
            FieldKind::U32 => FieldValue::U32(0),
            FieldKind::U64 => FieldValue::U64(0),
            FieldKind::Bytes(n) => FieldValue::Bytes(vec![0; n]),
            FieldKind::Spare(_) => FieldValue::Spare,
        }
    }

    fn matches(&self, kind: FieldKind) -> bool {
        match (self, kind) {
            (FieldValue::U8(_), FieldKind::U8)
            | (FieldValue::U16(_), FieldKind::U16)
            | (FieldValue::U32(_), FieldKind::U32)
            | (FieldValue::U64(_), FieldKind::U64)
            | (FieldValue::Spare, FieldKind::Spare(_)) => true,
            (FieldValue::Bytes(b), FieldKind::Bytes(n)) => b.len() == n,
            _ => false,
        }
    }
}

/// A structured value tied to a declared layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    layout: &'static RecordLayout,
    values: Vec<FieldValue>,
}

impl Record {
    /// Creates a record with every field zeroed.
    pub fn new(layout: &'static RecordLayout) -> Self {
        Self {
            layout,
            values: layout.fields.iter().map(|f| FieldValue::zero_of(f.kind)).collect(),
        }
    }

    pub fn layout(&self) -> &'static RecordLayout {
        self.layout
    }

    /// Sets a field by name. The value must match the declared kind. A
    /// byte sub-array shorter than its declared width is zero-padded up to
    /// it; a longer one is rejected.
    pub fn set(&mut self, name: &str, value: FieldValue) -> GroveResult<()> {
        let idx = self.layout.field_index(name).ok_or_else(|| {
            GroveError::invalid_parameter(format!("no field '{name}' in {}", self.layout.name))
        })?;
        let kind = self.layout.fields[idx].kind;
        if matches!(kind, FieldKind::Spare(_)) {
            return Err(GroveError::invalid_parameter(format!(
                "field '{name}' in {} is reserved",
                self.layout.name
            )));
        }
        let value = match (value, kind) {
            (FieldValue::Bytes(mut b), FieldKind::Bytes(n)) if b.len() < n => {
                b.resize(n, 0);
                FieldValue::Bytes(b)
            }
            (value, _) => value,
        };
        if !value.matches(kind) {
            return Err(GroveError::invalid_parameter(format!(
                "value for '{name}' does not match declared {kind:?}"
            )));
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Returns a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.layout.field_index(name).map(|i| &self.values[i])
    }

    pub fn u16(&self, name: &str) -> Option<u16> {
        match self.get(name) {
            Some(FieldValue::U16(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn u32(&self, name: &str) -> Option<u32> {
        match self.get(name) {
            Some(FieldValue::U32(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        match self.get(name) {
            Some(FieldValue::U64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        match self.get(name) {
            Some(FieldValue::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    /// Encodes the record into a buffer of exactly the layout's declared
    /// size, fields in declared order, reserved space zero-filled.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.layout.byte_len()];
        let mut offset = 0;
        for (def, value) in self.layout.fields.iter().zip(&self.values) {
            let width = def.kind.width();
            let slot = &mut buf[offset..offset + width];
            match value {
                FieldValue::U8(v) => slot[0] = *v,
                FieldValue::U16(v) => LittleEndian::write_u16(slot, *v),
                FieldValue::U32(v) => LittleEndian::write_u32(slot, *v),
                FieldValue::U64(v) => LittleEndian::write_u64(slot, *v),
                FieldValue::Bytes(b) => slot.copy_from_slice(b),
                FieldValue::Spare => {} // already zero
            }
            offset += width;
        }
        buf
    }
}

/// Decodes `buf` against `layout`.
///
/// Fails with [`GroveError::MalformedRecord`] if the buffer is shorter than
/// the layout's declared size. Trailing bytes beyond the declared size are
/// ignored, matching how the engine hands back records inside larger
/// buffers.
pub fn decode(layout: &'static RecordLayout, buf: &[u8]) -> GroveResult<Record> {
    let expected = layout.byte_len();
    if buf.len() < expected {
        return Err(GroveError::MalformedRecord {
            layout: layout.name,
            expected,
            actual: buf.len(),
        });
    }

    let mut values = Vec::with_capacity(layout.fields.len());
    let mut offset = 0;
    for def in layout.fields {
        let width = def.kind.width();
        let slot = &buf[offset..offset + width];
        values.push(match def.kind {
            FieldKind::U8 => FieldValue::U8(slot[0]),
            FieldKind::U16 => FieldValue::U16(LittleEndian::read_u16(slot)),
            FieldKind::U32 => FieldValue::U32(LittleEndian::read_u32(slot)),
            FieldKind::U64 => FieldValue::U64(LittleEndian::read_u64(slot)),
            FieldKind::Bytes(_) => FieldValue::Bytes(slot.to_vec()),
            FieldKind::Spare(_) => FieldValue::Spare,
        });
        offset += width;
    }
    Ok(Record { layout, values })
}
