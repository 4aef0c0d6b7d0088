//! Declarative description of box payloads.
//!
//! A [`SchemaEntry`] says whether a box is a full box and how its payload is
//! laid out; for field payloads, an ordered list of [`FieldDescriptor`]s drives
//! the generic field codec in both directions.

use crate::boxes::BoxKey;

/// Integer wire type: width in bytes (1, 2, 4 or 8) and signedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntType {
    pub bytes: u8,
    pub signed: bool,
}

impl IntType {
    pub const U8: IntType = IntType { bytes: 1, signed: false };
    pub const U16: IntType = IntType { bytes: 2, signed: false };
    pub const U32: IntType = IntType { bytes: 4, signed: false };
    pub const U64: IntType = IntType { bytes: 8, signed: false };
    pub const I8: IntType = IntType { bytes: 1, signed: true };
    pub const I16: IntType = IntType { bytes: 2, signed: true };
    pub const I32: IntType = IntType { bytes: 4, signed: true };
    pub const I64: IntType = IntType { bytes: 8, signed: true };

    pub const fn bits(self) -> u32 {
        self.bytes as u32 * 8
    }
}

/// Maps a full-box version to the wire type of a field.
pub type VersionTable = &'static [(u8, IntType)];

/// 32-bit in version 0, 64-bit in version 1 (times, durations, offsets).
pub const V0_U32_V1_U64: VersionTable = &[(0, IntType::U32), (1, IntType::U64)];
pub const V0_I32_V1_I64: VersionTable = &[(0, IntType::I32), (1, IntType::I64)];
/// Unsigned in version 0, signed in version 1 (composition offsets).
pub const V0_U32_V1_I32: VersionTable = &[(0, IntType::U32), (1, IntType::I32)];
pub const V0_U16_V1_U32: VersionTable = &[(0, IntType::U16), (1, IntType::U32)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSpec {
    Fixed(IntType),
    ByVersion(VersionTable),
}

impl IntSpec {
    /// Wire type for the given version, `None` when the table has no entry.
    pub fn resolve(&self, version: Option<u8>) -> Option<IntType> {
        match *self {
            IntSpec::Fixed(t) => Some(t),
            IntSpec::ByVersion(table) => {
                let v = version?;
                table.iter().find(|(tv, _)| *tv == v).map(|(_, t)| *t)
            }
        }
    }
}

/// Number of elements (or bytes) in a sized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Fixed(u32),
    /// Value of an earlier integer field in the same scope.
    Field(&'static str),
    /// Everything up to the end of the enclosing payload.
    ToEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListBound {
    Count(&'static str),
    ToEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    Int(IntSpec),
    FourCC,
    Bytes(u32),
    Record(&'static [FieldDescriptor]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int(IntSpec),
    /// `width` bits starting `offset` bits from the MSB of a shared host word.
    Bits { host: IntType, offset: u8, width: u8 },
    FourCC,
    Bytes(Count),
    Array { element: Element, count: Count },
    Box,
    Boxes(ListBound),
    RawToEnd,
}

impl FieldKind {
    pub(crate) fn is_to_end(&self) -> bool {
        matches!(
            self,
            FieldKind::RawToEnd
                | FieldKind::Bytes(Count::ToEnd)
                | FieldKind::Array { count: Count::ToEnd, .. }
                | FieldKind::Boxes(ListBound::ToEnd)
        )
    }
}

/// When a field appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Always,
    MinVersion(u8),
    /// Any of these flag bits is set.
    FlagsAny(u32),
    /// An earlier field in the same scope holds this value.
    FieldIs(&'static str, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldDescriptor {
            name,
            kind,
            presence: Presence::Always,
        }
    }

    pub const fn when(self, presence: Presence) -> Self {
        FieldDescriptor { presence, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Fields(&'static [FieldDescriptor]),
    /// Child boxes up to the end of the payload.
    Container,
    /// Opaque bytes.
    Raw,
    /// Large media payload left in the source.
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaEntry {
    pub key: BoxKey,
    /// Human-readable name, e.g. "Track Header Box".
    pub name: &'static str,
    pub full_box: bool,
    pub layout: Layout,
}

/// Scope a descriptor list is evaluated in: the enclosing full-box header
/// plus the fields already seen at this level.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Gate {
    pub version: Option<u8>,
    pub flags: Option<u32>,
}

impl Gate {
    pub fn admits(&self, presence: &Presence, seen: &crate::boxes::Fields) -> bool {
        match *presence {
            Presence::Always => true,
            Presence::MinVersion(v) => self.version.is_some_and(|have| have >= v),
            Presence::FlagsAny(mask) => self.flags.is_some_and(|f| f & mask != 0),
            Presence::FieldIs(name, want) => seen.uint(name) == Some(want),
        }
    }
}
