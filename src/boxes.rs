use crate::error::{EncodeError, InvalidFourCC};
use crate::registry::Registry;
use crate::schema::{Count, FieldKind, Layout, ListBound};
use crate::stream::StreamRange;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const UUID: FourCC = FourCC(*b"uuid");

    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }

    fn is_printable(&self) -> bool {
        self.0.iter().all(|c| (32..=126).contains(c))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl FromStr for FourCC {
    type Err = InvalidFourCC;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match *s.as_bytes() {
            [a, b, c, d] => Ok(FourCC([a, b, c, d])),
            _ => Err(InvalidFourCC { len: s.len() }),
        }
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }
}

// Printable codes serialize as their 4-character text, anything else as 8 hex digits.
impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if self.is_printable() {
            s.serialize_str(&self.as_str_lossy())
        } else {
            s.serialize_str(&hex::encode(self.0))
        }
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        if let Ok(cc) = s.parse::<FourCC>() {
            return Ok(cc);
        }
        let mut out = [0u8; 4];
        hex::decode_to_slice(&s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(FourCC(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl fmt::Display for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxKey::FourCC(cc) => write!(f, "{cc}"),
            BoxKey::Uuid(u) => write!(f, "uuid:{}", hex::encode(u)),
        }
    }
}

/// How the size of a box is expressed on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeForm {
    /// 32-bit size field. Promoted to `Large` on encode when the box outgrows it.
    #[default]
    Compact,
    /// size=1 followed by a 64-bit largesize.
    Large,
    /// size=0: the box runs to the end of its container.
    ToEnd,
}

#[derive(Debug, Clone)]
pub struct BoxHeader {
    pub size: u64,          // declared total size, or 0 = to container end
    pub typ: FourCC,        // 4CC or b"uuid"
    pub uuid: Option<[u8; 16]>,
    pub header_size: u64,   // 8, 16, 24 or 32
    pub start: u64,         // offset of header start
    pub form: SizeForm,
}

impl BoxHeader {
    pub fn key(&self) -> BoxKey {
        match self.uuid {
            Some(u) => BoxKey::Uuid(u),
            None => BoxKey::FourCC(self.typ),
        }
    }

    /// Offset one past the last byte of the box.
    pub fn end(&self, container_end: u64) -> u64 {
        match self.form {
            SizeForm::ToEnd => container_end,
            _ => self.start + self.size,
        }
    }
}

/// Version and 24-bit flags of a full box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullBoxHeader {
    pub version: u8,
    pub flags: u32,
}

pub type FieldName = Cow<'static, str>;

/// Decoded field values, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fields(Vec<(FieldName, Value)>);

impl Fields {
    pub fn new() -> Self {
        Fields(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the value of `name`, or appends it when absent.
    pub fn insert(&mut self, name: impl Into<FieldName>, value: Value) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    // Descriptor lists are validated for unique names, so decoding can append.
    pub(crate) fn push(&mut self, name: &'static str, value: Value) {
        self.0.push((Cow::Borrowed(name), value));
    }

    pub fn with(mut self, name: impl Into<FieldName>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_ref(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<FieldName>> FromIterator<(N, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut f = Fields::new();
        for (n, v) in iter {
            f.insert(n, v);
        }
        f
    }
}

// Serialized as an ordered map so JSON output reads naturally.
impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = s.serialize_map(Some(self.0.len()))?;
        for (n, v) in &self.0 {
            map.serialize_entry(n.as_ref(), v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> serde::de::Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to values")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Fields::new();
                while let Some((name, value)) = access.next_entry::<String, crate::boxes::Value>()? {
                    if fields.contains(&name) {
                        return Err(serde::de::Error::custom(format_args!("duplicate field `{name}`")));
                    }
                    fields.0.push((Cow::Owned(name), value));
                }
                Ok(fields)
            }
        }

        d.deserialize_map(FieldsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    UInt(u64),
    Int(i64),
    FourCC(FourCC),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Record(Fields),
    Box(Box<Mp4Box>),
    Boxes(Vec<Mp4Box>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_fourcc(&self) -> Option<FourCC> {
        match *self {
            Value::FourCC(cc) => Some(cc),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Fields> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Boxes held directly by this value (none for scalars).
    pub fn nested_boxes(&self) -> &[Mp4Box] {
        match self {
            Value::Box(b) => std::slice::from_ref(b.as_ref()),
            Value::Boxes(v) => v,
            _ => &[],
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::FourCC(_) => "fourcc",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Box(_) => "box",
            Value::Boxes(_) => "boxes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Payload {
    /// Schema-declared fields in wire order.
    Fields(Fields),
    /// Child boxes of a plain container.
    Children(Vec<Mp4Box>),
    /// Opaque bytes (unknown boxes, free space).
    Raw(Vec<u8>),
    /// Large media kept in the source and copied through on encode.
    Stream(StreamRange),
}

/// One node of a decoded box tree.
///
/// `size` is the total size seen at decode time (or produced by the last
/// encode); it is derived data and takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mp4Box {
    pub typ: FourCC,
    #[serde(default, with = "uuid_hex", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<[u8; 16]>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub size_form: SizeForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<FullBoxHeader>,
    pub payload: Payload,
}

impl PartialEq for Mp4Box {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.uuid == other.uuid
            && self.size_form == other.size_form
            && self.full == other.full
            && self.payload == other.payload
    }
}

impl Eq for Mp4Box {}

impl Hash for Mp4Box {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.typ.hash(state);
        self.uuid.hash(state);
        self.size_form.hash(state);
        self.full.hash(state);
        self.payload.hash(state);
    }
}

impl Mp4Box {
    fn bare(typ: FourCC, payload: Payload) -> Self {
        Mp4Box {
            typ,
            uuid: None,
            size: 0,
            size_form: SizeForm::Compact,
            full: None,
            payload,
        }
    }

    pub fn new_container(typ: impl Into<FourCC>, children: Vec<Mp4Box>) -> Self {
        Self::bare(typ.into(), Payload::Children(children))
    }

    pub fn new_raw(typ: impl Into<FourCC>, bytes: Vec<u8>) -> Self {
        Self::bare(typ.into(), Payload::Raw(bytes))
    }

    pub fn new_fields(typ: impl Into<FourCC>, fields: Fields) -> Self {
        Self::bare(typ.into(), Payload::Fields(fields))
    }

    pub fn new_full(typ: impl Into<FourCC>, version: u8, flags: u32, fields: Fields) -> Self {
        let mut b = Self::bare(typ.into(), Payload::Fields(fields));
        b.full = Some(FullBoxHeader { version, flags });
        b
    }

    pub fn new_stream(typ: impl Into<FourCC>, range: StreamRange) -> Self {
        Self::bare(typ.into(), Payload::Stream(range))
    }

    pub fn new_uuid(uuid: [u8; 16], bytes: Vec<u8>) -> Self {
        let mut b = Self::bare(FourCC::UUID, Payload::Raw(bytes));
        b.uuid = Some(uuid);
        b
    }

    pub fn key(&self) -> BoxKey {
        match self.uuid {
            Some(u) => BoxKey::Uuid(u),
            None => BoxKey::FourCC(self.typ),
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.full.map(|h| h.version)
    }

    pub fn flags(&self) -> Option<u32> {
        self.full.map(|h| h.flags)
    }

    pub fn fields(&self) -> Option<&Fields> {
        match &self.payload {
            Payload::Fields(f) => Some(f),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|f| f.get(name))
    }

    /// Direct child boxes: container children, or boxes nested in fields
    /// (sample entries under `stsd`, codec config under `avc1`, ...).
    pub fn children(&self) -> impl Iterator<Item = &Mp4Box> {
        let (direct, fields): (&[Mp4Box], Option<&Fields>) = match &self.payload {
            Payload::Children(c) => (c, None),
            Payload::Fields(f) => (&[], Some(f)),
            _ => (&[], None),
        };
        direct.iter().chain(
            fields
                .into_iter()
                .flat_map(|f| f.iter().flat_map(|(_, v)| v.nested_boxes())),
        )
    }

    pub fn child(&self, typ: &[u8; 4]) -> Option<&Mp4Box> {
        self.children().find(|c| &c.typ.0 == typ)
    }

    pub fn with_field(mut self, name: impl Into<FieldName>, value: Value) -> Self {
        match &mut self.payload {
            Payload::Fields(f) => f.insert(name, value),
            other => *other = Payload::Fields(Fields::new().with(name, value)),
        }
        self
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.full.get_or_insert_with(FullBoxHeader::default).version = version;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.full.get_or_insert_with(FullBoxHeader::default).flags = flags & 0x00FF_FFFF;
        self
    }

    pub fn with_children(mut self, children: Vec<Mp4Box>) -> Self {
        self.payload = Payload::Children(children);
        self
    }

    pub fn with_size_form(mut self, form: SizeForm) -> Self {
        self.size_form = form;
        self
    }

    /// Replace a counted field (array, byte string or box list) and rewrite
    /// the integer field that holds its count, so the two cannot disagree.
    ///
    /// ```
    /// use isobox::{Value, default_registry};
    ///
    /// let stco = isobox::decode(&[
    ///     0, 0, 0, 20, b's', b't', b'c', b'o', 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 8,
    /// ])
    /// .unwrap()
    /// .boxes
    /// .remove(0);
    /// let offsets = Value::Array(vec![Value::UInt(8), Value::UInt(4096)]);
    /// let stco = stco.with_counted_array(default_registry(), "chunk_offset", offsets).unwrap();
    /// assert_eq!(stco.field("entry_count"), Some(&Value::UInt(2)));
    /// ```
    pub fn with_counted_array(self, registry: &Registry, name: &str, items: Value) -> Result<Self, EncodeError> {
        let key = self.key();
        let Some(Layout::Fields(descs)) = registry.lookup(&key).map(|s| s.layout) else {
            return Err(EncodeError::UnknownSchema { key });
        };
        let d = descs
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| EncodeError::UnknownField { typ: self.typ, field: name.to_owned() })?;

        let (expected, count) = match d.kind {
            FieldKind::Array { count, .. } => ("array", count),
            FieldKind::Bytes(count) => ("bytes", count),
            FieldKind::Boxes(ListBound::Count(c)) => ("boxes", Count::Field(c)),
            FieldKind::Boxes(ListBound::ToEnd) => ("boxes", Count::ToEnd),
            _ => ("array", Count::ToEnd),
        };
        let len = match (&items, expected) {
            (Value::Array(a), "array") => a.len(),
            (Value::Bytes(b), "bytes") => b.len(),
            (Value::Boxes(b), "boxes") => b.len(),
            (other, _) => {
                return Err(EncodeError::TypeMismatch {
                    typ: self.typ,
                    field: d.name,
                    expected,
                    found: other.kind_name(),
                });
            }
        };

        let updated = self.with_field(d.name, items);
        Ok(match count {
            Count::Field(c) => updated.with_field(c, Value::UInt(len as u64)),
            _ => updated,
        })
    }
}

/// Top-level boxes of a file or fragment, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxTree {
    pub boxes: Vec<Mp4Box>,
}

impl BoxTree {
    pub fn new(boxes: Vec<Mp4Box>) -> Self {
        BoxTree { boxes }
    }

    /// First box matching a slash-separated path such as `moov/trak/mdia/mdhd`.
    pub fn find(&self, path: &str) -> Option<&Mp4Box> {
        self.find_all(path).into_iter().next()
    }

    /// Every box matching a slash-separated path, in file order.
    pub fn find_all(&self, path: &str) -> Vec<&Mp4Box> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut out = Vec::new();
        for b in &self.boxes {
            collect_path(b, &segments, &mut out);
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn collect_path<'a>(b: &'a Mp4Box, segments: &[&str], out: &mut Vec<&'a Mp4Box>) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if b.typ.as_str_lossy() != *first {
        return;
    }
    if rest.is_empty() {
        out.push(b);
        return;
    }
    for c in b.children() {
        collect_path(c, rest, out);
    }
}

mod uuid_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<[u8; 16]>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(u) => s.serialize_some(&hex::encode(u)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 16]>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let mut out = [0u8; 16];
        hex::decode_to_slice(&s, &mut out).map_err(serde::de::Error::custom)?;
        Ok(Some(out))
    }
}
