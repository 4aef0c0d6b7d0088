//! Generic field codec: one descriptor list drives both directions.

use crate::boxes::{FourCC, Fields, Value};
use crate::error::{DecodeError, EncodeError};
use crate::parser::Decoder;
use crate::schema::{Count, Element, FieldDescriptor, FieldKind, Gate, IntSpec, IntType, ListBound};
use crate::writer::{Encoder, Out};
use std::io::{Read, Seek};

fn low_bits(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

// ---------- Decode ----------

impl<R: Read + Seek> Decoder<'_, R> {
    /// Decode a descriptor list that ends no later than `end`.
    pub(crate) fn decode_fields(
        &mut self,
        typ: FourCC,
        descs: &'static [FieldDescriptor],
        end: u64,
        gate: Gate,
    ) -> Result<Fields, DecodeError> {
        let mut out = Fields::new();
        let mut host_word = 0u64;

        for d in descs {
            if !gate.admits(&d.presence, &out) {
                continue;
            }
            let value = match d.kind {
                FieldKind::Int(spec) => {
                    let t = resolve_for_decode(typ, d.name, spec, gate)?;
                    self.read_int(end, t)?
                }
                FieldKind::Bits { host, offset, width } => {
                    if offset == 0 {
                        host_word = self.read_uint(end, host.bytes)?;
                    }
                    let shift = host.bits() - offset as u32 - width as u32;
                    Value::UInt((host_word >> shift) & low_bits(width as u32))
                }
                FieldKind::FourCC => Value::FourCC(self.read_fourcc(end)?),
                FieldKind::Bytes(count) => {
                    let n = match count {
                        Count::Fixed(n) => n as u64,
                        Count::Field(name) => out.uint(name).unwrap_or(0),
                        Count::ToEnd => end.saturating_sub(self.position()),
                    };
                    Value::Bytes(self.read_vec(end, n)?)
                }
                FieldKind::Array { element, count } => {
                    Value::Array(self.decode_array(typ, d.name, element, count, &out, end, gate)?)
                }
                FieldKind::Box => Value::Box(Box::new(self.decode_box(end, false)?)),
                FieldKind::Boxes(ListBound::Count(name)) => {
                    let n = out.uint(name).unwrap_or(0);
                    Value::Boxes(self.decode_counted(end, n)?)
                }
                FieldKind::Boxes(ListBound::ToEnd) => Value::Boxes(self.decode_list_to_end(end)?),
                FieldKind::RawToEnd => {
                    let n = end.saturating_sub(self.position());
                    Value::Bytes(self.read_vec(end, n)?)
                }
            };
            out.push(d.name, value);
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_array(
        &mut self,
        typ: FourCC,
        name: &'static str,
        element: Element,
        count: Count,
        scope: &Fields,
        end: u64,
        gate: Gate,
    ) -> Result<Vec<Value>, DecodeError> {
        let fixed = match count {
            Count::Fixed(n) => Some(n as u64),
            Count::Field(f) => Some(scope.uint(f).unwrap_or(0)),
            Count::ToEnd => None,
        };

        let mut items = match fixed {
            // A hostile count must not drive the allocation.
            Some(n) => Vec::with_capacity(n.min(end.saturating_sub(self.position())) as usize),
            None => Vec::new(),
        };
        match fixed {
            Some(n) => {
                for _ in 0..n {
                    items.push(self.decode_element(typ, name, element, end, gate)?);
                }
            }
            None => {
                while self.position() < end {
                    items.push(self.decode_element(typ, name, element, end, gate)?);
                }
            }
        }
        Ok(items)
    }

    fn decode_element(
        &mut self,
        typ: FourCC,
        name: &'static str,
        element: Element,
        end: u64,
        gate: Gate,
    ) -> Result<Value, DecodeError> {
        Ok(match element {
            Element::Int(spec) => {
                let t = resolve_for_decode(typ, name, spec, gate)?;
                self.read_int(end, t)?
            }
            Element::FourCC => Value::FourCC(self.read_fourcc(end)?),
            Element::Bytes(n) => Value::Bytes(self.read_vec(end, n as u64)?),
            Element::Record(inner) => Value::Record(self.decode_fields(typ, inner, end, gate)?),
        })
    }
}

fn resolve_for_decode(typ: FourCC, field: &'static str, spec: IntSpec, gate: Gate) -> Result<IntType, DecodeError> {
    spec.resolve(gate.version).ok_or(DecodeError::InvalidVersion {
        typ,
        field,
        version: gate.version.unwrap_or(0),
    })
}

// ---------- Encode ----------

impl Encoder<'_> {
    pub(crate) fn encode_fields<O: Out>(
        &mut self,
        typ: FourCC,
        descs: &'static [FieldDescriptor],
        fields: &Fields,
        gate: Gate,
        out: &mut O,
    ) -> Result<(), EncodeError> {
        let mut host_word = 0u64;

        for d in descs {
            if !gate.admits(&d.presence, fields) {
                if fields.contains(d.name) {
                    return Err(EncodeError::UnexpectedField { typ, field: d.name });
                }
                continue;
            }
            let value = fields
                .get(d.name)
                .ok_or(EncodeError::MissingField { typ, field: d.name })?;

            match d.kind {
                FieldKind::Int(spec) => {
                    let t = resolve_for_encode(typ, d.name, spec, gate)?;
                    out.put_uint(int_bits(typ, d.name, value, t)?, t.bytes)?;
                }
                FieldKind::Bits { host, offset, width } => {
                    let v = expect_uint(typ, d.name, value)?;
                    if v > low_bits(width as u32) {
                        return Err(EncodeError::OutOfRange { typ, field: d.name, bits: width as u32 });
                    }
                    if offset == 0 {
                        host_word = 0;
                    }
                    let shift = host.bits() - offset as u32 - width as u32;
                    host_word |= v << shift;
                    if offset as u32 + width as u32 == host.bits() {
                        out.put_uint(host_word, host.bytes)?;
                    }
                }
                FieldKind::FourCC => out.put(&expect_fourcc(typ, d.name, value)?.0)?,
                FieldKind::Bytes(count) => {
                    let bytes = value.as_bytes().ok_or_else(|| mismatch(typ, d.name, "bytes", value))?;
                    check_count(typ, d.name, count, fields, bytes.len())?;
                    out.put(bytes)?;
                }
                FieldKind::Array { element, count } => {
                    let items = value.as_array().ok_or_else(|| mismatch(typ, d.name, "array", value))?;
                    check_count(typ, d.name, count, fields, items.len())?;
                    for item in items {
                        self.encode_element(typ, d.name, element, item, gate, out)?;
                    }
                }
                FieldKind::Box => match value {
                    Value::Box(b) => out.put_box(self, b, false)?,
                    other => return Err(mismatch(typ, d.name, "box", other)),
                },
                FieldKind::Boxes(bound) => {
                    let Value::Boxes(kids) = value else {
                        return Err(mismatch(typ, d.name, "boxes", value));
                    };
                    if let ListBound::Count(name) = bound {
                        check_count(typ, d.name, Count::Field(name), fields, kids.len())?;
                    }
                    self.encode_list(kids, out)?;
                }
                FieldKind::RawToEnd => {
                    let bytes = value.as_bytes().ok_or_else(|| mismatch(typ, d.name, "bytes", value))?;
                    out.put(bytes)?;
                }
            }
        }

        // Extra names would be silently dropped on the wire.
        if let Some((name, _)) = fields.iter().find(|(n, _)| !descs.iter().any(|d| d.name == *n)) {
            tracing::debug!(typ = %typ, field = name, "field not in schema");
            return Err(EncodeError::UnknownField { typ, field: name.to_owned() });
        }
        Ok(())
    }

    fn encode_element<O: Out>(
        &mut self,
        typ: FourCC,
        name: &'static str,
        element: Element,
        item: &Value,
        gate: Gate,
        out: &mut O,
    ) -> Result<(), EncodeError> {
        match element {
            Element::Int(spec) => {
                let t = resolve_for_encode(typ, name, spec, gate)?;
                out.put_uint(int_bits(typ, name, item, t)?, t.bytes)
            }
            Element::FourCC => out.put(&expect_fourcc(typ, name, item)?.0),
            Element::Bytes(n) => {
                let bytes = item.as_bytes().ok_or_else(|| mismatch(typ, name, "bytes", item))?;
                check_count(typ, name, Count::Fixed(n), &Fields::new(), bytes.len())?;
                out.put(bytes)
            }
            Element::Record(inner) => {
                let rec = item.as_record().ok_or_else(|| mismatch(typ, name, "record", item))?;
                self.encode_fields(typ, inner, rec, gate, out)
            }
        }
    }
}

fn resolve_for_encode(typ: FourCC, field: &'static str, spec: IntSpec, gate: Gate) -> Result<IntType, EncodeError> {
    spec.resolve(gate.version).ok_or(EncodeError::InvalidVersion {
        typ,
        field,
        version: gate.version,
    })
}

fn mismatch(typ: FourCC, field: &'static str, expected: &'static str, found: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        typ,
        field,
        expected,
        found: found.kind_name(),
    }
}

fn expect_uint(typ: FourCC, field: &'static str, v: &Value) -> Result<u64, EncodeError> {
    match *v {
        Value::UInt(n) => Ok(n),
        Value::Int(n) => u64::try_from(n).map_err(|_| EncodeError::OutOfRange { typ, field, bits: 64 }),
        _ => Err(mismatch(typ, field, "uint", v)),
    }
}

fn expect_fourcc(typ: FourCC, field: &'static str, v: &Value) -> Result<FourCC, EncodeError> {
    v.as_fourcc().ok_or_else(|| mismatch(typ, field, "fourcc", v))
}

/// Range-check an integer value and return its two's-complement bits,
/// truncated to the wire width.
fn int_bits(typ: FourCC, field: &'static str, v: &Value, t: IntType) -> Result<u64, EncodeError> {
    let bits = t.bits();
    let out_of_range = || EncodeError::OutOfRange { typ, field, bits };
    if !t.signed {
        let n = match *v {
            Value::UInt(n) => n,
            Value::Int(n) => u64::try_from(n).map_err(|_| out_of_range())?,
            _ => return Err(mismatch(typ, field, "uint", v)),
        };
        return if n > low_bits(bits) { Err(out_of_range()) } else { Ok(n) };
    }

    let n = match *v {
        Value::Int(n) => n,
        Value::UInt(n) => i64::try_from(n).map_err(|_| out_of_range())?,
        _ => return Err(mismatch(typ, field, "int", v)),
    };
    if bits < 64 {
        let (min, max) = (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1);
        if n < min || n > max {
            return Err(out_of_range());
        }
    }
    Ok(n as u64 & low_bits(bits))
}

fn check_count(typ: FourCC, field: &'static str, count: Count, scope: &Fields, len: usize) -> Result<(), EncodeError> {
    let declared = match count {
        Count::Fixed(n) => n as u64,
        Count::Field(name) => scope.uint(name).unwrap_or(0),
        Count::ToEnd => return Ok(()),
    };
    if declared != len as u64 {
        return Err(EncodeError::ArrayLengthMismatch {
            typ,
            field,
            count: declared,
            len: len as u64,
        });
    }
    Ok(())
}
