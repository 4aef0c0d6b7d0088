//! Encoding side of the tree walker.
//!
//! Encoding runs twice over the same code path. The measuring pass validates
//! every box and records its header form and total size in pre-order; the
//! emitting pass replays that plan while writing. Sizes are therefore known
//! before any parent header is written, and a tree that fails validation
//! produces no output at all.

use crate::boxes::{FourCC, FullBoxHeader, Mp4Box, Payload, SizeForm};
use crate::error::EncodeError;
use crate::header::{plan_size, write_box_header};
use crate::registry::Registry;
use crate::schema::{Gate, Layout};
use crate::stream::{ReadSeek, StreamError, StreamRange};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;
use std::sync::atomic::AtomicBool;

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Sink shared by both passes.
pub(crate) trait Out {
    fn put(&mut self, bytes: &[u8]) -> Result<()>;
    fn put_uint(&mut self, v: u64, bytes: u8) -> Result<()>;
    fn put_stream(&mut self, typ: FourCC, range: StreamRange) -> Result<()>;
    fn put_box(&mut self, enc: &mut Encoder<'_>, b: &Mp4Box, may_run_to_end: bool) -> Result<()>;

    fn put_full_header(&mut self, h: FullBoxHeader) -> Result<()> {
        self.put_uint(h.version as u64, 1)?;
        self.put_uint((h.flags & 0x00FF_FFFF) as u64, 3)
    }
}

pub(crate) struct Measure {
    len: u64,
    // Length of the source stream payloads are copied from, if there is one.
    source_len: Option<u64>,
}

impl Out for Measure {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.len += bytes.len() as u64;
        Ok(())
    }

    fn put_uint(&mut self, _v: u64, bytes: u8) -> Result<()> {
        self.len += bytes as u64;
        Ok(())
    }

    fn put_stream(&mut self, typ: FourCC, range: StreamRange) -> Result<()> {
        let source_len = self.source_len.ok_or(EncodeError::StreamWithoutSource { typ })?;
        if range.end() > source_len {
            return Err(StreamError::Truncated {
                expected: range.len,
                copied: source_len.saturating_sub(range.offset).min(range.len),
            }
            .into());
        }
        self.len += range.len;
        Ok(())
    }

    fn put_box(&mut self, enc: &mut Encoder<'_>, b: &Mp4Box, may_run_to_end: bool) -> Result<()> {
        self.len += enc.measure_box(b, may_run_to_end, self.source_len)?;
        Ok(())
    }
}

pub(crate) struct Emit<'a, W: ?Sized> {
    w: &'a mut W,
    source: Option<&'a mut dyn ReadSeek>,
    cancel: Option<&'a AtomicBool>,
    written: u64,
}

impl<W: Write + ?Sized> Out for Emit<'_, W> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.w.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn put_uint(&mut self, v: u64, bytes: u8) -> Result<()> {
        self.w.write_uint::<BigEndian>(v, bytes as usize)?;
        self.written += bytes as u64;
        Ok(())
    }

    fn put_stream(&mut self, typ: FourCC, range: StreamRange) -> Result<()> {
        let src = self
            .source
            .as_deref_mut()
            .ok_or(EncodeError::StreamWithoutSource { typ })?;
        self.written += range.copy_to(src, self.w, self.cancel)?;
        Ok(())
    }

    fn put_box(&mut self, enc: &mut Encoder<'_>, b: &Mp4Box, _may_run_to_end: bool) -> Result<()> {
        enc.emit_box(b, self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Planned {
    form: SizeForm,
    total: u64,
}

pub struct Encoder<'r> {
    pub(crate) registry: &'r Registry,
    plan: Vec<Planned>,
    cursor: usize,
}

impl<'r> Encoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Encoder {
            registry,
            plan: Vec::new(),
            cursor: 0,
        }
    }

    /// Validate `boxes` and return their encoded length. `source_len` is the
    /// length of the source stream payloads will be copied from; every range
    /// must lie inside it.
    pub fn measure(&mut self, boxes: &[Mp4Box], source_len: Option<u64>) -> Result<u64> {
        self.plan.clear();
        self.cursor = 0;
        let mut m = Measure { len: 0, source_len };
        self.encode_list(boxes, &mut m)?;
        tracing::trace!(boxes = self.plan.len(), len = m.len, "tree measured");
        Ok(m.len)
    }

    /// Write `boxes` as planned by the last [`Encoder::measure`] call.
    pub fn emit<'a, W: Write + ?Sized>(
        &mut self,
        boxes: &[Mp4Box],
        w: &'a mut W,
        source: Option<&'a mut dyn ReadSeek>,
        cancel: Option<&'a AtomicBool>,
    ) -> Result<u64> {
        self.cursor = 0;
        let mut e = Emit {
            w,
            source,
            cancel,
            written: 0,
        };
        self.encode_list(boxes, &mut e)?;
        Ok(e.written)
    }

    pub(crate) fn encode_list<O: Out>(&mut self, boxes: &[Mp4Box], out: &mut O) -> Result<()> {
        for (i, b) in boxes.iter().enumerate() {
            out.put_box(self, b, i + 1 == boxes.len())?;
        }
        Ok(())
    }

    fn measure_box(&mut self, b: &Mp4Box, may_run_to_end: bool, source_len: Option<u64>) -> Result<u64> {
        if b.size_form == SizeForm::ToEnd && !may_run_to_end {
            return Err(EncodeError::UnsupportedLargesize { typ: b.typ });
        }
        let idx = self.plan.len();
        self.plan.push(Planned {
            form: b.size_form,
            total: 0,
        });

        let mut body = Measure { len: 0, source_len };
        self.encode_body(b, &mut body)?;

        let (form, total) = plan_size(b.size_form, b.uuid.is_some(), body.len);
        if form != b.size_form {
            tracing::debug!(typ = %b.typ, total, "box promoted to largesize");
        }
        self.plan[idx] = Planned { form, total };
        Ok(total)
    }

    fn emit_box<W: Write + ?Sized>(&mut self, b: &Mp4Box, out: &mut Emit<'_, W>) -> Result<()> {
        let p = self.plan[self.cursor];
        self.cursor += 1;

        let start = out.written;
        let mut hdr = Vec::with_capacity(32);
        write_box_header(&mut hdr, b.typ, b.uuid.as_ref(), p.form, p.total)?;
        out.put(&hdr)?;
        self.encode_body(b, out)?;
        debug_assert_eq!(out.written - start, p.total, "{} emitted differently than measured", b.typ);
        Ok(())
    }

    fn encode_body<O: Out>(&mut self, b: &Mp4Box, out: &mut O) -> Result<()> {
        if (b.typ == FourCC::UUID) != b.uuid.is_some() {
            return Err(EncodeError::UuidMismatch { typ: b.typ });
        }
        let key = b.key();
        let schema = self.registry.lookup(&key).copied();
        if schema.is_some_and(|s| s.full_box) != b.full.is_some() {
            return Err(EncodeError::FullBoxMismatch { typ: b.typ });
        }
        if let Some(h) = b.full {
            out.put_full_header(h)?;
        }

        match (&b.payload, schema.map(|s| s.layout)) {
            (Payload::Raw(bytes), _) => out.put(bytes),
            (Payload::Stream(range), _) => out.put_stream(b.typ, *range),
            (Payload::Children(kids), None | Some(Layout::Container)) => self.encode_list(kids, out),
            (Payload::Fields(fields), Some(Layout::Fields(descs))) => {
                let gate = Gate {
                    version: b.version(),
                    flags: b.flags(),
                };
                self.encode_fields(b.typ, descs, fields, gate, out)
            }
            (Payload::Fields(_), None) => Err(EncodeError::UnknownSchema { key }),
            _ => Err(EncodeError::PayloadMismatch { typ: b.typ }),
        }
    }
}
