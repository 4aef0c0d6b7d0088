//! Decoding side of the tree walker.
//!
//! Boxes are read strictly in order: a box's start depends on the declared
//! size of the one before it. Every read is checked against the end offset of
//! the enclosing payload, so a bad size aborts the subtree instead of
//! desynchronizing the rest of the file.

use crate::boxes::{FourCC, Mp4Box, Payload, Value};
use crate::error::DecodeError;
use crate::header::{FULL_BOX_HEADER_LEN, decode_header, read_full_box_header};
use crate::registry::Registry;
use crate::schema::{Gate, IntType, Layout};
use crate::stream::StreamRange;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Deepest box nesting the decoder follows before giving up.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Decoder<'a, R> {
    r: &'a mut R,
    registry: &'a Registry,
    pos: u64,
    // Boxes currently open above the one being decoded.
    depth: usize,
}

impl<'a, R: Read + Seek> Decoder<'a, R> {
    /// Start decoding at the reader's current position.
    pub fn new(r: &'a mut R, registry: &'a Registry) -> Result<Self> {
        let pos = r.stream_position()?;
        Ok(Decoder {
            r,
            registry,
            pos,
            depth: 0,
        })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decode sibling boxes until exactly `end`.
    pub fn decode_list_to_end(&mut self, end: u64) -> Result<Vec<Mp4Box>> {
        let mut kids = Vec::new();
        while self.pos < end {
            kids.push(self.decode_box(end, true)?);
        }
        Ok(kids)
    }

    /// Decode exactly `count` sibling boxes, all within `end`.
    pub fn decode_counted(&mut self, end: u64, count: u64) -> Result<Vec<Mp4Box>> {
        let cap = count.min(end.saturating_sub(self.pos) / 8) as usize;
        let mut kids = Vec::with_capacity(cap);
        for i in 0..count {
            kids.push(self.decode_box(end, i + 1 == count)?);
        }
        Ok(kids)
    }

    /// Decode one box starting at the current position. `end` bounds the
    /// enclosing payload; `may_run_to_end` allows the size=0 form.
    pub fn decode_box(&mut self, end: u64, may_run_to_end: bool) -> Result<Mp4Box> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep {
                offset: self.pos,
                limit: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        let decoded = self.decode_box_body(end, may_run_to_end);
        self.depth -= 1;
        decoded
    }

    fn decode_box_body(&mut self, end: u64, may_run_to_end: bool) -> Result<Mp4Box> {
        let start = self.pos;
        let available = end.saturating_sub(start);
        let hdr = decode_header(self.r, start, available)?;
        self.pos += hdr.header_size;

        let box_end = match hdr.form {
            crate::boxes::SizeForm::ToEnd if !may_run_to_end => {
                return Err(DecodeError::UnsupportedLargesize {
                    typ: hdr.typ,
                    offset: start,
                });
            }
            crate::boxes::SizeForm::ToEnd => end,
            _ if hdr.size > available => {
                return Err(DecodeError::NestedBoxOverflow {
                    typ: hdr.typ,
                    offset: start,
                    declared: hdr.size,
                    available,
                });
            }
            _ => hdr.end(end),
        };

        let key = hdr.key();
        let schema = self.registry.lookup(&key).copied();

        let full = match schema {
            Some(s) if s.full_box => {
                self.need(box_end, FULL_BOX_HEADER_LEN)?;
                let h = read_full_box_header(self.r)?;
                self.pos += FULL_BOX_HEADER_LEN;
                Some(h)
            }
            _ => None,
        };

        let payload_start = self.pos;
        let payload_len = box_end - payload_start;
        let payload = match schema.map(|s| s.layout) {
            None => {
                tracing::debug!(key = %key, offset = start, len = payload_len, "unregistered box kept opaque");
                Payload::Raw(self.read_vec(box_end, payload_len)?)
            }
            Some(Layout::Raw) => Payload::Raw(self.read_vec(box_end, payload_len)?),
            Some(Layout::Container) => Payload::Children(self.decode_list_to_end(box_end)?),
            Some(Layout::Stream) => {
                let range = StreamRange::new(payload_start, payload_len);
                self.r.seek(SeekFrom::Start(box_end))?;
                self.pos = box_end;
                tracing::debug!(typ = %hdr.typ, offset = range.offset, len = range.len, "stream payload left in source");
                Payload::Stream(range)
            }
            Some(Layout::Fields(descs)) => {
                let gate = Gate {
                    version: full.map(|h| h.version),
                    flags: full.map(|h| h.flags),
                };
                Payload::Fields(self.decode_fields(hdr.typ, descs, box_end, gate)?)
            }
        };

        if self.pos != box_end {
            return Err(DecodeError::SizeMismatch {
                typ: hdr.typ,
                offset: start,
                declared: payload_len,
                consumed: self.pos - payload_start,
            });
        }

        tracing::trace!(typ = %hdr.typ, offset = start, size = box_end - start, "box decoded");
        Ok(Mp4Box {
            typ: hdr.typ,
            uuid: hdr.uuid,
            size: box_end - start,
            size_form: hdr.form,
            full,
            payload,
        })
    }

    // ---------- Byte helpers (shared with the field codec) ----------

    pub(crate) fn need(&self, end: u64, needed: u64) -> Result<()> {
        let available = end.saturating_sub(self.pos);
        if needed > available {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn read_vec(&mut self, end: u64, n: u64) -> Result<Vec<u8>> {
        self.need(end, n)?;
        let mut v = vec![0u8; n as usize];
        self.r.read_exact(&mut v)?;
        self.pos += n;
        Ok(v)
    }

    pub(crate) fn read_fourcc(&mut self, end: u64) -> Result<FourCC> {
        self.need(end, 4)?;
        let mut cc = [0u8; 4];
        self.r.read_exact(&mut cc)?;
        self.pos += 4;
        Ok(FourCC(cc))
    }

    pub(crate) fn read_uint(&mut self, end: u64, bytes: u8) -> Result<u64> {
        self.need(end, bytes as u64)?;
        let v = self.r.read_uint::<BigEndian>(bytes as usize)?;
        self.pos += bytes as u64;
        Ok(v)
    }

    /// Signed kinds are sign-extended; unsigned kinds are not.
    pub(crate) fn read_int(&mut self, end: u64, t: IntType) -> Result<Value> {
        self.need(end, t.bytes as u64)?;
        let v = if t.signed {
            Value::Int(self.r.read_int::<BigEndian>(t.bytes as usize)?)
        } else {
            Value::UInt(self.r.read_uint::<BigEndian>(t.bytes as usize)?)
        };
        self.pos += t.bytes as u64;
        Ok(v)
    }
}

/// Iterator over the top-level boxes of a source.
///
/// Boxes already yielded stay valid when a later one fails; after the first
/// error the iterator is exhausted, since box boundaries past a bad box
/// cannot be trusted.
pub struct TopLevelBoxes<'a, R> {
    dec: Decoder<'a, R>,
    end: u64,
    failed: bool,
}

impl<'a, R: Read + Seek> TopLevelBoxes<'a, R> {
    pub fn new(r: &'a mut R, registry: &'a Registry) -> Result<Self> {
        let start = r.stream_position()?;
        let end = r.seek(SeekFrom::End(0))?;
        r.seek(SeekFrom::Start(start))?;
        Ok(TopLevelBoxes {
            dec: Decoder::new(r, registry)?,
            end,
            failed: false,
        })
    }
}

impl<R: Read + Seek> Iterator for TopLevelBoxes<'_, R> {
    type Item = Result<Mp4Box>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.dec.position() >= self.end {
            return None;
        }
        let item = self.dec.decode_box(self.end, true);
        self.failed = item.is_err();
        Some(item)
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for TopLevelBoxes<'_, R> {}
