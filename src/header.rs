use crate::boxes::{BoxHeader, FourCC, FullBoxHeader, SizeForm};
use crate::error::DecodeError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Size + type, without largesize or uuid.
pub const BASIC_HEADER_LEN: u64 = 8;
pub const FULL_BOX_HEADER_LEN: u64 = 4;

/// Read the box header at the current position of a seekable source.
pub fn read_box_header<R: Read + Seek>(r: &mut R) -> Result<BoxHeader, DecodeError> {
    let start = r.stream_position()?;
    let len = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(start))?;
    decode_header(r, start, len.saturating_sub(start))
}

/// Decode a header starting at `start` with `available` bytes left before the
/// end of the enclosing container.
pub fn decode_header<R: Read + ?Sized>(
    r: &mut R,
    start: u64,
    available: u64,
) -> Result<BoxHeader, DecodeError> {
    let need = |needed: u64| -> Result<(), DecodeError> {
        if needed > available {
            Err(DecodeError::Truncated {
                offset: start,
                needed,
                available,
            })
        } else {
            Ok(())
        }
    };

    need(BASIC_HEADER_LEN)?;
    let size32 = r.read_u32::<BigEndian>()?;
    let mut typ = [0u8; 4];
    r.read_exact(&mut typ)?;
    let mut header_size = BASIC_HEADER_LEN;

    let (form, size) = match size32 {
        0 => (SizeForm::ToEnd, 0),
        1 => {
            need(header_size + 8)?;
            header_size += 8;
            (SizeForm::Large, r.read_u64::<BigEndian>()?)
        }
        n => (SizeForm::Compact, n as u64),
    };

    let mut uuid = None;
    if &typ == b"uuid" {
        need(header_size + 16)?;
        let mut u = [0u8; 16];
        r.read_exact(&mut u)?;
        header_size += 16;
        uuid = Some(u);
    }

    if form != SizeForm::ToEnd && size < header_size {
        return Err(DecodeError::InvalidSize {
            typ: FourCC(typ),
            offset: start,
            size,
        });
    }

    Ok(BoxHeader {
        size,
        typ: FourCC(typ),
        uuid,
        header_size,
        start,
        form,
    })
}

pub fn read_full_box_header<R: Read + ?Sized>(r: &mut R) -> io::Result<FullBoxHeader> {
    let version = r.read_u8()?;
    let flags = r.read_u24::<BigEndian>()?;
    Ok(FullBoxHeader { version, flags })
}

/// Pick the wire form and total size for a box whose header-less body
/// (full-box header included) is `body_len` bytes.
///
/// A compact box that no longer fits the 32-bit size field is promoted to
/// largesize.
pub fn plan_size(form: SizeForm, has_uuid: bool, body_len: u64) -> (SizeForm, u64) {
    let base = BASIC_HEADER_LEN + if has_uuid { 16 } else { 0 } + body_len;
    match form {
        SizeForm::Compact if base > u32::MAX as u64 => (SizeForm::Large, base + 8),
        SizeForm::Compact => (SizeForm::Compact, base),
        SizeForm::Large => (SizeForm::Large, base + 8),
        SizeForm::ToEnd => (SizeForm::ToEnd, base),
    }
}

pub fn write_box_header<W: Write + ?Sized>(
    w: &mut W,
    typ: FourCC,
    uuid: Option<&[u8; 16]>,
    form: SizeForm,
    total: u64,
) -> io::Result<()> {
    match form {
        SizeForm::Compact => {
            let size = u32::try_from(total).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "compact box size exceeds 32 bits")
            })?;
            w.write_u32::<BigEndian>(size)?;
            w.write_all(&typ.0)?;
        }
        SizeForm::Large => {
            w.write_u32::<BigEndian>(1)?;
            w.write_all(&typ.0)?;
            w.write_u64::<BigEndian>(total)?;
        }
        SizeForm::ToEnd => {
            w.write_u32::<BigEndian>(0)?;
            w.write_all(&typ.0)?;
        }
    }
    if let Some(u) = uuid {
        w.write_all(u)?;
    }
    Ok(())
}

pub fn write_full_box_header<W: Write + ?Sized>(w: &mut W, h: FullBoxHeader) -> io::Result<()> {
    w.write_u8(h.version)?;
    w.write_u24::<BigEndian>(h.flags & 0x00FF_FFFF)
}
