use isobox::boxes::{Mp4Box, Payload};
use isobox::{BoxTree, CHUNK_SIZE, Codec, EncodeError, StreamError, StreamRange, decode, encode};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::AtomicBool;

const TWO_GIB: u64 = 2 * 1024 * 1024 * 1024;

/// A file made of one compact `mdat` header followed by `payload_len` zero
/// bytes that are generated on demand instead of stored.
struct SyntheticMdat {
    header: [u8; 8],
    len: u64,
    pos: u64,
}

impl SyntheticMdat {
    fn new(payload_len: u64) -> Self {
        let mut header = [0u8; 8];
        header[..4].copy_from_slice(&((payload_len + 8) as u32).to_be_bytes());
        header[4..].copy_from_slice(b"mdat");
        SyntheticMdat {
            header,
            len: payload_len + 8,
            pos: 0,
        }
    }
}

impl Read for SyntheticMdat {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let n = if self.pos < 8 {
            let from = &self.header[self.pos as usize..];
            let n = from.len().min(buf.len());
            buf[..n].copy_from_slice(&from[..n]);
            n
        } else {
            let n = (self.len - self.pos).min(buf.len() as u64) as usize;
            buf[..n].fill(0);
            n
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for SyntheticMdat {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        self.pos = match to {
            SeekFrom::Start(p) => p,
            SeekFrom::End(d) => self.len.checked_add_signed(d).ok_or(io::ErrorKind::InvalidInput)?,
            SeekFrom::Current(d) => self.pos.checked_add_signed(d).ok_or(io::ErrorKind::InvalidInput)?,
        };
        Ok(self.pos)
    }
}

/// Counts bytes and remembers the largest single write.
#[derive(Default)]
struct CountingSink {
    total: u64,
    largest_write: usize,
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.total += buf.len() as u64;
        self.largest_write = self.largest_write.max(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn two_gib_mdat_decodes_to_a_range() {
    let mut src = SyntheticMdat::new(TWO_GIB);
    let tree = Codec::default().decode_from(&mut src).unwrap();

    assert_eq!(tree.boxes.len(), 1);
    let mdat = &tree.boxes[0];
    assert_eq!(mdat.size, TWO_GIB + 8);
    assert_eq!(mdat.payload, Payload::Stream(StreamRange::new(8, TWO_GIB)));

    // The handle is a few bytes, whatever the payload length.
    assert!(tree.to_json().unwrap().len() < 512);
}

#[test]
fn two_gib_mdat_copies_through_in_chunks() {
    let mut src = SyntheticMdat::new(TWO_GIB);
    let tree = Codec::default().decode_from(&mut src).unwrap();

    let mut sink = CountingSink::default();
    let written = Codec::default().encode_with_source(&tree, &mut src, &mut sink).unwrap();

    assert_eq!(written, TWO_GIB + 8);
    assert_eq!(sink.total, TWO_GIB + 8);
    assert!(sink.largest_write <= CHUNK_SIZE, "largest write {}", sink.largest_write);
}

#[test]
fn tree_with_stream_needs_a_source() {
    let tree = BoxTree::new(vec![Mp4Box::new_stream(b"mdat", StreamRange::new(8, 100))]);
    assert!(matches!(encode(&tree).unwrap_err(), EncodeError::StreamWithoutSource { .. }));
}

#[test]
fn small_file_round_trips_through_its_source() {
    let mut file = Vec::new();
    file.extend_from_slice(&[0, 0, 0, 16, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0, 0, 0, 1]);
    file.extend_from_slice(&[0, 0, 0, 13, b'm', b'd', b'a', b't', 1, 2, 3, 4, 5]);

    let tree = decode(&file).unwrap();
    let range = match tree.boxes[1].payload {
        Payload::Stream(r) => r,
        ref other => panic!("unexpected payload {other:?}"),
    };
    assert_eq!(range, StreamRange::new(24, 5));

    let mut src = Cursor::new(file.clone());
    assert_eq!(range.read_to_vec(&mut src).unwrap(), vec![1, 2, 3, 4, 5]);

    let mut reader = range.open(&mut src).unwrap();
    let mut first = [0u8; 2];
    reader.read_exact(&mut first).unwrap();
    assert_eq!(first, [1, 2]);
    assert_eq!(reader.remaining(), 3);

    let mut out = Vec::new();
    Codec::default().encode_with_source(&tree, &mut src, &mut out).unwrap();
    assert_eq!(out, file);

    // An in-memory replacement needs no source.
    let edited = BoxTree::new(vec![tree.boxes[0].clone(), Mp4Box::new_raw(b"mdat", vec![1, 2, 3, 4, 5])]);
    assert_eq!(encode(&edited).unwrap(), file);
}

#[test]
fn short_source_is_truncated() {
    let range = StreamRange::new(4, 100);
    let mut src = Cursor::new(vec![0u8; 50]);
    let err = range.copy_to(&mut src, &mut io::sink(), None).unwrap_err();
    assert!(matches!(err, StreamError::Truncated { expected: 100, copied: 46 }), "{err:?}");
}

#[test]
fn cancelled_copy_stops_between_chunks() {
    let cancel = AtomicBool::new(true);
    let mut src = SyntheticMdat::new(4 * CHUNK_SIZE as u64);
    let range = StreamRange::new(8, 4 * CHUNK_SIZE as u64);
    let mut sink = CountingSink::default();

    let err = range.copy_to(&mut src, &mut sink, Some(&cancel)).unwrap_err();
    assert!(matches!(err, StreamError::Cancelled { copied: 0 }), "{err:?}");
    assert_eq!(sink.total, 0);

    let tree = BoxTree::new(vec![Mp4Box::new_stream(b"mdat", range)]);
    let err = Codec::default()
        .encode_with_source_cancellable(&tree, &mut src, &mut sink, Some(&cancel))
        .unwrap_err();
    assert!(matches!(err, EncodeError::Stream(StreamError::Cancelled { .. })));
}

#[test]
fn short_source_fails_before_writing() {
    let mut file = vec![0, 0, 0, 8, b'f', b'r', b'e', b'e'];
    file.extend_from_slice(&108u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&[0x5A; 100]);
    let tree = decode(&file).unwrap();
    assert_eq!(tree.boxes[1].payload, Payload::Stream(StreamRange::new(16, 100)));

    let mut short = Cursor::new(file[..60].to_vec());
    let mut out = Vec::new();
    let err = Codec::default().encode_with_source(&tree, &mut short, &mut out).unwrap_err();
    assert!(
        matches!(err, EncodeError::Stream(StreamError::Truncated { expected: 100, copied: 44 })),
        "{err:?}"
    );
    assert!(out.is_empty(), "{} bytes written", out.len());

    // The full source still works after the failed attempt.
    let mut src = Cursor::new(file.clone());
    Codec::default().encode_with_source(&tree, &mut src, &mut out).unwrap();
    assert_eq!(out, file);
}
