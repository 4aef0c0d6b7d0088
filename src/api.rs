use crate::{
    boxes::BoxTree,
    error::{DecodeError, EncodeError},
    parser::TopLevelBoxes,
    registry::{Registry, default_registry},
    stream::ReadSeek,
    writer::Encoder,
};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::AtomicBool;

/// Decoder/encoder bound to one schema registry.
///
/// A `Codec` is cheap to create and holds only a shared reference to the
/// registry, so several threads can each build their own over the same
/// registry and decode independent files in parallel.
///
/// # Example
/// ```no_run
/// use isobox::{Codec, default_registry};
/// use std::fs::File;
///
/// let mut file = File::open("video.mp4")?;
/// let codec = Codec::new(default_registry());
/// let tree = codec.decode_from(&mut file)?;
/// if let Some(mdhd) = tree.find("moov/trak/mdia/mdhd") {
///     println!("timescale = {:?}", mdhd.field("timescale"));
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r Registry,
}

impl<'r> Codec<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Codec { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Decode an in-memory file or fragment.
    pub fn decode(&self, bytes: &[u8]) -> Result<BoxTree, DecodeError> {
        self.decode_from(&mut Cursor::new(bytes))
    }

    /// Decode every top-level box from the reader's current position to its
    /// end. Stream payloads are recorded as ranges into `r`.
    pub fn decode_from<R: Read + Seek>(&self, r: &mut R) -> Result<BoxTree, DecodeError> {
        let boxes = self.top_level(r)?.collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(boxes = boxes.len(), "tree decoded");
        Ok(BoxTree::new(boxes))
    }

    /// Lazily decode top-level boxes one at a time.
    ///
    /// Each item is a fully decoded box. The iterator stops after the first
    /// error, because nothing past a malformed box can be located reliably.
    pub fn top_level<'a, R: Read + Seek>(&'a self, r: &'a mut R) -> Result<TopLevelBoxes<'a, R>, DecodeError> {
        TopLevelBoxes::new(r, self.registry)
    }

    /// Encode a tree into a new buffer.
    ///
    /// Fails with [`EncodeError::StreamWithoutSource`] if the tree still holds
    /// stream payloads; use [`Codec::encode_with_source`] for those.
    pub fn encode(&self, tree: &BoxTree) -> Result<Vec<u8>, EncodeError> {
        let mut enc = Encoder::new(self.registry);
        let len = enc.measure(&tree.boxes, None)?;
        let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        enc.emit(&tree.boxes, &mut out, None, None)?;
        Ok(out)
    }

    /// Encode a tree into `w`, returning the number of bytes written.
    ///
    /// The whole tree is validated before the first byte reaches `w`.
    pub fn encode_to<W: Write>(&self, tree: &BoxTree, w: &mut W) -> Result<u64, EncodeError> {
        let mut enc = Encoder::new(self.registry);
        enc.measure(&tree.boxes, None)?;
        enc.emit(&tree.boxes, w, None, None)
    }

    /// Encode a tree whose stream payloads are copied from `source`, normally
    /// the reader the tree was decoded from.
    pub fn encode_with_source<S, W>(&self, tree: &BoxTree, source: &mut S, w: &mut W) -> Result<u64, EncodeError>
    where
        S: Read + Seek,
        W: Write,
    {
        self.encode_with_source_cancellable(tree, source, w, None)
    }

    /// Like [`Codec::encode_with_source`], polling `cancel` between stream
    /// chunks.
    ///
    /// A source too short for any stream range fails before anything is
    /// written. A cancelled copy leaves `w` holding a partial file.
    pub fn encode_with_source_cancellable<S, W>(
        &self,
        tree: &BoxTree,
        source: &mut S,
        w: &mut W,
        cancel: Option<&AtomicBool>,
    ) -> Result<u64, EncodeError>
    where
        S: Read + Seek,
        W: Write,
    {
        let mut enc = Encoder::new(self.registry);
        let source_len = source.seek(SeekFrom::End(0))?;
        enc.measure(&tree.boxes, Some(source_len))?;
        enc.emit(&tree.boxes, w, Some(source as &mut dyn ReadSeek), cancel)
    }
}

impl Default for Codec<'static> {
    fn default() -> Self {
        Codec::new(default_registry())
    }
}

/// Decode `bytes` with the built-in registry.
///
/// # Example
/// ```
/// let file = [0, 0, 0, 16, b'f', b'r', b'e', b'e', 0, 0, 0, 0, 0, 0, 0, 0];
/// let tree = isobox::decode(&file).unwrap();
/// assert_eq!(tree.boxes[0].typ.to_string(), "free");
/// assert_eq!(isobox::encode(&tree).unwrap(), file);
/// ```
pub fn decode(bytes: &[u8]) -> Result<BoxTree, DecodeError> {
    Codec::default().decode(bytes)
}

/// Encode `tree` with the built-in registry.
pub fn encode(tree: &BoxTree) -> Result<Vec<u8>, EncodeError> {
    Codec::default().encode(tree)
}
