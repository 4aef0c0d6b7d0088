//! Schema-driven codec for ISO base media ("box") files such as MP4.
//!
//! Bytes decode into an owned [`BoxTree`] of [`Mp4Box`] nodes whose payloads
//! are described by a [`Registry`] of declarative schemas, and encode back to
//! identical bytes when the tree is left untouched. Large media payloads
//! (`mdat`, `imda`) are never buffered: they decode to a [`StreamRange`] and
//! are copied through from the source on encode.

pub mod api;
pub mod boxes;
pub mod error;
mod field;
pub mod header;
pub mod known_boxes;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod writer;

pub use api::{Codec, decode, encode};
pub use boxes::{BoxHeader, BoxKey, BoxTree, FieldName, Fields, FourCC, FullBoxHeader, Mp4Box, Payload, SizeForm, Value};
pub use error::{DecodeError, EncodeError, InvalidFourCC, SchemaError};
pub use header::read_box_header;
pub use parser::{MAX_NESTING_DEPTH, TopLevelBoxes};
pub use registry::{Registry, default_registry};
pub use schema::{FieldDescriptor, FieldKind, Layout, Presence, SchemaEntry};
pub use stream::{CHUNK_SIZE, RangeReader, StreamError, StreamRange};
