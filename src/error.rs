use crate::boxes::{BoxKey, FourCC};
use crate::stream::StreamError;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated { offset: u64, needed: u64, available: u64 },
    #[error("{typ} at offset {offset}: declared payload of {declared} bytes, fields consumed {consumed}")]
    SizeMismatch { typ: FourCC, offset: u64, declared: u64, consumed: u64 },
    #[error("{typ} at offset {offset}: declared size {declared} exceeds the {available} bytes left in its container")]
    NestedBoxOverflow { typ: FourCC, offset: u64, declared: u64, available: u64 },
    #[error("{typ}: field `{field}` has no layout for version {version}")]
    InvalidVersion { typ: FourCC, field: &'static str, version: u8 },
    #[error("{typ} at offset {offset}: size 0 is only allowed on the last box of a container")]
    UnsupportedLargesize { typ: FourCC, offset: u64 },
    #[error("{typ} at offset {offset}: invalid box size {size}")]
    InvalidSize { typ: FourCC, offset: u64, size: u64 },
    #[error("box at offset {offset} is nested more than {limit} levels deep")]
    NestingTooDeep { offset: u64, limit: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("{typ}: `{field}` holds {len} elements but its count is {count}")]
    ArrayLengthMismatch { typ: FourCC, field: &'static str, count: u64, len: u64 },
    #[error("{typ}: field `{field}` has no layout for version {version:?}")]
    InvalidVersion { typ: FourCC, field: &'static str, version: Option<u8> },
    #[error("{typ}: size 0 is only allowed on the last box of a container")]
    UnsupportedLargesize { typ: FourCC },
    #[error("{typ}: missing field `{field}`")]
    MissingField { typ: FourCC, field: &'static str },
    #[error("{typ}: field `{field}` is present but not expected for this version/flags")]
    UnexpectedField { typ: FourCC, field: &'static str },
    #[error("{typ}: schema has no field named `{field}`")]
    UnknownField { typ: FourCC, field: String },
    #[error("{typ}: field `{field}` expects {expected}, got {found}")]
    TypeMismatch { typ: FourCC, field: &'static str, expected: &'static str, found: &'static str },
    #[error("{typ}: value of `{field}` does not fit in {bits} bits")]
    OutOfRange { typ: FourCC, field: &'static str, bits: u32 },
    #[error("no schema registered for {key}")]
    UnknownSchema { key: BoxKey },
    #[error("{typ}: full-box header presence disagrees with the schema")]
    FullBoxMismatch { typ: FourCC },
    #[error("{typ}: uuid extended type must be set exactly when the type is `uuid`")]
    UuidMismatch { typ: FourCC },
    #[error("{typ}: payload kind does not match the schema layout")]
    PayloadMismatch { typ: FourCC },
    #[error("{typ}: stream payload needs a source to copy from")]
    StreamWithoutSource { typ: FourCC },
}

/// Problems found while building a registry from schema entries.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate schema for {key}")]
    DuplicateKey { key: BoxKey },
    #[error("{key}: duplicate field `{field}`")]
    DuplicateField { key: BoxKey, field: &'static str },
    #[error("{key}: bit field `{field}` does not continue a group tiling its host word")]
    BitGroup { key: BoxKey, field: &'static str },
    #[error("{key}: `{field}` refers to `{target}`, which is not an earlier integer field")]
    UnresolvedReference { key: BoxKey, field: &'static str, target: &'static str },
    #[error("{key}: field `{field}` follows a field that runs to the end of the payload")]
    FieldAfterToEnd { key: BoxKey, field: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a four-character code is 4 bytes, got {len}")]
pub struct InvalidFourCC {
    pub len: usize,
}
