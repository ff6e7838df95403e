//! Flat, non-hierarchical error enums. No `thiserror`, no `anyhow`: a
//! hand-written `Display` + `std::error::Error` impl per enum, matching the
//! house style for a synchronous, allocation-free core (see `spec.md` §7).

/// Errors surfaced while reading the wire format (§4.2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    /// The buffer ended before a required byte range.
    UnexpectedEof,
    /// The tag byte's kind code is unassigned.
    InvalidTag(u8),
    /// A `container_end` was read at depth 0.
    UnexpectedContainerEnd,
    /// A container open pushed nesting past the configured `max_depth`.
    MaxDepthExceeded,
    /// A `bytes`-family payload length exceeded `max_bytes_length`.
    BytesTooLong,
    /// An array's element count exceeded `max_array_length`.
    ArrayTooLarge,
    /// An object's pair count exceeded `max_object_size`.
    ObjectTooLarge,
    /// A `typed_array` payload length was not `count * sizeof(elem)`.
    Malformed,
}

impl core::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of buffer"),
            Self::InvalidTag(b) => write!(f, "invalid tag byte: {b:#04x}"),
            Self::UnexpectedContainerEnd => write!(f, "container_end at depth 0"),
            Self::MaxDepthExceeded => write!(f, "nesting depth exceeded configured max_depth"),
            Self::BytesTooLong => write!(f, "byte payload exceeded configured max_bytes_length"),
            Self::ArrayTooLarge => write!(f, "array length exceeded configured max_array_length"),
            Self::ObjectTooLarge => write!(f, "object size exceeded configured max_object_size"),
            Self::Malformed => write!(f, "value payload inconsistent with its declared shape"),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Errors surfaced by the sink during a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkError;

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sink rejected a write")
    }
}

impl std::error::Error for SinkError {}

/// Errors surfaced by the path resolver and the `apply_updates` patch engine
/// (§4.3, §4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchError {
    /// The underlying buffer failed to parse.
    Reader(ReaderError),
    /// The sink rejected a write.
    Sink(SinkError),
    /// The source root was not `object` (or `array`, where permitted) and no
    /// whole-root update was supplied.
    InvalidRoot,
    /// A path segment failed to parse.
    MalformedPath,
    /// A path addresses through a value whose kind cannot have children
    /// (e.g. a child update into a scalar, or into a `typed_array` element).
    PathTypeMismatch,
    /// Two updates in the same group disagree: a leaf and a child share a
    /// prefix, or more than one empty-path (root) update was supplied.
    ConflictingUpdates,
    /// An update targeted an index past the end of a non-extensible
    /// container (a `typed_array`, which cannot be upserted into).
    IndexOutOfRange,
}

impl core::fmt::Display for PatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Reader(e) => write!(f, "{e}"),
            Self::Sink(e) => write!(f, "{e}"),
            Self::InvalidRoot => write!(f, "source root is not an updatable container"),
            Self::MalformedPath => write!(f, "path failed to parse"),
            Self::PathTypeMismatch => write!(f, "path disagrees with the buffer's structure"),
            Self::ConflictingUpdates => write!(f, "updates conflict at a shared path"),
            Self::IndexOutOfRange => write!(f, "index out of range in a non-extensible container"),
        }
    }
}

impl std::error::Error for PatchError {}

impl From<ReaderError> for PatchError {
    fn from(e: ReaderError) -> Self {
        Self::Reader(e)
    }
}

impl From<SinkError> for PatchError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

/// Errors surfaced by the JSON projection (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonError {
    /// A wire read failed while walking the value.
    Reader(ReaderError),
    /// The sink rejected a write.
    Sink(SinkError),
    /// A `bytes`-family payload was not valid UTF-8.
    InvalidUtf8,
    /// A float was NaN or infinite; JSON cannot express it.
    NonFiniteFloat,
}

impl core::fmt::Display for JsonError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Reader(e) => write!(f, "{e}"),
            Self::Sink(e) => write!(f, "{e}"),
            Self::InvalidUtf8 => write!(f, "value bytes were not valid UTF-8"),
            Self::NonFiniteFloat => write!(f, "float is not finite"),
        }
    }
}

impl std::error::Error for JsonError {}

impl From<ReaderError> for JsonError {
    fn from(e: ReaderError) -> Self {
        Self::Reader(e)
    }
}

impl From<SinkError> for JsonError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}
