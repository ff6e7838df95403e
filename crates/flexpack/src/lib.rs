//! # flexpack
//!
//! A compact, schemaless, self-describing binary encoding for JSON-like
//! documents (objects, arrays, scalars, byte strings), together with the
//! read/query/patch engine that operates on it.
//!
//! ## Format
//!
//! Every encoded value starts with a tag byte: 5 bits of kind, 3 bits of
//! kind-specific inline data. Containers (`object`, `array`) are open-ended
//! sequences terminated by a `container_end` sentinel rather than a length
//! prefix. Integers and byte strings prefer an inline or variable-length
//! form over their fixed-width encoding whenever the value is small; see
//! [`tag`] and [`varint`] for the exact rules.
//!
//! ## Reading
//!
//! [`Reader`] is a non-owning forward cursor: every [`Value::Bytes`] (and
//! every object key) it yields borrows directly from the source buffer, and
//! decoding never allocates. [`Reader::read_path`]/[`Reader::read_paths`]
//! resolve [`path`]-syntax queries in a single forward pass.
//!
//! ## Writing and patching
//!
//! [`Writer`] emits tagged values onto any [`Sink`]. [`patch::apply_updates`]
//! re-encodes a source buffer with a batch of path-addressed updates applied:
//! replacing existing values, upserting missing ones (creating intermediate
//! containers and filling array gaps with `null`), and patching individual
//! elements of a `typed_array` in place, all in one forward pass, copying
//! every untouched byte range verbatim.
//!
//! ```
//! use flexpack::patch::{apply_updates, Update};
//! use flexpack::writer::{VecWriter, Writer};
//!
//! let mut w = VecWriter::new();
//! w.start_object().unwrap();
//! w.write_any_key(b"count").unwrap();
//! w.write_any(&1i64).unwrap();
//! w.end_container().unwrap();
//! let source = w.into_bytes();
//!
//! let mut set_count = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
//! let mut updates = [Update::new(b"count", &mut set_count)];
//! let mut order = [0usize; 1];
//! let patched = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();
//! assert!(updates[0].applied());
//! ```
//!
//! ## JSON projection
//!
//! [`json::to_json_string`] renders an encoded buffer as JSON text; it is
//! specified only at the interface level by `spec.md` §4.5 and implemented
//! here as a reference consumer, not a core subsystem.
//!
//! ## Non-goals
//!
//! Schemas, canonical object-key ordering, length-prefixed containers,
//! cryptographic integrity, index-based random access, and streaming decode
//! across partial buffers are all out of scope; see `spec.md` §1.

pub mod error;
pub mod f16;
pub mod json;
pub mod patch;
pub mod path;
pub mod reader;
pub mod sink;
pub mod tag;
pub mod value;
pub mod varint;
pub mod writer;

pub use error::{JsonError, PatchError, ReaderError, SinkError};
pub use patch::{apply_updates, Update};
pub use path::Segment;
pub use reader::{Reader, Reader64, UnboundedReader};
pub use sink::Sink;
pub use value::{PackedElem, TypedArrayView, Value};
pub use writer::{VecWriter, WriteAny, Writer};
