//! Write primitives over a [`Sink`]. See `spec.md` §4.4.
//!
//! This writer never backpatches a length field. Containers are open-ended
//! and closed by a sentinel `container_end` tag, so `start_object`/
//! `start_array` emit their tag and nothing else.

use crate::error::SinkError;
use crate::sink::Sink;
use crate::tag::{encode_tag, Kind};
use crate::value::PackedElem;
use crate::varint;

/// Wraps a [`Sink`] and emits tagged values onto it. Carries no buffering of
/// its own; every call writes directly through to the sink.
pub struct Writer<W: Sink> {
    sink: W,
    open: usize,
}

impl<W: Sink> Writer<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, open: 0 }
    }

    /// Unwraps the writer, returning the sink. Debug-asserts that every
    /// `start_object`/`start_array` was matched by `end_container`. An
    /// unbalanced writer produces a buffer no Reader can parse, which is a
    /// caller bug, not a data error.
    pub fn into_sink(self) -> W {
        debug_assert_eq!(self.open, 0, "writer finished with unclosed containers");
        self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    #[inline]
    fn write_tag(&mut self, kind: Kind, data: u8) -> Result<(), SinkError> {
        self.sink.write_byte(encode_tag(kind, data))
    }

    pub fn start_object(&mut self) -> Result<(), SinkError> {
        self.open += 1;
        self.write_tag(Kind::Object, 0)
    }

    pub fn start_array(&mut self) -> Result<(), SinkError> {
        self.open += 1;
        self.write_tag(Kind::Array, 0)
    }

    pub fn end_container(&mut self) -> Result<(), SinkError> {
        debug_assert!(self.open > 0, "end_container with nothing open");
        self.open = self.open.saturating_sub(1);
        self.write_tag(Kind::ContainerEnd, 0)
    }

    pub fn write_null(&mut self) -> Result<(), SinkError> {
        self.write_tag(Kind::Null, 0)
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), SinkError> {
        self.write_tag(Kind::Bool, v as u8)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), SinkError> {
        self.write_tag(Kind::U8, 0)?;
        self.sink.write_byte(v)
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), SinkError> {
        self.write_tag(Kind::U16, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), SinkError> {
        self.write_tag(Kind::U32, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), SinkError> {
        self.write_tag(Kind::U64, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_i8(&mut self, v: i8) -> Result<(), SinkError> {
        self.write_tag(Kind::I8, 0)?;
        self.sink.write_byte(v as u8)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<(), SinkError> {
        self.write_tag(Kind::I16, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), SinkError> {
        self.write_tag(Kind::I32, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<(), SinkError> {
        self.write_tag(Kind::I64, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_f16_bits(&mut self, bits: u16) -> Result<(), SinkError> {
        self.write_tag(Kind::F16, 0)?;
        self.sink.write_int_le(bits.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<(), SinkError> {
        self.write_tag(Kind::F32, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<(), SinkError> {
        self.write_tag(Kind::F64, 0)?;
        self.sink.write_int_le(v.to_le_bytes())
    }

    /// Emits a fixed `bytes` value (8-byte length prefix). Only reachable
    /// explicitly; `write_any`/canonical key writes prefer `small_bytes` or
    /// `var_int_bytes`.
    pub fn write_bytes_fixed(&mut self, v: &[u8]) -> Result<(), SinkError> {
        self.write_tag(Kind::Bytes, 0)?;
        self.sink.write_int_le((v.len() as u64).to_le_bytes())?;
        self.sink.write_all(v)
    }

    /// Canonical byte-string encoding used by `write_any` and object keys:
    /// `small_bytes` for length ≤ 7, `var_int_bytes` otherwise.
    pub fn write_bytes_canonical(&mut self, v: &[u8]) -> Result<(), SinkError> {
        if v.len() <= 7 {
            self.write_tag(Kind::SmallBytes, v.len() as u8)?;
            self.sink.write_all(v)
        } else {
            let len = v.len() as u64;
            let n = varint::byte_len(len);
            self.write_tag(Kind::VarIntBytes, n - 1)?;
            let mut len_buf = [0u8; 8];
            varint::write_into(&mut len_buf, len, n);
            self.sink.write_all(&len_buf[..n as usize])?;
            self.sink.write_all(v)
        }
    }

    /// Writes an object key. Always a `bytes`-family value, same canonical
    /// rule as any other byte string.
    pub fn write_any_key(&mut self, key: &[u8]) -> Result<(), SinkError> {
        self.write_bytes_canonical(key)
    }

    fn write_unsigned_canonical(&mut self, magnitude: u64) -> Result<(), SinkError> {
        if magnitude <= 7 {
            self.write_tag(Kind::SmallUint, magnitude as u8)
        } else {
            let n = varint::byte_len(magnitude);
            self.write_tag(Kind::VarIntUnsigned, n - 1)?;
            let mut buf = [0u8; 8];
            varint::write_into(&mut buf, magnitude, n);
            self.sink.write_all(&buf[..n as usize])
        }
    }

    fn write_signed_canonical(&mut self, v: i64) -> Result<(), SinkError> {
        if v >= 0 {
            let magnitude = v as u64;
            if (1..=7).contains(&magnitude) {
                self.write_tag(Kind::SmallIntPositive, magnitude as u8)
            } else if magnitude == 0 {
                self.write_tag(Kind::SmallUint, 0)
            } else {
                let n = varint::byte_len(magnitude);
                self.write_tag(Kind::VarIntSignedPositive, n - 1)?;
                let mut buf = [0u8; 8];
                varint::write_into(&mut buf, magnitude, n);
                self.sink.write_all(&buf[..n as usize])
            }
        } else {
            // magnitude of i64::MIN doesn't fit in i64, so widen through i128.
            let magnitude = (-(v as i128)) as u64;
            if (1..=7).contains(&magnitude) {
                self.write_tag(Kind::SmallIntNegative, magnitude as u8)
            } else {
                let n = varint::byte_len(magnitude);
                self.write_tag(Kind::VarIntSignedNegative, n - 1)?;
                let mut buf = [0u8; 8];
                varint::write_into(&mut buf, magnitude, n);
                self.sink.write_all(&buf[..n as usize])
            }
        }
    }

    /// Appends `bytes` unchanged, with no tag of its own. Used by the patch
    /// engine to splice an already-encoded subtree (key or value) through
    /// verbatim instead of re-encoding it.
    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.sink.write_all(bytes)
    }

    /// Emits a `typed_array`'s tag, element-type byte, and canonical count,
    /// leaving the payload to the caller. Used by the patch engine, which
    /// assembles the payload itself out of copied and patched element
    /// ranges rather than a single `&[T]` slice.
    pub(crate) fn write_typed_array_header(
        &mut self,
        elem: crate::tag::ElemType,
        count: usize,
    ) -> Result<(), SinkError> {
        self.write_tag(Kind::TypedArray, 0)?;
        self.sink.write_byte(elem.code())?;
        self.write_unsigned_canonical(count as u64)
    }

    /// Emits a `typed_array`: element-type byte, canonical-unsigned count,
    /// then the packed payload. On little-endian hosts the payload is one
    /// block copy; on big-endian hosts each element is written as its own
    /// little-endian bytes.
    pub fn write_typed_array<T: PackedElem>(&mut self, elems: &[T]) -> Result<(), SinkError> {
        self.write_tag(Kind::TypedArray, 0)?;
        self.sink.write_byte(T::ELEM.code())?;
        self.write_unsigned_canonical(elems.len() as u64)?;
        #[cfg(target_endian = "little")]
        {
            // SAFETY: every `PackedElem` is a plain numeric type whose
            // in-memory layout on a little-endian host is exactly its wire
            // representation; the byte slice covers `elems.len() *
            // size_of::<T>()` bytes with no padding between elements.
            let bytes = unsafe {
                core::slice::from_raw_parts(
                    elems.as_ptr() as *const u8,
                    elems.len() * core::mem::size_of::<T>(),
                )
            };
            return self.sink.write_all(bytes);
        }
        #[cfg(not(target_endian = "little"))]
        {
            for &e in elems {
                let buf = e.to_le_bytes_vec();
                self.sink.write_all(&buf[..T::ELEM.size()])?;
            }
            Ok(())
        }
    }
}

/// A value a host type can turn into its canonical wire form via
/// [`Writer::write_any`]. Integers prefer the inline small form when they
/// fit, then the narrowest varint; see `spec.md` §4.4's canonical-encoding
/// rule.
pub trait WriteAny {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError>;
}

macro_rules! impl_write_any_unsigned {
    ($ty:ty) => {
        impl WriteAny for $ty {
            fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
                w.write_unsigned_canonical(*self as u64)
            }
        }
    };
}

macro_rules! impl_write_any_signed {
    ($ty:ty) => {
        impl WriteAny for $ty {
            fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
                w.write_signed_canonical(*self as i64)
            }
        }
    };
}

impl_write_any_unsigned!(u8);
impl_write_any_unsigned!(u16);
impl_write_any_unsigned!(u32);
impl_write_any_unsigned!(u64);
impl_write_any_signed!(i8);
impl_write_any_signed!(i16);
impl_write_any_signed!(i32);
impl_write_any_signed!(i64);

impl WriteAny for bool {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
        w.write_bool(*self)
    }
}

impl WriteAny for f32 {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
        w.write_f32(*self)
    }
}

impl WriteAny for f64 {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
        w.write_f64(*self)
    }
}

impl WriteAny for &str {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
        w.write_bytes_canonical(self.as_bytes())
    }
}

impl WriteAny for &[u8] {
    fn write_any_into<W: Sink>(&self, w: &mut Writer<W>) -> Result<(), SinkError> {
        w.write_bytes_canonical(self)
    }
}

impl<W: Sink> Writer<W> {
    /// Writes `value` in its canonical wire form (narrowest small/varint
    /// encoding for integers and byte strings; `write(kind, v)` is the
    /// escape hatch when a caller needs a specific fixed-width kind).
    pub fn write_any<T: WriteAny>(&mut self, value: &T) -> Result<(), SinkError> {
        value.write_any_into(self)
    }
}

/// A convenience `Writer<Vec<u8>>` for callers without their own `Sink`.
pub struct VecWriter {
    inner: Writer<Vec<u8>>,
}

impl VecWriter {
    pub fn new() -> Self {
        Self {
            inner: Writer::new(Vec::with_capacity(256)),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_sink()
    }
}

impl Default for VecWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for VecWriter {
    type Target = Writer<Vec<u8>>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl core::ops::DerefMut for VecWriter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
