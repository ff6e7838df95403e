//! Forward cursor over an encoded buffer. See `spec.md` §4.2.
//!
//! `Reader` never allocates and never copies a byte payload. Every
//! `Value::Bytes`/`TypedArray` it yields borrows directly from the source
//! slice. Parse limits (`MAX_DEPTH` plus three runtime ceilings) are baked
//! into the type via a const generic so that a Reader with every limit
//! disabled compiles its bounds checks away entirely; see the module-level
//! constants and [`UnboundedReader`]/[`Reader64`] below.

use crate::error::ReaderError;
use crate::path::{self, Segment};
use crate::tag::{decode_tag, ElemType, Kind};
use crate::value::{TypedArrayView, Value};
use crate::varint;

/// A cursor over an encoded buffer, generic over `MAX_DEPTH`: the static
/// capacity of the per-depth iteration-count stack used to enforce
/// `max_array_length`/`max_object_size`.
///
/// `MAX_DEPTH == 0` means unbounded nesting and carries a zero-sized counter
/// stack (matching `spec.md`'s "when all limits are disabled, the Reader has
/// no iteration-count stack"). With `MAX_DEPTH == 0`, `max_array_length` and
/// `max_object_size` have nowhere to store their counters and are not
/// enforced. Pick a nonzero `MAX_DEPTH` (e.g. [`Reader64`]) whenever those
/// limits matter.
pub struct Reader<'a, const MAX_DEPTH: usize = 0> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    max_bytes_length: u64,
    max_array_length: u64,
    max_object_size: u64,
    counters: [u32; MAX_DEPTH],
}

/// A Reader with every limit disabled: unbounded depth, no byte/array/object
/// ceilings. The common case for trusted input.
pub type UnboundedReader<'a> = Reader<'a, 0>;

/// A Reader bounding nesting to 64 levels, suitable as a default safety net
/// over untrusted input when combined with `with_limits`.
pub type Reader64<'a> = Reader<'a, 64>;

impl<'a, const MAX_DEPTH: usize> Reader<'a, MAX_DEPTH> {
    /// A reader over `buf` with no byte/array/object ceilings (depth is
    /// still bounded by `MAX_DEPTH`, if nonzero).
    pub const fn new(buf: &'a [u8]) -> Self {
        Self::with_limits(buf, 0, 0, 0)
    }

    /// A reader with explicit runtime ceilings. `0` means "disabled" for
    /// each of `max_bytes_length`, `max_array_length`, `max_object_size`.
    pub const fn with_limits(
        buf: &'a [u8],
        max_bytes_length: u64,
        max_array_length: u64,
        max_object_size: u64,
    ) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
            max_bytes_length,
            max_array_length,
            max_object_size,
            counters: [0; MAX_DEPTH],
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The full source buffer, for callers (the patch engine) that need to
    /// copy an already-skipped byte range verbatim.
    #[inline]
    pub(crate) fn raw_bytes(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    fn take_byte(&mut self) -> Result<u8, ReaderError> {
        let b = *self.buf.get(self.pos).ok_or(ReaderError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    fn take(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if n > self.remaining() {
            return Err(ReaderError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn open_container(&mut self) -> Result<(), ReaderError> {
        let new_depth = self.depth + 1;
        if MAX_DEPTH != 0 && new_depth > MAX_DEPTH {
            return Err(ReaderError::MaxDepthExceeded);
        }
        self.depth = new_depth;
        if MAX_DEPTH != 0 {
            self.counters[new_depth - 1] = 0;
        }
        Ok(())
    }

    fn close_container(&mut self) -> Result<(), ReaderError> {
        if self.depth == 0 {
            return Err(ReaderError::UnexpectedContainerEnd);
        }
        self.depth -= 1;
        Ok(())
    }

    /// Reads the raw little-endian length prefix used by `bytes` and checks
    /// it against `max_bytes_length`.
    fn checked_bytes_len(&self, len: u64) -> Result<usize, ReaderError> {
        if self.max_bytes_length != 0 && len > self.max_bytes_length {
            return Err(ReaderError::BytesTooLong);
        }
        Ok(len as usize)
    }

    /// Decodes the payload of a non-container, non-`container_end` kind.
    /// `data` is the tag byte's 3-bit inline field.
    fn decode_scalar(&mut self, kind: Kind, data: u8) -> Result<Value<'a>, ReaderError> {
        Ok(match kind {
            Kind::Object | Kind::Array | Kind::ContainerEnd => unreachable!("handled by read()"),
            Kind::Null => Value::Null,
            Kind::Bool => Value::Bool(data & 1 != 0),
            Kind::U8 => Value::U64(self.take_byte()? as u64),
            Kind::U16 => Value::U64(u16::from_le_bytes(self.take(2)?.try_into().unwrap()) as u64),
            Kind::U32 => Value::U64(u32::from_le_bytes(self.take(4)?.try_into().unwrap()) as u64),
            Kind::U64 => Value::U64(u64::from_le_bytes(self.take(8)?.try_into().unwrap())),
            Kind::I8 => Value::I64(self.take_byte()? as i8 as i64),
            Kind::I16 => Value::I64(i16::from_le_bytes(self.take(2)?.try_into().unwrap()) as i64),
            Kind::I32 => Value::I64(i32::from_le_bytes(self.take(4)?.try_into().unwrap()) as i64),
            Kind::I64 => Value::I64(i64::from_le_bytes(self.take(8)?.try_into().unwrap())),
            Kind::F16 => Value::F16(u16::from_le_bytes(self.take(2)?.try_into().unwrap())),
            Kind::F32 => Value::F32(f32::from_le_bytes(self.take(4)?.try_into().unwrap())),
            Kind::F64 => Value::F64(f64::from_le_bytes(self.take(8)?.try_into().unwrap())),
            Kind::SmallUint => Value::U64(data as u64),
            Kind::SmallIntPositive => {
                if data == 0 {
                    return Err(ReaderError::Malformed);
                }
                Value::I64(data as i64)
            }
            Kind::SmallIntNegative => {
                if data == 0 {
                    return Err(ReaderError::Malformed);
                }
                Value::I64(-(data as i64))
            }
            Kind::VarIntUnsigned => {
                let len = data as usize + 1;
                Value::U64(varint::read(self.take(len)?))
            }
            Kind::VarIntSignedPositive => {
                let len = data as usize + 1;
                let magnitude = varint::read(self.take(len)?);
                if magnitude > i64::MAX as u64 {
                    return Err(ReaderError::Malformed);
                }
                Value::I64(magnitude as i64)
            }
            Kind::VarIntSignedNegative => {
                let len = data as usize + 1;
                let magnitude = varint::read(self.take(len)?);
                if magnitude == 0 || magnitude > 1u64 << 63 {
                    return Err(ReaderError::Malformed);
                }
                let v = if magnitude == 1u64 << 63 {
                    i64::MIN
                } else {
                    -(magnitude as i64)
                };
                Value::I64(v)
            }
            Kind::Bytes => {
                let raw_len = u64::from_le_bytes(self.take(8)?.try_into().unwrap());
                let len = self.checked_bytes_len(raw_len)?;
                Value::Bytes(self.take(len)?)
            }
            Kind::VarIntBytes => {
                let len_of_len = data as usize + 1;
                let raw_len = varint::read(self.take(len_of_len)?);
                let len = self.checked_bytes_len(raw_len)?;
                Value::Bytes(self.take(len)?)
            }
            Kind::SmallBytes => Value::Bytes(self.take(data as usize)?),
            Kind::TypedArray => {
                let elem_byte = self.take_byte()?;
                let elem = ElemType::from_code(elem_byte).ok_or(ReaderError::Malformed)?;
                let count_byte = self.take_byte()?;
                let (count_code, count_data) = decode_tag(count_byte);
                let count = match Kind::from_code(count_code) {
                    Some(Kind::SmallUint) => count_data as u64,
                    Some(Kind::VarIntUnsigned) => {
                        let len = count_data as usize + 1;
                        varint::read(self.take(len)?)
                    }
                    _ => return Err(ReaderError::Malformed),
                };
                if self.max_array_length != 0 && count > self.max_array_length {
                    return Err(ReaderError::ArrayTooLarge);
                }
                let count = count as usize;
                let total = count
                    .checked_mul(elem.size())
                    .ok_or(ReaderError::Malformed)?;
                let bytes = self.take(total)?;
                Value::TypedArray(TypedArrayView::new(elem, count, bytes))
            }
        })
    }

    /// Advances one value, returning its decoded kind and payload. For
    /// containers, only the open marker is consumed. Iterate with
    /// [`Self::iterate_object`]/[`Self::iterate_array`] or skip past it with
    /// [`Self::skip_value`].
    pub fn read(&mut self) -> Result<Value<'a>, ReaderError> {
        let byte = self.take_byte()?;
        let (code, data) = decode_tag(byte);
        let kind = Kind::from_code(code).ok_or(ReaderError::InvalidTag(byte))?;
        match kind {
            Kind::Object => {
                self.open_container()?;
                Ok(Value::Object)
            }
            Kind::Array => {
                self.open_container()?;
                Ok(Value::Array)
            }
            Kind::ContainerEnd => Err(ReaderError::UnexpectedContainerEnd),
            other => self.decode_scalar(other, data),
        }
    }

    /// Advances past one value, including every byte of a container's body.
    pub fn skip_value(&mut self) -> Result<(), ReaderError> {
        let value = self.read()?;
        self.skip_value_tail(value)
    }

    /// Finishes skipping a value already obtained from `read()`/iteration:
    /// a no-op for scalars (their payload is already fully consumed), and a
    /// flat scan to the matching `container_end` for containers. Exposed to
    /// the patch engine, which drains values it decides not to touch.
    pub(crate) fn skip_value_tail(&mut self, value: Value<'a>) -> Result<(), ReaderError> {
        if !matches!(value, Value::Object | Value::Array) {
            return Ok(());
        }
        let target = self.depth;
        loop {
            let byte = self.take_byte()?;
            let (code, data) = decode_tag(byte);
            let kind = Kind::from_code(code).ok_or(ReaderError::InvalidTag(byte))?;
            match kind {
                Kind::Object | Kind::Array => self.open_container()?,
                Kind::ContainerEnd => {
                    self.close_container()?;
                    if self.depth < target {
                        break;
                    }
                }
                other => {
                    self.decode_scalar(other, data)?;
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn peek_is_container_end(&self) -> Result<bool, ReaderError> {
        let byte = *self.buf.get(self.pos).ok_or(ReaderError::UnexpectedEof)?;
        let (code, _) = decode_tag(byte);
        Ok(code == Kind::ContainerEnd.code())
    }

    fn bump_array_counter(&mut self) -> Result<(), ReaderError> {
        if MAX_DEPTH != 0 && self.max_array_length != 0 && self.depth > 0 {
            let slot = &mut self.counters[self.depth - 1];
            *slot += 1;
            if *slot as u64 > self.max_array_length {
                return Err(ReaderError::ArrayTooLarge);
            }
        }
        Ok(())
    }

    fn bump_object_counter(&mut self) -> Result<(), ReaderError> {
        if MAX_DEPTH != 0 && self.max_object_size != 0 && self.depth > 0 {
            let slot = &mut self.counters[self.depth - 1];
            *slot += 1;
            if *slot as u64 > self.max_object_size {
                return Err(ReaderError::ObjectTooLarge);
            }
        }
        Ok(())
    }

    /// Yields the next `(key, value)` pair of an already-opened object, or
    /// `None` (having consumed its `container_end`) when exhausted.
    pub fn iterate_object(&mut self) -> Result<Option<(&'a [u8], Value<'a>)>, ReaderError> {
        Ok(self.iterate_object_with_bounds()?.map(|m| (m.key, m.value)))
    }

    /// As `iterate_object`, but also reports the cursor position right after
    /// the key (and before the value's tag byte). The patch engine needs
    /// this to copy an unchanged key's raw encoding verbatim while still
    /// replacing or descending into its value.
    pub(crate) fn iterate_object_with_bounds(
        &mut self,
    ) -> Result<Option<ObjectMember<'a>>, ReaderError> {
        if self.peek_is_container_end()? {
            self.take_byte()?;
            self.close_container()?;
            return Ok(None);
        }
        self.bump_object_counter()?;
        let key = match self.read()? {
            Value::Bytes(b) => b,
            _ => return Err(ReaderError::Malformed),
        };
        let value_start = self.pos;
        let value = self.read()?;
        Ok(Some(ObjectMember {
            key,
            value_start,
            value,
        }))
    }

    /// Yields the next element of an already-opened array, or `None` (having
    /// consumed its `container_end`) when exhausted.
    pub fn iterate_array(&mut self) -> Result<Option<Value<'a>>, ReaderError> {
        if self.peek_is_container_end()? {
            self.take_byte()?;
            self.close_container()?;
            return Ok(None);
        }
        self.bump_array_counter()?;
        Ok(Some(self.read()?))
    }

    /// Resolves a single path against the value at the current cursor
    /// position, without moving the cursor. `None` if the path is malformed
    /// or does not resolve against this buffer's structure.
    pub fn read_path(&mut self, path: &[u8]) -> Result<Option<Value<'a>>, ReaderError> {
        let saved = (self.pos, self.depth, self.counters);
        let result = self.resolve_path(path);
        self.pos = saved.0;
        self.depth = saved.1;
        self.counters = saved.2;
        result
    }

    fn resolve_path(&mut self, path: &[u8]) -> Result<Option<Value<'a>>, ReaderError> {
        if path.is_empty() {
            return Ok(Some(self.read()?));
        }
        let value = self.read()?;
        self.resolve_in_container(value, path)
    }

    fn resolve_in_container(
        &mut self,
        container: Value<'a>,
        path: &[u8],
    ) -> Result<Option<Value<'a>>, ReaderError> {
        let (segment, rest) = match path::parse_segment(path) {
            Some(parsed) => parsed,
            None => {
                self.skip_value_tail(container)?;
                return Ok(None);
            }
        };
        match (segment, container) {
            (Segment::Key(key), Value::Object) => loop {
                match self.iterate_object()? {
                    None => return Ok(None),
                    Some((k, v)) => {
                        if k == key {
                            return self.finish_match(rest, v);
                        }
                        self.skip_value_tail(v)?;
                    }
                }
            },
            (Segment::Index(index), Value::Array) => {
                let mut i = 0u64;
                loop {
                    match self.iterate_array()? {
                        None => return Ok(None),
                        Some(v) => {
                            if i == index {
                                return self.finish_match(rest, v);
                            }
                            self.skip_value_tail(v)?;
                            i += 1;
                        }
                    }
                }
            }
            (_, other) => {
                self.skip_value_tail(other)?;
                Ok(None)
            }
        }
    }

    fn finish_match(&mut self, rest: &[u8], value: Value<'a>) -> Result<Option<Value<'a>>, ReaderError> {
        if rest.is_empty() {
            Ok(Some(value))
        } else if matches!(value, Value::Object | Value::Array) {
            self.resolve_in_container(value, rest)
        } else {
            Ok(None)
        }
    }

    /// Resolves every path in `queries` against the value at the current
    /// cursor position in one forward pass over the buffer, restoring the
    /// cursor on return. `out[i]` receives the result for `queries[i]`.
    ///
    /// `order` and `out` must have the same length as `queries`; both are
    /// caller-owned scratch (`order` is sorted in place) so resolving many
    /// queries allocates nothing beyond what the caller already supplied.
    pub fn read_paths(
        &mut self,
        queries: &[&[u8]],
        order: &mut [usize],
        out: &mut [Option<Value<'a>>],
    ) -> Result<(), ReaderError> {
        debug_assert_eq!(queries.len(), order.len());
        debug_assert_eq!(queries.len(), out.len());

        for (i, slot) in order.iter_mut().enumerate() {
            *slot = i;
        }
        order.sort_unstable_by(|&a, &b| path::compare(queries[a], queries[b]));
        for slot in out.iter_mut() {
            *slot = None;
        }

        let saved = (self.pos, self.depth, self.counters);

        let root_range_end = order.len();
        // Queries with an empty path want the root value itself. Pull them
        // out of the group before descending (they sort first: an empty
        // remainder always sorts before a non-empty one that shares its,
        // vacuous, "prefix").
        let mut start = 0;
        while start < root_range_end && queries[order[start]].is_empty() {
            start += 1;
        }
        let root_value = self.read()?;
        for &qi in &order[..start] {
            out[qi] = Some(root_value);
        }
        if start < root_range_end {
            self.read_paths_in_container(queries, order, start, root_range_end, root_value, out, 0)?;
        } else {
            self.skip_value_tail(root_value)?;
        }

        self.pos = saved.0;
        self.depth = saved.1;
        self.counters = saved.2;
        Ok(())
    }

    /// Scans one already-opened container once, matching its members against
    /// the (sorted, depth-prefix-contiguous) slice `order[start..end]` and
    /// recursing into child containers for queries with remaining segments.
    /// Matched entries are compacted out of `order[start..end]` in place so
    /// later members of the same container can't re-match a path whose
    /// first occurrence already resolved it.
    #[allow(clippy::too_many_arguments)]
    fn read_paths_in_container(
        &mut self,
        queries: &[&[u8]],
        order: &mut [usize],
        mut start: usize,
        mut end: usize,
        container: Value<'a>,
        out: &mut [Option<Value<'a>>],
        depth: usize,
    ) -> Result<(), ReaderError> {
        if !matches!(container, Value::Object | Value::Array) {
            self.skip_value_tail(container)?;
            return Ok(());
        }
        let is_object = matches!(container, Value::Object);
        let mut array_index: u64 = 0;

        loop {
            let member = if is_object {
                match self.iterate_object()? {
                    None => break,
                    Some((k, v)) => (Segment::Key(k), v),
                }
            } else {
                match self.iterate_array()? {
                    None => break,
                    Some(v) => {
                        let seg = Segment::Index(array_index);
                        array_index += 1;
                        (seg, v)
                    }
                }
            };
            if start >= end {
                self.skip_value_tail(member.1)?;
                continue;
            }
            let (target, value) = member;
            let lo = start
                + order[start..end].partition_point(|&qi| {
                    path::segment_cmp(&segment_at(queries[qi], depth), &target) == core::cmp::Ordering::Less
                });
            let hi = start
                + order[start..end].partition_point(|&qi| {
                    path::segment_cmp(&segment_at(queries[qi], depth), &target) != core::cmp::Ordering::Greater
                });
            if lo >= hi {
                self.skip_value_tail(value)?;
                continue;
            }

            // Within [lo, hi) (all sharing this depth's segment), paths
            // ending here sort before ones that continue (ordering rule 4),
            // so the leaf/child split is itself a contiguous boundary.
            let child_start =
                lo + order[lo..hi].partition_point(|&qi| segment_rest_empty(queries[qi], depth));
            for &qi in &order[lo..child_start] {
                out[qi] = Some(value);
            }
            if child_start < hi && matches!(value, Value::Object | Value::Array) {
                self.read_paths_in_container(queries, order, child_start, hi, value, out, depth + 1)?;
            } else {
                // Either every match in the block was a leaf (value already
                // fully read for scalars, and still needs draining if it's
                // a container), or a child path reached into a non-container
                // value and has nothing to match. Either way, drain it.
                self.skip_value_tail(value)?;
            }

            // Compact out order[lo..hi]: shift the tail left to close the gap.
            order.copy_within(hi..end, lo);
            end -= hi - lo;
            start = lo;
        }
        Ok(())
    }

}

/// One `(key, value)` pair yielded mid-scan by `iterate_object_with_bounds`.
pub(crate) struct ObjectMember<'a> {
    pub key: &'a [u8],
    /// Cursor position immediately after the key, before the value's tag.
    pub value_start: usize,
    pub value: Value<'a>,
}

pub(crate) fn segment_at<'p>(path: &'p [u8], depth: usize) -> Segment<'p> {
    path::segment_at_depth(path, depth).unwrap_or(Segment::Key(b""))
}

pub(crate) fn segment_rest_empty(path: &[u8], depth: usize) -> bool {
    let mut rest = path;
    for _ in 0..=depth {
        match path::parse_segment(rest) {
            Some((_, next)) => rest = next,
            None => return true,
        }
    }
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::VecWriter;

    fn sample_buffer() -> Vec<u8> {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"a").unwrap();
        w.write_any(&1i64).unwrap();
        w.write_any_key(b"b").unwrap();
        w.start_object().unwrap();
        w.write_any_key(b"c").unwrap();
        w.write_any(&true).unwrap();
        w.write_any_key(b"d").unwrap();
        w.write_any(&"old").unwrap();
        w.end_container().unwrap();
        w.write_any_key(b"arr").unwrap();
        w.start_array().unwrap();
        w.write_any(&10i64).unwrap();
        w.write_any(&20i64).unwrap();
        w.end_container().unwrap();
        w.end_container().unwrap();
        w.into_bytes()
    }

    #[test]
    fn read_scalars_in_order() {
        let buf = sample_buffer();
        let mut r: UnboundedReader = Reader::new(&buf);
        assert_eq!(r.read().unwrap(), Value::Object);
        assert_eq!(r.iterate_object().unwrap().unwrap().0, b"a");
    }

    #[test]
    fn read_path_resolves_nested_and_indexed() {
        let buf = sample_buffer();
        let mut r: UnboundedReader = Reader::new(&buf);
        assert_eq!(r.read_path(b"a").unwrap(), Some(Value::I64(1)));
        assert_eq!(r.read_path(b"b.c").unwrap(), Some(Value::Bool(true)));
        assert_eq!(r.read_path(b"b.d").unwrap(), Some(Value::Bytes(b"old")));
        assert_eq!(r.read_path(b"arr[1]").unwrap(), Some(Value::I64(20)));
        assert_eq!(r.read_path(b"arr[9]").unwrap(), None);
        assert_eq!(r.read_path(b"missing").unwrap(), None);
        // cursor was restored each time, so re-reading from scratch works
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn path_type_mismatch_resolves_to_none() {
        let buf = sample_buffer();
        let mut r: UnboundedReader = Reader::new(&buf);
        assert_eq!(r.read_path(b"a.b").unwrap(), None);
        assert_eq!(r.read_path(b"arr.key").unwrap(), None);
    }

    #[test]
    fn max_depth_exceeded() {
        let mut w = VecWriter::new();
        for _ in 0..8 {
            w.start_array().unwrap();
        }
        w.write_any(&1i64).unwrap();
        for _ in 0..8 {
            w.end_container().unwrap();
        }
        let buf = w.into_bytes();

        let mut r: Reader<5> = Reader::with_limits(&buf, 0, 0, 0);
        for _ in 0..5 {
            assert!(matches!(r.read(), Ok(Value::Array)));
        }
        assert_eq!(r.read(), Err(ReaderError::MaxDepthExceeded));
    }

    #[test]
    fn bytes_too_long() {
        let mut w = VecWriter::new();
        let long = vec![b'x'; 100];
        w.write_any(&long.as_slice()).unwrap();
        let buf = w.into_bytes();

        let mut r: UnboundedReader = Reader::with_limits(&buf, 50, 0, 0);
        assert_eq!(r.read(), Err(ReaderError::BytesTooLong));
    }

    #[test]
    fn read_paths_matches_individual_read_path() {
        let buf = sample_buffer();
        let queries: [&[u8]; 4] = [b"a", b"b.c", b"arr[1]", b"missing"];
        let mut order = [0usize; 4];
        let mut out: [Option<Value>; 4] = [None; 4];
        let mut r: UnboundedReader = Reader::new(&buf);
        r.read_paths(&queries, &mut order, &mut out).unwrap();
        assert_eq!(out[0], Some(Value::I64(1)));
        assert_eq!(out[1], Some(Value::Bool(true)));
        assert_eq!(out[2], Some(Value::I64(20)));
        assert_eq!(out[3], None);
        assert_eq!(r.position(), 0);
    }
}
