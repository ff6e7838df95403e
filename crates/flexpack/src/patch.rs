//! The single-pass patch engine: `apply_updates`. See `spec.md` §4.4.
//!
//! The source buffer is walked once with a [`Reader`]; every byte range the
//! walk decides not to touch is copied into the sink verbatim. Updates are
//! pre-sorted by [`path::compare`] so that, at any depth, the updates
//! relevant to one container member form a contiguous range, the same
//! technique `Reader::read_paths` uses for batched queries, generalized here
//! to also cover upserts (updates whose path has no match in the source at
//! all) and typed-array element patches.

use crate::error::{PatchError, SinkError};
use crate::path::{self, Segment};
use crate::reader::{segment_at, segment_rest_empty, ObjectMember, Reader, UnboundedReader};
use crate::sink::Sink;
use crate::tag::ElemType;
use crate::value::{TypedArrayView, Value};
use crate::writer::Writer;
use core::cmp::Ordering;

/// One path-addressed update submitted to [`apply_updates`].
///
/// `write_fn` always emits into a reused `Vec<u8>` scratch buffer rather than
/// directly into the caller's output sink, so a typed-array element patch
/// (§4.4 step 7) can reinterpret the written bytes as a packed element
/// before copying them on.
pub struct Update<'a> {
    path: &'a [u8],
    write_fn: &'a mut dyn FnMut(&mut Writer<Vec<u8>>) -> Result<(), SinkError>,
    applied: bool,
}

impl<'a> Update<'a> {
    /// Builds an update from a path and a write closure. The closure is
    /// typically a local variable the caller takes `&mut` of, e.g.:
    ///
    /// ```
    /// use flexpack::patch::Update;
    /// use flexpack::writer::Writer;
    ///
    /// let mut set_a = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
    /// let update = Update::new(b"a", &mut set_a);
    /// ```
    pub fn new(
        path: &'a [u8],
        write_fn: &'a mut dyn FnMut(&mut Writer<Vec<u8>>) -> Result<(), SinkError>,
    ) -> Self {
        Self {
            path,
            write_fn,
            applied: false,
        }
    }

    #[inline]
    pub fn path(&self) -> &'a [u8] {
        self.path
    }

    /// Whether the engine applied (or discarded, as a shadowed duplicate)
    /// this update. `apply_updates` guarantees every update whose path
    /// resolves within the produced buffer has `applied() == true` on
    /// return.
    #[inline]
    pub fn applied(&self) -> bool {
        self.applied
    }
}

/// Applies a batch of `updates` against `source`, writing the patched
/// encoding to `sink` and returning it. See `spec.md` §4.4 for the full
/// protocol; in short:
///
/// - an update whose path resolves to an existing value replaces it;
/// - an update whose path has no match in the source creates (upserts) the
///   missing keys/array slots, filling array gaps with `null`;
/// - bytes belonging to subtrees no update touches are copied verbatim.
///
/// `order` is caller-owned scratch used to sort and group updates without
/// moving them (update values hold `&mut dyn FnMut`, so they are not
/// `Copy`); it must have the same length as `updates`.
pub fn apply_updates<W: Sink>(
    source: &[u8],
    updates: &mut [Update<'_>],
    order: &mut [usize],
    sink: W,
) -> Result<W, PatchError> {
    assert_eq!(order.len(), updates.len(), "order must match updates length");

    for u in updates.iter_mut() {
        u.applied = false;
    }
    for u in updates.iter() {
        if !path::validate(u.path) {
            return Err(PatchError::MalformedPath);
        }
    }
    for (i, slot) in order.iter_mut().enumerate() {
        *slot = i;
    }
    order.sort_by(|&a, &b| path::compare(updates[a].path, updates[b].path));

    let mut writer = Writer::new(sink);
    let mut reader: UnboundedReader = Reader::new(source);
    let mut scratch = Vec::new();

    let root_count = order.iter().filter(|&&i| updates[i].path.is_empty()).count();
    if root_count > 0 {
        if updates.len() != 1 {
            return Err(PatchError::ConflictingUpdates);
        }
        let idx = order[0];
        invoke_leaf(&mut updates[idx], &mut scratch)?;
        writer.write_raw(&scratch)?;
        updates[idx].applied = true;
        reader.skip_value()?;
        return Ok(writer.into_sink());
    }

    let root = reader.read()?;
    if !matches!(root, Value::Object | Value::Array) {
        return Err(PatchError::InvalidRoot);
    }
    match root {
        Value::Object => {
            writer.start_object()?;
            patch_object(&mut reader, &mut writer, &mut scratch, updates, order, 0, updates.len(), 0)?;
        }
        Value::Array => {
            writer.start_array()?;
            patch_array(&mut reader, &mut writer, &mut scratch, updates, order, 0, updates.len(), 0)?;
        }
        _ => unreachable!("checked above"),
    }
    Ok(writer.into_sink())
}

/// Runs `update.write_fn` into `scratch` (cleared first), leaving the
/// emitted tagged value's bytes in `scratch` for the caller to either copy
/// verbatim or decode.
fn invoke_leaf(update: &mut Update<'_>, scratch: &mut Vec<u8>) -> Result<(), PatchError> {
    scratch.clear();
    let taken = core::mem::take(scratch);
    let mut w = Writer::new(taken);
    (update.write_fn)(&mut w)?;
    *scratch = w.into_sink();
    Ok(())
}

/// `true` iff `order[start..end]` has at least one leaf (empty remainder at
/// `depth`) and at least one child (non-empty remainder). This is the
/// conflict the engine must reject per `spec.md` §4.4 step 5.
fn split_leaf_child(updates: &[Update<'_>], order: &[usize], start: usize, end: usize, depth: usize) -> usize {
    start + order[start..end].partition_point(|&qi| segment_rest_empty(updates[qi].path, depth))
}

/// Walks one already-opened source object, matching its members against the
/// sorted range `updates[order[start..end]]`, then emits upserts for
/// whatever in that range never matched an existing key, then closes the
/// container. Mirrors `Reader::read_paths_in_container`'s compaction
/// technique: a matched range is removed from `[start, end)` by shifting the
/// remainder left, so later members scan a shrinking window.
#[allow(clippy::too_many_arguments)]
fn patch_object<W: Sink>(
    reader: &mut UnboundedReader,
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    mut start: usize,
    mut end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    loop {
        let key_start = reader.position();
        let member = match reader.iterate_object_with_bounds()? {
            None => break,
            Some(m) => m,
        };
        if start >= end {
            copy_verbatim(reader, writer, key_start, member.value)?;
            continue;
        }
        let key_seg = Segment::Key(member.key);
        let (lo, hi) = matching_range(updates, order, start, end, depth, key_seg);
        if lo >= hi {
            copy_verbatim(reader, writer, key_start, member.value)?;
            continue;
        }
        handle_matched_member(reader, writer, scratch, key_start, member, updates, order, lo, hi, depth)?;
        order.copy_within(hi..end, lo);
        end -= hi - lo;
        start = lo;
    }
    finish_object_upserts(writer, scratch, updates, order, start, end, depth)?;
    writer.end_container()?;
    Ok(())
}

/// As `patch_object`, but over an already-opened source array; `depth` keys
/// updates by numeric index instead of object key.
#[allow(clippy::too_many_arguments)]
fn patch_array<W: Sink>(
    reader: &mut UnboundedReader,
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    mut start: usize,
    mut end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    let mut index: u64 = 0;
    loop {
        let elem_start = reader.position();
        let value = match reader.iterate_array()? {
            None => break,
            Some(v) => v,
        };
        if start >= end {
            copy_verbatim(reader, writer, elem_start, value)?;
            index += 1;
            continue;
        }
        let idx_seg = Segment::Index(index);
        let (lo, hi) = matching_range(updates, order, start, end, depth, idx_seg);
        if lo >= hi {
            copy_verbatim(reader, writer, elem_start, value)?;
            index += 1;
            continue;
        }
        let member = ObjectMember {
            key: &[],
            value_start: elem_start,
            value,
        };
        handle_matched_member(reader, writer, scratch, elem_start, member, updates, order, lo, hi, depth)?;
        order.copy_within(hi..end, lo);
        end -= hi - lo;
        start = lo;
        index += 1;
    }
    finish_array_upserts(writer, scratch, updates, order, start, end, depth, index)?;
    writer.end_container()?;
    Ok(())
}

/// Copies a fully-drained source value's raw bytes (from `start` through
/// wherever the reader's cursor now sits) straight into the sink. Used for
/// the "no update touches this subtree" case at every level.
fn copy_verbatim<W: Sink>(
    reader: &mut UnboundedReader,
    writer: &mut Writer<W>,
    start: usize,
    value: Value<'_>,
) -> Result<(), PatchError> {
    reader.skip_value_tail(value)?;
    let end = reader.position();
    writer.write_raw(&reader.raw_bytes()[start..end])?;
    Ok(())
}

/// The contiguous sub-range of `order[start..end]` whose depth-`depth`
/// segment equals `target`. A binary search, since `order[start..end]` is
/// sorted by `path::compare` and rule 1/2/3 of that order group same-segment
/// entries contiguously.
fn matching_range(
    updates: &[Update<'_>],
    order: &[usize],
    start: usize,
    end: usize,
    depth: usize,
    target: Segment<'_>,
) -> (usize, usize) {
    let lo = start
        + order[start..end]
            .partition_point(|&qi| path::segment_cmp(&segment_at(updates[qi].path, depth), &target) == Ordering::Less);
    let hi = start
        + order[start..end].partition_point(|&qi| {
            path::segment_cmp(&segment_at(updates[qi].path, depth), &target) != Ordering::Greater
        });
    (lo, hi)
}

/// Handles a source member (object pair or array element) whose depth-`depth`
/// segment matched at least one update in `order[start..end]`.
#[allow(clippy::too_many_arguments)]
fn handle_matched_member<W: Sink>(
    reader: &mut UnboundedReader,
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    key_start: usize,
    member: ObjectMember<'_>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    start: usize,
    end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    let child_start = split_leaf_child(updates, order, start, end, depth);
    let has_leaf = child_start > start;
    let has_child = child_start < end;
    if has_leaf && has_child {
        return Err(PatchError::ConflictingUpdates);
    }

    if has_leaf {
        for &qi in &order[start..child_start - 1] {
            updates[qi].applied = true;
        }
        let winner = order[child_start - 1];
        writer.write_raw(&reader.raw_bytes()[key_start..member.value_start])?;
        invoke_leaf(&mut updates[winner], scratch)?;
        writer.write_raw(scratch)?;
        updates[winner].applied = true;
        reader.skip_value_tail(member.value)?;
        return Ok(());
    }

    match member.value {
        Value::Object => {
            writer.write_raw(&reader.raw_bytes()[key_start..member.value_start])?;
            writer.start_object()?;
            patch_object(reader, writer, scratch, updates, order, start, end, depth + 1)?;
        }
        Value::Array => {
            writer.write_raw(&reader.raw_bytes()[key_start..member.value_start])?;
            writer.start_array()?;
            patch_array(reader, writer, scratch, updates, order, start, end, depth + 1)?;
        }
        Value::TypedArray(view) => {
            writer.write_raw(&reader.raw_bytes()[key_start..member.value_start])?;
            patch_typed_array(writer, scratch, view, updates, order, start, end, depth + 1)?;
        }
        _ => return Err(PatchError::PathTypeMismatch),
    }
    Ok(())
}

/// Emits whatever updates in `order[start..end]` never matched an existing
/// object key: the upsert / gap-fill path of `spec.md` §4.4 step 6. Groups
/// by depth-`depth` key (already sorted contiguous) and, for each group,
/// writes the key followed by either a leaf value or a freshly built
/// container.
fn finish_object_upserts<W: Sink>(
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    mut start: usize,
    end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    while start < end {
        let key_seg = segment_at(updates[order[start]].path, depth);
        let key = match key_seg {
            Segment::Key(k) => k,
            Segment::Index(_) => return Err(PatchError::PathTypeMismatch),
        };
        let (_, hi) = matching_range(updates, order, start, end, depth, key_seg);
        writer.write_any_key(key)?;
        emit_group(writer, scratch, updates, order, start, hi, depth)?;
        start = hi;
    }
    Ok(())
}

/// As `finish_object_upserts`, but for array upserts: groups by numeric
/// index and fills any gap between the array's existing length
/// (`next_index`) and each upsert index with `null`.
#[allow(clippy::too_many_arguments)]
fn finish_array_upserts<W: Sink>(
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    mut start: usize,
    end: usize,
    depth: usize,
    mut next_index: u64,
) -> Result<(), PatchError> {
    while start < end {
        let idx_seg = segment_at(updates[order[start]].path, depth);
        let index = match idx_seg {
            Segment::Index(ix) => ix,
            Segment::Key(_) => return Err(PatchError::PathTypeMismatch),
        };
        while next_index < index {
            writer.write_null()?;
            next_index += 1;
        }
        let (_, hi) = matching_range(updates, order, start, end, depth, idx_seg);
        emit_group(writer, scratch, updates, order, start, hi, depth)?;
        next_index = index + 1;
        start = hi;
    }
    Ok(())
}

/// Writes one group of updates sharing a single key/index segment: a leaf
/// value if the group's remainder is empty, otherwise a brand-new container
/// (kind inferred from the first child's next segment) built entirely from
/// the group's own updates.
fn emit_group<W: Sink>(
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    start: usize,
    end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    let child_start = split_leaf_child(updates, order, start, end, depth);
    let has_leaf = child_start > start;
    let has_child = child_start < end;
    if has_leaf && has_child {
        return Err(PatchError::ConflictingUpdates);
    }

    if has_leaf {
        for &qi in &order[start..child_start - 1] {
            updates[qi].applied = true;
        }
        let winner = order[child_start - 1];
        invoke_leaf(&mut updates[winner], scratch)?;
        writer.write_raw(scratch)?;
        updates[winner].applied = true;
        return Ok(());
    }

    match segment_at(updates[order[start]].path, depth + 1) {
        Segment::Key(_) => {
            writer.start_object()?;
            finish_object_upserts(writer, scratch, updates, order, start, end, depth + 1)?;
            writer.end_container()?;
        }
        Segment::Index(_) => {
            writer.start_array()?;
            finish_array_upserts(writer, scratch, updates, order, start, end, depth + 1, 0)?;
            writer.end_container()?;
        }
    }
    Ok(())
}

/// Rewrites a source `typed_array`'s packed payload, applying every update
/// in `order[start..end]` that addresses one of its elements by index
/// (`spec.md` §4.4 step 7). Indices are not upsertable, since a `typed_array`
/// cannot grow, and a path reaching past an index (rather than ending at it)
/// is a type mismatch, since elements are scalars.
#[allow(clippy::too_many_arguments)]
fn patch_typed_array<W: Sink>(
    writer: &mut Writer<W>,
    scratch: &mut Vec<u8>,
    view: TypedArrayView<'_>,
    updates: &mut [Update<'_>],
    order: &mut [usize],
    start: usize,
    end: usize,
    depth: usize,
) -> Result<(), PatchError> {
    let elem = view.elem_type();
    let elem_size = elem.size();
    let payload = view.raw_bytes();
    writer.write_typed_array_header(elem, view.len())?;

    let mut cursor = 0usize;
    let mut i = start;
    while i < end {
        let seg = segment_at(updates[order[i]].path, depth);
        let index = match seg {
            Segment::Index(ix) => ix,
            Segment::Key(_) => return Err(PatchError::PathTypeMismatch),
        };
        if !segment_rest_empty(updates[order[i]].path, depth) {
            return Err(PatchError::PathTypeMismatch);
        }
        let index = index as usize;
        if index >= view.len() {
            return Err(PatchError::IndexOutOfRange);
        }
        let off = index * elem_size;
        writer.write_raw(&payload[cursor..off])?;

        let (_, hi) = matching_range(updates, order, i, end, depth, seg);
        for &qi in &order[i..hi - 1] {
            updates[qi].applied = true;
        }
        let winner = order[hi - 1];
        invoke_leaf(&mut updates[winner], scratch)?;
        let mut tmp: UnboundedReader = Reader::new(scratch);
        let value = tmp.read()?;
        let bytes = encode_typed_scalar(elem, value)?;
        writer.write_raw(&bytes[..elem_size])?;
        updates[winner].applied = true;

        cursor = off + elem_size;
        i = hi;
    }
    writer.write_raw(&payload[cursor..])?;
    Ok(())
}

fn as_u64_exact(v: Value<'_>) -> Result<u64, PatchError> {
    match v {
        Value::U64(n) => Ok(n),
        Value::I64(n) if n >= 0 => Ok(n as u64),
        _ => Err(PatchError::PathTypeMismatch),
    }
}

fn as_i64_exact(v: Value<'_>) -> Result<i64, PatchError> {
    match v {
        Value::I64(n) => Ok(n),
        Value::U64(n) if n <= i64::MAX as u64 => Ok(n as i64),
        _ => Err(PatchError::PathTypeMismatch),
    }
}

fn fits_unsigned(v: u64, size: usize) -> Result<(), PatchError> {
    let max = if size >= 8 { u64::MAX } else { (1u64 << (size * 8)) - 1 };
    if v > max {
        Err(PatchError::PathTypeMismatch)
    } else {
        Ok(())
    }
}

fn fits_signed(v: i64, size: usize) -> Result<(), PatchError> {
    let bits = (size * 8) as u32;
    let (min, max) = if bits >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    };
    if v < min || v > max {
        Err(PatchError::PathTypeMismatch)
    } else {
        Ok(())
    }
}

/// Reinterprets a decoded scalar `Value` as the raw little-endian bytes of
/// one `elem`-typed packed array element. Integers narrow between
/// compatible signed/unsigned kinds when the magnitude fits; floats must
/// match `elem`'s width exactly (`spec.md` §4.4 step 7: "reject floats with
/// non-matching kind").
fn encode_typed_scalar(elem: ElemType, value: Value<'_>) -> Result<[u8; 8], PatchError> {
    let mut out = [0u8; 8];
    match elem {
        ElemType::U8 => {
            let v = as_u64_exact(value)?;
            fits_unsigned(v, 1)?;
            out[0] = v as u8;
        }
        ElemType::U16 => {
            let v = as_u64_exact(value)?;
            fits_unsigned(v, 2)?;
            out[..2].copy_from_slice(&(v as u16).to_le_bytes());
        }
        ElemType::U32 => {
            let v = as_u64_exact(value)?;
            fits_unsigned(v, 4)?;
            out[..4].copy_from_slice(&(v as u32).to_le_bytes());
        }
        ElemType::U64 => {
            let v = as_u64_exact(value)?;
            out.copy_from_slice(&v.to_le_bytes());
        }
        ElemType::I8 => {
            let v = as_i64_exact(value)?;
            fits_signed(v, 1)?;
            out[0] = (v as i8) as u8;
        }
        ElemType::I16 => {
            let v = as_i64_exact(value)?;
            fits_signed(v, 2)?;
            out[..2].copy_from_slice(&(v as i16).to_le_bytes());
        }
        ElemType::I32 => {
            let v = as_i64_exact(value)?;
            fits_signed(v, 4)?;
            out[..4].copy_from_slice(&(v as i32).to_le_bytes());
        }
        ElemType::I64 => {
            let v = as_i64_exact(value)?;
            out.copy_from_slice(&v.to_le_bytes());
        }
        ElemType::F16 => match value {
            Value::F16(bits) => out[..2].copy_from_slice(&bits.to_le_bytes()),
            _ => return Err(PatchError::PathTypeMismatch),
        },
        ElemType::F32 => match value {
            Value::F32(f) => out[..4].copy_from_slice(&f.to_le_bytes()),
            _ => return Err(PatchError::PathTypeMismatch),
        },
        ElemType::F64 => match value {
            Value::F64(f) => out[..8].copy_from_slice(&f.to_le_bytes()),
            _ => return Err(PatchError::PathTypeMismatch),
        },
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::UnboundedReader;
    use crate::writer::VecWriter;

    fn encode_scenario_source() -> Vec<u8> {
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

    fn read_path<'a>(buf: &'a [u8], path: &[u8]) -> Option<Value<'a>> {
        let mut r: UnboundedReader = Reader::new(buf);
        r.read_path(path).unwrap()
    }

    #[test]
    fn scenario_1_full_batch() {
        let source = encode_scenario_source();
        let mut set_a = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
        let mut set_bd = |w: &mut Writer<Vec<u8>>| w.write_any(&"new");
        let mut set_x = |w: &mut Writer<Vec<u8>>| w.write_any(&999i64);
        let mut set_bef = |w: &mut Writer<Vec<u8>>| w.write_any(&5i64);
        let mut set_arr1 = |w: &mut Writer<Vec<u8>>| w.write_any(&99i64);
        let mut set_arr3 = |w: &mut Writer<Vec<u8>>| w.write_any(&33i64);

        let mut updates = [
            Update::new(b"a", &mut set_a),
            Update::new(b"b.d", &mut set_bd),
            Update::new(b"x", &mut set_x),
            Update::new(b"b.e.f", &mut set_bef),
            Update::new(b"arr[1]", &mut set_arr1),
            Update::new(b"arr[3]", &mut set_arr3),
        ];
        let mut order = [0usize; 6];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();

        assert_eq!(read_path(&out, b"a"), Some(Value::I64(2)));
        assert_eq!(read_path(&out, b"b.c"), Some(Value::Bool(true)));
        assert_eq!(read_path(&out, b"b.d"), Some(Value::Bytes(b"new")));
        assert_eq!(read_path(&out, b"b.e.f"), Some(Value::I64(5)));
        assert_eq!(read_path(&out, b"x"), Some(Value::I64(999)));
        assert_eq!(read_path(&out, b"arr[0]"), Some(Value::I64(10)));
        assert_eq!(read_path(&out, b"arr[1]"), Some(Value::I64(99)));
        assert_eq!(read_path(&out, b"arr[2]"), Some(Value::Null));
        assert_eq!(read_path(&out, b"arr[3]"), Some(Value::I64(33)));
        assert!(updates.iter().all(Update::applied));

        // output re-parses cleanly end to end
        let mut r: UnboundedReader = Reader::new(&out);
        r.skip_value().unwrap();
        assert_eq!(r.position(), out.len());
    }

    #[test]
    fn scenario_2_conflicting_leaf_and_child() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"b").unwrap();
        w.start_object().unwrap();
        w.write_any_key(b"c").unwrap();
        w.write_any(&true).unwrap();
        w.end_container().unwrap();
        w.end_container().unwrap();
        let source = w.into_bytes();

        let mut set_b = |w: &mut Writer<Vec<u8>>| w.write_any(&1i64);
        let mut set_bc = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
        let mut updates = [Update::new(b"b", &mut set_b), Update::new(b"b.c", &mut set_bc)];
        let mut order = [0usize; 2];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::ConflictingUpdates);
    }

    #[test]
    fn scenario_3_invalid_root() {
        let mut w = VecWriter::new();
        w.write_any(&1i64).unwrap();
        let source = w.into_bytes();

        let mut set_a = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
        let mut updates = [Update::new(b"a", &mut set_a)];
        let mut order = [0usize; 1];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::InvalidRoot);
    }

    #[test]
    fn scenario_4_malformed_path() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"a").unwrap();
        w.write_any(&1i64).unwrap();
        w.end_container().unwrap();
        let source = w.into_bytes();

        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
        let mut updates = [Update::new(b"a[", &mut set)];
        let mut order = [0usize; 1];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::MalformedPath);
    }

    #[test]
    fn scenario_5_path_type_mismatch() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"a").unwrap();
        w.write_any(&1i64).unwrap();
        w.end_container().unwrap();
        let source = w.into_bytes();

        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&2i64);
        let mut updates = [Update::new(b"a.b", &mut set)];
        let mut order = [0usize; 1];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::PathTypeMismatch);
    }

    #[test]
    fn scenario_8_quoted_key_with_space() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"items").unwrap();
        w.start_array().unwrap();
        w.start_object().unwrap();
        w.write_any_key(b"name with space").unwrap();
        w.write_any(&"val1").unwrap();
        w.end_container().unwrap();
        w.start_object().unwrap();
        w.write_any_key(b"name with space").unwrap();
        w.write_any(&"val2").unwrap();
        w.end_container().unwrap();
        w.end_container().unwrap();
        w.end_container().unwrap();
        let buf = w.into_bytes();

        assert_eq!(
            read_path(&buf, b"items[1]['name with space']"),
            Some(Value::Bytes(b"val2"))
        );
    }

    #[test]
    fn empty_update_list_is_byte_identical() {
        let source = encode_scenario_source();
        let mut updates: [Update<'_>; 0] = [];
        let mut order: [usize; 0] = [];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn upsert_into_empty_object_creates_path() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.end_container().unwrap();
        let source = w.into_bytes();

        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&7i64);
        let mut updates = [Update::new(b"a.b.c", &mut set)];
        let mut order = [0usize; 1];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();
        assert_eq!(read_path(&out, b"a.b.c"), Some(Value::I64(7)));
    }

    #[test]
    fn typed_array_element_patch() {
        let mut w = VecWriter::new();
        w.write_typed_array(&[1u32, 2, 3, 4]).unwrap();
        let source = w.into_bytes();

        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&99u64);
        let mut updates = [Update::new(b"[2]", &mut set)];
        let mut order = [0usize; 1];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();

        let mut r: UnboundedReader = Reader::new(&out);
        match r.read().unwrap() {
            Value::TypedArray(view) => {
                assert_eq!(view.get::<u32>(0), Some(1));
                assert_eq!(view.get::<u32>(2), Some(99));
                assert_eq!(view.get::<u32>(3), Some(4));
            }
            other => panic!("expected typed array, got {other:?}"),
        }
    }

    #[test]
    fn typed_array_index_out_of_range() {
        let mut w = VecWriter::new();
        w.write_typed_array(&[1u32, 2]).unwrap();
        let source = w.into_bytes();

        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&9u64);
        let mut updates = [Update::new(b"[5]", &mut set)];
        let mut order = [0usize; 1];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::IndexOutOfRange);
    }

    #[test]
    fn duplicate_leaf_updates_last_one_wins() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"a").unwrap();
        w.write_any(&1i64).unwrap();
        w.end_container().unwrap();
        let source = w.into_bytes();

        let mut set1 = |w: &mut Writer<Vec<u8>>| w.write_any(&10i64);
        let mut set2 = |w: &mut Writer<Vec<u8>>| w.write_any(&20i64);
        let mut updates = [Update::new(b"a", &mut set1), Update::new(b"a", &mut set2)];
        let mut order = [0usize; 2];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();
        assert_eq!(read_path(&out, b"a"), Some(Value::I64(20)));
        assert!(updates.iter().all(Update::applied));
    }

    #[test]
    fn root_replacement() {
        let source = encode_scenario_source();
        let mut set = |w: &mut Writer<Vec<u8>>| w.write_any(&42i64);
        let mut updates = [Update::new(b"", &mut set)];
        let mut order = [0usize; 1];
        let out = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap();
        let mut r: UnboundedReader = Reader::new(&out);
        assert_eq!(r.read().unwrap(), Value::I64(42));
    }

    #[test]
    fn root_replacement_with_other_updates_conflicts() {
        let source = encode_scenario_source();
        let mut set_root = |w: &mut Writer<Vec<u8>>| w.write_any(&42i64);
        let mut set_a = |w: &mut Writer<Vec<u8>>| w.write_any(&1i64);
        let mut updates = [Update::new(b"", &mut set_root), Update::new(b"a", &mut set_a)];
        let mut order = [0usize; 2];
        let err = apply_updates(&source, &mut updates, &mut order, Vec::new()).unwrap_err();
        assert_eq!(err, PatchError::ConflictingUpdates);
    }
}
