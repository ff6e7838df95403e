//! JSON pretty-printer over a [`Reader`]. Specified by interface only in
//! `spec.md` §4.5 ("this component is ... not part of the core"); implemented
//! here as a minimal reference consumer on top of the raw wire format.

use crate::error::JsonError;
use crate::f16;
use crate::reader::Reader;
use crate::value::Value;
use core::fmt::Write as _;

/// Renders the value at the reader's current cursor as JSON text appended to
/// `out`. Consumes exactly one value (a scalar, or a whole container and its
/// descendants).
///
/// - byte strings are UTF-8-validated before being emitted as JSON strings;
/// - control characters `0x00..=0x1F` are escaped, with named escapes for
///   `\b \t \n \f \r \" \\`;
/// - non-finite floats are rejected rather than silently coerced;
/// - each `typed_array` element is printed as a JSON number, the array as a
///   whole as a JSON array.
pub fn write_json<const MAX_DEPTH: usize>(
    reader: &mut Reader<'_, MAX_DEPTH>,
    out: &mut String,
) -> Result<(), JsonError> {
    let value = reader.read()?;
    write_value(reader, out, value)
}

fn write_value<const MAX_DEPTH: usize>(
    reader: &mut Reader<'_, MAX_DEPTH>,
    out: &mut String,
    value: Value<'_>,
) -> Result<(), JsonError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
        Value::U64(n) => {
            let _ = write!(out, "{n}");
        }
        Value::I64(n) => {
            let _ = write!(out, "{n}");
        }
        Value::F16(bits) => write_finite_f64(out, f16::to_f32(bits) as f64)?,
        Value::F32(f) => write_finite_f64(out, f as f64)?,
        Value::F64(f) => write_finite_f64(out, f)?,
        Value::Bytes(bytes) => write_json_string(out, bytes)?,
        Value::TypedArray(view) => write_typed_array(out, view)?,
        Value::Object => write_object(reader, out)?,
        Value::Array => write_array(reader, out)?,
    }
    Ok(())
}

fn write_finite_f64(out: &mut String, f: f64) -> Result<(), JsonError> {
    if !f.is_finite() {
        return Err(JsonError::NonFiniteFloat);
    }
    let _ = write!(out, "{f}");
    Ok(())
}

fn write_int(out: &mut String, n: impl core::fmt::Display) {
    let _ = write!(out, "{n}");
}

fn write_object<const MAX_DEPTH: usize>(
    reader: &mut Reader<'_, MAX_DEPTH>,
    out: &mut String,
) -> Result<(), JsonError> {
    out.push('{');
    let mut first = true;
    while let Some((key, value)) = reader.iterate_object()? {
        if !first {
            out.push(',');
        }
        first = false;
        write_json_string(out, key)?;
        out.push(':');
        write_value(reader, out, value)?;
    }
    out.push('}');
    Ok(())
}

fn write_array<const MAX_DEPTH: usize>(
    reader: &mut Reader<'_, MAX_DEPTH>,
    out: &mut String,
) -> Result<(), JsonError> {
    out.push('[');
    let mut first = true;
    while let Some(value) = reader.iterate_array()? {
        if !first {
            out.push(',');
        }
        first = false;
        write_value(reader, out, value)?;
    }
    out.push(']');
    Ok(())
}

/// Decodes the element at `index` directly from the view's packed payload.
/// Infallible by construction: the caller has already matched `T::ELEM`
/// against `view.elem_type()` and bounds `index` by `view.len()`.
fn elem_at<T: crate::value::PackedElem>(view: &crate::value::TypedArrayView<'_>, index: usize) -> T {
    let size = T::ELEM.size();
    let start = index * size;
    T::from_le_bytes(&view.raw_bytes()[start..start + size])
}

fn write_typed_array(out: &mut String, view: crate::value::TypedArrayView<'_>) -> Result<(), JsonError> {
    use crate::tag::ElemType;
    out.push('[');
    for i in 0..view.len() {
        if i > 0 {
            out.push(',');
        }
        match view.elem_type() {
            ElemType::U8 => write_int(out, elem_at::<u8>(&view, i)),
            ElemType::I8 => write_int(out, elem_at::<i8>(&view, i)),
            ElemType::U16 => write_int(out, elem_at::<u16>(&view, i)),
            ElemType::I16 => write_int(out, elem_at::<i16>(&view, i)),
            ElemType::U32 => write_int(out, elem_at::<u32>(&view, i)),
            ElemType::I32 => write_int(out, elem_at::<i32>(&view, i)),
            ElemType::U64 => write_int(out, elem_at::<u64>(&view, i)),
            ElemType::I64 => write_int(out, elem_at::<i64>(&view, i)),
            ElemType::F16 => write_finite_f64(out, f16::to_f32(elem_at::<u16>(&view, i)) as f64)?,
            ElemType::F32 => write_finite_f64(out, elem_at::<f32>(&view, i) as f64)?,
            ElemType::F64 => write_finite_f64(out, elem_at::<f64>(&view, i))?,
        }
    }
    out.push(']');
    Ok(())
}

fn write_json_string(out: &mut String, bytes: &[u8]) -> Result<(), JsonError> {
    let s = core::str::from_utf8(bytes).map_err(|_| JsonError::InvalidUtf8)?;
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) <= 0x1F => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}

/// Convenience entry point: renders the whole buffer (one root value) as a
/// freshly allocated JSON `String`.
pub fn to_json_string(buf: &[u8]) -> Result<String, JsonError> {
    let mut reader: crate::reader::UnboundedReader = Reader::new(buf);
    let mut out = String::new();
    write_json(&mut reader, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::VecWriter;

    #[test]
    fn prints_scalars_and_containers() {
        let mut w = VecWriter::new();
        w.start_object().unwrap();
        w.write_any_key(b"name").unwrap();
        w.write_any(&"alice").unwrap();
        w.write_any_key(b"age").unwrap();
        w.write_any(&30u64).unwrap();
        w.write_any_key(b"active").unwrap();
        w.write_any(&true).unwrap();
        w.write_any_key(b"note").unwrap();
        w.write_null().unwrap();
        w.write_any_key(b"scores").unwrap();
        w.start_array().unwrap();
        w.write_any(&1i64).unwrap();
        w.write_any(&2i64).unwrap();
        w.end_container().unwrap();
        w.end_container().unwrap();
        let buf = w.into_bytes();

        let json = to_json_string(&buf).unwrap();
        assert_eq!(
            json,
            r#"{"name":"alice","age":30,"active":true,"note":null,"scores":[1,2]}"#
        );
    }

    #[test]
    fn escapes_control_characters_and_quotes() {
        let mut w = VecWriter::new();
        w.write_any(&"line1\nline2\t\"quoted\"\u{01}").unwrap();
        let buf = w.into_bytes();
        let json = to_json_string(&buf).unwrap();
        assert_eq!(json, "\"line1\\nline2\\t\\\"quoted\\\"\\u0001\"");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut w = VecWriter::new();
        w.write_bytes_fixed(&[0xFF, 0xFE]).unwrap();
        let buf = w.into_bytes();
        assert_eq!(to_json_string(&buf), Err(JsonError::InvalidUtf8));
    }

    #[test]
    fn rejects_non_finite_floats() {
        let mut w = VecWriter::new();
        w.write_f64(f64::NAN).unwrap();
        let buf = w.into_bytes();
        assert_eq!(to_json_string(&buf), Err(JsonError::NonFiniteFloat));
    }

    #[test]
    fn prints_typed_array_as_numbers() {
        let mut w = VecWriter::new();
        w.write_typed_array(&[1u32, 2, 3]).unwrap();
        let buf = w.into_bytes();
        assert_eq!(to_json_string(&buf).unwrap(), "[1,2,3]");
    }
}
