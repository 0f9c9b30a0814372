//! Bit-precise struct decoder.
//!
//! Walks a compiled [`StructSchema`], slicing out each field's bit range and
//! decoding it against its primitive type (or recursing into a nested
//! struct's own schema). Byte-aligned ranges take a zero-copy fast path;
//! anything else is extracted bit by bit, LSB-first within each byte, and
//! zero-right-padded up to the primitive's storage width before decoding.

use super::registry::StructRegistry;
use super::types::{FieldKind, Primitive, StructSchema, ValueSchema};
use crate::error::{Result, WpilogError};
use crate::value::{SchemaTypes, Value};

/// The result of decoding one struct instance: its fields as a [`Value::Map`]
/// plus a path -> schema-name map recording which fields were nested structs
/// (so callers can label child entries without re-walking the schema).
pub struct Decoded {
    pub data: Value,
    pub schema_types: SchemaTypes,
}

/// Decode one struct instance named `name` from `bytes`.
///
/// Callers pass the bit length of the embedding field when decoding a nested
/// struct (`bytes` is already a right-sized slice); `decode` itself walks the
/// schema's own field bit ranges and does not need that length.
pub fn decode(
    registry: &StructRegistry,
    name: &str,
    bytes: &[u8],
    _bit_length: Option<u32>,
) -> Result<Decoded> {
    let schema = registry
        .get(name)
        .ok_or_else(|| WpilogError::SchemaMissing(name.to_string()))?;

    let mut data = Vec::with_capacity(schema.fields.len());
    let mut schema_types = SchemaTypes::new();

    for field in &schema.fields {
        let (sliced, value_bit_length) = slice_bits(bytes, field.bit_range);

        match &field.kind {
            FieldKind::Primitive(prim) => {
                let value = decode_primitive_field(field, *prim, &sliced, value_bit_length);
                data.push((field.name.clone(), value));
            }
            FieldKind::SchemaRef(ref_name) => {
                let is_array = field.array_length.is_some();
                schema_types.insert(
                    field.name.clone(),
                    format!("{}{}", ref_name, if is_array { "[]" } else { "" }),
                );

                let child = if is_array {
                    decode_array(registry, ref_name, &sliced, field.array_length)?
                } else {
                    decode(registry, ref_name, &sliced, Some(value_bit_length))?
                };

                for (path, type_name) in child.schema_types {
                    schema_types.insert(format!("{}/{}", field.name, path), type_name);
                }
                data.push((field.name.clone(), child.data));
            }
        }
    }

    Ok(Decoded {
        data: Value::Map(data),
        schema_types,
    })
}

/// Decode a contiguous run of struct instances, either `array_length` of them
/// or as many as fit in `bytes` when `array_length` is `None`.
pub fn decode_array(
    registry: &StructRegistry,
    name: &str,
    bytes: &[u8],
    array_length: Option<u32>,
) -> Result<Decoded> {
    let schema = registry
        .get(name)
        .ok_or_else(|| WpilogError::SchemaMissing(name.to_string()))?;
    let elem_bytes = schema.length_in_bytes() as usize;
    let length = match array_length {
        Some(n) => n as usize,
        None => {
            if elem_bytes == 0 {
                0
            } else {
                bytes.len() / elem_bytes
            }
        }
    };

    let mut items = Vec::with_capacity(length);
    let mut schema_types = SchemaTypes::new();

    for i in 0..length {
        let start = i * elem_bytes;
        let end = start + elem_bytes;
        let slice = bytes.get(start..end).unwrap_or(&[]);
        let child = decode(registry, name, slice, None)?;

        for (path, type_name) in &child.schema_types {
            schema_types.insert(format!("{}/{}", i, path), type_name.clone());
        }
        schema_types.insert(i.to_string(), name.to_string());
        items.push(child.data);
    }

    Ok(Decoded {
        data: Value::Array(items),
        schema_types,
    })
}

fn decode_primitive_field(
    field: &ValueSchema,
    prim: Primitive,
    sliced: &[u8],
    value_bit_length: u32,
) -> Value {
    match field.array_length {
        None => decode_value(sliced, prim, field.enum_map.as_ref()),
        Some(array_length) => {
            let item_bits = (field.bit_range.1 - field.bit_range.0) / array_length.max(1);
            let mut items = Vec::with_capacity(array_length as usize);
            let mut position = 0u32;
            while position < value_bit_length {
                let (item_bytes, _) = slice_bits(sliced, (position, position + item_bits));
                items.push(decode_value(&item_bytes, prim, field.enum_map.as_ref()));
                position += item_bits;
            }

            if matches!(prim, Primitive::Char) {
                let joined: String = items
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        _ => String::new(),
                    })
                    .collect();
                Value::String(joined)
            } else {
                Value::Array(items)
            }
        }
    }
}

/// Decode one primitive's bytes, padding with trailing zero bytes up to the
/// primitive's full storage width, and remap through `enum_map` if given.
fn decode_value(value: &[u8], prim: Primitive, enum_map: Option<&super::types::EnumMap>) -> Value {
    let width = prim.bytes() as usize;
    let mut padded = vec![0u8; width];
    let n = value.len().min(width);
    padded[..n].copy_from_slice(&value[..n]);

    let raw: Value = match prim {
        Primitive::Bool => Value::Bool(padded[0] > 0),
        Primitive::Char => Value::String(String::from_utf8_lossy(value).into_owned()),
        Primitive::Int8 => Value::Number(padded[0] as i8 as f64),
        Primitive::Int16 => Value::Number(i16::from_le_bytes([padded[0], padded[1]]) as f64),
        Primitive::Int32 => Value::Number(
            i32::from_le_bytes([padded[0], padded[1], padded[2], padded[3]]) as f64,
        ),
        Primitive::Int64 => Value::Number(i64::from_le_bytes(padded[..8].try_into().unwrap()) as f64),
        Primitive::UInt8 => Value::Number(padded[0] as f64),
        Primitive::UInt16 => Value::Number(u16::from_le_bytes([padded[0], padded[1]]) as f64),
        Primitive::UInt32 => Value::Number(
            u32::from_le_bytes([padded[0], padded[1], padded[2], padded[3]]) as f64,
        ),
        Primitive::UInt64 => {
            Value::Number(u64::from_le_bytes(padded[..8].try_into().unwrap()) as f64)
        }
        Primitive::Float32 => Value::Number(
            f32::from_le_bytes([padded[0], padded[1], padded[2], padded[3]]) as f64,
        ),
        Primitive::Float64 => Value::Number(f64::from_le_bytes(padded[..8].try_into().unwrap())),
    };

    if let (Some(map), Value::Number(n)) = (enum_map, &raw) {
        if let Some(label) = map.values.get(&(*n as i64)) {
            return Value::String(label.clone());
        }
    }

    raw
}

/// Extract `bit_range` (a half-open `[start, end)` bit range) from `bytes`,
/// returning the extracted bytes (zero-right-padded to a whole number of
/// bytes) and the number of bits actually extracted.
fn slice_bits(bytes: &[u8], bit_range: (u32, u32)) -> (Vec<u8>, u32) {
    let (start, end) = bit_range;
    let length = end.saturating_sub(start);

    if start % 8 == 0 && end % 8 == 0 {
        let start_byte = (start / 8) as usize;
        let end_byte = (end / 8) as usize;
        let slice = bytes.get(start_byte..end_byte).unwrap_or(&[]);
        return (slice.to_vec(), length);
    }

    let bits = to_bit_vec(bytes);
    let slice_start = start as usize;
    let slice_end = (end as usize).min(bits.len());
    let selected = if slice_start < slice_end {
        &bits[slice_start..slice_end]
    } else {
        &[]
    };
    (from_bit_vec(selected), length)
}

/// Expand bytes into one bool per bit, LSB-first within each byte (bit 0 of
/// byte 0 is the first element).
fn to_bit_vec(bytes: &[u8]) -> Vec<bool> {
    let mut out = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for shift in 0..8 {
            out.push((byte >> shift) & 1 != 0);
        }
    }
    out
}

/// Inverse of [`to_bit_vec`]: pack bools back into bytes, LSB-first.
fn from_bit_vec(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(name: &str, text: &str) -> StructRegistry {
        let mut reg = StructRegistry::new();
        reg.register(name, text).unwrap();
        reg
    }

    #[test]
    fn decodes_simple_doubles() {
        let reg = registry_with("Point", "double x; double y");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f64.to_le_bytes());
        bytes.extend_from_slice(&2.5f64.to_le_bytes());

        let decoded = decode(&reg, "Point", &bytes, None).unwrap();
        match decoded.data {
            Value::Map(fields) => {
                assert_eq!(fields[0], ("x".to_string(), Value::Number(1.5)));
                assert_eq!(fields[1], ("y".to_string(), Value::Number(2.5)));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn decodes_packed_bitfield_booleans() {
        let reg = registry_with("Bools", "bool a:1; bool b:1; bool c:1");
        let byte = 0b0000_0101u8; // a=1, b=0, c=1
        let decoded = decode(&reg, "Bools", &[byte], None).unwrap();
        match decoded.data {
            Value::Map(fields) => {
                assert_eq!(fields[0].1, Value::Bool(true));
                assert_eq!(fields[1].1, Value::Bool(false));
                assert_eq!(fields[2].1, Value::Bool(true));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn decodes_nested_struct_with_prefixed_schema_types() {
        let mut reg = StructRegistry::new();
        reg.register("Point", "double x; double y").unwrap();
        reg.register("Line", "Point start; Point end").unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.0f64.to_le_bytes());
        bytes.extend_from_slice(&0.0f64.to_le_bytes());
        bytes.extend_from_slice(&3.0f64.to_le_bytes());
        bytes.extend_from_slice(&4.0f64.to_le_bytes());

        let decoded = decode(&reg, "Line", &bytes, None).unwrap();
        assert_eq!(
            decoded.schema_types.get("start").unwrap(),
            "Point"
        );
        assert_eq!(decoded.schema_types.get("end").unwrap(), "Point");
    }

    #[test]
    fn decodes_enum_remap() {
        let reg = registry_with("State", "enum{kIdle=0,kRunning=1} int8 state");
        let decoded = decode(&reg, "State", &[1], None).unwrap();
        match decoded.data {
            Value::Map(fields) => {
                assert_eq!(fields[0].1, Value::String("kRunning".to_string()));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn decodes_char_array_as_string() {
        let reg = registry_with("Name", "char letters[3]");
        let decoded = decode(&reg, "Name", b"abc", None).unwrap();
        match decoded.data {
            Value::Map(fields) => {
                assert_eq!(fields[0].1, Value::String("abc".to_string()));
            }
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn decodes_array_of_structs() {
        let mut reg = StructRegistry::new();
        reg.register("Pair", "int32 a; int32 b").unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&4i32.to_le_bytes());

        let decoded = decode_array(&reg, "Pair", &bytes, Some(2)).unwrap();
        match decoded.data {
            Value::Array(items) => assert_eq!(items.len(), 2),
            _ => panic!("expected array"),
        }
        assert_eq!(decoded.schema_types.get("0").unwrap(), "Pair");
        assert_eq!(decoded.schema_types.get("1").unwrap(), "Pair");
    }

    #[test]
    fn missing_schema_errors() {
        let reg = StructRegistry::new();
        assert!(decode(&reg, "Nope", &[], None).is_err());
    }
}
