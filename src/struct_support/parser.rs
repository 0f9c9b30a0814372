//! Parser for WPILib struct schema definitions.
//!
//! The grammar is a `;`-separated list of declarations, each optionally
//! prefixed with `enum { NAME=INT, ... }`, followed by `TYPE NAME[N]` (array)
//! or `TYPE NAME:BITS` (bitfield) or `TYPE NAME` (plain). Layout (bit ranges)
//! is assigned later by the registry; this module only parses the text.

use super::types::*;
use crate::error::{Result, WpilogError};
use std::collections::HashMap;

/// Parser for struct schema definitions.
pub struct SchemaParser;

impl SchemaParser {
    /// Parse a schema definition string, e.g. `"double x; double y"`.
    pub fn parse(schema_text: &str) -> Result<Vec<ParsedField>> {
        let mut fields = Vec::new();

        for decl in schema_text.split(';') {
            let trimmed = decl.trim();
            if trimmed.is_empty() {
                continue;
            }
            fields.push(Self::parse_declaration(trimmed)?);
        }

        Ok(fields)
    }

    fn parse_declaration(decl: &str) -> Result<ParsedField> {
        let decl = decl.trim();
        let (enum_map, rest) = Self::extract_enum_spec(decl)?;
        let rest = rest.trim();

        if let Some(colon) = rest.rfind(':') {
            let (left, width_str) = (rest[..colon].trim(), rest[colon + 1..].trim());
            if !left.is_empty() {
                return Self::parse_bitfield(left, width_str, enum_map);
            }
        }

        Self::parse_standard(rest, enum_map)
    }

    fn parse_standard(rest: &str, enum_map: Option<EnumMap>) -> Result<ParsedField> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(WpilogError::SchemaError(format!(
                "invalid declaration: {}",
                rest
            )));
        }

        let type_str = tokens[0];
        let name_and_array = tokens[1..].join(" ");

        let (name, array_length) = if let Some(bracket_pos) = name_and_array.find('[') {
            let name = name_and_array[..bracket_pos].trim();
            let array_part = &name_and_array[bracket_pos..];
            if !array_part.ends_with(']') {
                return Err(WpilogError::SchemaError(format!(
                    "invalid array syntax: {}",
                    name_and_array
                )));
            }
            let size_str = array_part[1..array_part.len() - 1].trim();
            let length = size_str.parse::<u32>().map_err(|_| {
                WpilogError::SchemaError(format!("invalid array size: {}", size_str))
            })?;
            (name.to_string(), Some(length))
        } else {
            (name_and_array.trim().to_string(), None)
        };

        Ok(ParsedField {
            name,
            kind: Self::parse_kind(type_str),
            enum_map,
            bitfield_width: None,
            array_length,
        })
    }

    fn parse_bitfield(left: &str, width_str: &str, enum_map: Option<EnumMap>) -> Result<ParsedField> {
        let bit_width = width_str
            .parse::<u32>()
            .map_err(|_| WpilogError::SchemaError(format!("invalid bit width: {}", width_str)))?;
        if bit_width == 0 {
            return Err(WpilogError::SchemaError(
                "bit width must be at least 1".to_string(),
            ));
        }

        let tokens: Vec<&str> = left.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(WpilogError::SchemaError(format!(
                "invalid bit-field declaration: {}",
                left
            )));
        }

        let type_str = tokens[0];
        let name = tokens[1..].join(" ");

        Ok(ParsedField {
            name,
            kind: Self::parse_kind(type_str),
            enum_map,
            bitfield_width: Some(bit_width),
            array_length: None,
        })
    }

    /// Extracts a leading `enum { NAME=INT, ... }` prefix, if present.
    fn extract_enum_spec(decl: &str) -> Result<(Option<EnumMap>, &str)> {
        let trimmed = decl.trim();

        let start_pos = if trimmed.starts_with("enum") {
            trimmed
                .find('{')
                .ok_or_else(|| WpilogError::SchemaError("enum keyword without braces".to_string()))?
        } else if trimmed.starts_with('{') {
            0
        } else {
            return Ok((None, trimmed));
        };

        let end_pos = trimmed
            .find('}')
            .ok_or_else(|| WpilogError::SchemaError("unclosed enum specification".to_string()))?;

        let enum_text = &trimmed[start_pos..=end_pos];
        let remaining = &trimmed[end_pos + 1..];

        Ok((Some(Self::parse_enum_spec(enum_text)?), remaining))
    }

    fn parse_enum_spec(text: &str) -> Result<EnumMap> {
        let text = text.trim();
        if !text.starts_with('{') || !text.ends_with('}') {
            return Err(WpilogError::SchemaError(format!("invalid enum spec: {}", text)));
        }

        let inner = &text[1..text.len() - 1];
        let mut values = HashMap::new();

        for entry in inner.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((name, value_str)) = entry.split_once('=') else {
                return Err(WpilogError::SchemaError(format!(
                    "invalid enum entry: {}",
                    entry
                )));
            };
            // Non-integer right-hand sides are ignored per the grammar rules
            // rather than rejected outright.
            if let Ok(value) = value_str.trim().parse::<i64>() {
                values.insert(value, name.trim().to_string());
            }
        }

        Ok(EnumMap { values })
    }

    fn parse_kind(type_str: &str) -> FieldKind {
        match Primitive::from_name(type_str) {
            Some(p) => FieldKind::Primitive(p),
            None => FieldKind::SchemaRef(type_str.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_schema() {
        let fields = SchemaParser::parse("double x; double y").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "x");
        assert_eq!(fields[0].kind, FieldKind::Primitive(Primitive::Float64));
    }

    #[test]
    fn parses_array() {
        let fields = SchemaParser::parse("double arr[4]").unwrap();
        assert_eq!(fields[0].array_length, Some(4));
        assert_eq!(fields[0].kind, FieldKind::Primitive(Primitive::Float64));
    }

    #[test]
    fn parses_bitfield() {
        let fields = SchemaParser::parse("int8 a:4; int16 b:4").unwrap();
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].bitfield_width, Some(4));
        assert_eq!(fields[0].kind, FieldKind::Primitive(Primitive::Int8));
        assert_eq!(fields[1].kind, FieldKind::Primitive(Primitive::Int16));
    }

    #[test]
    fn parses_enum_spec() {
        let fields = SchemaParser::parse("enum{a=1,b=2} int8 val").unwrap();
        assert_eq!(fields[0].name, "val");
        let enum_map = fields[0].enum_map.as_ref().unwrap();
        assert_eq!(enum_map.values.get(&1), Some(&"a".to_string()));
        assert_eq!(enum_map.values.get(&2), Some(&"b".to_string()));
    }

    #[test]
    fn ignores_non_integer_enum_values() {
        let fields = SchemaParser::parse("enum{a=1,b=bad} int8 val").unwrap();
        let enum_map = fields[0].enum_map.as_ref().unwrap();
        assert_eq!(enum_map.values.len(), 1);
        assert!(enum_map.values.get(&1).is_some());
    }

    #[test]
    fn parses_struct_reference() {
        let fields = SchemaParser::parse("Translation2d translation").unwrap();
        assert_eq!(
            fields[0].kind,
            FieldKind::SchemaRef("Translation2d".to_string())
        );
    }

    #[test]
    fn skips_empty_declarations() {
        let fields = SchemaParser::parse("double x;; ; double y;").unwrap();
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn rejects_zero_bit_width() {
        assert!(SchemaParser::parse("int8 a:0").is_err());
    }
}
