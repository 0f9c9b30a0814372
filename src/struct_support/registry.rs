//! Struct schema registry: the back end of the struct schema compiler.
//!
//! Owns the set of raw schema texts seen so far (one per `.schema` entry) and
//! the subset that has actually been compiled into bit-precise `StructSchema`
//! layouts. Compilation is deferred and retried in fixed-point fashion: a
//! schema that references another struct not yet seen is simply left
//! pending, and every time a new schema text arrives every still-pending
//! schema gets another attempt. This matches logs where `.schema` entries
//! for nested struct types can arrive in any order relative to the structs
//! that use them.

use super::types::*;
use crate::error::{Result, WpilogError};
use std::collections::HashMap;

/// Registry of struct schema texts and their compiled bit layouts.
#[derive(Clone, Default)]
pub struct StructRegistry {
    schema_texts: HashMap<String, String>,
    schemas: HashMap<String, StructSchema>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct schema from its raw `.schema` entry text.
    ///
    /// Idempotent for a given name: the first definition wins, matching the
    /// behavior of struct decoders elsewhere in the ecosystem that treat a
    /// `.schema` entry as append-only. After recording the text, every schema
    /// that has not yet compiled (including this one) is retried until a full
    /// pass makes no further progress.
    pub fn register(&mut self, name: &str, schema_text: &str) -> Result<()> {
        if self.schema_texts.contains_key(name) {
            return Ok(());
        }
        self.schema_texts
            .insert(name.to_string(), schema_text.to_string());
        self.compile_pending()
    }

    /// Get a compiled schema by name.
    pub fn get(&self, name: &str) -> Option<&StructSchema> {
        self.schemas.get(name)
    }

    /// Retry compiling every registered-but-uncompiled schema until a pass
    /// makes no progress. Unlike a topological sort, this tolerates schema
    /// texts for dependencies that never arrive: those simply stay pending
    /// forever, and anything depending on them stays pending too.
    fn compile_pending(&mut self) -> Result<()> {
        loop {
            let mut progressed = false;
            let names: Vec<String> = self
                .schema_texts
                .keys()
                .filter(|n| !self.schemas.contains_key(*n))
                .cloned()
                .collect();

            for name in names {
                let text = self.schema_texts[&name].clone();
                let fields = super::parser::SchemaParser::parse(&text)?;
                if let Some(schema) = self.try_compile(&name, &fields) {
                    self.schemas.insert(name, schema);
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }
        Ok(())
    }

    /// Attempt to assign bit ranges to every field of one schema. Returns
    /// `None` if a field refers to a struct that has not compiled yet, in
    /// which case the caller leaves this schema pending and retries later.
    fn try_compile(&self, name: &str, fields: &[ParsedField]) -> Option<StructSchema> {
        let mut out = Vec::with_capacity(fields.len());
        let mut bit_position: u32 = 0;
        // Current open bitfield unit: (bits filled so far, unit width in bits).
        let mut bitfield: Option<(u32, u32)> = None;

        for field in fields {
            match &field.kind {
                FieldKind::SchemaRef(ref_name) => {
                    if ref_name == name {
                        // A struct cannot (usefully) contain itself; treat as unresolved.
                        return None;
                    }
                    flush_bitfield(&mut bit_position, &mut bitfield);
                    let referenced = self.schemas.get(ref_name)?;
                    let mut length = referenced.length_in_bits;
                    if let Some(n) = field.array_length {
                        length *= n;
                    }
                    out.push(ValueSchema {
                        name: field.name.clone(),
                        kind: field.kind.clone(),
                        enum_map: field.enum_map.clone(),
                        bitfield_width: None,
                        array_length: field.array_length,
                        bit_range: (bit_position, bit_position + length),
                    });
                    bit_position += length;
                }
                FieldKind::Primitive(prim) => match field.bitfield_width {
                    None => {
                        flush_bitfield(&mut bit_position, &mut bitfield);
                        let mut length = prim.bits();
                        if let Some(n) = field.array_length {
                            length *= n;
                        }
                        out.push(ValueSchema {
                            name: field.name.clone(),
                            kind: field.kind.clone(),
                            enum_map: field.enum_map.clone(),
                            bitfield_width: None,
                            array_length: field.array_length,
                            bit_range: (bit_position, bit_position + length),
                        });
                        bit_position += length;
                    }
                    Some(width) => {
                        // Invalid bitfield declarations are dropped silently rather
                        // than rejected: a char/float storage type, or a bool field
                        // whose declared width isn't exactly 1 bit.
                        if !prim.valid_for_bitfield() {
                            continue;
                        }
                        if matches!(prim, Primitive::Bool) && width != 1 {
                            continue;
                        }

                        let unit_width = prim.bits();
                        let value_bits = width.min(unit_width);

                        let needs_new_unit = match bitfield {
                            None => true,
                            Some((filled, unit)) => {
                                (!matches!(prim, Primitive::Bool) && unit != unit_width)
                                    || filled + value_bits > unit
                            }
                        };

                        if needs_new_unit {
                            flush_bitfield(&mut bit_position, &mut bitfield);
                            bitfield = Some((0, unit_width));
                        }

                        out.push(ValueSchema {
                            name: field.name.clone(),
                            kind: field.kind.clone(),
                            enum_map: field.enum_map.clone(),
                            bitfield_width: Some(value_bits),
                            array_length: None,
                            bit_range: (bit_position, bit_position + value_bits),
                        });

                        let (filled, _unit) = bitfield.as_mut().unwrap();
                        *filled += value_bits;
                        bit_position += value_bits;
                    }
                },
            }
        }

        flush_bitfield(&mut bit_position, &mut bitfield);

        Some(StructSchema {
            name: name.to_string(),
            length_in_bits: bit_position,
            fields: out,
        })
    }
}

/// Close out an open bitfield unit, advancing `bit_position` past any unused
/// tail bits in the unit (the unit is always a whole storage type wide, even
/// if the last bitfield in it used fewer bits).
fn flush_bitfield(bit_position: &mut u32, bitfield: &mut Option<(u32, u32)>) {
    if let Some((filled, unit)) = bitfield.take() {
        *bit_position += unit - filled;
    }
}

/// Convenience used by callers that want a [`WpilogError::SchemaMissing`]
/// rather than `Option::None` when a name is looked up and absent.
pub fn require<'a>(registry: &'a StructRegistry, name: &str) -> Result<&'a StructSchema> {
    registry
        .get(name)
        .ok_or_else(|| WpilogError::SchemaMissing(name.to_string()))
}
