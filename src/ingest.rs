//! Ingestion pipeline: binds the record reader/classifier to field store
//! writes, routing each data record by its entry's declared type, feeding
//! struct schema text into the schema compiler, and expanding structured
//! payloads (structs, JSON, MessagePack) into `key/child` hierarchies.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::datalog::{DataLogReader, DataLogRecord};
use crate::error::{Result, WpilogError};
use crate::log_store::{Log, LoggableType};
use crate::struct_support::{self, StructRegistry};
use crate::value::Value;

#[derive(Debug, Clone)]
struct EntryInfo {
    name: String,
    type_name: String,
}

/// Drives one or more WPILOG byte buffers into a shared [`Log`] and
/// [`StructRegistry`]. Struct schemas accumulate across every buffer ingested
/// through the same `Ingester`, so nested struct types defined in an earlier
/// file decode correctly in a later one.
pub struct Ingester {
    log: Log,
    registry: StructRegistry,
    entries: HashMap<u32, EntryInfo>,
}

impl Default for Ingester {
    fn default() -> Self {
        Self::new()
    }
}

impl Ingester {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            registry: StructRegistry::new(),
            entries: HashMap::new(),
        }
    }

    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut Log {
        &mut self.log
    }

    pub fn into_log(self) -> Log {
        self.log
    }

    /// Parses and ingests every record in `bytes`. Returns an error only for
    /// an invalid WPILOG header; per-record failures (malformed payloads,
    /// truncated tails) are skipped and logged, never propagated.
    pub fn ingest_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ingest_bytes_filtered(bytes, |_, _, _, _| true)
    }

    /// Memory-maps `path` and ingests it, avoiding a full-file copy into the
    /// process heap for the typical multi-megabyte `.wpilog` file. The map is
    /// dropped once ingestion returns; every sample has already been copied
    /// into the field store by then.
    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        self.ingest_bytes(&mmap)
    }

    /// As [`Ingester::ingest_file`], but with the same external capture gate
    /// as [`Ingester::ingest_bytes_filtered`].
    pub fn ingest_file_filtered(
        &mut self,
        path: impl AsRef<Path>,
        should_capture: impl FnMut(&str, &str, f64, &[u8]) -> bool,
    ) -> Result<()> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        self.ingest_bytes_filtered(&mmap, should_capture)
    }

    /// As [`Ingester::ingest_bytes`], but `should_capture` is consulted for
    /// every data record before it reaches the field store, letting a
    /// caller apply an external capture gate (e.g. the CLI's DriverStation
    /// enabled/FMS/mode filter). The closure receives the entry's name,
    /// declared type, timestamp, and raw payload; schema (`.schema`) records
    /// always bypass the filter since schema compilation is not itself a
    /// field write.
    pub fn ingest_bytes_filtered(
        &mut self,
        bytes: &[u8],
        mut should_capture: impl FnMut(&str, &str, f64, &[u8]) -> bool,
    ) -> Result<()> {
        let reader = DataLogReader::new(bytes);
        let records = reader.records()?;

        for record in records {
            match record {
                Ok(rec) => self.ingest_record(rec, &mut should_capture),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable record");
                }
            }
        }

        Ok(())
    }

    fn ingest_record(
        &mut self,
        record: DataLogRecord,
        should_capture: &mut impl FnMut(&str, &str, f64, &[u8]) -> bool,
    ) {
        if record.is_control() {
            if record.is_start() {
                match record.get_start_data() {
                    Ok(start) => {
                        self.entries.insert(
                            start.entry,
                            EntryInfo {
                                name: start.name,
                                type_name: start.type_name,
                            },
                        );
                    }
                    Err(err) => tracing::debug!(error = %err, "malformed start record"),
                }
            } else if record.is_finish() {
                match record.get_finish_entry() {
                    Ok(entry) => tracing::debug!(entry, "entry finished"),
                    Err(err) => tracing::debug!(error = %err, "malformed finish record"),
                }
            } else if record.is_set_metadata() {
                match record.get_set_metadata_data() {
                    Ok(meta) => {
                        tracing::debug!(entry = meta.entry, metadata = %meta.metadata, "entry metadata updated")
                    }
                    Err(err) => tracing::debug!(error = %err, "malformed set metadata record"),
                }
            }
            return;
        }

        let Some(info) = self.entries.get(&record.entry).cloned() else {
            tracing::debug!(entry = record.entry, "data record for unknown entry id");
            return;
        };

        let timestamp = record.timestamp as f64 / 1_000_000.0;
        self.route(&info, timestamp, &record, should_capture);
    }

    fn route(
        &mut self,
        info: &EntryInfo,
        t: f64,
        record: &DataLogRecord,
        should_capture: &mut impl FnMut(&str, &str, f64, &[u8]) -> bool,
    ) {
        let payload = record.data.as_slice();

        if let Some(schema_name) = schema_entry_name(&info.name) {
            let schema_text = String::from_utf8_lossy(payload);
            if let Err(err) = self.registry.register(schema_name, &schema_text) {
                tracing::warn!(name = schema_name, error = %err, "failed to compile schema");
            }
            return;
        }

        if !should_capture(&info.name, &info.type_name, t, payload) {
            return;
        }

        match info.type_name.as_str() {
            "boolean" => match record.get_boolean() {
                Ok(v) => self.log.put_boolean(&info.name, t, v),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed boolean");
                }
            },
            "int64" => match record.get_integer() {
                Ok(v) => self.log.put_number(&info.name, t, v as f64),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed int64");
                }
            },
            "float" => match record.get_float() {
                Ok(v) => self.log.put_number(&info.name, t, v as f64),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed float");
                }
            },
            "double" => match record.get_double() {
                Ok(v) => self.log.put_number(&info.name, t, v),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed double");
                }
            },
            "string" => {
                self.log.put_string(&info.name, t, record.get_string());
            }
            "json" => {
                let text = record.get_string();
                self.log.put_string(&info.name, t, text.clone());
                self.log.set_generated_parent(&info.name);
                self.log
                    .set_structured_type(&info.name, Some("JSON".to_string()));
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(parsed) => put_unknown_struct(&mut self.log, &info.name, t, &Value::from(parsed), false),
                    Err(err) => tracing::debug!(key = %info.name, error = %err, "malformed json payload"),
                }
            }
            "msgpack" => {
                self.log.put_raw(&info.name, t, payload.to_vec());
                self.log.set_generated_parent(&info.name);
                self.log
                    .set_structured_type(&info.name, Some("MessagePack".to_string()));
                match record.get_msgpack() {
                    Ok(parsed) => put_unknown_struct(&mut self.log, &info.name, t, &Value::from(parsed), false),
                    Err(err) => tracing::debug!(key = %info.name, error = %err, "malformed msgpack payload"),
                }
            }
            "boolean[]" => {
                self.log
                    .put_boolean_array(&info.name, t, record.get_boolean_array());
            }
            "int64[]" => match record.get_integer_array() {
                Ok(v) => self
                    .log
                    .put_number_array(&info.name, t, v.into_iter().map(|x| x as f64).collect()),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed int64[]");
                }
            },
            "float[]" => match record.get_float_array() {
                Ok(v) => self
                    .log
                    .put_number_array(&info.name, t, v.into_iter().map(|x| x as f64).collect()),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed float[]");
                }
            },
            "double[]" => match record.get_double_array() {
                Ok(v) => self.log.put_number_array(&info.name, t, v),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed double[]");
                }
            },
            "string[]" => match record.get_string_array() {
                Ok(v) => self.log.put_string_array(&info.name, t, v),
                Err(err) => {
                    let err = malformed(record, info, err);
                    tracing::debug!(key = %info.name, error = %err, "malformed string[]");
                }
            },
            other if other.starts_with("struct:") => {
                self.ingest_struct(info, t, payload, other);
            }
            _ => {
                self.log.put_raw(&info.name, t, payload.to_vec());
            }
        }
    }

    fn ingest_struct(&mut self, info: &EntryInfo, t: f64, payload: &[u8], type_name: &str) {
        self.log.put_raw(&info.name, t, payload.to_vec());

        let rest = &type_name["struct:".len()..];
        let (struct_name, is_array) = match rest.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (rest, false),
        };

        let decoded = if is_array {
            struct_support::decode_array(&self.registry, struct_name, payload, None)
        } else {
            struct_support::decode(&self.registry, struct_name, payload, None)
        };

        let decoded = match decoded {
            Ok(d) => d,
            Err(err) => {
                tracing::debug!(key = %info.name, struct_name, error = %err, "schema not yet available");
                return;
            }
        };

        self.log.set_generated_parent(&info.name);
        self.log.set_structured_type(
            &info.name,
            Some(format!("{struct_name}{}", if is_array { "[]" } else { "" })),
        );

        put_unknown_struct(&mut self.log, &info.name, t, &decoded.data, false);

        for (child_path, child_type) in &decoded.schema_types {
            let child_key = format!("{}/{}", info.name, child_path);
            self.log.put_empty(&child_key);
            self.log
                .set_structured_type(&child_key, Some(child_type.clone()));
        }
    }
}

/// Wraps a record accessor's size-check failure as the entry-tagged
/// [`WpilogError::MalformedPayload`] the ingestion pipeline surfaces for
/// mismatched declared-type sizes, rather than the generic parse error
/// `DataLogRecord`'s accessors raise on their own.
fn malformed(record: &DataLogRecord, info: &EntryInfo, err: WpilogError) -> WpilogError {
    WpilogError::MalformedPayload {
        entry: record.entry,
        type_name: info.type_name.clone(),
        reason: err.to_string(),
    }
}

/// If `name` names a `.schema` entry (e.g. `/Foo/.schema/struct:Bar`), return
/// the schema name carried after the literal `"struct:"`.
fn schema_entry_name(name: &str) -> Option<&str> {
    if !name.contains(".schema") {
        return None;
    }
    name.find("struct:").map(|idx| &name[idx + "struct:".len()..])
}

/// The structural expander: writes a decoded [`Value`] tree into the field
/// store rooted at `key`. Primitive leaves are only written when
/// `allow_root_write` is set (the top-level call for a struct/JSON/MessagePack
/// record passes `false` since the root placeholder is written separately as
/// `Raw`/`String`).
fn put_unknown_struct(log: &mut Log, key: &str, t: f64, value: &Value, allow_root_write: bool) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            if allow_root_write {
                log.put_boolean(key, t, *b);
            }
        }
        Value::Number(n) => {
            if allow_root_write {
                log.put_number(key, t, *n);
            }
        }
        Value::String(s) => {
            if allow_root_write {
                log.put_string(key, t, s.clone());
            }
        }
        Value::Bytes(b) => {
            if allow_root_write {
                log.put_raw(key, t, b.clone());
            }
        }
        Value::Array(items) => match homogeneous_kind(items) {
            Some(HomogKind::Bool) => log.put_boolean_array(
                key,
                t,
                items.iter().map(|v| v.as_bool().unwrap()).collect(),
            ),
            Some(HomogKind::Number) => {
                log.put_number_array(key, t, items.iter().map(|v| v.as_f64().unwrap()).collect())
            }
            Some(HomogKind::String) => log.put_string_array(
                key,
                t,
                items
                    .iter()
                    .map(|v| v.as_str().unwrap().to_string())
                    .collect(),
            ),
            None => {
                log.put_number(&format!("{key}/length"), t, items.len() as f64);
                for (i, item) in items.iter().enumerate() {
                    put_unknown_struct(log, &format!("{key}/{i}"), t, item, true);
                }
            }
        },
        Value::Map(pairs) => {
            for (child_key, child_value) in pairs {
                put_unknown_struct(log, &format!("{key}/{child_key}"), t, child_value, true);
            }
        }
    }
}

enum HomogKind {
    Bool,
    Number,
    String,
}

fn homogeneous_kind(items: &[Value]) -> Option<HomogKind> {
    let first = items.first()?;
    match first {
        Value::Bool(_) if items.iter().all(|v| matches!(v, Value::Bool(_))) => {
            Some(HomogKind::Bool)
        }
        Value::Number(_) if items.iter().all(|v| matches!(v, Value::Number(_))) => {
            Some(HomogKind::Number)
        }
        Value::String(_) if items.iter().all(|v| matches!(v, Value::String(_))) => {
            Some(HomogKind::String)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_record(entry: u32, name: &str, type_name: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(0u8); // control type: start
        payload.extend_from_slice(&entry.to_le_bytes());
        for s in [name, type_name, ""] {
            payload.extend_from_slice(&(s.len() as u32).to_le_bytes());
            payload.extend_from_slice(s.as_bytes());
        }
        frame(0, 0, &payload)
    }

    fn data_record(entry: u32, timestamp_us: u64, payload: &[u8]) -> Vec<u8> {
        frame(entry, timestamp_us, payload)
    }

    fn frame(entry: u32, timestamp_us: u64, payload: &[u8]) -> Vec<u8> {
        // header byte: entry_len=4 (code 3), size_len=4 (code 3), timestamp_len=8 (code 7)
        let mut out = vec![0b0111_1111u8];
        out.extend_from_slice(&entry.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&timestamp_us.to_le_bytes()[..8]);
        out.extend_from_slice(payload);
        out
    }

    fn wpilog_header() -> Vec<u8> {
        let mut header = Vec::new();
        header.extend_from_slice(b"WPILOG");
        header.extend_from_slice(&0x0100u16.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header
    }

    #[test]
    fn minimal_log_scenario() {
        let mut bytes = wpilog_header();
        bytes.extend(start_record(1, "/x", "double"));
        bytes.extend(data_record(1, 1_000_000, &3.14f64.to_le_bytes()));

        let mut ingester = Ingester::new();
        ingester.ingest_bytes(&bytes).unwrap();

        let range = ingester.log().get_number("/x", 0.0, 2.0).unwrap();
        assert_eq!(range.timestamps, vec![1.0]);
        assert_eq!(range.values, vec![LoggableType::Number(3.14)]);
    }

    #[test]
    fn json_expansion_scenario() {
        let mut bytes = wpilog_header();
        bytes.extend(start_record(1, "/j", "json"));
        let json = br#"{"a":1,"b":[true,false]}"#;
        bytes.extend(data_record(1, 2_000_000, json));

        let mut ingester = Ingester::new();
        ingester.ingest_bytes(&bytes).unwrap();
        let log = ingester.log();

        assert_eq!(log.get_structured_type("/j"), Some("JSON"));
        assert!(!log.is_generated("/j"));
        assert!(log.is_generated("/j/a"));
        let a = log.get_number("/j/a", 0.0, 3.0).unwrap();
        assert_eq!(a.values, vec![LoggableType::Number(1.0)]);
        let b = log.get_range("/j/b", 0.0, 3.0).unwrap();
        assert_eq!(
            b.values,
            vec![LoggableType::BooleanArray(vec![true, false])]
        );
    }

    #[test]
    fn struct_schema_and_decode_roundtrip() {
        let mut bytes = wpilog_header();
        bytes.extend(start_record(
            1,
            "/.schema/struct:Point",
            "structschema",
        ));
        bytes.extend(data_record(1, 0, b"double x; double y"));
        bytes.extend(start_record(2, "/p", "struct:Point"));
        let mut payload = Vec::new();
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        payload.extend_from_slice(&2.0f64.to_le_bytes());
        bytes.extend(data_record(2, 1_000_000, &payload));

        let mut ingester = Ingester::new();
        ingester.ingest_bytes(&bytes).unwrap();
        let log = ingester.log();

        assert_eq!(log.get_structured_type("/p"), Some("Point"));
        assert!(log.is_generated("/p/x"));
        let x = log.get_number("/p/x", 0.0, 2.0).unwrap();
        assert_eq!(x.values, vec![LoggableType::Number(1.0)]);
    }
}
