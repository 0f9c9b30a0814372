//! Log field store: a keyed, type-tagged, timestamp-ordered columnar model
//! for decoded WPILOG samples.
//!
//! A [`Log`] is the destination every ingestion path writes into: direct
//! `put_<T>` calls for primitive records, or recursive child writes for
//! struct/JSON/MessagePack records that expand into a subtree of keys.

use std::collections::{BTreeMap, HashSet};

/// The closed set of sample payload shapes a field can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum LoggableType {
    Raw(Vec<u8>),
    Boolean(bool),
    Number(f64),
    String(String),
    BooleanArray(Vec<bool>),
    NumberArray(Vec<f64>),
    StringArray(Vec<String>),
    /// Placeholder for a synthetic parent/child node with no direct samples,
    /// used to make struct/JSON children discoverable before they're written.
    Empty,
}

impl LoggableType {
    /// The type tag, independent of any particular sample's value. Used to
    /// check a `put_<T>` against the field's existing declared type.
    fn tag(&self) -> LoggableTag {
        match self {
            LoggableType::Raw(_) => LoggableTag::Raw,
            LoggableType::Boolean(_) => LoggableTag::Boolean,
            LoggableType::Number(_) => LoggableTag::Number,
            LoggableType::String(_) => LoggableTag::String,
            LoggableType::BooleanArray(_) => LoggableTag::BooleanArray,
            LoggableType::NumberArray(_) => LoggableTag::NumberArray,
            LoggableType::StringArray(_) => LoggableTag::StringArray,
            LoggableType::Empty => LoggableTag::Empty,
        }
    }
}

/// The coarse scalar kind of a field, as seen by the range analysis
/// primitives, which only ever operate on `String | Boolean | Number`
/// fields and treat everything else as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Boolean,
    Number,
    String,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoggableTag {
    Raw,
    Boolean,
    Number,
    String,
    BooleanArray,
    NumberArray,
    StringArray,
    Empty,
}

/// One timestamped sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: LoggableType,
}

/// A set of samples returned by a range query, split into parallel
/// timestamp/value sequences in stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogValueSet {
    pub timestamps: Vec<f64>,
    pub values: Vec<LoggableType>,
}

impl LogValueSet {
    fn push(&mut self, sample: &Sample) {
        self.timestamps.push(sample.timestamp);
        self.values.push(sample.value.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One key's time series plus its metadata.
#[derive(Debug, Clone)]
pub struct LogField {
    tag: LoggableTag,
    samples: Vec<Sample>,
    pub structured_type: Option<String>,
    /// Set when a `put_<T>` was rejected because it disagreed with the
    /// field's already-established type.
    pub type_warning: bool,
}

impl LogField {
    fn new(tag: LoggableTag) -> Self {
        Self {
            tag,
            samples: Vec::new(),
            structured_type: None,
            type_warning: false,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A mapping from `/`-separated key paths to [`LogField`]s, plus the
/// bookkeeping needed for structural expansion and range queries.
#[derive(Debug, Clone, Default)]
pub struct Log {
    fields: BTreeMap<String, LogField>,
    generated_parents: HashSet<String>,
    timestamp_range: Option<(f64, f64)>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new field of `type` if `key` is absent. No-op otherwise.
    pub fn create_blank_field(&mut self, key: &str, ty: &LoggableType) {
        self.fields
            .entry(key.to_string())
            .or_insert_with(|| LogField::new(ty.tag()));
    }

    /// Removes `key` and forgets its generated-parent status.
    pub fn delete_field(&mut self, key: &str) {
        self.fields.remove(key);
        self.generated_parents.remove(key);
    }

    /// Upserts a sample into `key`, creating the field (typed by `value`) if
    /// absent. Rejects the write (setting `type_warning`) if the field
    /// already holds a different type. Timestamps stay non-decreasing;
    /// ties keep insertion order.
    pub fn put(&mut self, key: &str, timestamp: f64, value: LoggableType) {
        let tag = value.tag();
        let field = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| LogField::new(tag));

        if field.tag != tag {
            field.type_warning = true;
            return;
        }

        let insert_at = field
            .samples
            .iter()
            .rposition(|s| s.timestamp <= timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        field.samples.insert(insert_at, Sample { timestamp, value });

        self.timestamp_range = Some(match self.timestamp_range {
            None => (timestamp, timestamp),
            Some((start, end)) => (start.min(timestamp), end.max(timestamp)),
        });
    }

    pub fn put_raw(&mut self, key: &str, t: f64, v: Vec<u8>) {
        self.put(key, t, LoggableType::Raw(v));
    }
    pub fn put_boolean(&mut self, key: &str, t: f64, v: bool) {
        self.put(key, t, LoggableType::Boolean(v));
    }
    pub fn put_number(&mut self, key: &str, t: f64, v: f64) {
        self.put(key, t, LoggableType::Number(v));
    }
    pub fn put_string(&mut self, key: &str, t: f64, v: String) {
        self.put(key, t, LoggableType::String(v));
    }
    pub fn put_boolean_array(&mut self, key: &str, t: f64, v: Vec<bool>) {
        self.put(key, t, LoggableType::BooleanArray(v));
    }
    pub fn put_number_array(&mut self, key: &str, t: f64, v: Vec<f64>) {
        self.put(key, t, LoggableType::NumberArray(v));
    }
    pub fn put_string_array(&mut self, key: &str, t: f64, v: Vec<String>) {
        self.put(key, t, LoggableType::StringArray(v));
    }
    pub fn put_empty(&mut self, key: &str) {
        self.create_blank_field(key, &LoggableType::Empty);
    }

    /// Returns samples with `start < timestamp <= end`, in stored order.
    /// `None` if `key` is absent; an empty set if present but nothing falls
    /// in range.
    pub fn get_range(&self, key: &str, start: f64, end: f64) -> Option<LogValueSet> {
        let field = self.fields.get(key)?;
        let mut out = LogValueSet::default();
        for sample in &field.samples {
            if sample.timestamp > start && sample.timestamp <= end {
                out.push(sample);
            }
        }
        Some(out)
    }

    /// Like `get_range`, but returns `None` if the field's type tag isn't
    /// the one `expect` selects (no coercion between types).
    fn get_range_typed(
        &self,
        key: &str,
        start: f64,
        end: f64,
        expect: LoggableTag,
    ) -> Option<LogValueSet> {
        let field = self.fields.get(key)?;
        if field.tag != expect {
            return None;
        }
        self.get_range(key, start, end)
    }

    pub fn get_boolean(&self, key: &str, start: f64, end: f64) -> Option<LogValueSet> {
        self.get_range_typed(key, start, end, LoggableTag::Boolean)
    }
    pub fn get_number(&self, key: &str, start: f64, end: f64) -> Option<LogValueSet> {
        self.get_range_typed(key, start, end, LoggableTag::Number)
    }
    pub fn get_string(&self, key: &str, start: f64, end: f64) -> Option<LogValueSet> {
        self.get_range_typed(key, start, end, LoggableTag::String)
    }

    /// Drops every sample with `timestamp < t`. If a field's first retained
    /// sample still has `timestamp < t` (i.e. it was the most-recent-before
    /// sample), its timestamp is clamped to exactly `t` so the
    /// most-recent-value-at-`t` semantic survives the trim.
    pub fn clear_before_time(&mut self, t: f64) {
        for field in self.fields.values_mut() {
            let cut = field.samples.partition_point(|s| s.timestamp < t);
            if cut > 0 {
                field.samples.drain(0..cut - 1);
            }
            if let Some(first) = field.samples.first_mut() {
                if first.timestamp < t {
                    first.timestamp = t;
                }
            }
        }
        self.timestamp_range = self.timestamp_range.map(|(start, end)| {
            let new_start = start.max(t);
            (new_start, end.max(new_start))
        });
    }

    /// Union of the timestamps of `keys`, deduplicated and ascending, except
    /// that a single key returns its raw (already-sorted, possibly
    /// duplicate-bearing) timestamp sequence unchanged.
    pub fn get_timestamps(&self, keys: &[&str]) -> Vec<f64> {
        if keys.len() == 1 {
            return self
                .fields
                .get(keys[0])
                .map(|f| f.samples.iter().map(|s| s.timestamp).collect())
                .unwrap_or_default();
        }

        let mut all: Vec<f64> = keys
            .iter()
            .filter_map(|k| self.fields.get(*k))
            .flat_map(|f| f.samples.iter().map(|s| s.timestamp))
            .collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        all.dedup();
        all
    }

    /// The tracked min/max of all sample timestamps ever inserted (advanced
    /// only by `clear_before_time`, never by normal writes going backward).
    /// Defaults to `(0.0, 10.0)` before any sample has been inserted.
    pub fn get_timestamp_range(&self) -> (f64, f64) {
        self.timestamp_range.unwrap_or((0.0, 10.0))
    }

    pub fn set_structured_type(&mut self, key: &str, structured_type: Option<String>) {
        if let Some(field) = self.fields.get_mut(key) {
            field.structured_type = structured_type;
        }
    }

    pub fn get_structured_type(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.structured_type.as_deref()
    }

    /// Marks `key` as a generated parent: every strict `/`-descendant of it
    /// is considered "generated" by `is_generated`.
    pub fn set_generated_parent(&mut self, key: &str) {
        self.generated_parents.insert(key.to_string());
    }

    /// True iff some strict `/`-ancestor of `key` is a registered generated
    /// parent. Prefix matching respects `/` boundaries: `"foo"` does not
    /// make `"foobar"` generated.
    pub fn is_generated(&self, key: &str) -> bool {
        self.generated_parents
            .iter()
            .any(|parent| is_strict_path_prefix(parent, key))
    }

    pub fn get_field(&self, key: &str) -> Option<&LogField> {
        self.fields.get(key)
    }

    /// The coarse scalar kind of `key`'s declared type, or `None` if the key
    /// is not registered. Used by the range analysis primitives to
    /// type-check a field before querying it.
    pub fn scalar_kind(&self, key: &str) -> Option<ScalarKind> {
        let field = self.fields.get(key)?;
        Some(match field.tag {
            LoggableTag::Boolean => ScalarKind::Boolean,
            LoggableTag::Number => ScalarKind::Number,
            LoggableTag::String => ScalarKind::String,
            _ => ScalarKind::Other,
        })
    }

    /// All registered keys, in sorted order (the store is keyed by
    /// `BTreeMap`, so this is also iteration order).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Builds a tree of keys rooted under `prefix`, split on `/`. Generated
    /// keys are omitted when `include_generated` is false.
    pub fn get_field_tree(&self, prefix: &str, include_generated: bool) -> FieldTreeNode {
        let mut root = FieldTreeNode::internal(prefix.to_string());
        for key in self.fields.keys() {
            if !key.starts_with(prefix) {
                continue;
            }
            if !include_generated && self.is_generated(key) {
                continue;
            }
            let relative = key.strip_prefix(prefix).unwrap_or(key).trim_start_matches('/');
            if relative.is_empty() {
                continue;
            }
            root.insert(relative, key);
        }
        root
    }
}

fn is_strict_path_prefix(parent: &str, key: &str) -> bool {
    key.len() > parent.len() && key.starts_with(parent) && key.as_bytes()[parent.len()] == b'/'
}

/// One node of a `get_field_tree` result: either an internal node (more path
/// segments below it) or a terminal node carrying the full key.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTreeNode {
    Internal {
        name: String,
        children: BTreeMap<String, FieldTreeNode>,
    },
    Terminal {
        full_key: String,
    },
}

impl FieldTreeNode {
    fn internal(name: String) -> Self {
        FieldTreeNode::Internal {
            name,
            children: BTreeMap::new(),
        }
    }

    fn insert(&mut self, relative: &str, full_key: &str) {
        let FieldTreeNode::Internal { children, .. } = self else {
            return;
        };
        match relative.split_once('/') {
            Some((head, tail)) if !tail.is_empty() => {
                let child = children
                    .entry(head.to_string())
                    .or_insert_with(|| FieldTreeNode::internal(head.to_string()));
                child.insert(tail, full_key);
            }
            _ => {
                children.insert(
                    relative.to_string(),
                    FieldTreeNode::Terminal {
                        full_key: full_key.to_string(),
                    },
                );
            }
        }
    }
}
