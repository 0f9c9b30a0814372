//! Generic interval and event-triggered queries over the log field store,
//! used by the CLI driver to compute cycle-time and sampled-value
//! statistics.
//!
//! Both queries type-check their target fields against `String | Boolean |
//! Number` before running; a field outside that set yields an empty result
//! and an [`WpilogError::UnsupportedFieldType`] diagnostic rather than a
//! query result, matching `analyze_file_records`/`analyze_value_records` in
//! the reference driver.

use crate::error::{Result, WpilogError};
use crate::log_store::{Log, LogValueSet, LoggableType, ScalarKind};

/// A scalar sample value as seen by an analysis query (the subset of
/// `LoggableType` that `String | Boolean | Number` fields can hold).
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl AnalysisValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnalysisValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn supported(kind: ScalarKind) -> bool {
    matches!(
        kind,
        ScalarKind::Boolean | ScalarKind::Number | ScalarKind::String
    )
}

fn to_analysis_value(value: &LoggableType) -> Option<AnalysisValue> {
    match value {
        LoggableType::Boolean(b) => Some(AnalysisValue::Boolean(*b)),
        LoggableType::Number(n) => Some(AnalysisValue::Number(*n)),
        LoggableType::String(s) => Some(AnalysisValue::String(s.clone())),
        _ => None,
    }
}

/// True iff `sample` equals the configured target `value` (a `serde_json`
/// scalar, as carried by `startValue`/`endValue`/`triggerValue` in the
/// analysis configuration).
fn matches_target(sample: &LoggableType, target: &serde_json::Value) -> bool {
    match sample {
        LoggableType::Boolean(b) => target.as_bool() == Some(*b),
        LoggableType::Number(n) => target.as_f64() == Some(*n),
        LoggableType::String(s) => target.as_str() == Some(s.as_str()),
        _ => false,
    }
}

/// The full (timestamp, value) sequence of `key`, in stored order,
/// regardless of the field's type: used to walk `start_key`/`trigger_key`
/// in full rather than a bounded window.
fn full_series(log: &Log, key: &str, kind: ScalarKind) -> LogValueSet {
    let series = match kind {
        ScalarKind::Boolean => log.get_boolean(key, f64::NEG_INFINITY, f64::INFINITY),
        ScalarKind::Number => log.get_number(key, f64::NEG_INFINITY, f64::INFINITY),
        ScalarKind::String => log.get_string(key, f64::NEG_INFINITY, f64::INFINITY),
        ScalarKind::Other => None,
    };
    series.unwrap_or_default()
}

/// The (start, end] window of `key`'s samples, regardless of type.
fn windowed_series(log: &Log, key: &str, kind: ScalarKind, start: f64, end: f64) -> LogValueSet {
    let series = match kind {
        ScalarKind::Boolean => log.get_boolean(key, start, end),
        ScalarKind::Number => log.get_number(key, start, end),
        ScalarKind::String => log.get_string(key, start, end),
        ScalarKind::Other => None,
    };
    series.unwrap_or_default()
}

/// Cycle-time query: for each sample of `start_key` equal to `start_value`,
/// find the next sample of `end_key` (within the window up to the next
/// `start_value` match, or the log's last timestamp) equal to `end_value`,
/// and yield the elapsed time. Missing fields yield an empty result with no
/// diagnostic (the reference logs "missing fields" separately from
/// "unsupported type"); a present field of the wrong type is the
/// `UnsupportedFieldType` case.
pub fn interval_query(
    log: &Log,
    start_key: &str,
    start_value: &serde_json::Value,
    end_key: &str,
    end_value: &serde_json::Value,
) -> Result<Vec<f64>> {
    let (Some(start_kind), Some(end_kind)) =
        (log.scalar_kind(start_key), log.scalar_kind(end_key))
    else {
        return Ok(Vec::new());
    };
    if !supported(start_kind) {
        return Err(WpilogError::UnsupportedFieldType(start_key.to_string()));
    }
    if !supported(end_kind) {
        return Err(WpilogError::UnsupportedFieldType(end_key.to_string()));
    }

    let start_series = full_series(log, start_key, start_kind);
    let last_ts = log.get_timestamp_range().1;
    let mut out = Vec::new();

    for i in 0..start_series.timestamps.len() {
        let t_i = start_series.timestamps[i];
        if !matches_target(&start_series.values[i], start_value) {
            continue;
        }

        let t_next = start_series.timestamps[i + 1..]
            .iter()
            .zip(start_series.values[i + 1..].iter())
            .find(|(_, v)| matches_target(v, start_value))
            .map(|(t, _)| *t)
            .unwrap_or(last_ts);

        let end_window = windowed_series(log, end_key, end_kind, t_i, t_next);
        if let Some(pos) = end_window
            .values
            .iter()
            .position(|v| matches_target(v, end_value))
        {
            out.push(end_window.timestamps[pos] - t_i);
        }
    }

    Ok(out)
}

/// Triggered-sampling query: scans `trigger_key` in order, and at every
/// sample equal to `trigger_value`, captures the last sample of `entry_key`
/// over `(prev_trigger_ts, trigger_ts]`. `prev_trigger_ts` advances to every
/// matching trigger's timestamp even when no value was captured.
pub fn triggered_sampling(
    log: &Log,
    entry_key: &str,
    trigger_key: &str,
    trigger_value: &serde_json::Value,
) -> Result<Vec<AnalysisValue>> {
    let (Some(trigger_kind), Some(entry_kind)) =
        (log.scalar_kind(trigger_key), log.scalar_kind(entry_key))
    else {
        return Ok(Vec::new());
    };
    if !supported(trigger_kind) {
        return Err(WpilogError::UnsupportedFieldType(trigger_key.to_string()));
    }
    if !supported(entry_kind) {
        return Err(WpilogError::UnsupportedFieldType(entry_key.to_string()));
    }

    let triggers = full_series(log, trigger_key, trigger_kind);
    let mut prev_ts = 0.0;
    let mut out = Vec::new();

    for (t, v) in triggers.timestamps.iter().zip(triggers.values.iter()) {
        if !matches_target(v, trigger_value) {
            continue;
        }
        let window = windowed_series(log, entry_key, entry_kind, prev_ts, *t);
        if let Some(last) = window.values.last().and_then(to_analysis_value) {
            out.push(last);
        }
        prev_ts = *t;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_bool(b: bool) -> serde_json::Value {
        serde_json::Value::Bool(b)
    }
    fn json_num(n: f64) -> serde_json::Value {
        serde_json::Number::from_f64(n).unwrap().into()
    }

    #[test]
    fn interval_query_finds_cycle_time() {
        let mut log = Log::new();
        log.put_boolean("/start", 1.0, true);
        log.put_boolean("/start", 2.0, false);
        log.put_boolean("/end", 1.5, true);

        let durations =
            interval_query(&log, "/start", &json_bool(true), "/end", &json_bool(true)).unwrap();
        assert_eq!(durations, vec![0.5]);
    }

    #[test]
    fn interval_query_skips_window_with_no_match() {
        let mut log = Log::new();
        log.put_boolean("/start", 1.0, true);
        log.put_boolean("/start", 2.0, true);
        log.put_boolean("/end", 2.5, true); // falls after the second start window opens

        let durations =
            interval_query(&log, "/start", &json_bool(true), "/end", &json_bool(true)).unwrap();
        // First window is (1.0, 2.0]; no /end match in that window.
        // Second window is (2.0, last_ts]; /end at 2.5 matches.
        assert_eq!(durations, vec![0.5]);
    }

    #[test]
    fn interval_query_uses_last_timestamp_when_no_next_start() {
        let mut log = Log::new();
        log.put_number("/start", 1.0, 1.0);
        log.put_number("/end", 5.0, 9.0);

        let durations =
            interval_query(&log, "/start", &json_num(1.0), "/end", &json_num(9.0)).unwrap();
        assert_eq!(durations, vec![4.0]);
    }

    #[test]
    fn interval_query_rejects_unsupported_field_type() {
        let mut log = Log::new();
        log.put_raw("/start", 1.0, vec![1]);
        log.put_boolean("/end", 1.0, true);

        let err = interval_query(&log, "/start", &json_bool(true), "/end", &json_bool(true))
            .unwrap_err();
        assert!(matches!(err, WpilogError::UnsupportedFieldType(_)));
    }

    #[test]
    fn interval_query_missing_field_is_empty_not_an_error() {
        let log = Log::new();
        let result = interval_query(&log, "/nope", &json_bool(true), "/also_nope", &json_bool(true));
        assert_eq!(result.unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn triggered_sampling_emits_last_value_before_each_trigger() {
        let mut log = Log::new();
        log.put_number("/entry", 0.5, 1.0);
        log.put_number("/entry", 0.9, 2.0);
        log.put_boolean("/trigger", 1.0, true);
        log.put_number("/entry", 1.5, 3.0);
        log.put_boolean("/trigger", 2.0, true);

        let values =
            triggered_sampling(&log, "/entry", "/trigger", &json_bool(true)).unwrap();
        assert_eq!(
            values,
            vec![AnalysisValue::Number(2.0), AnalysisValue::Number(3.0)]
        );
    }

    #[test]
    fn triggered_sampling_advances_past_trigger_with_no_value() {
        let mut log = Log::new();
        log.put_boolean("/trigger", 1.0, true);
        log.put_number("/entry", 2.0, 5.0);
        log.put_boolean("/trigger", 3.0, true);

        let values =
            triggered_sampling(&log, "/entry", "/trigger", &json_bool(true)).unwrap();
        // First trigger at t=1.0 has no /entry sample in (0, 1.0]; skipped.
        // Second trigger window (1.0, 3.0] captures the sample at t=2.0.
        assert_eq!(values, vec![AnalysisValue::Number(5.0)]);
    }
}
