//! Analysis configuration: the JSON shape consumed by the CLI driver to
//! decide which time-interval and value-sampling analyses to run, and which
//! driver-station conditions gate data capture.

use serde::Deserialize;

/// Which robot operating mode(s) an analysis (or the whole capture gate)
/// applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotMode {
    Auto,
    Teleop,
    Both,
}

/// One statistic to compute over a set of sampled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    Average,
    Max,
    Min,
    Count,
    AbsAverage,
    AbsMax,
    AbsMin,
    /// Values more than two population standard deviations from the mean.
    Outlier2std,
    /// As `Outlier2std`, but computed over absolute values.
    AbsOutlier2std,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculationConfig {
    #[serde(rename = "type")]
    pub calc_type: CalculationType,
    pub name: String,
}

/// A cycle-time analysis: measures the elapsed time between a `startEntry`
/// reaching `startValue` and the next `endEntry` reaching `endValue`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeAnalysisConfig {
    #[serde(rename = "startEntry")]
    pub start_entry: String,
    #[serde(rename = "startValue")]
    pub start_value: serde_json::Value,
    #[serde(rename = "endEntry")]
    pub end_entry: String,
    #[serde(rename = "endValue")]
    pub end_value: serde_json::Value,
    pub calculations: Vec<CalculationConfig>,
}

/// A triggered-sampling analysis: samples `entry` each time `triggerEntry`
/// matches `triggerValue`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueAnalysisConfig {
    pub entry: String,
    #[serde(rename = "triggerEntry")]
    pub trigger_entry: String,
    #[serde(rename = "triggerValue")]
    pub trigger_value: serde_json::Value,
    pub calculations: Vec<CalculationConfig>,
}

/// Top-level analysis configuration, deserialized from the CLI's
/// `config.json` argument.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub enabled: bool,
    #[serde(rename = "fmsAttached")]
    pub fms_attached: bool,
    #[serde(rename = "robotMode")]
    pub robot_mode: RobotMode,
    #[serde(rename = "timeAnalysis", default)]
    pub time_analysis: Vec<TimeAnalysisConfig>,
    #[serde(rename = "valueAnalysis", default)]
    pub value_analysis: Vec<ValueAnalysisConfig>,
}

/// Entries captured unconditionally, regardless of the configured capture
/// gate, so driver-station state itself is always tracked.
pub const MANDATORY_ENTRIES: [&str; 3] = [
    "/DriverStation/Enabled",
    "/DriverStation/Autonomous",
    "/DriverStation/FMSAttached",
];

impl AnalysisConfig {
    /// Every entry name referenced anywhere in the configuration, plus the
    /// mandatory driver-station entries. Records not in this set (while the
    /// capture gate applies) are not ingested.
    pub fn target_entry_names(&self) -> std::collections::HashSet<String> {
        let mut names: std::collections::HashSet<String> =
            MANDATORY_ENTRIES.iter().map(|s| s.to_string()).collect();
        for t in &self.time_analysis {
            names.insert(t.start_entry.clone());
            names.insert(t.end_entry.clone());
        }
        for v in &self.value_analysis {
            names.insert(v.entry.clone());
            names.insert(v.trigger_entry.clone());
        }
        names
    }
}

/// Tracks the live driver-station state seen so far during ingestion, used
/// to evaluate the capture gate against the configured filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverStationState {
    pub enabled: bool,
    pub autonomous: bool,
    pub fms_attached: bool,
}

impl DriverStationState {
    /// Whether a non-mandatory data record should be captured right now,
    /// given the configured filters. Mandatory entries bypass this check
    /// entirely (see `MANDATORY_ENTRIES`).
    pub fn should_capture_record(&self, config: &AnalysisConfig) -> bool {
        if config.enabled && !self.enabled {
            return false;
        }
        if config.fms_attached && !self.fms_attached {
            return false;
        }
        match config.robot_mode {
            RobotMode::Both => true,
            RobotMode::Auto => self.autonomous,
            RobotMode::Teleop => self.enabled && !self.autonomous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AnalysisConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_minimal_config() {
        let config = parse(
            r#"{"enabled":true,"fmsAttached":false,"robotMode":"teleop","timeAnalysis":[],"valueAnalysis":[]}"#,
        );
        assert!(config.enabled);
        assert_eq!(config.robot_mode, RobotMode::Teleop);
    }

    #[test]
    fn parses_full_config_with_calculations() {
        let config = parse(
            r#"{
                "enabled": true,
                "fmsAttached": true,
                "robotMode": "both",
                "timeAnalysis": [{
                    "startEntry": "/a", "startValue": true,
                    "endEntry": "/b", "endValue": false,
                    "calculations": [{"type":"average","name":"avg"},{"type":"outlier_2std","name":"outliers"}]
                }],
                "valueAnalysis": [{
                    "entry": "/c", "triggerEntry": "/d", "triggerValue": 1.0,
                    "calculations": [{"type":"abs_max","name":"m"}]
                }]
            }"#,
        );
        assert_eq!(config.time_analysis.len(), 1);
        assert_eq!(config.value_analysis.len(), 1);
        assert_eq!(
            config.time_analysis[0].calculations[1].calc_type,
            CalculationType::Outlier2std
        );
    }

    #[test]
    fn target_entry_names_includes_mandatory_and_configured() {
        let config = parse(
            r#"{
                "enabled": false, "fmsAttached": false, "robotMode": "both",
                "timeAnalysis": [{"startEntry":"/s","startValue":1,"endEntry":"/e","endValue":2,"calculations":[]}],
                "valueAnalysis": []
            }"#,
        );
        let names = config.target_entry_names();
        assert!(names.contains("/DriverStation/Enabled"));
        assert!(names.contains("/s"));
        assert!(names.contains("/e"));
    }

    #[test]
    fn capture_gate_respects_mode_and_filters() {
        let config = parse(
            r#"{"enabled":true,"fmsAttached":false,"robotMode":"auto","timeAnalysis":[],"valueAnalysis":[]}"#,
        );
        let mut state = DriverStationState::default();
        assert!(!state.should_capture_record(&config));
        state.enabled = true;
        assert!(!state.should_capture_record(&config)); // not autonomous yet
        state.autonomous = true;
        assert!(state.should_capture_record(&config));
    }
}
