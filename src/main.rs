use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use wpilog_analyzer::analysis::{self, AnalysisValue};
use wpilog_analyzer::config::{
    AnalysisConfig, CalculationConfig, CalculationType, DriverStationState, MANDATORY_ENTRIES,
};
use wpilog_analyzer::ingest::Ingester;
use wpilog_analyzer::WpilogError;

/// Runs cycle-time and triggered-value analyses over a folder of WPILOG
/// telemetry logs, gated by a JSON configuration.
#[derive(Parser)]
#[command(name = "wpilog-analyzer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing the `.wpilog` files to analyze
    log_folder: PathBuf,

    /// Path to the JSON analysis configuration
    config: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.log_folder.is_dir() {
        anyhow::bail!("{} is not a directory", cli.log_folder.display());
    }

    let config_text = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config file: {}", cli.config.display()))?;
    let config: AnalysisConfig = serde_json::from_str(&config_text)
        .map_err(|err| WpilogError::ConfigParseError(err.to_string()))
        .with_context(|| format!("failed to parse config file: {}", cli.config.display()))?;

    let mut log_files: Vec<PathBuf> = std::fs::read_dir(&cli.log_folder)
        .with_context(|| format!("failed to read directory: {}", cli.log_folder.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("wpilog"))
        .collect();
    log_files.sort();

    if log_files.is_empty() {
        anyhow::bail!("no .wpilog files found in {}", cli.log_folder.display());
    }

    println!("Found {} log file(s) to process:", log_files.len());
    for file in &log_files {
        println!("  {}", file.display());
    }

    let target_entries = config.target_entry_names();
    let mandatory: HashSet<&str> = MANDATORY_ENTRIES.iter().copied().collect();

    let mut aggregated_time: Vec<Vec<f64>> = vec![Vec::new(); config.time_analysis.len()];
    let mut aggregated_value: Vec<Vec<AnalysisValue>> =
        vec![Vec::new(); config.value_analysis.len()];

    for file in &log_files {
        println!("\nProcessing: {}", file.display());

        let mut ingester = Ingester::new();
        let mut ds_state = DriverStationState::default();
        let ingest_result = ingester.ingest_file_filtered(file, |name, type_name, _t, payload| {
            if type_name == "boolean" && payload.len() == 1 {
                let value = payload[0] != 0;
                match name {
                    "/DriverStation/Enabled" => ds_state.enabled = value,
                    "/DriverStation/Autonomous" => ds_state.autonomous = value,
                    "/DriverStation/FMSAttached" => ds_state.fms_attached = value,
                    _ => {}
                }
            }
            if mandatory.contains(name) {
                return true;
            }
            if !target_entries.contains(name) {
                return false;
            }
            ds_state.should_capture_record(&config)
        });

        if let Err(err) = ingest_result {
            tracing::warn!(file = %file.display(), error = %err, "failed to read log header, skipping file");
            continue;
        }

        let log = ingester.into_log();

        if !config.time_analysis.is_empty() {
            println!("\n=== Time analysis for {} ===", file.display());
            for (i, analysis_cfg) in config.time_analysis.iter().enumerate() {
                println!(
                    "\n{} ({}) -> {} ({})",
                    analysis_cfg.start_entry,
                    analysis_cfg.start_value,
                    analysis_cfg.end_entry,
                    analysis_cfg.end_value
                );
                match analysis::interval_query(
                    &log,
                    &analysis_cfg.start_entry,
                    &analysis_cfg.start_value,
                    &analysis_cfg.end_entry,
                    &analysis_cfg.end_value,
                ) {
                    Ok(diffs) => {
                        print_cycles(&diffs, &analysis_cfg.calculations, "");
                        aggregated_time[i].extend(&diffs);
                    }
                    Err(err) => {
                        println!("  skipping analysis: {err}");
                    }
                }
            }
        }

        if !config.value_analysis.is_empty() {
            println!("\n=== Value analysis for {} ===", file.display());
            for (i, analysis_cfg) in config.value_analysis.iter().enumerate() {
                println!(
                    "\n{} triggered by {} ({})",
                    analysis_cfg.entry, analysis_cfg.trigger_entry, analysis_cfg.trigger_value
                );
                match analysis::triggered_sampling(
                    &log,
                    &analysis_cfg.entry,
                    &analysis_cfg.trigger_entry,
                    &analysis_cfg.trigger_value,
                ) {
                    Ok(values) => {
                        print_values(&values, &analysis_cfg.calculations, "");
                        aggregated_value[i].extend(values);
                    }
                    Err(err) => {
                        println!("  skipping analysis: {err}");
                    }
                }
            }
        }
    }

    if !config.time_analysis.is_empty() {
        println!("\n=== Aggregated time analysis across all files ===");
        for (i, analysis_cfg) in config.time_analysis.iter().enumerate() {
            println!(
                "\n{} ({}) -> {} ({})",
                analysis_cfg.start_entry,
                analysis_cfg.start_value,
                analysis_cfg.end_entry,
                analysis_cfg.end_value
            );
            print_cycles(&aggregated_time[i], &analysis_cfg.calculations, "aggregated ");
        }
    }

    if !config.value_analysis.is_empty() {
        println!("\n=== Aggregated value analysis across all files ===");
        for (i, analysis_cfg) in config.value_analysis.iter().enumerate() {
            println!(
                "\n{} triggered by {} ({})",
                analysis_cfg.entry, analysis_cfg.trigger_entry, analysis_cfg.trigger_value
            );
            print_values(&aggregated_value[i], &analysis_cfg.calculations, "aggregated ");
        }
    }

    Ok(())
}

fn print_cycles(diffs: &[f64], calculations: &[CalculationConfig], prefix: &str) {
    if diffs.is_empty() {
        println!("  no complete cycles found for this analysis");
        return;
    }
    println!("  {prefix}cycles found: {}", diffs.len());
    for (i, d) in diffs.iter().enumerate() {
        println!("  cycle {}: {:.6}s", i + 1, d);
    }
    apply_calculations(diffs, calculations, prefix, "s");
}

fn print_values(values: &[AnalysisValue], calculations: &[CalculationConfig], prefix: &str) {
    if values.is_empty() {
        println!("  no values captured for this analysis");
        return;
    }
    println!("  {prefix}values captured: {}", values.len());

    let numeric: Vec<f64> = values.iter().filter_map(AnalysisValue::as_f64).collect();
    if numeric.is_empty() {
        println!("  values are non-numeric; no calculations to run");
        return;
    }
    apply_calculations(&numeric, calculations, prefix, "");
}

fn apply_calculations(values: &[f64], calculations: &[CalculationConfig], prefix: &str, unit: &str) {
    for calc in calculations {
        let result = match calc.calc_type {
            CalculationType::Average => format!("{:.6}{unit}", mean(values)),
            CalculationType::Max => format!("{:.6}{unit}", fold_max(values)),
            CalculationType::Min => format!("{:.6}{unit}", fold_min(values)),
            CalculationType::Count => format!("{}", values.len()),
            CalculationType::AbsAverage => {
                let abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
                format!("{:.6}{unit}", mean(&abs))
            }
            CalculationType::AbsMax => {
                format!("{:.6}{unit}", fold_max(&values.iter().map(|v| v.abs()).collect::<Vec<_>>()))
            }
            CalculationType::AbsMin => {
                format!("{:.6}{unit}", fold_min(&values.iter().map(|v| v.abs()).collect::<Vec<_>>()))
            }
            CalculationType::Outlier2std => format!("{:?}", two_std_outliers(values, false)),
            CalculationType::AbsOutlier2std => format!("{:?}", two_std_outliers(values, true)),
        };
        println!("  {prefix}{}: {result}", calc.name);
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::MIN, f64::max)
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::MAX, f64::min)
}

fn two_std_outliers(values: &[f64], absolute: bool) -> Vec<f64> {
    let transformed: Vec<f64> = if absolute {
        values.iter().map(|v| v.abs()).collect()
    } else {
        values.to_vec()
    };
    let m = mean(&transformed);
    let variance = transformed.iter().map(|v| (v - m).powi(2)).sum::<f64>() / transformed.len() as f64;
    let std_dev = variance.sqrt();
    transformed
        .into_iter()
        .filter(|v| (v - m).abs() > 2.0 * std_dev)
        .collect()
}
