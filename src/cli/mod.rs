//! trainflow CLI module
//!
//! Command-line front end over [`Pipeline`]: train, predict, inspect and
//! export artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;

use crate::config::PipelineConfig;
use crate::inference::PredictionResult;
use crate::pipeline::{ArtifactState, Pipeline};
use crate::preprocessing::{record_from_json, FeatureRecord};
use crate::training::TrainingReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
    let _ = std::io::stdout().flush();
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "trainflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train classifiers on CSV data and serve predictions from saved artifacts")]
#[command(long_about = None)]
pub struct Cli {
    /// Artifact directory
    #[arg(short, long, global = true, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train every classifier on a CSV file
    Train {
        /// Input data file (CSV or TSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Write the training report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict one record with a trained model
    Predict {
        /// Model name (LogisticRegression, SVC, RandomForestClassifier)
        #[arg(short, long)]
        model: String,

        /// Record as a JSON object
        #[arg(short, long, conflicts_with = "record_file")]
        record: Option<String>,

        /// File holding the record as a JSON object
        #[arg(long)]
        record_file: Option<PathBuf>,

        /// Reject records with missing features
        #[arg(long)]
        strict: bool,
    },

    /// List artifacts and the training manifest
    Artifacts,

    /// Copy one artifact file out of the artifact directory
    Export {
        /// Artifact file name, e.g. SVC.json
        #[arg(short, long)]
        name: String,

        /// Destination path
        #[arg(long)]
        to: PathBuf,
    },
}

/// Configuration from `--config`, or defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Train {
            data,
            target,
            output,
        } => cmd_train(config, &data, &target, &cli.artifacts, output.as_deref()),
        Commands::Predict {
            model,
            record,
            record_file,
            strict,
        } => {
            let config = if strict { config.strict() } else { config };
            let record = read_record(record.as_deref(), record_file.as_deref())?;
            cmd_predict(config, &record, &model, &cli.artifacts)
        }
        Commands::Artifacts => cmd_artifacts(config, &cli.artifacts),
        Commands::Export { name, to } => cmd_export(config, &cli.artifacts, &name, &to),
    }
}

fn read_record(inline: Option<&str>, file: Option<&Path>) -> anyhow::Result<FeatureRecord> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading record file {}", path.display()))?,
        (None, None) => anyhow::bail!("either --record or --record-file is required"),
    };
    let value: serde_json::Value = serde_json::from_str(&text).context("parsing record JSON")?;
    Ok(record_from_json(value)?)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    config: PipelineConfig,
    data_path: &Path,
    target: &str,
    artifacts: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    step_run(&format!("Training on {}", data_path.display()));
    let start = Instant::now();
    let pipeline = Pipeline::new(config);
    let report = pipeline.train_pipeline(data_path, target, artifacts)?;
    step_done(&format!(
        "{} train / {} test rows in {:.2?}",
        report.n_train,
        report.n_test,
        start.elapsed()
    ));

    print_report(&report);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("  {} report written to {}", ok("✓"), path.display());
    }
    println!();
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!();
    println!(
        "  {:<24} {:>9} {:>9} {:>9} {:>9} {:>9}",
        muted("Model"),
        muted("Accuracy"),
        muted("Precision"),
        muted("Recall"),
        muted("F1"),
        muted("MSE")
    );
    println!("  {}", dim(&"─".repeat(76)));
    for (name, m) in report.metrics.iter() {
        println!(
            "  {:<24} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            name.white().bold(),
            m.accuracy,
            m.precision,
            m.recall,
            m.f1_score,
            m.mse
        );
    }
    for failure in &report.failures {
        println!(
            "  {:<24} {}",
            failure.model,
            format!("err: {}", failure.error).red()
        );
    }
}

pub fn cmd_predict(
    config: PipelineConfig,
    record: &FeatureRecord,
    model: &str,
    artifacts: &Path,
) -> anyhow::Result<()> {
    let result: PredictionResult = Pipeline::new(config).predict_pipeline(record, model, artifacts)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub fn cmd_artifacts(config: PipelineConfig, artifacts: &Path) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(config);
    section(&format!("Artifacts in {}", artifacts.display()));

    match pipeline.state(artifacts)? {
        ArtifactState::Untrained => {
            println!("  {}", "untrained".yellow());
        }
        ArtifactState::Trained(manifest) => {
            println!("  {:<16} {}", muted("Target"), manifest.target.white());
            println!(
                "  {:<16} {}",
                muted("Classes"),
                manifest
                    .classes
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("  {:<16} {}", muted("Features"), manifest.feature_names.join(", "));
            println!("  {:<16} {}", muted("Models"), manifest.models.join(", "));
            println!("  {:<16} {}", muted("Trained at"), manifest.trained_at.to_rfc3339());
        }
    }

    println!();
    for info in pipeline.list_artifacts(artifacts)? {
        println!(
            "  {:<32} {:>10}",
            info.file_name,
            dim(&format!("{} B", info.size_bytes))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_export(
    config: PipelineConfig,
    artifacts: &Path,
    name: &str,
    to: &Path,
) -> anyhow::Result<()> {
    let bytes = Pipeline::new(config).download_artifact(artifacts, name)?;
    std::fs::write(to, &bytes).with_context(|| format!("writing {}", to.display()))?;
    println!("  {} {} → {} ({} B)", ok("✓"), name, to.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict() {
        let cli = Cli::parse_from([
            "trainflow",
            "predict",
            "--model",
            "SVC",
            "--record",
            r#"{"age": 45}"#,
            "--strict",
        ]);
        match cli.command {
            Commands::Predict { model, strict, .. } => {
                assert_eq!(model, "SVC");
                assert!(strict);
            }
            _ => panic!("expected predict"),
        }
        assert_eq!(cli.artifacts, PathBuf::from("artifacts"));
    }

    #[test]
    fn test_read_record() {
        let record = read_record(Some(r#"{"age": 45, "city": "A"}"#), None).unwrap();
        assert_eq!(record.len(), 2);
        assert!(read_record(Some("[1]"), None).is_err());
        assert!(read_record(None, None).is_err());
    }
}
