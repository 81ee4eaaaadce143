// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use crate::format::{render, summarize, OutputFormat};
use crate::EXIT_FAILURE;
use anyhow::{Context, Result};
use cgate_capability::CapabilityDocument;
use cgate_core::{PolicyConfig, Report};
use cgate_engine::{EvalConfig, Evaluator};
use cgate_sources::{DirSource, ExecRunner, PolicySource, Runner, StaticRunner};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Run a full evaluation and print the report.
pub async fn validate(
    config: Option<&Path>,
    policy_dirs: &[PathBuf],
    runner: &Path,
    effective_time: &str,
    output: OutputFormat,
    inputs: &[PathBuf],
) -> Result<i32> {
    let runner = ExecRunner::new(runner);
    evaluate(config, policy_dirs, Box::new(runner), effective_time, output, inputs).await
}

/// Post-process saved raw results and print the report.
pub async fn replay(
    file: &Path,
    config: Option<&Path>,
    policy_dirs: &[PathBuf],
    effective_time: &str,
    output: OutputFormat,
) -> Result<i32> {
    let runner = StaticRunner::from_file(file)?;
    evaluate(config, policy_dirs, Box::new(runner), effective_time, output, &[]).await
}

/// Print the restricted capability document.
pub fn capabilities() -> Result<i32> {
    let bytes = CapabilityDocument::baseline()
        .restricted()
        .to_bytes()
        .context("serialize capability document")?;
    let rendered = String::from_utf8(bytes).context("capability document is not UTF-8")?;
    println!("{rendered}");
    Ok(0)
}

async fn evaluate(
    config: Option<&Path>,
    policy_dirs: &[PathBuf],
    runner: Box<dyn Runner>,
    effective_time: &str,
    output: OutputFormat,
    inputs: &[PathBuf],
) -> Result<i32> {
    let policy = load_config(config)?;
    let effective_time = parse_effective_time(effective_time)?;

    let mut evaluator = Evaluator::new(runner).with_config(EvalConfig {
        policy,
        effective_time,
        ..EvalConfig::default()
    });
    for dir in policy_dirs {
        evaluator = evaluator.with_source(Box::new(DirSource::new(dir)) as Box<dyn PolicySource>);
    }

    let report = evaluator.evaluate(inputs).await?;
    info!(target: "cgate.cli", "{}", summarize(&report));
    println!("{}", render(&report, output)?);

    Ok(exit_code(&report))
}

/// Load the include/exclude configuration; absent file means defaults.
fn load_config(path: Option<&Path>) -> Result<PolicyConfig> {
    let Some(path) = path else {
        return Ok(PolicyConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read policy config {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("parse policy config {}", path.display()))
}

/// `"now"` (the default) leaves the engine on the wall clock.
fn parse_effective_time(raw: &str) -> Result<Option<DateTime<Utc>>> {
    if raw.eq_ignore_ascii_case("now") {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid effective time {raw:?}, expected RFC 3339 or \"now\""))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

fn exit_code(report: &Report) -> i32 {
    if report.has_failures() {
        EXIT_FAILURE
    } else {
        0
    }
}
