// SPDX-License-Identifier: MIT OR Apache-2.0
//! Report rendering.

use anyhow::{Context, Result};
use cgate_core::Report;
use clap::ValueEnum;

/// Supported report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// YAML.
    Yaml,
}

/// Render the report in the requested format.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("render report as JSON")
        }
        OutputFormat::Yaml => serde_yaml::to_string(report).context("render report as YAML"),
    }
}

/// One-line outcome summary for the log.
pub fn summarize(report: &Report) -> String {
    let mut failures = 0;
    let mut warnings = 0;
    let mut successes = 0;
    for check in &report.results {
        failures += check.failures.len();
        warnings += check.warnings.len();
        successes += check.successes.len();
    }
    format!(
        "{} component(s): {failures} failure(s), {warnings} warning(s), {successes} success(es)",
        report.results.len()
    )
}
