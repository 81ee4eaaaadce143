// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner implementations.
//!
//! The rule engine itself lives outside this workspace. `ExecRunner` drives
//! it as a child process with a fixed argument contract; `StaticRunner`
//! replays preloaded results for tests and offline use.

use crate::{Runner, WorkDir};
use anyhow::{Context, Result};
use async_trait::async_trait;
use cgate_core::CheckResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// What a runner hands back: one check result per input namespace plus an
/// opaque data payload passed through to the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Check results in runner order.
    #[serde(default)]
    pub results: Vec<CheckResult>,

    /// Opaque payload, passed through untouched.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RunOutput {
    /// Parse runner output bytes.
    ///
    /// Accepts either the full `{"results": [...], "data": ...}` object or
    /// a bare array of check results (data defaults to null).
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not valid JSON of either shape.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).context("runner output is not valid JSON")?;
        match value {
            serde_json::Value::Array(_) => Ok(Self {
                results: serde_json::from_value(value)
                    .context("runner output array is not a list of check results")?,
                data: serde_json::Value::Null,
            }),
            other => serde_json::from_value(other)
                .context("runner output object does not match the run contract"),
        }
    }
}

/// Runs the external rule engine as a child process.
///
/// The child is invoked as:
///
/// ```text
/// <program> [extra args] --policy <dir> --capabilities <file> [--input <path>]...
/// ```
///
/// and must print [`RunOutput`] JSON on stdout. A non-zero exit or
/// unparseable output is a fatal runner error; there are no retries here.
#[derive(Debug, Clone)]
pub struct ExecRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl ExecRunner {
    /// Drive the given engine executable.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Prepend extra arguments before the contract arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Runner for ExecRunner {
    async fn run(&self, workdir: &WorkDir, inputs: &[PathBuf]) -> Result<RunOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--policy")
            .arg(workdir.policy_dir())
            .arg("--capabilities")
            .arg(workdir.capabilities_path());
        for input in inputs {
            cmd.arg("--input").arg(input);
        }
        cmd.kill_on_drop(true);

        debug!(
            target: "cgate.sources",
            program = %self.program.display(),
            inputs = inputs.len(),
            "invoking rule engine"
        );

        let out = cmd
            .output()
            .await
            .with_context(|| format!("spawn rule engine {}", self.program.display()))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            anyhow::bail!(
                "rule engine {} failed (code={:?}): {}",
                self.program.display(),
                out.status.code(),
                stderr.trim()
            );
        }

        RunOutput::from_json_slice(&out.stdout)
    }
}

/// A runner that returns a fixed output on every call.
#[derive(Debug, Clone, Default)]
pub struct StaticRunner {
    output: RunOutput,
}

impl StaticRunner {
    /// Always return `output`.
    #[must_use]
    pub fn new(output: RunOutput) -> Self {
        Self { output }
    }

    /// Load the fixed output from a saved raw-results JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read raw results {}", path.display()))?;
        Ok(Self::new(RunOutput::from_json_slice(&bytes)?))
    }
}

#[async_trait]
impl Runner for StaticRunner {
    async fn run(&self, _workdir: &WorkDir, _inputs: &[PathBuf]) -> Result<RunOutput> {
        Ok(self.output.clone())
    }
}
