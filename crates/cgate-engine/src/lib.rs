// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-engine
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Cancellation for in-flight evaluations.
pub mod cancel;
/// Metadata enrichment from the rule index.
pub mod enrich;
/// Include/exclude filtering of check results.
pub mod filter;
/// Effective-time gating of failures.
pub mod gate;
/// Dependency-based trimming of redundant results.
pub mod trim;

pub use cancel::CancelToken;
pub use enrich::StalePolicy;

use cgate_capability::CapabilityDocument;
use cgate_core::{CheckResult, PolicyConfig, Report};
use cgate_matcher::Matcher;
use cgate_rules::{IndexError, RuleIndex};
use cgate_sources::{PolicySource, Runner, WorkDir};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the evaluation orchestrator.
///
/// Everything here is fatal for the whole call; per-result metadata
/// anomalies are recovered inside the post-processing stages instead.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The scoped work directory could not be prepared.
    #[error("failed to prepare evaluation work dir")]
    Workspace(#[source] anyhow::Error),

    /// A policy source failed to materialize.
    #[error("failed to fetch policy from {url}")]
    Source {
        /// The source that failed.
        url: String,
        /// Underlying fetch error.
        #[source]
        source: anyhow::Error,
    },

    /// The restricted capability document could not be produced or written.
    #[error("failed to write capability document")]
    Capabilities(#[source] anyhow::Error),

    /// Building the rule index failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The rule engine itself failed; surfaced verbatim, no retry.
    #[error("rule engine execution failed")]
    Runner(#[source] anyhow::Error),

    /// The runner produced nothing to judge.
    #[error("no successes, warnings, or failures, check input")]
    EmptyResults,

    /// The caller cancelled the evaluation.
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Settings for one evaluation.
#[derive(Debug, Default)]
pub struct EvalConfig {
    /// Include/exclude configuration applied to raw results.
    pub policy: PolicyConfig,

    /// Instant to judge `effective_on` against. `None` means the wall clock
    /// at the moment [`Evaluator::evaluate`] is entered.
    pub effective_time: Option<DateTime<Utc>>,

    /// Base capability document to restrict. `None` uses the built-in
    /// baseline.
    pub capabilities: Option<CapabilityDocument>,

    /// How enrichment treats `effective_on` values already in the past.
    pub stale: StalePolicy,
}

/// Drives a full evaluation: materialize policy, restrict capabilities,
/// index rules, invoke the runner, post-process, report.
///
/// Collaborators are injected at construction so tests swap the runner and
/// sources freely. Each call owns its work directory and rule index
/// exclusively; nothing is shared across concurrent evaluations.
pub struct Evaluator {
    sources: Vec<Box<dyn PolicySource>>,
    runner: Box<dyn Runner>,
    config: EvalConfig,
}

impl Evaluator {
    /// Create an evaluator around the given runner, with no sources and
    /// default configuration.
    #[must_use]
    pub fn new(runner: Box<dyn Runner>) -> Self {
        Self {
            sources: Vec::new(),
            runner,
            config: EvalConfig::default(),
        }
    }

    /// Add a policy source. Sources materialize (and index) in the order
    /// they were added, so overlays go last.
    #[must_use]
    pub fn with_source(mut self, source: Box<dyn PolicySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Replace the evaluation configuration.
    #[must_use]
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Current evaluation configuration.
    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Run a full evaluation over `inputs`.
    ///
    /// # Errors
    ///
    /// See [`EvalError`]; all variants are fatal for the call.
    pub async fn evaluate(&self, inputs: &[PathBuf]) -> Result<Report, EvalError> {
        self.evaluate_cancellable(&CancelToken::new(), inputs).await
    }

    /// Run a full evaluation, abandoning it between I/O steps once `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Cancelled`] when the token fires; otherwise as
    /// [`Evaluator::evaluate`].
    pub async fn evaluate_cancellable(
        &self,
        cancel: &CancelToken,
        inputs: &[PathBuf],
    ) -> Result<Report, EvalError> {
        let effective_time = self.config.effective_time.unwrap_or_else(Utc::now);
        debug!(target: "cgate.engine", %effective_time, inputs = inputs.len(), "evaluation starting");

        let workdir = WorkDir::new().map_err(EvalError::Workspace)?;

        let mut rule_roots = Vec::new();
        for source in &self.sources {
            ensure_live(cancel)?;
            let root = source
                .acquire(&workdir.policy_dir())
                .await
                .map_err(|source_err| EvalError::Source {
                    url: source.url(),
                    source: source_err,
                })?;
            info!(target: "cgate.engine", url = %source.url(), "policy source materialized");
            let rules = match source.subdir() {
                "" => root,
                subdir => root.join(subdir),
            };
            rule_roots.push(rules);
        }

        ensure_live(cancel)?;
        let capabilities = self
            .config
            .capabilities
            .clone()
            .unwrap_or_else(CapabilityDocument::baseline)
            .restricted();
        let bytes = capabilities
            .to_bytes()
            .map_err(|e| EvalError::Capabilities(e.into()))?;
        workdir
            .write_capabilities(&bytes)
            .await
            .map_err(EvalError::Capabilities)?;

        let mut index = RuleIndex::new();
        for root in &rule_roots {
            index.add_dir(root)?;
        }

        ensure_live(cancel)?;
        let output = self
            .runner
            .run(&workdir, inputs)
            .await
            .map_err(EvalError::Runner)?;
        ensure_live(cancel)?;

        if output.results.iter().all(CheckResult::is_empty) {
            return Err(EvalError::EmptyResults);
        }

        let matcher = Matcher::new(&self.config.policy);
        let results: Vec<CheckResult> = output
            .results
            .iter()
            .map(|check| {
                let processed =
                    postprocess(check, &matcher, &index, effective_time, self.config.stale);
                info!(
                    target: "cgate.engine",
                    name = %processed.name,
                    failures = processed.failures.len(),
                    warnings = processed.warnings.len(),
                    successes = processed.successes.len(),
                    "check result processed"
                );
                processed
            })
            .collect();

        Ok(Report {
            results,
            data: output.data,
            effective_time,
        })
    }
}

/// Run one check result through the four post-processing stages.
///
/// The input is read-only; a new check result comes back. Stage order is
/// fixed (filter, time gate, enrich, trim): the trimmer must see the
/// post-gate failure set, and enrichment must not feed the gate.
#[must_use]
pub fn postprocess(
    check: &CheckResult,
    matcher: &Matcher,
    index: &RuleIndex,
    effective_time: DateTime<Utc>,
    stale: StalePolicy,
) -> CheckResult {
    let filtered = filter::apply(check, matcher);
    let gated = gate::apply(&filtered, effective_time);
    let enriched = enrich::apply(&gated, index, effective_time, stale);
    trim::apply(&enriched)
}

fn ensure_live(cancel: &CancelToken) -> Result<(), EvalError> {
    if cancel.is_cancelled() {
        Err(EvalError::Cancelled)
    } else {
        Ok(())
    }
}
