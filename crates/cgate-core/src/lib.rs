// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-core
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Coercion helpers for polymorphic result metadata.
pub mod meta;
/// Rule descriptors extracted from annotated policy modules.
pub mod rule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use rule::{RuleDescriptor, RuleKind};

/// Polymorphic metadata attached to a [`RuleResult`].
///
/// Values come straight from the rule engine and can be strings, lists of
/// anything, booleans, and so on. Use the helpers in [`meta`] to read them
/// without panicking on unexpected shapes.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Well-known metadata keys recognized by the evaluation pipeline.
pub mod keys {
    /// Canonical `"<package>.<short_name>"` rule identifier.
    pub const CODE: &str = "code";
    /// Optional finer-grained selector within a rule.
    pub const TERM: &str = "term";
    /// Collection tags attached to the rule.
    pub const COLLECTIONS: &str = "collections";
    /// RFC 3339 instant at which a failure starts to count.
    pub const EFFECTIVE_ON: &str = "effective_on";
    /// Codes of rules this result depends on.
    pub const DEPENDS_ON: &str = "depends_on";
    /// Short human-readable rule title.
    pub const TITLE: &str = "title";
    /// Longer rule description.
    pub const DESCRIPTION: &str = "description";
    /// Suggested remediation.
    pub const SOLUTION: &str = "solution";
}

/// A single rule outcome: a message plus whatever metadata the rule attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Human-readable outcome message.
    #[serde(rename = "msg")]
    pub message: String,

    /// Free-form metadata (code, term, collections, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl RuleResult {
    /// Build a result with a message and no metadata.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            metadata: Metadata::new(),
        }
    }

    /// The result's canonical rule code, when its metadata carries one as a string.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        meta::as_str(&self.metadata, keys::CODE)
    }
}

/// One named bucket of rule outcomes, as produced by the runner.
///
/// Order within each bucket is meaningful and is preserved through
/// post-processing. Empty buckets deserialize from `null` or absence, and
/// always serialize as `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Namespace this bucket was evaluated for.
    #[serde(default, alias = "namespace")]
    pub name: String,

    /// Rule violations.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub failures: Vec<RuleResult>,

    /// Non-blocking findings.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub warnings: Vec<RuleResult>,

    /// Rules that passed.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub successes: Vec<RuleResult>,

    /// Rules that were not evaluated.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub skipped: Vec<RuleResult>,

    /// Rules waived by an exception.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub exceptions: Vec<RuleResult>,
}

/// Accept `null` where a bucket list is expected.
fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<RuleResult>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Option<Vec<RuleResult>> = Option::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}

impl CheckResult {
    /// Create an empty bucket set for `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// True when every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
            && self.warnings.is_empty()
            && self.successes.is_empty()
            && self.skipped.is_empty()
            && self.exceptions.is_empty()
    }
}

/// The canonical evaluation outcome: ordered check results plus the opaque
/// data payload passed through from the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// One entry per logical input namespace, in runner order.
    pub results: Vec<CheckResult>,

    /// Opaque runner payload, passed through untouched.
    #[serde(default)]
    pub data: serde_json::Value,

    /// Instant the evaluation was judged against.
    pub effective_time: DateTime<Utc>,
}

impl Report {
    /// True when any check result still holds a failure.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|c| !c.failures.is_empty())
    }
}

/// User-facing include/exclude configuration for an evaluation.
///
/// `collections` is the legacy spelling of `include: ["@tag", ...]` and is
/// folded into the include list when the matcher is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Patterns selecting results to keep. Empty means "everything" (`*`).
    pub include: Vec<String>,

    /// Patterns selecting results to drop.
    pub exclude: Vec<String>,

    /// Legacy collection tags, equivalent to `@tag` include entries.
    pub collections: Vec<String>,
}

impl PolicyConfig {
    /// Include patterns with legacy `collections` folded in and the
    /// default `*` applied when nothing was configured.
    #[must_use]
    pub fn effective_includes(&self) -> Vec<String> {
        let mut includes: Vec<String> = self
            .collections
            .iter()
            .map(|tag| format!("@{tag}"))
            .chain(self.include.iter().cloned())
            .collect();
        if includes.is_empty() {
            includes.push("*".to_string());
        }
        includes
    }
}
