// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rule descriptors extracted from annotated policy modules.

use serde::{Deserialize, Serialize};

/// What a rule head asserts when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// A `deny` rule; firing produces a failure.
    Deny,
    /// A `warn` rule; firing produces a warning.
    Warn,
    /// An `allow` rule.
    Allow,
    /// Any other rule head.
    Other,
}

impl RuleKind {
    /// Derive the kind from a rule head name.
    #[must_use]
    pub fn from_head(name: &str) -> Self {
        match name {
            "deny" => Self::Deny,
            "warn" => Self::Warn,
            "allow" => Self::Allow,
            _ => Self::Other,
        }
    }
}

/// Metadata record for one annotated rule, keyed by its canonical code.
///
/// Immutable once built; the index hands out references during enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    /// Canonical `"<package>.<short_name>"` identifier.
    pub code: String,

    /// Package path the rule lives in.
    pub package: String,

    /// Annotated short name.
    pub short_name: String,

    /// Short human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Suggested remediation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,

    /// Collection tags for bulk include/exclude.
    #[serde(default)]
    pub collections: Vec<String>,

    /// Codes of rules this rule depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// RFC 3339 instant at which failures start to count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_on: Option<String>,

    /// Kind derived from the rule head.
    pub kind: RuleKind,
}

impl RuleDescriptor {
    /// Build the canonical code for a package/short-name pair.
    #[must_use]
    pub fn code_for(package: &str, short_name: &str) -> String {
        format!("{package}.{short_name}")
    }
}
