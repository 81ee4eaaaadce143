// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency-based trimming of redundant results.

use cgate_core::{keys, meta, CheckResult, RuleResult};
use std::collections::BTreeSet;
use tracing::debug;

/// Remove warnings and successes that depend on a rule that failed in the
/// same check result.
///
/// When a prerequisite fails, downstream "passing" outcomes say nothing
/// useful and only pad the report. Failures themselves are never trimmed: a
/// failure that depends on another failure is still a failure.
#[must_use]
pub fn apply(check: &CheckResult) -> CheckResult {
    let failed: BTreeSet<&str> = check
        .failures
        .iter()
        .filter_map(RuleResult::code)
        .collect();

    if failed.is_empty() {
        return check.clone();
    }

    let survives = |result: &&RuleResult| {
        let Some(depends_on) = meta::string_list(&result.metadata, keys::DEPENDS_ON) else {
            return true;
        };
        let shadowed = depends_on.iter().any(|dep| failed.contains(dep.as_str()));
        if shadowed {
            debug!(
                target: "cgate.engine",
                code = result.code().unwrap_or("<none>"),
                "trimming result shadowed by a failed dependency"
            );
        }
        !shadowed
    };

    let mut trimmed = check.clone();
    trimmed.warnings = check.warnings.iter().filter(survives).cloned().collect();
    trimmed.successes = check.successes.iter().filter(survives).cloned().collect();
    trimmed
}
