// SPDX-License-Identifier: MIT OR Apache-2.0
//! Include/exclude filtering of check results.

use cgate_core::CheckResult;
use cgate_matcher::Matcher;

/// Produce a copy of `check` holding only the results the matcher keeps.
///
/// Every bucket is filtered the same way; relative order inside each bucket
/// is preserved.
#[must_use]
pub fn apply(check: &CheckResult, matcher: &Matcher) -> CheckResult {
    let keep = |bucket: &[cgate_core::RuleResult]| {
        bucket
            .iter()
            .filter(|r| matcher.keeps(r))
            .cloned()
            .collect()
    };

    CheckResult {
        name: check.name.clone(),
        failures: keep(&check.failures),
        warnings: keep(&check.warnings),
        successes: keep(&check.successes),
        skipped: keep(&check.skipped),
        exceptions: keep(&check.exceptions),
    }
}
