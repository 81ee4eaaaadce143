// SPDX-License-Identifier: MIT OR Apache-2.0
//! Effective-time gating of failures.

use cgate_core::{keys, meta, CheckResult};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Demote failures whose `effective_on` lies beyond `effective_time`.
///
/// Demoted failures are appended after the existing warnings, keeping their
/// own relative order. A missing, non-string, or unparseable `effective_on`
/// leaves the failure where it is; only a timestamp we can read and that
/// is strictly in the future softens the outcome. No other bucket is gated.
#[must_use]
pub fn apply(check: &CheckResult, effective_time: DateTime<Utc>) -> CheckResult {
    let mut gated = check.clone();
    let mut failures = Vec::with_capacity(gated.failures.len());

    for result in gated.failures {
        match meta::time(&result.metadata, keys::EFFECTIVE_ON) {
            Some(effective_on) if effective_on > effective_time => {
                debug!(
                    target: "cgate.engine",
                    code = result.code().unwrap_or("<none>"),
                    %effective_on,
                    "failure not yet effective, demoting to warning"
                );
                gated.warnings.push(result);
            }
            _ => failures.push(result),
        }
    }

    gated.failures = failures;
    gated
}
