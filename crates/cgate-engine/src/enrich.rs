// SPDX-License-Identifier: MIT OR Apache-2.0
//! Metadata enrichment from the rule index.

use cgate_core::{keys, meta, CheckResult, RuleResult};
use cgate_rules::RuleIndex;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Controls how enrichment treats timestamps that have already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Strip `effective_on` values at or before the effective time; they no
    /// longer change the outcome and only clutter the report.
    #[default]
    Strip,
    /// Preserve past `effective_on` values for audit consumers.
    Keep,
}

/// Enrich every surviving result from the rule index and normalize the
/// metadata shapes downstream consumers rely on.
///
/// For results whose `code` names a known descriptor, the descriptor's
/// `title`, `description`, and `solution` are copied in when the result
/// does not already carry them, and `depends_on` is injected for the
/// trimmer. Results without a descriptor keep their metadata as-is apart
/// from the shape normalization, which applies everywhere: `collections`
/// becomes a list of strings or is dropped, and stale `effective_on`
/// values are handled per `stale`.
#[must_use]
pub fn apply(
    check: &CheckResult,
    index: &RuleIndex,
    effective_time: DateTime<Utc>,
    stale: StalePolicy,
) -> CheckResult {
    let enrich_bucket = |bucket: &[RuleResult]| {
        bucket
            .iter()
            .map(|r| enrich_result(r, index, effective_time, stale))
            .collect()
    };

    CheckResult {
        name: check.name.clone(),
        failures: enrich_bucket(&check.failures),
        warnings: enrich_bucket(&check.warnings),
        successes: enrich_bucket(&check.successes),
        skipped: enrich_bucket(&check.skipped),
        exceptions: enrich_bucket(&check.exceptions),
    }
}

fn enrich_result(
    result: &RuleResult,
    index: &RuleIndex,
    effective_time: DateTime<Utc>,
    stale: StalePolicy,
) -> RuleResult {
    let mut out = result.clone();

    if let Some(descriptor) = result.code().and_then(|code| index.get(code)) {
        let mut fill = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                out.metadata
                    .entry(key.to_string())
                    .or_insert_with(|| Value::String(value.clone()));
            }
        };
        fill(keys::TITLE, &descriptor.title);
        fill(keys::DESCRIPTION, &descriptor.description);
        fill(keys::SOLUTION, &descriptor.solution);

        if !descriptor.depends_on.is_empty() && !out.metadata.contains_key(keys::DEPENDS_ON) {
            out.metadata.insert(
                keys::DEPENDS_ON.to_string(),
                Value::from(descriptor.depends_on.clone()),
            );
        }
    }

    normalize_collections(&mut out);
    if stale == StalePolicy::Strip {
        strip_stale_effective_on(&mut out, effective_time);
    }

    out
}

/// Rewrite `collections` to a plain list of strings, or drop it when the
/// value has no such reading.
fn normalize_collections(result: &mut RuleResult) {
    let Some(raw) = result.metadata.get(keys::COLLECTIONS) else {
        return;
    };
    match meta::coerce_string_list(raw) {
        Some(list) => {
            result
                .metadata
                .insert(keys::COLLECTIONS.to_string(), Value::from(list));
        }
        None => {
            result.metadata.remove(keys::COLLECTIONS);
        }
    }
}

/// Remove an `effective_on` that is no longer actionable. Values we cannot
/// parse are preserved untouched.
fn strip_stale_effective_on(result: &mut RuleResult, effective_time: DateTime<Utc>) {
    if let Some(effective_on) = meta::time(&result.metadata, keys::EFFECTIVE_ON) {
        if effective_on <= effective_time {
            result.metadata.remove(keys::EFFECTIVE_ON);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgate_core::{RuleDescriptor, RuleKind};
    use serde_json::json;

    fn index_with(descriptor: RuleDescriptor) -> RuleIndex {
        let mut index = RuleIndex::new();
        index.insert(descriptor);
        index
    }

    fn descriptor(code: &str) -> RuleDescriptor {
        let (package, short_name) = code.rsplit_once('.').expect("two-part code");
        RuleDescriptor {
            code: code.to_string(),
            package: package.to_string(),
            short_name: short_name.to_string(),
            title: Some("A title".into()),
            description: Some("A description".into()),
            solution: None,
            collections: vec![],
            depends_on: vec![],
            effective_on: None,
            kind: RuleKind::Deny,
        }
    }

    fn result(code: &str) -> RuleResult {
        let mut r = RuleResult::new("msg");
        r.metadata.insert("code".into(), json!(code));
        r
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn copies_descriptor_fields_when_absent() {
        let index = index_with(descriptor("breakfast.spam"));
        let check = CheckResult {
            failures: vec![result("breakfast.spam")],
            ..CheckResult::default()
        };

        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        let meta = &enriched.failures[0].metadata;
        assert_eq!(meta["title"], json!("A title"));
        assert_eq!(meta["description"], json!("A description"));
        assert!(!meta.contains_key("solution"), "absent solution stays absent");
    }

    #[test]
    fn result_values_win_over_descriptor_values() {
        let index = index_with(descriptor("breakfast.spam"));
        let mut r = result("breakfast.spam");
        r.metadata.insert("title".into(), json!("From the rule"));
        let check = CheckResult {
            failures: vec![r],
            ..CheckResult::default()
        };

        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert_eq!(enriched.failures[0].metadata["title"], json!("From the rule"));
    }

    #[test]
    fn injects_depends_on_for_the_trimmer() {
        let mut d = descriptor("breakfast.ham");
        d.depends_on = vec!["breakfast.spam".into()];
        let index = index_with(d);
        let check = CheckResult {
            successes: vec![result("breakfast.ham")],
            ..CheckResult::default()
        };

        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert_eq!(
            enriched.successes[0].metadata["depends_on"],
            json!(["breakfast.spam"])
        );
    }

    #[test]
    fn unknown_codes_are_left_untouched() {
        let index = RuleIndex::new();
        let check = CheckResult {
            failures: vec![result("mystery.rule")],
            ..CheckResult::default()
        };
        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert_eq!(enriched.failures[0], result("mystery.rule"));
    }

    #[test]
    fn collections_are_normalized_everywhere() {
        let index = RuleIndex::new();
        let mut scalar = result("a.b");
        scalar.metadata.insert("collections".into(), json!("solo"));
        let mut bad = result("c.d");
        bad.metadata.insert("collections".into(), json!({"not": "a list"}));

        let check = CheckResult {
            warnings: vec![scalar],
            successes: vec![bad],
            ..CheckResult::default()
        };
        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert_eq!(enriched.warnings[0].metadata["collections"], json!(["solo"]));
        assert!(!enriched.successes[0].metadata.contains_key("collections"));
    }

    #[test]
    fn stale_effective_on_is_stripped_but_future_kept() {
        let index = RuleIndex::new();
        let mut past = result("a.b");
        past.metadata
            .insert("effective_on".into(), json!("2001-01-01T00:00:00Z"));
        let mut future = result("c.d");
        future
            .metadata
            .insert("effective_on".into(), json!("3021-01-01T00:00:00Z"));

        let check = CheckResult {
            warnings: vec![past, future],
            ..CheckResult::default()
        };
        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert!(!enriched.warnings[0].metadata.contains_key("effective_on"));
        assert_eq!(
            enriched.warnings[1].metadata["effective_on"],
            json!("3021-01-01T00:00:00Z")
        );
    }

    #[test]
    fn keep_policy_preserves_stale_timestamps() {
        let index = RuleIndex::new();
        let mut past = result("a.b");
        past.metadata
            .insert("effective_on".into(), json!("2001-01-01T00:00:00Z"));
        let check = CheckResult {
            warnings: vec![past],
            ..CheckResult::default()
        };
        let enriched = apply(&check, &index, now(), StalePolicy::Keep);
        assert_eq!(
            enriched.warnings[0].metadata["effective_on"],
            json!("2001-01-01T00:00:00Z")
        );
    }

    #[test]
    fn unparseable_effective_on_is_preserved() {
        let index = RuleIndex::new();
        let mut odd = result("a.b");
        odd.metadata.insert("effective_on".into(), json!("someday"));
        let check = CheckResult {
            failures: vec![odd],
            ..CheckResult::default()
        };
        let enriched = apply(&check, &index, now(), StalePolicy::Strip);
        assert_eq!(enriched.failures[0].metadata["effective_on"], json!("someday"));
    }
}
