// SPDX-License-Identifier: MIT OR Apache-2.0
//! Full evaluation flows: sources, capabilities, index, runner, report.

use anyhow::Result;
use async_trait::async_trait;
use cgate_core::{CheckResult, RuleResult};
use cgate_engine::{CancelToken, EvalConfig, EvalError, Evaluator};
use cgate_sources::{DirSource, InlineSource, RunOutput, Runner, StaticRunner, WorkDir};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::path::PathBuf;

const BREAKFAST_MODULE: &str = r#"package policy.release.breakfast

# METADATA
# title: Spam is refused
# description: Processed meat has no place on the table.
# custom:
#   short_name: spam
deny contains result if {
    input.menu.spam
    result := "spam found"
}
"#;

fn spam_failure() -> RuleResult {
    let mut r = RuleResult::new("spam found");
    r.metadata
        .insert("code".into(), json!("release.breakfast.spam"));
    r
}

fn static_runner(results: Vec<CheckResult>) -> Box<StaticRunner> {
    Box::new(StaticRunner::new(RunOutput {
        results,
        data: serde_json::Value::Null,
    }))
}

#[tokio::test]
async fn evaluation_enriches_from_materialized_policy() {
    let check = CheckResult {
        name: "release.main".into(),
        failures: vec![spam_failure()],
        ..CheckResult::default()
    };
    let source = InlineSource::new("release-policy")
        .with_module("release/breakfast.rego", BREAKFAST_MODULE);

    let report = Evaluator::new(static_runner(vec![check]))
        .with_source(Box::new(source))
        .evaluate(&[])
        .await
        .expect("evaluation succeeds");

    let failure = &report.results[0].failures[0];
    assert_eq!(failure.metadata["title"], json!("Spam is refused"));
    assert_eq!(
        failure.metadata["description"],
        json!("Processed meat has no place on the table.")
    );
}

#[tokio::test]
async fn broken_module_fails_the_evaluation() {
    let check = CheckResult {
        name: "main".into(),
        successes: vec![RuleResult::new("ok")],
        ..CheckResult::default()
    };
    let source = InlineSource::new("broken").with_module("bad.rego", "deny { true }\n");

    let err = Evaluator::new(static_runner(vec![check]))
        .with_source(Box::new(source))
        .evaluate(&[])
        .await
        .expect_err("broken module must fail");
    assert!(matches!(err, EvalError::Index(_)), "got: {err:?}");
}

#[tokio::test]
async fn missing_source_directory_is_fatal() {
    let check = CheckResult {
        name: "main".into(),
        successes: vec![RuleResult::new("ok")],
        ..CheckResult::default()
    };

    let err = Evaluator::new(static_runner(vec![check]))
        .with_source(Box::new(DirSource::new("/no/such/policy")))
        .evaluate(&[])
        .await
        .expect_err("missing source must fail");
    match err {
        EvalError::Source { url, .. } => assert!(url.contains("/no/such/policy")),
        other => panic!("expected Source error, got {other:?}"),
    }
}

struct FailingRunner;

#[async_trait]
impl Runner for FailingRunner {
    async fn run(&self, _workdir: &WorkDir, _inputs: &[PathBuf]) -> Result<RunOutput> {
        anyhow::bail!("engine exploded")
    }
}

#[tokio::test]
async fn runner_failure_is_surfaced_verbatim() {
    let err = Evaluator::new(Box::new(FailingRunner))
        .evaluate(&[])
        .await
        .expect_err("runner failure must propagate");
    match &err {
        EvalError::Runner(inner) => assert_eq!(inner.to_string(), "engine exploded"),
        other => panic!("expected Runner error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_output_is_rejected() {
    let empty = vec![CheckResult::named("main")];
    let err = Evaluator::new(static_runner(empty))
        .evaluate(&[])
        .await
        .expect_err("empty results must fail");
    assert!(matches!(err, EvalError::EmptyResults));
    assert_eq!(
        err.to_string(),
        "no successes, warnings, or failures, check input"
    );

    let none_at_all = Evaluator::new(static_runner(Vec::new()))
        .evaluate(&[])
        .await
        .expect_err("no check results at all must fail");
    assert!(matches!(none_at_all, EvalError::EmptyResults));
}

#[tokio::test]
async fn skipped_only_results_still_produce_a_report() {
    // The empty-output guard looks at every bucket; a run where rules were
    // at least reached (and skipped) is a real result set.
    let check = CheckResult {
        name: "main".into(),
        skipped: vec![RuleResult::new("skipped")],
        ..CheckResult::default()
    };
    let report = Evaluator::new(static_runner(vec![check]))
        .evaluate(&[])
        .await
        .expect("skipped bucket is still a non-empty result set");
    assert_eq!(report.results[0].skipped.len(), 1);
}

#[tokio::test]
async fn cancelled_token_stops_the_evaluation() {
    let check = CheckResult {
        name: "main".into(),
        successes: vec![RuleResult::new("ok")],
        ..CheckResult::default()
    };
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = Evaluator::new(static_runner(vec![check]))
        .evaluate_cancellable(&cancel, &[])
        .await
        .expect_err("cancelled evaluation must not complete");
    assert!(matches!(err, EvalError::Cancelled));
}

#[tokio::test]
async fn effective_time_override_is_honored_and_reported() {
    let pinned: DateTime<Utc> = "2020-06-01T00:00:00Z".parse().expect("timestamp");
    let mut failure = RuleResult::new("future rule");
    failure
        .metadata
        .insert("effective_on".into(), json!("2021-01-01T00:00:00Z"));
    let check = CheckResult {
        name: "main".into(),
        failures: vec![failure],
        ..CheckResult::default()
    };

    let report = Evaluator::new(static_runner(vec![check]))
        .with_config(EvalConfig {
            effective_time: Some(pinned),
            ..EvalConfig::default()
        })
        .evaluate(&[])
        .await
        .expect("evaluation succeeds");

    assert_eq!(report.effective_time, pinned);
    // Judged from 2020, the 2021 failure has not landed yet.
    assert!(report.results[0].failures.is_empty());
    assert_eq!(report.results[0].warnings.len(), 1);
}

#[tokio::test]
async fn report_serializes_empty_buckets_as_arrays() {
    let check = CheckResult {
        name: "main".into(),
        successes: vec![RuleResult::new("ok")],
        ..CheckResult::default()
    };
    let report = Evaluator::new(static_runner(vec![check]))
        .evaluate(&[])
        .await
        .expect("evaluation succeeds");

    let value = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(value["results"][0]["skipped"], json!([]));
    assert_eq!(value["results"][0]["exceptions"], json!([]));
    assert_eq!(value["results"][0]["failures"], json!([]));
}

#[tokio::test]
async fn overlay_source_refines_base_rules() {
    let base = InlineSource::new("base").with_module("release/breakfast.rego", BREAKFAST_MODULE);
    let overlay_module = r#"package policy.release.breakfast

# METADATA
# title: Spam is merely frowned upon
# custom:
#   short_name: spam
deny contains result if {
    result := "spam found"
}
"#;
    let overlay = InlineSource::new("overlay").with_module("breakfast.rego", overlay_module);

    let check = CheckResult {
        name: "main".into(),
        failures: vec![spam_failure()],
        ..CheckResult::default()
    };

    let report = Evaluator::new(static_runner(vec![check]))
        .with_source(Box::new(base))
        .with_source(Box::new(overlay))
        .evaluate(&[])
        .await
        .expect("evaluation succeeds");

    assert_eq!(
        report.results[0].failures[0].metadata["title"],
        json!("Spam is merely frowned upon")
    );
}
