// SPDX-License-Identifier: MIT OR Apache-2.0
//! Annotation extraction from policy module source.
//!
//! The scanner is deliberately narrow: it understands `package`
//! declarations, `# METADATA` comment blocks, and the rule head that
//! follows a block. Everything else in the module belongs to the rule
//! engine and is ignored here.

use crate::IndexError;
use cgate_core::{RuleDescriptor, RuleKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The YAML payload of one `# METADATA` block.
#[derive(Debug, Default, Deserialize)]
struct AnnotationBlock {
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    custom: BTreeMap<String, serde_yaml::Value>,
}

/// Parse one module's source and return the descriptors of its annotated rules.
///
/// Rules without a `short_name` annotation are not admitted; malformed
/// annotation blocks are skipped with a warning.
///
/// # Errors
///
/// Returns [`IndexError::MissingPackage`] when no package declaration is
/// found anywhere in the module.
pub fn parse_module(module: &str, source: &str) -> Result<Vec<RuleDescriptor>, IndexError> {
    let package = find_package(source).ok_or_else(|| IndexError::MissingPackage {
        module: module.to_string(),
    })?;

    let mut out = Vec::new();
    let mut lines = source.lines().enumerate().peekable();

    while let Some((lineno, line)) = lines.next() {
        if line.trim() != "# METADATA" {
            continue;
        }
        let block_line = lineno + 1;

        let mut yaml = String::new();
        while let Some((_, next)) = lines.peek() {
            let trimmed = next.trim_start();
            match trimmed.strip_prefix('#') {
                Some(rest) => {
                    yaml.push_str(rest.strip_prefix(' ').unwrap_or(rest));
                    yaml.push('\n');
                    lines.next();
                }
                None => break,
            }
        }

        let head = loop {
            match lines.next() {
                Some((_, l)) if l.trim().is_empty() => continue,
                other => break other.map(|(_, l)| l),
            }
        };
        let Some(head) = head else {
            warn!(
                target: "cgate.rules",
                module,
                line = block_line,
                "annotation block at end of module has no rule, skipping"
            );
            continue;
        };

        let block: AnnotationBlock = match serde_yaml::from_str(&yaml) {
            Ok(block) => block,
            Err(err) => {
                warn!(
                    target: "cgate.rules",
                    module,
                    line = block_line,
                    error = %err,
                    "malformed annotation block, skipping rule"
                );
                continue;
            }
        };

        if let Some(descriptor) = build_descriptor(module, &package, block, head) {
            out.push(descriptor);
        }
    }

    Ok(out)
}

/// Locate the module's package declaration and normalize its path.
///
/// Leading `data.` and `policy.` segments are conventions of how rule
/// bundles are addressed, not part of the code a user writes in an
/// include/exclude pattern, so they are trimmed.
fn find_package(source: &str) -> Option<String> {
    for line in source.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("package ") {
            let raw = rest.split_whitespace().next()?;
            let path = raw.strip_prefix("data.").unwrap_or(raw);
            let path = path.strip_prefix("policy.").unwrap_or(path);
            if path.is_empty() {
                return None;
            }
            return Some(path.to_string());
        }
    }
    None
}

fn build_descriptor(
    module: &str,
    package: &str,
    block: AnnotationBlock,
    head: &str,
) -> Option<RuleDescriptor> {
    let short_name = match block.custom.get("short_name").and_then(yaml_str) {
        Some(name) => name,
        None => {
            debug!(
                target: "cgate.rules",
                module,
                "annotated rule has no short_name, not indexed"
            );
            return None;
        }
    };

    let kind = RuleKind::from_head(head_name(head));

    let effective_on = match block.custom.get("effective_on") {
        None => None,
        Some(value) => match yaml_str(value) {
            Some(s) => Some(s),
            None => {
                warn!(
                    target: "cgate.rules",
                    module,
                    rule = %short_name,
                    "effective_on is not a string, dropping"
                );
                None
            }
        },
    };

    Some(RuleDescriptor {
        code: RuleDescriptor::code_for(package, &short_name),
        package: package.to_string(),
        short_name: short_name.clone(),
        title: block.title,
        description: block.description,
        solution: block.custom.get("solution").and_then(yaml_str),
        collections: string_list(module, &short_name, "collections", &block.custom),
        depends_on: string_list(module, &short_name, "depends_on", &block.custom),
        effective_on,
        kind,
    })
}

/// First identifier on the rule head line (`deny contains x if {` → `deny`).
fn head_name(head: &str) -> &str {
    let trimmed = head.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Coerce a custom annotation field to a list of strings.
///
/// Scalars become singletons; non-string list elements and wholly wrong
/// shapes are dropped with a warning.
fn string_list(
    module: &str,
    rule: &str,
    field: &str,
    custom: &BTreeMap<String, serde_yaml::Value>,
) -> Vec<String> {
    let Some(value) = custom.get(field) else {
        return Vec::new();
    };

    match value {
        serde_yaml::Value::String(s) => vec![s.clone()],
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .filter_map(|item| {
                let coerced = yaml_str(item);
                if coerced.is_none() {
                    warn!(
                        target: "cgate.rules",
                        module,
                        rule,
                        field,
                        "dropping non-string entry"
                    );
                }
                coerced
            })
            .collect(),
        _ => {
            warn!(
                target: "cgate.rules",
                module,
                rule,
                field,
                "expected a string or list of strings, dropping"
            );
            Vec::new()
        }
    }
}

fn yaml_str(value: &serde_yaml::Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_prefixes_are_trimmed() {
        assert_eq!(
            find_package("package policy.release.breakfast\n"),
            Some("release.breakfast".to_string())
        );
        assert_eq!(
            find_package("package data.policy.lunch\n"),
            Some("lunch".to_string())
        );
        assert_eq!(
            find_package("package dinner\n"),
            Some("dinner".to_string())
        );
        assert_eq!(find_package("deny { true }\n"), None);
    }

    #[test]
    fn head_name_handles_common_shapes() {
        assert_eq!(head_name("deny contains result if {"), "deny");
        assert_eq!(head_name("warn[msg] {"), "warn");
        assert_eq!(head_name("allow if {"), "allow");
        assert_eq!(head_name("violation_count := count(deny)"), "violation_count");
    }

    #[test]
    fn missing_short_name_is_not_indexed() {
        let source = r#"package policy.x

# METADATA
# title: Untitled
deny contains r if { r := 1 }
"#;
        let rules = parse_module("x.rego", source).expect("parse");
        assert!(rules.is_empty());
    }

    #[test]
    fn malformed_yaml_block_is_skipped() {
        let source = r#"package policy.x

# METADATA
# title: [unterminated
# custom:
#   short_name: broken
deny contains r if { r := 1 }

# METADATA
# custom:
#   short_name: fine
deny contains r if { r := 2 }
"#;
        let rules = parse_module("x.rego", source).expect("parse");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].short_name, "fine");
    }

    #[test]
    fn wrong_typed_fields_are_dropped() {
        let source = r#"package policy.x

# METADATA
# custom:
#   short_name: odd
#   collections: 42
#   depends_on:
#     - x.other
#     - 7
#   effective_on: false
deny contains r if { r := 1 }
"#;
        let rules = parse_module("x.rego", source).expect("parse");
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert!(rule.collections.is_empty());
        assert_eq!(rule.depends_on, vec!["x.other"]);
        assert!(rule.effective_on.is_none());
    }

    #[test]
    fn trailing_annotation_without_rule_is_skipped() {
        let source = "package policy.x\n\n# METADATA\n# custom:\n#   short_name: dangling\n";
        let rules = parse_module("x.rego", source).expect("parse");
        assert!(rules.is_empty());
    }
}
