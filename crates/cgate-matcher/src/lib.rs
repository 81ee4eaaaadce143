// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-matcher
#![deny(unsafe_code)]
#![warn(missing_docs)]

use cgate_core::{keys, meta, PolicyConfig, RuleResult};

/// Result of evaluating a rule result against include/exclude patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// The best-matching include outscored every matching exclude.
    Kept,
    /// A matching exclude scored at least as high as the best include.
    DroppedByExclude,
    /// No include pattern matched any of the result's tokens.
    DroppedByMissingInclude,
}

impl MatchDecision {
    /// Returns `true` only for [`MatchDecision::Kept`].
    #[must_use]
    pub fn is_kept(self) -> bool {
        matches!(self, Self::Kept)
    }
}

/// One configured pattern with its precomputed specificity score.
#[derive(Debug, Clone)]
struct Pattern {
    text: String,
    score: i64,
}

/// Compiled include/exclude pattern pair for result filtering.
///
/// Patterns match a result's expanded tokens by exact string equality, so a
/// shape outside the documented grammar simply never matches.
#[derive(Debug, Clone)]
pub struct Matcher {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl Matcher {
    /// Build a matcher from a [`PolicyConfig`].
    ///
    /// Legacy `collections` entries are folded into the include list as
    /// `@tag` patterns, and an empty include list defaults to `*`.
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self::from_patterns(&config.effective_includes(), &config.exclude)
    }

    /// Build a matcher from raw include/exclude pattern lists.
    #[must_use]
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Pattern {
                    text: p.clone(),
                    score: score(p),
                })
                .collect()
        };
        Self {
            include: compile(include),
            exclude: compile(exclude),
        }
    }

    /// Decide whether `result` survives filtering.
    ///
    /// A result whose `code` metadata is present but not a string cannot be
    /// classified and passes through unfiltered.
    #[must_use]
    pub fn keeps(&self, result: &RuleResult) -> bool {
        if let Some(raw) = result.metadata.get(keys::CODE) {
            if !raw.is_string() {
                return true;
            }
        }

        let term = meta::as_str(&result.metadata, keys::TERM);
        let collections =
            meta::string_list(&result.metadata, keys::COLLECTIONS).unwrap_or_default();
        self.decide(&tokens(result.code(), term, &collections))
            .is_kept()
    }

    /// Score the token set against both pattern lists and decide.
    #[must_use]
    pub fn decide(&self, tokens: &[String]) -> MatchDecision {
        let best = |patterns: &[Pattern]| {
            patterns
                .iter()
                .filter(|p| tokens.iter().any(|t| t == &p.text))
                .map(|p| p.score)
                .max()
        };

        match (best(&self.include), best(&self.exclude)) {
            (None, _) => MatchDecision::DroppedByMissingInclude,
            (Some(inc), Some(exc)) if inc <= exc => MatchDecision::DroppedByExclude,
            (Some(_), _) => MatchDecision::Kept,
        }
    }
}

/// Expand a result's code, term, and collections into its match tokens.
///
/// A code with fewer than two dotted components contributes nothing beyond
/// the universal `*`; components left of the final `<pkg>.<name>` pair are
/// ignored. Each collection `c` contributes an `@c` token.
#[must_use]
pub fn tokens(code: Option<&str>, term: Option<&str>, collections: &[String]) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(code) = code {
        let parts: Vec<&str> = code.split('.').collect();
        if parts.len() >= 2 {
            let pkg = parts[parts.len() - 2];
            let name = parts[parts.len() - 1];

            let bases = [pkg.to_string(), format!("{pkg}.*"), format!("{pkg}.{name}")];
            out.extend(bases.iter().cloned());
            if let Some(term) = term {
                out.extend(bases.iter().map(|b| format!("{b}:{term}")));
            }
        }
    }

    for collection in collections {
        out.push(format!("@{collection}"));
    }

    out.push("*".to_string());
    out
}

/// Specificity score for a pattern; higher wins.
///
/// A concrete package contributes 10, a concrete rule name 100, a term
/// qualifier 100; the bare wildcard is worth 1.
#[must_use]
pub fn score(pattern: &str) -> i64 {
    let (base, term) = match pattern.split_once(':') {
        Some((base, _)) => (base, true),
        None => (pattern, false),
    };

    let (pkg, name) = match base.split_once('.') {
        Some((pkg, name)) => (pkg, Some(name)),
        None => (base, None),
    };

    let mut score = 0;
    score += match pkg {
        "*" => 1,
        "" => 0,
        _ => 10,
    };
    if let Some(name) = name {
        if !name.is_empty() && name != "*" {
            score += 100;
        }
    }
    if term {
        score += 100;
    }
    score
}
