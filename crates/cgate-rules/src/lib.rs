// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-rules
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod parse;

pub use parse::parse_module;

use cgate_core::RuleDescriptor;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Errors that fail an index build outright.
///
/// Per-rule annotation problems are *not* errors; they are logged and the
/// rule is skipped.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A policy module could not be read from disk.
    #[error("failed to read policy module {path}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Walking the policy tree failed.
    #[error("failed to walk policy tree")]
    Walk(#[from] walkdir::Error),

    /// A module is syntactically broken: no package declaration was found.
    #[error("policy module {module} has no package declaration")]
    MissingPackage {
        /// Module path or name.
        module: String,
    },
}

/// Read-only catalog of rule descriptors keyed by canonical code.
///
/// Built once per evaluation from the materialized policy sources and
/// consulted during metadata enrichment. Duplicate codes are resolved
/// last-wins, which lets overlay modules refine upstream rules.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    rules: BTreeMap<String, RuleDescriptor>,
}

impl RuleIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from every `.rego` module under `root`.
    ///
    /// Test helper modules (`*_test.rego`) are skipped, matching the rule
    /// engine's own convention for separating policy from its tests.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the tree walk fails, a module cannot be
    /// read, or a module has no package declaration.
    pub fn from_dir(root: &Path) -> Result<Self, IndexError> {
        let mut index = Self::new();
        index.add_dir(root)?;
        Ok(index)
    }

    /// Merge every `.rego` module under `root` into this index.
    ///
    /// Later additions win over earlier ones on duplicate codes, so callers
    /// add overlay trees after their base trees.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RuleIndex::from_dir`].
    pub fn add_dir(&mut self, root: &Path) -> Result<(), IndexError> {
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !name.ends_with(".rego") || name.ends_with("_test.rego") {
                continue;
            }

            let source = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let module = path
                .strip_prefix(root)
                .unwrap_or(path)
                .display()
                .to_string();
            self.add_module(&module, &source)?;
        }

        debug!(target: "cgate.rules", rules = self.len(), "rule index built");
        Ok(())
    }

    /// Parse `source` as one policy module and merge its rules into the index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::MissingPackage`] when the module has no
    /// package declaration.
    pub fn add_module(&mut self, module: &str, source: &str) -> Result<(), IndexError> {
        for descriptor in parse_module(module, source)? {
            self.insert(descriptor);
        }
        Ok(())
    }

    /// Insert a descriptor, replacing any previous entry with the same code.
    pub fn insert(&mut self, descriptor: RuleDescriptor) {
        if self.rules.contains_key(&descriptor.code) {
            debug!(
                target: "cgate.rules",
                code = %descriptor.code,
                "duplicate rule code, keeping the later definition"
            );
        }
        self.rules.insert(descriptor.code.clone(), descriptor);
    }

    /// Look up a descriptor by canonical code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&RuleDescriptor> {
        self.rules.get(code)
    }

    /// Number of descriptors in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the index holds no descriptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over descriptors in code order.
    pub fn iter(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.values()
    }
}
