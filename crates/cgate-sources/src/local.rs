// SPDX-License-Identifier: MIT OR Apache-2.0
//! Policy sources backed by the local filesystem.

use crate::PolicySource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A policy source rooted at a local directory.
///
/// `acquire` copies the tree into the work area so post-processing never
/// reads from (or races with) the caller's checkout.
#[derive(Debug, Clone)]
pub struct DirSource {
    path: PathBuf,
    subdir: String,
}

impl DirSource {
    /// Source the whole directory at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subdir: String::new(),
        }
    }

    /// Restrict the rule source to a relative subdirectory of the tree.
    #[must_use]
    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }
}

#[async_trait]
impl PolicySource for DirSource {
    async fn acquire(&self, dest: &Path) -> Result<PathBuf> {
        anyhow::ensure!(
            self.path.is_dir(),
            "policy source does not exist: {}",
            self.path.display()
        );

        let target = unique_dest(dest, &self.path);
        copy_tree(&self.path, &target)?;
        debug!(
            target: "cgate.sources",
            from = %self.path.display(),
            to = %target.display(),
            "policy source materialized"
        );
        Ok(target)
    }

    fn url(&self) -> String {
        format!("file::{}", self.path.display())
    }

    fn subdir(&self) -> &str {
        &self.subdir
    }
}

/// A policy source holding its modules in memory.
///
/// Used by tests and by callers that assemble policy on the fly; `acquire`
/// writes each named module under the destination.
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    name: String,
    modules: Vec<(String, String)>,
}

impl InlineSource {
    /// Create an empty inline source labelled `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Add a module with a relative path and its source text.
    #[must_use]
    pub fn with_module(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.push((path.into(), source.into()));
        self
    }
}

#[async_trait]
impl PolicySource for InlineSource {
    async fn acquire(&self, dest: &Path) -> Result<PathBuf> {
        let target = dest.join(&self.name);
        for (rel, source) in &self.modules {
            let path = target.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create dir {}", parent.display()))?;
            }
            fs::write(&path, source).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(target)
    }

    fn url(&self) -> String {
        format!("inline::{}", self.name)
    }
}

/// Pick a destination subdirectory that does not collide with a tree an
/// earlier source already materialized.
fn unique_dest(dest: &Path, source: &Path) -> PathBuf {
    let base = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("policy");
    let mut candidate = dest.join(base);
    let mut n = 1;
    while candidate.exists() {
        candidate = dest.join(format!("{base}.{n}"));
        n += 1;
    }
    candidate
}

fn copy_tree(src_root: &Path, dest_root: &Path) -> Result<()> {
    for entry in WalkDir::new(src_root).follow_links(false) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src_root).unwrap_or(entry.path());
        if rel.as_os_str().is_empty() {
            continue;
        }

        let dest_path = dest_root.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .with_context(|| format!("create dir {}", dest_path.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create dir {}", parent.display()))?;
            }
            fs::copy(entry.path(), &dest_path)
                .with_context(|| format!("copy {}", rel.display()))?;
        }
    }
    Ok(())
}
