// SPDX-License-Identifier: MIT OR Apache-2.0
//! The working directory an evaluation exclusively owns.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Scratch space for one evaluation: materialized policy trees plus the
/// capability document, all underneath a temp directory that is removed
/// when this value drops, on every exit path, success or error.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
    _temp: TempDir,
}

impl WorkDir {
    /// Create a fresh work directory with an empty `policy/` subtree.
    ///
    /// # Errors
    ///
    /// Returns an error when the temp directory or its subtree cannot be
    /// created.
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create evaluation work dir")?;
        let root = temp.path().to_path_buf();
        std::fs::create_dir_all(root.join("policy")).context("create policy subtree")?;
        debug!(target: "cgate.sources", path = %root.display(), "work dir created");
        Ok(Self { root, _temp: temp })
    }

    /// Root of the work directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory policy sources are materialized into.
    #[must_use]
    pub fn policy_dir(&self) -> PathBuf {
        self.root.join("policy")
    }

    /// Where the restricted capability document is written.
    #[must_use]
    pub fn capabilities_path(&self) -> PathBuf {
        self.root.join("capabilities.json")
    }

    /// Write the capability document bytes where the runner expects them.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub async fn write_capabilities(&self, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.capabilities_path(), bytes)
            .await
            .context("write capability document")
    }
}
