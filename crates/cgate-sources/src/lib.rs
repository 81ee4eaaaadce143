// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cgate-sources
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Local-directory and inline policy sources.
pub mod local;
/// Runner implementations: external process and preloaded results.
pub mod runner;
/// The temp-backed directory an evaluation owns.
pub mod workdir;

pub use local::{DirSource, InlineSource};
pub use runner::{ExecRunner, RunOutput, StaticRunner};
pub use workdir::WorkDir;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A place policy rules come from.
///
/// After [`acquire`](PolicySource::acquire) returns, the directory tree
/// rooted at the returned path contains rule source files readable by the
/// runner and the rule indexer.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Materialize this source's rule tree under `dest` and return the
    /// directory holding it.
    async fn acquire(&self, dest: &Path) -> Result<PathBuf>;

    /// Where this source points (for logs and reports).
    fn url(&self) -> String;

    /// Relative subdirectory of the materialized tree holding rule source,
    /// empty when the whole tree is rule source.
    fn subdir(&self) -> &str {
        ""
    }
}

/// The external rule engine, abstracted to a single call.
///
/// Implementations receive the work directory (materialized policy plus the
/// restricted capability document) and the caller's input files, and return
/// one [`CheckResult`](cgate_core::CheckResult) per logical input namespace
/// along with an opaque data payload.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Execute the rules over `inputs`.
    async fn run(&self, workdir: &WorkDir, inputs: &[PathBuf]) -> Result<RunOutput>;
}
