//! Scoped working directory for one conversation.
//!
//! Each conversation exclusively owns its working directory for the run's
//! lifetime. The directory is created lazily at run start and removed on all
//! exit paths, including panics, by the `TempDir` drop.

use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::debug;

/// Owner of the conversation's working directory.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh empty working directory under the system temp root.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("triad-")
            .tempdir()
            .context("create working directory")?;
        debug!(path = %dir.path().display(), "created working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
