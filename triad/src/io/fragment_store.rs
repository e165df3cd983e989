//! Per-fragment file persistence inside the working directory.
//!
//! Iterative refinements accumulate: a fragment resolving to an existing file
//! is appended after a single separating newline instead of truncating what a
//! previous turn wrote, so later fragments can rely on earlier definitions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Whether the resolved file is created fresh or appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Create,
    Append,
}

/// A fragment's landing spot on disk, derived deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Absolute path under the working directory.
    pub path: PathBuf,
    /// Name relative to the working directory, as passed to the interpreter.
    pub file_name: String,
    pub mode: FileMode,
}

/// File store rooted at the conversation's working directory.
#[derive(Debug, Clone)]
pub struct FragmentStore {
    workdir: PathBuf,
}

impl FragmentStore {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolve a workdir-relative file name. An existing file means append.
    pub fn resolve(&self, file_name: &str) -> ResolvedFile {
        let path = self.workdir.join(file_name);
        let mode = if path.exists() {
            FileMode::Append
        } else {
            FileMode::Create
        };
        ResolvedFile {
            path,
            file_name: file_name.to_string(),
            mode,
        }
    }

    /// Write the fragment body according to the resolved mode.
    ///
    /// Append adds exactly one separating newline before the body; create
    /// truncates anything already there.
    pub fn write(&self, file: &ResolvedFile, body: &str) -> Result<()> {
        if let Some(parent) = file.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create fragment dir {}", parent.display()))?;
        }
        debug!(path = %file.path.display(), mode = ?file.mode, "writing fragment");
        match file.mode {
            FileMode::Create => fs::write(&file.path, body)
                .with_context(|| format!("write fragment {}", file.path.display()))?,
            FileMode::Append => {
                let mut handle = OpenOptions::new()
                    .append(true)
                    .open(&file.path)
                    .with_context(|| format!("open fragment {}", file.path.display()))?;
                handle
                    .write_all(b"\n")
                    .and_then(|()| handle.write_all(body.as_bytes()))
                    .with_context(|| format!("append fragment {}", file.path.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_resolution_creates_then_appends() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FragmentStore::new(temp.path());

        let first = store.resolve("script.py");
        assert_eq!(first.mode, FileMode::Create);
        store.write(&first, "a = 1").expect("write");

        let second = store.resolve("script.py");
        assert_eq!(second.mode, FileMode::Append);
        store.write(&second, "print(a)").expect("append");

        let contents = fs::read_to_string(temp.path().join("script.py")).expect("read");
        assert_eq!(contents, "a = 1\nprint(a)");
    }

    #[test]
    fn append_separates_with_exactly_one_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FragmentStore::new(temp.path());
        store.write(&store.resolve("s.py"), "first").expect("write");
        store.write(&store.resolve("s.py"), "second").expect("append");
        store.write(&store.resolve("s.py"), "third").expect("append");

        let contents = fs::read_to_string(temp.path().join("s.py")).expect("read");
        assert_eq!(contents, "first\nsecond\nthird");
    }

    #[test]
    fn create_truncates_previous_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FragmentStore::new(temp.path());
        fs::write(temp.path().join("s.py"), "old").expect("seed");

        // Resolution happened before the file existed in a fresh workdir.
        let file = ResolvedFile {
            path: temp.path().join("s.py"),
            file_name: "s.py".to_string(),
            mode: FileMode::Create,
        };
        store.write(&file, "new").expect("write");
        let contents = fs::read_to_string(temp.path().join("s.py")).expect("read");
        assert_eq!(contents, "new");
    }

    #[test]
    fn nested_relative_names_create_parent_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FragmentStore::new(temp.path());
        let file = store.resolve("scripts/run.sh");
        store.write(&file, "echo hi").expect("write");
        assert!(temp.path().join("scripts/run.sh").is_file());
    }
}
