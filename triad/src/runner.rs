//! Sandboxed execution of the code fragments in one message.
//!
//! Fragments run in order with fail-fast semantics: the first nonzero or
//! timeout exit code stops the batch and becomes the overall exit code.
//! Per-fragment outputs accumulate in order regardless.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::fragment::{
    CodeFragment, command_for, declared_filename, fallback_filename, filename_stays_in_workdir,
    silence_installs,
};
use crate::io::fragment_store::FragmentStore;
use crate::io::sandbox::Sandbox;

/// Reserved exit code reported for a fragment that hit its wall-clock
/// timeout, distinct from normal interpreter exit codes.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Failures that abort a fragment batch before anything executes.
#[derive(Debug, PartialEq, Eq)]
pub enum RunnerError {
    /// The message carried no executable fragments.
    EmptyInput,
    /// The isolated environment is not currently active.
    NotReady,
    /// A declared filename would escape the working directory.
    InvalidFilename(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::EmptyInput => write!(f, "no code fragments to execute"),
            RunnerError::NotReady => write!(f, "execution environment is not running"),
            RunnerError::InvalidFilename(name) => {
                write!(f, "declared filename {name:?} is not inside the working directory")
            }
        }
    }
}

impl std::error::Error for RunnerError {}

/// Accumulated result of running all fragments in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code of the last processed fragment (0 if all succeeded).
    pub exit_code: i32,
    /// Concatenation of all processed fragments' outputs, in order.
    pub combined_output: String,
    /// Resolved path of the first fragment's file, if any fragment resolved.
    pub first_file: Option<PathBuf>,
}

/// Run all fragments of one message inside the sandbox.
///
/// Per fragment: silence install noise, resolve the file (create or append),
/// write the body, and run the per-language command under the hard timeout.
/// Stops at the first failing fragment.
#[instrument(skip_all, fields(fragments = fragments.len(), timeout_secs = timeout.as_secs()))]
pub fn run_fragments<S: Sandbox>(
    sandbox: &S,
    store: &FragmentStore,
    fragments: &[CodeFragment],
    timeout: Duration,
) -> Result<ExecutionResult> {
    if fragments.is_empty() {
        return Err(RunnerError::EmptyInput.into());
    }
    if !sandbox.is_running() {
        return Err(RunnerError::NotReady.into());
    }

    let mut combined_output = String::new();
    let mut first_file: Option<PathBuf> = None;
    let mut exit_code = 0;

    for fragment in fragments {
        let body = silence_installs(&fragment.language, &fragment.body);

        let file_name = match declared_filename(&body) {
            Some(name) if filename_stays_in_workdir(name) => name.to_string(),
            Some(name) => return Err(RunnerError::InvalidFilename(name.to_string()).into()),
            None => fallback_filename(&fragment.language, &body),
        };

        let resolved = store.resolve(&file_name);
        store.write(&resolved, &body)?;
        if first_file.is_none() {
            first_file = Some(resolved.path.clone());
        }

        let Some(command) = command_for(&fragment.language, &file_name, timeout.as_secs()) else {
            combined_output.push_str(&format!(
                "unsupported fragment language {:?}\n",
                fragment.language
            ));
            exit_code = 1;
            break;
        };

        debug!(file = %file_name, language = %fragment.language, "executing fragment");
        let output = sandbox.exec(&command, timeout)?;

        combined_output.push_str(&output.output);
        exit_code = output.exit_code;
        if output.timed_out || exit_code == TIMEOUT_EXIT_CODE {
            exit_code = TIMEOUT_EXIT_CODE;
            combined_output.push_str(&format!(
                "\n[fragment timed out after {}s]\n",
                timeout.as_secs()
            ));
            break;
        }
        if exit_code != 0 {
            info!(exit_code, "fragment failed, stopping batch");
            break;
        }
    }

    Ok(ExecutionResult {
        exit_code,
        combined_output,
        first_file,
    })
}
