//! Code fragment extraction and deterministic file naming.
//!
//! A Proposer message may carry zero or more fenced code blocks. Each block
//! becomes a [`CodeFragment`] processed in order of appearance. Naming is
//! deterministic: an explicit `# filename: foo.py` directive on the first
//! line wins; otherwise the name derives from a SHA-256 hash of the body so
//! the same fragment always lands in the same file across turns.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// A single executable code block extracted from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    pub language: String,
    pub body: String,
}

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^```([A-Za-z0-9_+-]+)[ \t]*\r?\n(.*?)^```[ \t]*$").expect("fence regex")
});

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#|//|--)?\s*[Ff]ilename:\s*([\w./\\-]+)").expect("filename regex")
});

static PIP_INSTALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?P<cmd>\s*!?\s*pip3?\s+install)(?P<rest>.*)$").expect("pip regex")
});

/// Extract fenced code blocks, in order. Blocks without a language tag are
/// not executable and are skipped.
pub fn extract_fragments(content: &str) -> Vec<CodeFragment> {
    FENCE_RE
        .captures_iter(content)
        .map(|caps| CodeFragment {
            language: caps[1].to_lowercase(),
            body: caps[2].trim_end_matches('\n').to_string(),
        })
        .collect()
}

/// Rewrite package-install lines to their quiet form so a fragment appended
/// and re-run across turns does not drown the transcript in installer noise.
pub fn silence_installs(language: &str, body: &str) -> String {
    if !matches!(language, "python" | "bash" | "sh") {
        return body.to_string();
    }
    PIP_INSTALL_RE
        .replace_all(body, |caps: &regex::Captures<'_>| {
            let rest = &caps["rest"];
            if rest.contains("-qqq") {
                format!("{}{}", &caps["cmd"], rest)
            } else {
                format!("{} -qqq{}", &caps["cmd"], rest)
            }
        })
        .into_owned()
}

/// Filename declared on the first line of the fragment body, if any.
pub fn declared_filename(body: &str) -> Option<&str> {
    let first_line = body.lines().next()?;
    FILENAME_RE
        .captures(first_line)
        .map(|caps| caps.get(1).expect("filename capture").as_str())
}

/// True if a declared name stays inside the working directory when resolved
/// lexically: relative, and no `..` components.
pub fn filename_stays_in_workdir(name: &str) -> bool {
    let path = std::path::Path::new(name);
    if path.is_absolute() || name.starts_with('\\') {
        return false;
    }
    path.components()
        .all(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir))
}

/// Deterministic fallback name for a fragment without an explicit directive.
pub fn fallback_filename(language: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let digest = hasher.finalize();
    let hash = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("tmp_code_{hash}.{}", extension_for(language))
}

fn extension_for(language: &str) -> &str {
    match language {
        "python" => "py",
        "bash" => "sh",
        "sh" => "sh",
        "javascript" => "js",
        other => other,
    }
}

/// Languages the executor can run, for prompt rendering.
pub fn runnable_languages() -> &'static [&'static str] {
    &["python", "bash", "sh", "javascript"]
}

/// Interpreter for a language, or `None` when the language is not runnable.
pub fn interpreter_for(language: &str) -> Option<&'static str> {
    match language {
        "python" => Some("python3"),
        "bash" => Some("bash"),
        "sh" => Some("sh"),
        "javascript" => Some("node"),
        _ => None,
    }
}

/// Build the in-container invocation for a resolved fragment file, wrapped in
/// the `timeout` coreutil so a runaway interpreter exits with code 124.
pub fn command_for(language: &str, file_name: &str, timeout_secs: u64) -> Option<Vec<String>> {
    let interpreter = interpreter_for(language)?;
    Some(vec![
        "timeout".to_string(),
        timeout_secs.to_string(),
        interpreter.to_string(),
        file_name.to_string(),
    ])
}
