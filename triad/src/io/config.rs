//! Run configuration stored in `triad.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Run configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TriadConfig {
    /// Hard upper bound on messages in one run (seed messages included).
    pub max_turns: usize,

    /// Optional whole-run deadline in seconds; `0` disables it.
    pub run_timeout_secs: u64,

    pub model: ModelConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible API base, e.g. `http://localhost:8000/v1`.
    pub base_url: String,
    /// Model name sent with each completion request.
    pub model: String,
    /// Environment variable holding the API key; empty key is allowed for
    /// local endpoints.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first failed request, with backoff.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container image used for fragment execution.
    pub image: String,
    /// Hard wall-clock timeout per fragment, in seconds.
    pub fragment_timeout_secs: u64,
    /// Truncate captured fragment output beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            model: "default".to_string(),
            api_key_env: "TRIAD_API_KEY".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "python:3-slim".to_string(),
            fragment_timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for TriadConfig {
    fn default() -> Self {
        Self {
            max_turns: 12,
            run_timeout_secs: 0,
            model: ModelConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl TriadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(anyhow!("model.base_url must be non-empty"));
        }
        if self.model.model.trim().is_empty() {
            return Err(anyhow!("model.model must be non-empty"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.sandbox.image.trim().is_empty() {
            return Err(anyhow!("sandbox.image must be non-empty"));
        }
        if self.sandbox.fragment_timeout_secs == 0 {
            return Err(anyhow!("sandbox.fragment_timeout_secs must be > 0"));
        }
        if self.sandbox.output_limit_bytes == 0 {
            return Err(anyhow!("sandbox.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TriadConfig::default()`.
pub fn load_config(path: &Path) -> Result<TriadConfig> {
    if !path.exists() {
        let cfg = TriadConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TriadConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TriadConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TriadConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("triad.toml");
        let cfg = TriadConfig {
            max_turns: 6,
            ..TriadConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn zero_max_turns_is_rejected() {
        let cfg = TriadConfig {
            max_turns: 0,
            ..TriadConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("triad.toml");
        fs::write(&path, "max_turns = 4\n[sandbox]\nimage = \"python:3\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_turns, 4);
        assert_eq!(cfg.sandbox.image, "python:3");
        assert_eq!(cfg.model, ModelConfig::default());
    }
}
