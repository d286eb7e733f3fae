use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Defaults for a run, read from a TOML file with `--config`.
///
/// ```toml
/// generator = "/opt/force-riscv/bin/friscv"
/// jobs = 8
/// timeout-s = 600
/// cfg-root = "/opt/force-riscv"
/// script-suffixes = ["_force.py"]
/// ```
///
/// Anything given on the command line takes priority.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
    pub generator: Option<PathBuf>,
    pub test_flag: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_s: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub run_summary: Option<PathBuf>,
    pub cfg_root: Option<PathBuf>,
    pub script_suffixes: Option<Vec<String>>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }
}
