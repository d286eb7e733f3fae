use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::file::ResolvedItem;
use crate::flags::FlagValue;
use crate::item::ControlItem;

/// The generator flag naming the configuration file.
pub const CFG_FLAG: &str = "--cfg";

/// Script name endings accepted as test templates by default.
pub const DEFAULT_SCRIPT_SUFFIXES: [&str; 1] = ["_force.py"];

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub script_suffixes: Vec<String>,
    /// When set, `--cfg` values are checked to exist relative to this directory.
    pub cfg_root: Option<PathBuf>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            script_suffixes: DEFAULT_SCRIPT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cfg_root: None,
        }
    }
}

impl ValidationOptions {
    pub fn with_cfg_root(mut self, cfg_root: impl Into<PathBuf>) -> Self {
        self.cfg_root = Some(cfg_root.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    EmptyFname,
    UnrecognizedSuffix,
    EmptyGenerator,
    MissingCfg,
    CfgNotFound(PathBuf),
    /// Also listed at the given earlier index.
    DuplicateFname(usize),
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::DuplicateFname(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::EmptyFname => f.write_str("fname is empty"),
            IssueKind::UnrecognizedSuffix => f.write_str("fname is not a recognised test script"),
            IssueKind::EmptyGenerator => f.write_str("generator has no flags"),
            IssueKind::MissingCfg => write!(f, "generator has no {CFG_FLAG} value"),
            IssueKind::CfgNotFound(path) => {
                write!(f, "{CFG_FLAG} path {} does not exist", path.display())
            }
            IssueKind::DuplicateFname(first) => write!(f, "fname already listed at #{first}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub index: usize,
    pub fname: String,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.fname, self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// No error-level issues. Warnings are allowed.
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.kind.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.kind.severity() == Severity::Warning)
    }
}

/// Check a single record.
pub fn validate_item(
    index: usize,
    item: &ControlItem,
    options: &ValidationOptions,
) -> Vec<ValidationIssue> {
    let mut kinds = Vec::new();

    if item.fname.trim().is_empty() {
        kinds.push(IssueKind::EmptyFname);
    } else if !options
        .script_suffixes
        .iter()
        .any(|suffix| item.fname.ends_with(suffix.as_str()))
    {
        kinds.push(IssueKind::UnrecognizedSuffix);
    }

    if item.generator.is_empty() {
        kinds.push(IssueKind::EmptyGenerator);
    }

    match item.generator.get(CFG_FLAG) {
        Some(Some(FlagValue::Str(cfg))) if !cfg.trim().is_empty() => {
            if let Some(root) = &options.cfg_root {
                let path = resolve_cfg(root, cfg);
                if !path.exists() {
                    kinds.push(IssueKind::CfgNotFound(path));
                }
            }
        }
        _ => kinds.push(IssueKind::MissingCfg),
    }

    kinds
        .into_iter()
        .map(|kind| ValidationIssue {
            index,
            fname: item.fname.clone(),
            kind,
        })
        .collect()
}

fn resolve_cfg(root: &Path, cfg: &str) -> PathBuf {
    let cfg = Path::new(cfg);
    if cfg.is_absolute() {
        cfg.to_path_buf()
    } else {
        root.join(cfg)
    }
}

/// Check every resolved test case, including a warning for each repeated `fname`.
pub fn validate(items: &[ResolvedItem], options: &ValidationOptions) -> ValidationReport {
    let mut issues = Vec::new();
    let mut first_seen: HashMap<&Path, usize> = HashMap::new();

    for resolved in items {
        issues.extend(validate_item(resolved.index, &resolved.item, options));

        if let Some(first) = first_seen.get(resolved.script.as_path()) {
            issues.push(ValidationIssue {
                index: resolved.index,
                fname: resolved.item.fname.clone(),
                kind: IssueKind::DuplicateFname(*first),
            });
        } else {
            first_seen.insert(resolved.script.as_path(), resolved.index);
        }
    }

    ValidationReport { issues }
}
