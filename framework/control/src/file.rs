use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};
use crate::flags::FlagMap;
use crate::item::ControlItem;

/// Default limit on how deep control files may include each other.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// File name endings that mark an entry as a nested control file rather than a test script.
pub const CONTROL_FILE_SUFFIXES: [&str; 3] = ["_fctrl.yaml", "_fctrl.yml", "_fctrl.json"];

/// The serialized form of a control file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ControlList {
    control_items: Vec<ControlItem>,
}

/// A control list together with the directory its `fname` entries are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    pub base_dir: PathBuf,
    /// The file this list was loaded from, if any.
    pub source: Option<PathBuf>,
    pub items: Vec<ControlItem>,
}

/// A runnable test case produced by [ControlFile::resolve].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    /// Position in the flattened list.
    pub index: usize,
    /// The record with inherited defaults applied and wildcards replaced by a concrete name.
    pub item: ControlItem,
    /// `fname` joined onto the directory of the control file that listed it.
    pub script: PathBuf,
    /// The control file the record came from.
    pub control_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub max_depth: usize,
    pub control_suffixes: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            control_suffixes: CONTROL_FILE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ResolveOptions {
    pub fn is_control_file(&self, fname: &str) -> bool {
        self.control_suffixes
            .iter()
            .any(|suffix| fname.ends_with(suffix.as_str()))
    }
}

impl ControlFile {
    pub fn new(base_dir: impl Into<PathBuf>, items: Vec<ControlItem>) -> Self {
        Self {
            base_dir: base_dir.into(),
            source: None,
            items,
        }
    }

    /// Parse a YAML control list. Accepts either a bare sequence of records or a mapping with a
    /// `control_items` sequence. A document holding only comments is an empty list.
    pub fn from_yaml_str(s: &str) -> ControlResult<Self> {
        if s.lines().map(str::trim).all(|line| {
            line.is_empty() || line.starts_with('#') || line == "---"
        }) {
            return Ok(Self::new(".", Vec::new()));
        }

        let value: serde_yaml::Value = serde_yaml::from_str(s)?;
        let items = match value {
            serde_yaml::Value::Null => Vec::new(),
            serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value)?,
            serde_yaml::Value::Mapping(_) => {
                serde_yaml::from_value::<ControlList>(value)?.control_items
            }
            serde_yaml::Value::Bool(_) => return Err(ControlError::UnexpectedShape("a boolean")),
            serde_yaml::Value::Number(_) => return Err(ControlError::UnexpectedShape("a number")),
            serde_yaml::Value::String(_) => return Err(ControlError::UnexpectedShape("a string")),
            serde_yaml::Value::Tagged(_) => {
                return Err(ControlError::UnexpectedShape("a tagged value"))
            }
        };

        Ok(Self::new(".", items))
    }

    /// Parse a JSON control list, in the same shapes as [ControlFile::from_yaml_str].
    ///
    /// Records are deserialized straight from the text, since `serde_json::Value` objects don't
    /// keep key order and flag order is argument order.
    pub fn from_json_str(s: &str) -> ControlResult<Self> {
        let items = match s.trim_start().chars().next() {
            Some('[') => serde_json::from_str(s)?,
            Some('{') => serde_json::from_str::<ControlList>(s)?.control_items,
            _ => match serde_json::from_str::<serde_json::Value>(s)? {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::Bool(_) => {
                    return Err(ControlError::UnexpectedShape("a boolean"))
                }
                serde_json::Value::Number(_) => {
                    return Err(ControlError::UnexpectedShape("a number"))
                }
                serde_json::Value::String(_) => {
                    return Err(ControlError::UnexpectedShape("a string"))
                }
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(ControlError::UnexpectedShape("an unrecognised document"))
                }
            },
        };

        Ok(Self::new(".", items))
    }

    /// Load a control file, picking the format from its extension. Entries are resolved
    /// relative to the file's directory.
    pub fn load(path: impl AsRef<Path>) -> ControlResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let contents = std::fs::read_to_string(path).map_err(|source| ControlError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            Some("json") => Self::from_json_str(&contents)?,
            _ => return Err(ControlError::UnsupportedFormat(path.to_path_buf())),
        };

        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            base_dir,
            source: Some(path.to_path_buf()),
            ..file
        })
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn to_yaml_string(&self) -> ControlResult<String> {
        Ok(serde_yaml::to_string(&ControlList {
            control_items: self.items.clone(),
        })?)
    }

    pub fn to_json_string(&self) -> ControlResult<String> {
        Ok(serde_json::to_string_pretty(&ControlList {
            control_items: self.items.clone(),
        })?)
    }

    /// Flatten this list into runnable test cases.
    ///
    /// An entry naming a nested control file is replaced by that file's entries, which inherit
    /// the entry's options and generator flags as defaults. An entry with wildcards is replaced by
    /// one entry per matching file in the control file's directory, sorted by name.
    pub fn resolve(&self, options: &ResolveOptions) -> ControlResult<Vec<ResolvedItem>> {
        let mut stack = Vec::new();
        if let Some(source) = &self.source {
            stack.push(canonicalize(source)?);
        }

        let mut resolved = Vec::new();
        self.resolve_into(
            &FlagMap::new(),
            &FlagMap::new(),
            options,
            &mut stack,
            &mut resolved,
        )?;

        Ok(resolved)
    }

    fn resolve_into(
        &self,
        default_options: &FlagMap,
        default_generator: &FlagMap,
        options: &ResolveOptions,
        stack: &mut Vec<PathBuf>,
        resolved: &mut Vec<ResolvedItem>,
    ) -> ControlResult<()> {
        for item in &self.items {
            let item = item.with_defaults(default_options, default_generator);

            if options.is_control_file(&item.fname) {
                let path = canonicalize(&self.base_dir.join(&item.fname))?;
                if stack.contains(&path) {
                    return Err(ControlError::IncludeCycle(path));
                }
                if stack.len() >= options.max_depth {
                    return Err(ControlError::TooDeep {
                        path,
                        max: options.max_depth,
                    });
                }

                log::debug!("Including control file {}", path.display());
                let nested = ControlFile::load(&path)?;
                stack.push(path);
                nested.resolve_into(&item.options, &item.generator, options, stack, resolved)?;
                stack.pop();
            } else if item.is_wildcard() {
                let matches = expand_wildcard(&self.base_dir, &item.fname, options)?;
                if matches.is_empty() {
                    log::warn!(
                        "No test scripts in {} match `{}`",
                        self.base_dir.display(),
                        item.fname
                    );
                }
                for fname in matches {
                    self.push_resolved(
                        ControlItem {
                            fname,
                            ..item.clone()
                        },
                        resolved,
                    );
                }
            } else {
                self.push_resolved(item, resolved);
            }
        }

        Ok(())
    }

    fn push_resolved(&self, item: ControlItem, resolved: &mut Vec<ResolvedItem>) {
        resolved.push(ResolvedItem {
            index: resolved.len(),
            script: self.base_dir.join(&item.fname),
            control_file: self.source.clone(),
            item,
        });
    }
}

fn canonicalize(path: &Path) -> ControlResult<PathBuf> {
    path.canonicalize().map_err(|source| ControlError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Translate a `*`/`?` file name pattern into an anchored regex.
fn wildcard_regex(pattern: &str) -> ControlResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut literal))),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|source| ControlError::Wildcard {
        pattern: pattern.to_string(),
        source,
    })
}

/// Files in `base_dir` (or the pattern's own sub-directory) whose names match the wildcard in the
/// final path component. Nested control files are never picked up by a wildcard.
fn expand_wildcard(
    base_dir: &Path,
    pattern: &str,
    options: &ResolveOptions,
) -> ControlResult<Vec<String>> {
    let pattern_path = Path::new(pattern);
    let parent = pattern_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty());
    let file_pattern = pattern_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(pattern);
    let matcher = wildcard_regex(file_pattern)?;

    let search_dir = match parent {
        Some(parent) => base_dir.join(parent),
        None => base_dir.to_path_buf(),
    };

    let mut matches = Vec::new();
    for entry in walkdir::WalkDir::new(&search_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !matcher.is_match(name) || options.is_control_file(name) {
            continue;
        }

        matches.push(match parent {
            Some(parent) => parent.join(name).display().to_string(),
            None => name.to_string(),
        });
    }

    Ok(matches)
}
