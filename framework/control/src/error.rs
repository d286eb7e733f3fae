use std::path::PathBuf;

/// Errors raised while loading or resolving a control list.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Failed to read control file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML control list: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON control list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a list of control items or a mapping with `control_items`, found {0}")]
    UnexpectedShape(&'static str),
    #[error("Unsupported control file {}, expected a .yaml, .yml or .json extension", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Control file {} includes itself", .0.display())]
    IncludeCycle(PathBuf),
    #[error("Control files nested more than {max} levels deep at {}", path.display())]
    TooDeep { path: PathBuf, max: usize },
    #[error("Invalid wildcard `{pattern}`: {source}")]
    Wildcard {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Failed to list test scripts: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type ControlResult<T> = Result<T, ControlError>;
