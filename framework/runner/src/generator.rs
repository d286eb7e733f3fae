use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::bail;
use anyhow::Context;

use crate::types::RegressResult;

/// Environment variable to override the path to the generator program.
pub const REGRESS_GENERATOR_PATH_ENV: &str = "REGRESS_GENERATOR_PATH";

/// The generator looked for on the `PATH` when no path is configured.
pub const DEFAULT_GENERATOR: &str = "friscv";

/// Get the path to the generator program.
///
/// An explicit path from the command line wins. Otherwise the [`REGRESS_GENERATOR_PATH_ENV`]
/// environment variable is used if set, then the path from the settings file, and finally
/// [`DEFAULT_GENERATOR`] is looked up on the user's `PATH`. The returned path is absolute because
/// test cases run with their output directory as working directory.
pub fn generator_path(
    explicit: Option<&Path>,
    configured: Option<&Path>,
) -> RegressResult<PathBuf> {
    resolve_generator(
        explicit,
        env::var(REGRESS_GENERATOR_PATH_ENV).ok().as_deref(),
        configured,
        None,
    )
}

fn resolve_generator(
    explicit: Option<&Path>,
    env_value: Option<&str>,
    configured: Option<&Path>,
    search_path: Option<OsString>,
) -> RegressResult<PathBuf> {
    if let Some(path) = explicit {
        return existing(path, "Generator path");
    }

    match (env_value, configured) {
        (Some(""), _) => {
            bail!("'{REGRESS_GENERATOR_PATH_ENV}' set to empty string");
        }
        (None, Some(path)) => existing(path, "Generator path from the settings file"),
        (Some(DEFAULT_GENERATOR), _) | (None, None) => {
            log::warn!("'{REGRESS_GENERATOR_PATH_ENV}' is not a path so looking in user's 'PATH'");
            let found = match search_path {
                Some(paths) => {
                    let cwd = env::current_dir().context("Failed to get current directory")?;
                    which::which_in(DEFAULT_GENERATOR, Some(paths), cwd)
                }
                None => which::which(DEFAULT_GENERATOR),
            };
            found.with_context(|| {
                format!(
                    "Generator '{DEFAULT_GENERATOR}' not found in PATH. Please install it, pass --generator or set '{REGRESS_GENERATOR_PATH_ENV}' to the correct path."
                )
            })
        }
        (Some(path), _) => existing(
            Path::new(path),
            &format!("Generator path overwritten with '{REGRESS_GENERATOR_PATH_ENV}={path}' but"),
        ),
    }
}

fn existing(path: &Path, what: &str) -> RegressResult<PathBuf> {
    if !path.exists() {
        bail!("{what} '{}' doesn't exist", path.display());
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    // Symlinks are kept, multi-call binaries need to see the name they were invoked by.
    let cwd = env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}
