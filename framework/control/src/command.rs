use std::fmt;
use std::path::{Path, PathBuf};

use crate::item::ControlItem;

/// The flag the generator takes its test template with, unless configured otherwise.
pub const DEFAULT_TEST_FLAG: &str = "-t";

/// A program and its arguments.
///
/// Arguments are held exactly as authored in the control list. [CommandLine::exec_args] gives the
/// form to hand to a process without going through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments for direct execution. Values wrapped in a single pair of matching quotes, such
    /// as `"PrivilegeLevel=1"`, were written for a shell and lose that one layer of quoting.
    pub fn exec_args(&self) -> Vec<&str> {
        self.args.iter().map(|arg| strip_shell_quotes(arg)).collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn strip_shell_quotes(arg: &str) -> &str {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &arg[1..arg.len() - 1];
        }
    }
    arg
}

/// How the generator program is invoked for a single test script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorInvocation {
    pub program: PathBuf,
    /// Passed before the script path. When `None` the script is a bare positional argument.
    pub test_flag: Option<String>,
}

impl GeneratorInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            test_flag: Some(DEFAULT_TEST_FLAG.to_string()),
        }
    }

    /// An empty flag means the script path is passed positionally.
    pub fn with_test_flag(mut self, test_flag: &str) -> Self {
        self.test_flag = (!test_flag.is_empty()).then(|| test_flag.to_string());
        self
    }

    /// `program [test_flag] <script> <generator flags...>`
    pub fn command_for(&self, script: &Path, item: &ControlItem) -> CommandLine {
        let mut args = Vec::with_capacity(2 + item.generator.len() * 2);
        if let Some(test_flag) = &self.test_flag {
            args.push(test_flag.clone());
        }
        args.push(script.display().to_string());
        args.extend(item.generator_args());

        CommandLine::new(self.program.display().to_string(), args)
    }
}
