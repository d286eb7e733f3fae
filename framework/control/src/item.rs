use serde::{Deserialize, Serialize};

use crate::command::CommandLine;
use crate::flags::{FlagMap, FlagValue};

/// The informational option holding an instruction budget for the test.
pub const MAX_INSTR_OPTION: &str = "max-instr";

/// One test case record of a control list.
///
/// Pairs a test script with the flags passed to the generator when it runs that script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlItem {
    /// The test script to run, relative to the control file. May also name a nested control
    /// file or contain `*`/`?` wildcards, see [crate::ControlFile::resolve].
    pub fname: String,
    /// Informational metadata, not passed to the generator.
    #[serde(default, skip_serializing_if = "FlagMap::is_empty")]
    pub options: FlagMap,
    /// Generator command line flags, in argument order.
    pub generator: FlagMap,
}

impl ControlItem {
    pub fn new(fname: impl Into<String>, generator: FlagMap) -> Self {
        Self {
            fname: fname.into(),
            options: FlagMap::new(),
            generator,
        }
    }

    pub fn with_options(mut self, options: FlagMap) -> Self {
        self.options = options;
        self
    }

    /// The `max-instr` option, if it is set to a non-negative number.
    pub fn max_instr(&self) -> Option<u64> {
        match self.options.get(MAX_INSTR_OPTION)?? {
            FlagValue::Int(n) => u64::try_from(*n).ok(),
            FlagValue::Str(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.fname.contains(['*', '?'])
    }

    /// This item layered over the options and generator flags inherited from a parent control
    /// file entry.
    pub fn with_defaults(&self, options: &FlagMap, generator: &FlagMap) -> ControlItem {
        ControlItem {
            fname: self.fname.clone(),
            options: self.options.over(options),
            generator: self.generator.over(generator),
        }
    }

    /// The generator flags as separate arguments. A flag with no value contributes only its name.
    pub fn generator_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.generator.len() * 2);
        for (flag, value) in self.generator.iter() {
            args.push(flag.to_string());
            if let Some(value) = value {
                args.push(value.to_string());
            }
        }
        args
    }

    /// The test script followed by its generator flags, e.g.
    /// `Constraint_force.py --cfg config/riscv.config --noiss`.
    pub fn command_line(&self) -> CommandLine {
        CommandLine::new(self.fname.clone(), self.generator_args())
    }
}
