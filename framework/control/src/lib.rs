//! Control lists name the test scripts to run and the flags the generator runs each one with.
//!
//! ```yaml
//! control_items:
//!   - fname: Constraint_force.py
//!     generator: { --cfg: config/riscv.config, --noiss: ~ }
//! ```

pub mod builtin;
mod command;
mod error;
mod file;
mod flags;
mod item;
mod validate;

pub use command::{CommandLine, GeneratorInvocation, DEFAULT_TEST_FLAG};
pub use error::{ControlError, ControlResult};
pub use file::{
    ControlFile, ResolveOptions, ResolvedItem, CONTROL_FILE_SUFFIXES, DEFAULT_MAX_DEPTH,
};
pub use flags::{FlagMap, FlagValue};
pub use item::{ControlItem, MAX_INSTR_OPTION};
pub use validate::{
    validate, validate_item, IssueKind, Severity, ValidationIssue, ValidationOptions,
    ValidationReport, CFG_FLAG, DEFAULT_SCRIPT_SUFFIXES,
};
