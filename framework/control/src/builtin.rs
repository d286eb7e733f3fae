//! Control lists shipped with the workspace.

use crate::error::ControlResult;
use crate::file::ControlFile;

const NOISS_FCTRL: &str = include_str!("../../../control/riscv/APIs/_noiss_fctrl.yaml");

/// Directory the built-in lists' test scripts are relative to.
pub const RISCV_APIS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../control/riscv/APIs");

/// The RISC-V API tests run without an instruction-set simulator.
pub fn noiss_fctrl() -> ControlResult<ControlFile> {
    Ok(ControlFile::from_yaml_str(NOISS_FCTRL)?.with_base_dir(RISCV_APIS_DIR))
}
