//! Register class descriptors.
//!
//! The saturation analysis does not care what the registers are called;
//! it only needs to know, per class, which data mode the class holds and
//! how many registers a scheduler may actually use. Targets describe
//! themselves with a small static table of [`RegClassInfo`] values.

use crate::ir::Mode;

/// Description of one register class.
#[derive(Clone, Debug)]
pub struct RegClassInfo {
    /// The name of the register class, for logging.
    pub name: &'static str,
    /// The data mode allocated into this class.
    pub mode: Mode,
    /// Total number of registers in the class.
    pub n_regs: u32,
    /// Registers the target itself reserves (stack pointer, ...).
    pub n_ignore: u32,
    /// Registers additionally reserved by the ABI in the current
    /// function.
    pub n_abi_ignore: u32,
}

impl RegClassInfo {
    /// How many registers of this class a scheduler may use.
    pub fn available(&self) -> u32 {
        self.n_regs - self.n_ignore - self.n_abi_ignore
    }
}

/// The register classes of a target.
#[derive(Clone, Debug)]
pub struct RegInfo {
    classes: Vec<RegClassInfo>,
}

impl RegInfo {
    /// Build the descriptor from its classes.
    pub fn new(classes: Vec<RegClassInfo>) -> Self {
        Self { classes }
    }

    /// Iterate over all register classes.
    pub fn classes(&self) -> impl Iterator<Item = &RegClassInfo> {
        self.classes.iter()
    }

    /// The class holding values of `mode`, if any.
    pub fn class_of_mode(&self, mode: Mode) -> Option<&RegClassInfo> {
        self.classes.iter().find(|c| c.mode == mode)
    }
}
