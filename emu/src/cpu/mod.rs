pub mod alu;
pub mod arm;
pub mod condition;
pub mod flags;
pub mod psr;
pub mod registers;
pub mod thumb;

use crate::memory::Mmu;
use crate::semihost::Semihost;

use psr::Psr;
use registers::Registers;

/// Everything an engine owns. Moving this between the wide and narrow
/// engines is what an instruction set switch is.
#[derive(Debug)]
pub struct CoreParts {
    pub registers: Registers,
    pub cpsr: Psr,
    pub mmu: Mmu,
    pub semihost: Semihost,
}
