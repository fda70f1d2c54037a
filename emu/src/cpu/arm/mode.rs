use std::fmt::{Display, Formatter};
use std::ops::Deref;

use crate::bitwise::Bits;
use crate::cpu::arm::instruction::ArmInstruction;
use crate::cpu::condition::Condition;

/// A fetched 32-bit opcode together with its decoded form.
pub struct ArmOpcode {
    pub instruction: ArmInstruction,
    pub condition: Condition,
    pub raw: u32,
}

impl From<u32> for ArmOpcode {
    fn from(op_code: u32) -> Self {
        Self {
            instruction: ArmInstruction::from(op_code),
            condition: Condition::from(op_code.get_bits(28..=31) as u8),
            raw: op_code,
        }
    }
}

impl Deref for ArmOpcode {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl Display for ArmOpcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#010X} [{:04b}_{:024b}_{:04b}] {:?}{}",
            self.raw,
            self.raw.get_bits(28..=31),
            self.raw.get_bits(4..=27),
            self.raw.get_bits(0..=3),
            self.instruction,
            self.condition,
        )
    }
}
