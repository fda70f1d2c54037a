pub mod alu_instruction;
pub mod instruction;
pub mod mode;
mod operations;

use tracing::trace;

use crate::cpu::CoreParts;
use crate::cpu::psr::Psr;
use crate::cpu::registers::Registers;
use crate::fault::{Fault, StepOutcome};
use crate::memory::Mmu;
use crate::semihost::Semihost;

use mode::ArmOpcode;

/// The 32-bit engine.
pub struct Arm {
    pub registers: Registers,
    pub cpsr: Psr,
    pub mmu: Mmu,
    pub semihost: Semihost,
}

impl Arm {
    pub fn from_parts(parts: CoreParts) -> Self {
        Self {
            registers: parts.registers,
            cpsr: parts.cpsr,
            mmu: parts.mmu,
            semihost: parts.semihost,
        }
    }

    pub fn into_parts(self) -> CoreParts {
        CoreParts {
            registers: self.registers,
            cpsr: self.cpsr,
            mmu: self.mmu,
            semihost: self.semihost,
        }
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self) -> Result<StepOutcome, Fault> {
        let address = self.registers.program_counter() & !0b11;
        let raw = self.mmu.fetch_word(address)?;
        self.registers.set_program_counter(address.wrapping_add(4));

        let op_code = ArmOpcode::from(raw);
        trace!("{address:#010X}: {op_code}");

        if !self.cpsr.can_execute(op_code.condition) {
            return Ok(StepOutcome::Continue);
        }

        self.execute(&op_code, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Segment;
    use pretty_assertions::assert_eq;

    fn arm_with_text(words: &[u32]) -> Arm {
        let mut text = Vec::new();
        for word in words {
            text.extend_from_slice(&word.to_le_bytes());
        }
        text.resize(0x1000, 0);

        let mmu = Mmu::new(
            0,
            Segment::new(0, text),
            Segment::default(),
            Segment::new(0x2000, vec![0; 0x1000]),
            Segment::zeroed(0x3000, 0x1000),
            0x1_0000,
        );
        Arm {
            registers: Registers::default(),
            cpsr: Psr::default(),
            mmu,
            semihost: Semihost::new(String::new()),
        }
    }

    fn arm() -> Arm {
        arm_with_text(&[])
    }

    #[test]
    fn branch_lands_two_words_past_the_offset_base() {
        // B #60
        let mut cpu = arm_with_text(&[0b1110_1010_0000_0000_0000_0000_0000_1111]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.program_counter(), 68);
        assert_eq!(cpu.registers.link_register(), 0);
    }

    #[test]
    fn branch_with_link_saves_the_return_address() {
        // BL #-8 from address 8
        let mut cpu = arm_with_text(&[
            0,
            0,
            0b1110_1011_1111_1111_1111_1111_1111_1100,
        ]);
        cpu.registers.set_program_counter(8);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.program_counter(), 0);
        assert_eq!(cpu.registers.link_register(), 12);
    }

    #[test]
    fn branch_exchange_rejects_a_low_bit_target() {
        // BX R2
        let mut cpu = arm_with_text(&[0b1110_0001_0010_1111_1111_1111_0001_0010]);
        cpu.registers.set_register_at(2, 0x101);
        assert_eq!(
            cpu.step(),
            Err(Fault::ModeSwitchUnsupported { address: 0 })
        );
    }

    #[test]
    fn branch_exchange_to_an_even_target() {
        // BLX R2
        let mut cpu = arm_with_text(&[0b1110_0001_0010_1111_1111_1111_0011_0010]);
        cpu.registers.set_register_at(2, 0x40);
        assert_eq!(cpu.step(), Ok(StepOutcome::Continue));
        assert_eq!(cpu.registers.program_counter(), 0x40);
        assert_eq!(cpu.registers.link_register(), 4);
    }

    #[test]
    fn failed_condition_skips_the_instruction() {
        // MOVEQ R0, #1 with Z clear
        let mut cpu = arm_with_text(&[0b0000_0011_1010_0000_0000_0000_0000_0001]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0);
        assert_eq!(cpu.registers.program_counter(), 4);
    }

    #[test]
    fn add_with_pc_operand_reads_two_words_ahead() {
        // ADD R0, R15, #4
        let mut cpu = arm_with_text(&[0b1110_0010_1000_1111_0000_0000_0000_0100]);
        cpu.step().unwrap();
        // pc operand reads 8 at address 0, plus the immediate.
        assert_eq!(cpu.registers.register_at(0), 12);
    }

    #[test]
    fn movs_rotated_immediate_sets_the_carry() {
        // MOVS R0, #0xF0000000 (0xF rotated right by 4)
        let mut cpu = arm_with_text(&[0b1110_0011_1011_0000_0000_0010_0000_1111]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0xF000_0000);
        assert!(cpu.cpsr.carry_flag());
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn cmp_of_equal_values() {
        // CMP R3, R4
        let mut cpu = arm_with_text(&[0b1110_0001_0101_0011_0000_0000_0000_0100]);
        cpu.registers.set_register_at(3, 42);
        cpu.registers.set_register_at(4, 42);
        cpu.step().unwrap();
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.overflow_flag());
    }

    #[test]
    fn compare_naming_pc_as_destination_is_unimplemented() {
        // CMP with the destination field set to R15
        let mut cpu = arm_with_text(&[0b1110_0011_0101_0000_1111_0000_0000_0000]);
        assert_eq!(
            cpu.step(),
            Err(Fault::Unimplemented {
                address: 0,
                instruction: 0xE350_F000,
            })
        );
    }

    #[test]
    fn store_then_load_a_word() {
        let mut cpu = arm_with_text(&[
            // STR R1, [R2, #8]
            0b1110_0101_1000_0010_0001_0000_0000_1000,
            // LDR R3, [R2, #8]
            0b1110_0101_1001_0010_0011_0000_0000_1000,
        ]);
        cpu.registers.set_register_at(1, 0xCAFE_BABE);
        cpu.registers.set_register_at(2, 0x2000);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 0xCAFE_BABE);
        assert_eq!(cpu.mmu.read_word(0x2008).unwrap(), 0xCAFE_BABE);
    }

    #[test]
    fn store_into_text_faults() {
        // STR R1, [R2]
        let mut cpu = arm_with_text(&[0b1110_0101_1000_0010_0001_0000_0000_0000]);
        cpu.registers.set_register_at(2, 0x100);
        assert_eq!(cpu.step(), Err(Fault::Segment { address: 0x100 }));
    }

    #[test]
    fn signed_byte_load_extends_the_sign() {
        // LDRSB R0, [R1]
        let mut cpu = arm_with_text(&[0b1110_0001_1101_0001_0000_0000_1101_0000]);
        cpu.registers.set_register_at(1, 0x2000);
        cpu.mmu.write_byte(0x2000, 0x80).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0xFFFF_FF80);
    }

    #[test]
    fn halfword_store_and_load_with_writeback() {
        let mut cpu = arm_with_text(&[
            // STRH R0, [R1], #2
            0b1110_0000_1100_0001_0000_0000_1011_0010,
            // LDRH R2, [R1, #-2]
            0b1110_0001_0101_0001_0010_0000_1011_0010,
        ]);
        cpu.registers.set_register_at(0, 0x1_ABCD);
        cpu.registers.set_register_at(1, 0x2010);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(1), 0x2012);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(2), 0xABCD);
    }

    #[test]
    fn block_transfer_round_trip() {
        let mut cpu = arm_with_text(&[
            // STMDB R13!, {R4, R5, R14}
            0b1110_1001_0010_1101_0100_0000_0011_0000,
            // LDMIA R13!, {R0, R1, R2}
            0b1110_1000_1011_1101_0000_0000_0000_0111,
        ]);
        cpu.registers.set_stack_pointer(0x1_0000);
        cpu.registers.set_register_at(4, 11);
        cpu.registers.set_register_at(5, 22);
        cpu.registers.set_link_register(33);

        cpu.step().unwrap();
        assert_eq!(cpu.registers.stack_pointer(), 0x1_0000 - 12);
        assert_eq!(cpu.mmu.read_word(0x1_0000 - 12).unwrap(), 11);
        assert_eq!(cpu.mmu.read_word(0x1_0000 - 8).unwrap(), 22);
        assert_eq!(cpu.mmu.read_word(0x1_0000 - 4).unwrap(), 33);

        cpu.step().unwrap();
        assert_eq!(cpu.registers.stack_pointer(), 0x1_0000);
        assert_eq!(cpu.registers.register_at(0), 11);
        assert_eq!(cpu.registers.register_at(1), 22);
        assert_eq!(cpu.registers.register_at(2), 33);
    }

    #[test]
    fn multiply_and_accumulate() {
        // MLAS R2, R3, R4, R5
        let mut cpu = arm_with_text(&[0b1110_0000_0011_0010_0101_0100_1001_0011]);
        cpu.registers.set_register_at(3, 6);
        cpu.registers.set_register_at(4, 7);
        cpu.registers.set_register_at(5, 100);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(2), 142);
        assert!(!cpu.cpsr.zero_flag());
        assert!(!cpu.cpsr.sign_flag());
    }

    #[test]
    fn count_leading_zeros() {
        // CLZ R3, R5
        let mut cpu = arm_with_text(&[0b1110_0001_0110_1111_0011_1111_0001_0101]);
        cpu.registers.set_register_at(5, 0x0000_0100);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 23);

        let mut cpu = arm_with_text(&[0b1110_0001_0110_1111_0011_1111_0001_0101]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 32);
    }

    #[test]
    fn mrs_reads_the_flags() {
        // MRS R0, CPSR
        let mut cpu = arm_with_text(&[0b1110_0001_0000_1111_0000_0000_0000_0000]);
        cpu.cpsr.set_zero_flag(true);
        cpu.cpsr.set_carry_flag(true);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0x6000_0000);
    }

    #[test]
    fn msr_is_unimplemented() {
        // MSR CPSR_fc, R3
        let mut cpu = arm_with_text(&[0b1110_0001_0010_1001_1111_0000_0000_0011]);
        assert_eq!(
            cpu.step(),
            Err(Fault::Unimplemented {
                address: 0,
                instruction: 0b1110_0001_0010_1001_1111_0000_0000_0011,
            })
        );
    }

    #[test]
    fn unknown_software_interrupt_is_a_no_op() {
        // SWI #0x42
        let mut cpu = arm_with_text(&[0b1110_1111_0000_0000_0000_0000_0100_0010]);
        assert_eq!(cpu.step(), Ok(StepOutcome::Continue));
        assert_eq!(cpu.registers.program_counter(), 4);
    }

    #[test]
    fn fetch_outside_text_faults() {
        let mut cpu = arm();
        cpu.registers.set_program_counter(0x2000);
        assert_eq!(cpu.step(), Err(Fault::Segment { address: 0x2000 }));
    }
}
