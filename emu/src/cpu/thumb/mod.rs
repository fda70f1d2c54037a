pub mod alu_instructions;
pub mod instruction;
mod operations;

use tracing::trace;

use crate::cpu::CoreParts;
use crate::cpu::psr::Psr;
use crate::cpu::registers::Registers;
use crate::fault::{Fault, StepOutcome};
use crate::memory::Mmu;
use crate::semihost::Semihost;

use instruction::ThumbInstruction;

/// The 16-bit engine.
pub struct Thumb {
    pub registers: Registers,
    pub cpsr: Psr,
    pub mmu: Mmu,
    pub semihost: Semihost,
}

impl Thumb {
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
        let address = self.registers.program_counter() & !0b1;
        let raw = self.mmu.fetch_half(address)?;
        self.registers.set_program_counter(address.wrapping_add(2));

        let instruction = ThumbInstruction::from(raw);
        trace!("{address:#010X}: {raw:#06X} {instruction:?}");

        self.execute(instruction, raw, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::psr::CpuState;
    use crate::memory::Segment;
    use pretty_assertions::assert_eq;

    fn thumb_with_text(halves: &[u16]) -> Thumb {
        let mut text = Vec::new();
        for half in halves {
            text.extend_from_slice(&half.to_le_bytes());
        }
        text.resize(0x1000, 0);

        let mmu = Mmu::new(
            1,
            Segment::new(0, text),
            Segment::default(),
            Segment::new(0x2000, vec![0; 0x1000]),
            Segment::zeroed(0x3000, 0x1000),
            0x1_0000,
        );
        Thumb {
            registers: Registers::default(),
            cpsr: Psr::default(),
            mmu,
            semihost: Semihost::new(String::new()),
        }
    }

    #[test]
    fn shift_by_immediate_updates_flags() {
        // LSL R0, R1, #1
        let mut cpu = thumb_with_text(&[0b0000_0000_0100_1000]);
        cpu.registers.set_register_at(1, 0x8000_0001);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 2);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn add_subtract_register_and_immediate() {
        let mut cpu = thumb_with_text(&[
            // ADD R0, R1, R7
            0b0001_1001_1100_1000,
            // SUB R2, R0, #5
            0b0001_1111_0100_0010,
        ]);
        cpu.registers.set_register_at(1, 30);
        cpu.registers.set_register_at(7, 12);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 42);
        assert!(!cpu.cpsr.zero_flag());

        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(2), 37);
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn move_compare_with_immediate() {
        let mut cpu = thumb_with_text(&[
            // MOV R3, #200
            0b0010_0011_1100_1000,
            // CMP R3, #200
            0b0010_1011_1100_1000,
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 200);
        cpu.step().unwrap();
        assert!(cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn alu_negate_and_multiply() {
        let mut cpu = thumb_with_text(&[
            // NEG R0, R1
            0b0100_0010_0100_1000,
            // MUL R0, R2
            0b0100_0011_0101_0000,
        ]);
        cpu.registers.set_register_at(1, 7);
        cpu.registers.set_register_at(2, 3);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), (-7_i32) as u32);
        assert!(cpu.cpsr.sign_flag());

        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), (-21_i32) as u32);
        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn hi_register_add_does_not_touch_flags() {
        // ADD R8, R1
        let mut cpu = thumb_with_text(&[0b0100_0100_1000_1000]);
        cpu.registers.set_register_at(8, u32::MAX);
        cpu.registers.set_register_at(1, 2);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(8), 1);
        assert!(!cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn branch_exchange_keeps_compact_on_odd_target() {
        // BX R2
        let mut cpu = thumb_with_text(&[0b0100_0111_0001_0000]);
        cpu.registers.set_register_at(2, 0x41);
        assert_eq!(cpu.step(), Ok(StepOutcome::Continue));
        assert_eq!(cpu.registers.program_counter(), 0x40);
    }

    #[test]
    fn branch_exchange_switches_to_wide_on_even_target() {
        // BLX R2
        let mut cpu = thumb_with_text(&[0b0100_0111_1001_0000]);
        cpu.registers.set_register_at(2, 0x40);
        assert_eq!(cpu.step(), Ok(StepOutcome::ModeSwitch(CpuState::Arm)));
        assert_eq!(cpu.registers.program_counter(), 0x40);
        assert_eq!(cpu.registers.link_register(), 0x3);
    }

    #[test]
    fn pc_relative_load_uses_the_aligned_pool() {
        // LDR R1, [PC, #4] at address 0
        let mut cpu = thumb_with_text(&[0b0100_1001_0000_0001, 0, 0, 0, 0xBEEF]);
        cpu.step().unwrap();
        // Pool address is (0 + 4 aligned) + 4 = 8.
        assert_eq!(cpu.registers.register_at(1), 0xBEEF);
    }

    #[test]
    fn load_store_register_offset_round_trip() {
        let mut cpu = thumb_with_text(&[
            // STR R0, [R1, R2]
            0b0101_0000_1000_1000,
            // LDRB R3, [R1, R2]
            0b0101_1100_1000_1011,
        ]);
        cpu.registers.set_register_at(0, 0x1122_3380);
        cpu.registers.set_register_at(1, 0x2000);
        cpu.registers.set_register_at(2, 0x10);
        cpu.step().unwrap();
        assert_eq!(cpu.mmu.read_word(0x2010).unwrap(), 0x1122_3380);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 0x80);
    }

    #[test]
    fn misaligned_word_load_faults() {
        // LDR R0, [R1, R2]
        let mut cpu = thumb_with_text(&[0b0101_1000_1000_1000]);
        cpu.registers.set_register_at(1, 0x2001);
        assert_eq!(
            cpu.step(),
            Err(Fault::Alignment { address: 0x2001 })
        );
    }

    #[test]
    fn sign_extended_halfword_load() {
        // LDRSH R2, [R1, R4]
        let mut cpu = thumb_with_text(&[0b0101_1111_0000_1010]);
        cpu.registers.set_register_at(1, 0x2000);
        cpu.registers.set_register_at(4, 4);
        cpu.mmu.write_half(0x2004, 0x8001).unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(2), 0xFFFF_8001);
    }

    #[test]
    fn push_pop_round_trip() {
        let mut cpu = thumb_with_text(&[
            // PUSH {R0, R5, LR}
            0b1011_0101_0010_0001,
            // POP {R0, R5}
            0b1011_1100_0010_0001,
        ]);
        cpu.registers.set_stack_pointer(0x1_0000);
        cpu.registers.set_register_at(0, 10);
        cpu.registers.set_register_at(5, 50);
        cpu.registers.set_link_register(90);

        cpu.step().unwrap();
        assert_eq!(cpu.registers.stack_pointer(), 0x1_0000 - 12);
        assert_eq!(cpu.mmu.read_word(0x1_0000 - 4).unwrap(), 90);

        cpu.registers.set_register_at(0, 0);
        cpu.registers.set_register_at(5, 0);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 10);
        assert_eq!(cpu.registers.register_at(5), 50);
        assert_eq!(cpu.registers.stack_pointer(), 0x1_0000 - 4);
    }

    #[test]
    fn pop_pc_with_clear_low_bit_is_unsupported() {
        // POP {PC}
        let mut cpu = thumb_with_text(&[0b1011_1101_0000_0000]);
        cpu.registers.set_stack_pointer(0x1_0000 - 4);
        cpu.mmu.write_word(0x1_0000 - 4, 0x100).unwrap();
        assert_eq!(
            cpu.step(),
            Err(Fault::ModeSwitchUnsupported { address: 0 })
        );
    }

    #[test]
    fn pop_pc_with_set_low_bit_stays_compact() {
        // POP {PC}
        let mut cpu = thumb_with_text(&[0b1011_1101_0000_0000]);
        cpu.registers.set_stack_pointer(0x1_0000 - 4);
        cpu.mmu.write_word(0x1_0000 - 4, 0x101).unwrap();
        assert_eq!(cpu.step(), Ok(StepOutcome::Continue));
        assert_eq!(cpu.registers.program_counter(), 0x100);
    }

    #[test]
    fn extend_and_reverse() {
        let mut cpu = thumb_with_text(&[
            // SXTB R1, R2
            0b1011_0010_0101_0001,
            // UXTH R3, R2
            0b1011_0010_1001_0011,
            // REV R0, R2
            0b1011_1010_0001_0000,
            // REVSH R4, R2
            0b1011_1010_1101_0100,
        ]);
        cpu.registers.set_register_at(2, 0x1234_56F0);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(1), 0xFFFF_FFF0);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(3), 0x56F0);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0xF056_3412);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(4), 0xFFFF_F056);
    }

    #[test]
    fn multiple_load_store_advances_the_base() {
        let mut cpu = thumb_with_text(&[
            // STMIA R0!, {R1, R2}
            0b1100_0000_0000_0110,
            // LDMIA R3!, {R4, R5}
            0b1100_1011_0011_0000,
        ]);
        cpu.registers.set_register_at(0, 0x2000);
        cpu.registers.set_register_at(1, 7);
        cpu.registers.set_register_at(2, 8);
        cpu.registers.set_register_at(3, 0x2000);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 0x2008);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(4), 7);
        assert_eq!(cpu.registers.register_at(5), 8);
        assert_eq!(cpu.registers.register_at(3), 0x2008);
    }

    #[test]
    fn conditional_branch_follows_the_flags() {
        let mut cpu = thumb_with_text(&[
            // CMP R0, #0
            0b0010_1000_0000_0000,
            // BEQ #4
            0b1101_0000_0000_0010,
        ]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        // Target is 2 + 4 + 4.
        assert_eq!(cpu.registers.program_counter(), 10);
    }

    #[test]
    fn long_branch_link_pair() {
        let mut cpu = thumb_with_text(&[
            // BL prefix, offset 0
            0b1111_0000_0000_0000,
            // BL suffix, target two halfwords ahead
            0b1111_1000_0000_0100,
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.link_register(), 4);
        cpu.step().unwrap();
        assert_eq!(cpu.registers.program_counter(), 12);
        // Return address with the compact bit.
        assert_eq!(cpu.registers.link_register(), 0x5);
    }

    #[test]
    fn immediate_arithmetic_then_breakpoint() {
        let mut cpu = thumb_with_text(&[
            // MOV R0, #5
            0b0010_0000_0000_0101,
            // ADD R0, #3
            0b0011_0000_0000_0011,
            // BKPT #0
            0b1011_1110_0000_0000,
        ]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.registers.register_at(0), 8);
        assert_eq!(
            cpu.step(),
            Err(Fault::Unimplemented {
                address: 4,
                instruction: 0b1011_1110_0000_0000,
            })
        );
    }

    #[test]
    fn unknown_swi_is_unimplemented() {
        // SWI #0x42
        let mut cpu = thumb_with_text(&[0b1101_1111_0100_0010]);
        assert_eq!(
            cpu.step(),
            Err(Fault::Unimplemented {
                address: 0,
                instruction: 0b1101_1111_0100_0010,
            })
        );
    }

    #[test]
    fn undefined_word_reports_its_address() {
        let mut cpu = thumb_with_text(&[0, 0b1101_1110_0000_0000]);
        cpu.registers.set_program_counter(2);
        assert_eq!(
            cpu.step(),
            Err(Fault::Undefined {
                address: 2,
                instruction: 0b1101_1110_0000_0000,
            })
        );
    }
}
