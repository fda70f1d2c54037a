use tracing::debug;

use crate::bitwise::Bits;
use crate::cpu::CoreParts;
use crate::cpu::arm::Arm;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::registers::Registers;
use crate::cpu::thumb::Thumb;
use crate::fault::{Fault, StepOutcome};
use crate::memory::Mmu;
use crate::semihost::Semihost;

/// The active engine. A mode switch moves the whole core into a fresh
/// engine of the other encoding; memory ownership transfers, nothing is
/// copied.
enum Core {
    Arm(Arm),
    Thumb(Thumb),
}

impl Core {
    fn step(&mut self) -> Result<StepOutcome, Fault> {
        match self {
            Self::Arm(engine) => engine.step(),
            Self::Thumb(engine) => engine.step(),
        }
    }

    fn into_parts(self) -> CoreParts {
        match self {
            Self::Arm(engine) => engine.into_parts(),
            Self::Thumb(engine) => engine.into_parts(),
        }
    }

    fn switched(self, target: CpuState) -> Self {
        let parts = self.into_parts();
        match target {
            CpuState::Arm => Self::Arm(Arm::from_parts(parts)),
            CpuState::Thumb => Self::Thumb(Thumb::from_parts(parts)),
        }
    }
}

/// Owns the core and drives the fetch/decode/execute loop until the guest
/// terminates or faults.
pub struct Emulator {
    core: Core,
}

impl Emulator {
    /// Builds a core over a loaded image. The entry point's low bit picks
    /// the initial engine: set means compact code.
    pub fn new(mmu: Mmu, cmdline: String) -> Self {
        let entry = mmu.entry_point();
        let compact = entry.is_bit_on(0);

        let mut registers = Registers::default();
        registers.set_program_counter(entry & !0b1);
        registers.set_stack_pointer(mmu.stack_top());

        let parts = CoreParts {
            registers,
            cpsr: Psr::default(),
            mmu,
            semihost: Semihost::new(cmdline),
        };
        let core = if compact {
            Core::Thumb(Thumb::from_parts(parts))
        } else {
            Core::Arm(Arm::from_parts(parts))
        };

        debug!(
            "starting at {:#010X} in the {} engine",
            entry & !0b1,
            if compact { "compact" } else { "wide" }
        );
        Self { core }
    }

    /// Runs to completion, returning the final core state on a clean guest
    /// exit. Faults propagate to the caller.
    pub fn run(self) -> Result<CoreParts, Fault> {
        let mut core = self.core;
        loop {
            match core.step()? {
                StepOutcome::Continue => {}
                StepOutcome::ModeSwitch(target) => {
                    debug!("switching to the {target:?} engine");
                    core = core.switched(target);
                }
                StepOutcome::Terminate => return Ok(core.into_parts()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Segment;
    use pretty_assertions::assert_eq;

    fn image(entry: u32, text: Vec<u8>) -> Mmu {
        let mut text = text;
        text.resize(0x1000, 0);
        Mmu::new(
            entry,
            Segment::new(0, text),
            Segment::default(),
            Segment::default(),
            Segment::default(),
            0x1_0000,
        )
    }

    fn wide_words(words: &[u32]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for word in words {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    fn compact_halves(halves: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for half in halves {
            bytes.extend_from_slice(&half.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn arithmetic_then_exit() {
        // MOV R4, #21; ADD R4, R4, R4; MOV R0, #0x18; SWI 0x123456
        let mmu = image(
            0,
            wide_words(&[
                0b1110_0011_1010_0000_0100_0000_0001_0101,
                0b1110_0000_1000_0100_0100_0000_0000_0100,
                0b1110_0011_1010_0000_0000_0000_0001_1000,
                0b1110_1111_0001_0010_0011_0100_0101_0110,
            ]),
        );
        let parts = Emulator::new(mmu, String::new()).run().unwrap();
        assert_eq!(parts.registers.register_at(4), 42);
    }

    #[test]
    fn compact_entry_switches_to_wide_and_exits() {
        let mut text = compact_halves(&[
            // MOV R2, #16
            0b0010_0010_0001_0000,
            // BX R2
            0b0100_0111_0001_0000,
            0,
            0,
            0,
            0,
            0,
            0,
        ]);
        // Wide code at 0x10: MOV R7, #1; MOV R0, #0x18; SWI 0x123456
        text.extend_from_slice(&wide_words(&[
            0b1110_0011_1010_0000_0111_0000_0000_0001,
            0b1110_0011_1010_0000_0000_0000_0001_1000,
            0b1110_1111_0001_0010_0011_0100_0101_0110,
        ]));

        // Entry low bit set selects the compact engine.
        let parts = Emulator::new(image(1, text), String::new()).run().unwrap();
        assert_eq!(parts.registers.register_at(7), 1);
    }

    #[test]
    fn compact_program_stops_at_the_breakpoint() {
        // MOV R0, #5; ADD R0, #3; BKPT #0
        let mmu = image(
            1,
            compact_halves(&[
                0b0010_0000_0000_0101,
                0b0011_0000_0000_0011,
                0b1011_1110_0000_0000,
            ]),
        );
        let fault = Emulator::new(mmu, String::new()).run().unwrap_err();
        assert_eq!(
            fault,
            Fault::Unimplemented {
                address: 4,
                instruction: 0xBE00,
            }
        );
    }

    #[test]
    fn undefined_word_reports_its_address() {
        let mmu = image(
            0,
            wide_words(&[
                // MOV R0, #0 then a signed-byte store, which has no meaning.
                0b1110_0011_1010_0000_0000_0000_0000_0000,
                0b1110_0001_1100_0000_0000_0000_1101_0000,
            ]),
        );
        let fault = Emulator::new(mmu, String::new()).run().unwrap_err();
        assert_eq!(
            fault,
            Fault::Undefined {
                address: 4,
                instruction: 0xE1C0_00D0,
            }
        );
    }
}
