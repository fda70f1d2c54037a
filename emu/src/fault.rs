use thiserror::Error;

use crate::cpu::psr::CpuState;

/// What a single executed instruction asks the run loop to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep fetching from the same engine.
    Continue,

    /// Hand the core over to the engine for `CpuState`.
    ModeSwitch(CpuState),

    /// The guest asked to stop. The run loop exits cleanly.
    Terminate,
}

/// Terminal conditions. A fault aborts the run loop and is reported to
/// the user, there is no guest-visible exception delivery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Fault {
    /// The instruction decodes to something real that this core does not model.
    #[error("unimplemented instruction {instruction:#010X} at {address:#010X}")]
    Unimplemented { address: u32, instruction: u32 },

    /// The bit pattern decodes to nothing.
    #[error("undefined instruction {instruction:#010X} at {address:#010X}")]
    Undefined { address: u32, instruction: u32 },

    /// The address falls outside every mapped segment, or the access kind
    /// is not allowed there.
    #[error("segment violation at {address:#010X}")]
    Segment { address: u32 },

    /// A halfword or word access that is not naturally aligned.
    #[error("misaligned access at {address:#010X}")]
    Alignment { address: u32 },

    /// A branch asked for an instruction set transition the core does not support.
    #[error("unsupported instruction set switch at {address:#010X}")]
    ModeSwitchUnsupported { address: u32 },
}
