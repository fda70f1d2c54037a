#[allow(clippy::cast_possible_truncation)]
mod bitwise;

pub mod cpu;
pub mod elf;
pub mod emulator;
pub mod fault;
pub mod memory;
pub mod semihost;
