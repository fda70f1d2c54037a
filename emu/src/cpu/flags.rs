use crate::bitwise::Bits;

/// Transfer quantity of a single data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadWriteKind {
    #[default]
    Word,
    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(byte: bool) -> Self {
        if byte { Self::Byte } else { Self::Word }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(bit: bool) -> Self {
        if bit { Self::Load } else { Self::Store }
    }
}

/// When the offset is applied to the base register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    /// Apply the offset after the transfer.
    Post,
    /// Apply the offset before the transfer.
    Pre,
}

impl From<bool> for Indexing {
    fn from(bit: bool) -> Self {
        if bit { Self::Pre } else { Self::Post }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offsetting {
    /// Subtract the offset from the base.
    Down,
    /// Add the offset to the base.
    Up,
}

impl From<bool> for Offsetting {
    fn from(bit: bool) -> Self {
        if bit { Self::Up } else { Self::Down }
    }
}

/// Second operand of a data processing instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Immediate,
    Register,
}

impl From<bool> for OperandKind {
    fn from(bit: bool) -> Self {
        if bit { Self::Immediate } else { Self::Register }
    }
}

/// One of the four barrel shifter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftKind {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
    Ror = 3,
}

impl From<u32> for ShiftKind {
    fn from(op: u32) -> Self {
        match op.get_bits(0..=1) {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            3 => Self::Ror,
            _ => unreachable!(),
        }
    }
}
