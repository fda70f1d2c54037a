use std::fmt::{Display, Formatter};

/// Condition field of an instruction, evaluated against the status flags
/// before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Condition {
    /// Equal (Z set).
    EQ = 0x0,
    /// Not equal (Z clear).
    NE = 0x1,
    /// Unsigned higher or same (C set).
    CS = 0x2,
    /// Unsigned lower (C clear).
    CC = 0x3,
    /// Negative (N set).
    MI = 0x4,
    /// Positive or zero (N clear).
    PL = 0x5,
    /// Overflow (V set).
    VS = 0x6,
    /// No overflow (V clear).
    VC = 0x7,
    /// Unsigned higher (C set and Z clear).
    HI = 0x8,
    /// Unsigned lower or same (C clear or Z set).
    LS = 0x9,
    /// Signed greater or equal (N equals V).
    GE = 0xA,
    /// Signed less than (N differs from V).
    LT = 0xB,
    /// Signed greater than (Z clear and N equals V).
    GT = 0xC,
    /// Signed less or equal (Z set or N differs from V).
    LE = 0xD,
    /// Always.
    AL = 0xE,
    /// Reserved, never executes.
    NV = 0xF,
}

impl From<u8> for Condition {
    fn from(cond: u8) -> Self {
        match cond {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            0xF => Self::NV,
            _ => unreachable!("condition fields are 4 bits"),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EQ => write!(f, "EQ"),
            Self::NE => write!(f, "NE"),
            Self::CS => write!(f, "CS"),
            Self::CC => write!(f, "CC"),
            Self::MI => write!(f, "MI"),
            Self::PL => write!(f, "PL"),
            Self::VS => write!(f, "VS"),
            Self::VC => write!(f, "VC"),
            Self::HI => write!(f, "HI"),
            Self::LS => write!(f, "LS"),
            Self::GE => write!(f, "GE"),
            Self::LT => write!(f, "LT"),
            Self::GT => write!(f, "GT"),
            Self::LE => write!(f, "LE"),
            Self::AL => write!(f, ""),
            Self::NV => write!(f, "_NEVER"),
        }
    }
}
