use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::condition::Condition;

/// Which decoder the core is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    /// 32-bit instructions.
    Arm,
    /// 16-bit instructions.
    Thumb,
}

impl From<bool> for CpuState {
    fn from(flag: bool) -> Self {
        if flag { Self::Thumb } else { Self::Arm }
    }
}

/// Program status register. Only the four condition flags in the top
/// nibble are modeled, the mode and interrupt bits of the real register
/// have no meaning in a user-space core.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Psr(u32);

impl Psr {
    /// N flag, bit 31.
    pub fn sign_flag(self) -> bool {
        self.0.is_bit_on(31)
    }

    /// Z flag, bit 30.
    pub fn zero_flag(self) -> bool {
        self.0.is_bit_on(30)
    }

    /// C flag, bit 29.
    pub fn carry_flag(self) -> bool {
        self.0.is_bit_on(29)
    }

    /// V flag, bit 28.
    pub fn overflow_flag(self) -> bool {
        self.0.is_bit_on(28)
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0 = self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0 = self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0 = self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0 = self.0.set_bit(28, value);
    }

    /// Sets all four flags from an arithmetic result.
    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_sign_flag(op_result.sign);
        self.set_zero_flag(op_result.zero);
        self.set_carry_flag(op_result.carry);
        self.set_overflow_flag(op_result.overflow);
    }

    pub fn can_execute(self, cond: Condition) -> bool {
        use Condition::*;

        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            NV => false,
        }
    }
}

impl From<Psr> for u32 {
    fn from(psr: Psr) -> Self {
        psr.0
    }
}
