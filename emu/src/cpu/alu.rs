use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Result of an arithmetic operation plus the four flag values it produces.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Addition with carry-in, flags computed on the widened operands.
/// Carry means the unsigned sum does not fit 32 bits.
pub fn adc_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
    let signed =
        i64::from(first_op as i32) + i64::from(second_op as i32) + i64::from(carry_in);
    let result = wide as u32;

    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow: signed != i64::from(result as i32),
        sign: result.is_bit_on(31),
        zero: result == 0,
    }
}

pub fn add_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    adc_op(first_op, second_op, false)
}

/// Subtraction with borrow-in. Carry is the no-borrow convention: set
/// when the minuend covers the amount being taken away.
pub fn sbc_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let borrow = u64::from(!carry_in);
    let taken = u64::from(second_op) + borrow;
    let signed =
        i64::from(first_op as i32) - i64::from(second_op as i32) - i64::from(!carry_in);
    let result = first_op
        .wrapping_sub(second_op)
        .wrapping_sub(u32::from(!carry_in));

    ArithmeticOpResult {
        result,
        carry: u64::from(first_op) >= taken,
        overflow: signed != i64::from(result as i32),
        sign: result.is_bit_on(31),
        zero: result == 0,
    }
}

pub fn sub_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    sbc_op(first_op, second_op, true)
}

/// Value and carry-out of a barrel shifter pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    pub value: u32,
    pub carry: bool,
}

/// Shift by an amount taken from an instruction field (0 to 31). A zero
/// field does not mean "no shift": LSR and ASR read it as 32, and ROR
/// becomes a rotate through carry by one.
pub fn shift_immediate(kind: ShiftKind, amount: u32, value: u32, carry_in: bool) -> ShiftResult {
    debug_assert!(amount < 32);

    match kind {
        ShiftKind::Lsl => match amount {
            0 => ShiftResult {
                value,
                carry: carry_in,
            },
            _ => ShiftResult {
                value: value << amount,
                carry: value.is_bit_on((32 - amount) as u8),
            },
        },
        ShiftKind::Lsr => match amount {
            0 => ShiftResult {
                value: 0,
                carry: value.is_bit_on(31),
            },
            _ => ShiftResult {
                value: value >> amount,
                carry: value.is_bit_on((amount - 1) as u8),
            },
        },
        ShiftKind::Asr => match amount {
            0 => {
                let top = value.is_bit_on(31);
                ShiftResult {
                    value: if top { u32::MAX } else { 0 },
                    carry: top,
                }
            }
            _ => ShiftResult {
                value: ((value as i32) >> amount) as u32,
                carry: value.is_bit_on((amount - 1) as u8),
            },
        },
        ShiftKind::Ror => match amount {
            // Rotate right extended: one bit through the carry.
            0 => ShiftResult {
                value: (u32::from(carry_in) << 31) | (value >> 1),
                carry: value.is_bit_on(0),
            },
            _ => {
                let result = value.rotate_right(amount);
                ShiftResult {
                    value: result,
                    carry: result.is_bit_on(31),
                }
            }
        },
    }
}

/// Shift by an amount taken from a register (low byte, 0 to 255).
/// Amount zero leaves value and carry alone.
pub fn shift_register(kind: ShiftKind, amount: u32, value: u32, carry_in: bool) -> ShiftResult {
    let amount = amount & 0xFF;
    if amount == 0 {
        return ShiftResult {
            value,
            carry: carry_in,
        };
    }

    match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => shift_immediate(kind, amount, value, carry_in),
            32 => ShiftResult {
                value: 0,
                carry: value.is_bit_on(0),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Lsr => match amount {
            1..=31 => shift_immediate(kind, amount, value, carry_in),
            32 => ShiftResult {
                value: 0,
                carry: value.is_bit_on(31),
            },
            _ => ShiftResult {
                value: 0,
                carry: false,
            },
        },
        ShiftKind::Asr => match amount {
            1..=31 => shift_immediate(kind, amount, value, carry_in),
            // Saturates to the sign bit from 32 on.
            _ => {
                let top = value.is_bit_on(31);
                ShiftResult {
                    value: if top { u32::MAX } else { 0 },
                    carry: top,
                }
            }
        },
        ShiftKind::Ror => match amount & 0b1_1111 {
            // A multiple of 32 rotates all the way around.
            0 => ShiftResult {
                value,
                carry: value.is_bit_on(31),
            },
            effective => {
                let result = value.rotate_right(effective);
                ShiftResult {
                    value: result,
                    carry: result.is_bit_on(31),
                }
            }
        },
    }
}
