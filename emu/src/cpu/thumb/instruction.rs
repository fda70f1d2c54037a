use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::ThumbAluInstruction;

/// Hi-register operations share one format row with BX/BLX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiRegisterOp {
    Add,
    Cmp,
    Mov,
    BranchExchange { link: bool },
}

/// What a sign/zero extend instruction extends from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendKind {
    SignedHalfword,
    SignedByte,
    UnsignedHalfword,
    UnsignedByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseKind {
    Word,
    PackedHalfwords,
    SignedHalfword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbInstruction {
    MoveShiftedRegister {
        shift_kind: ShiftKind,
        offset: u32,
        rs: u32,
        rd: u32,
    },
    AddSubtract {
        subtract: bool,
        immediate: bool,
        rn_or_offset: u32,
        rs: u32,
        rd: u32,
    },
    MoveCompareAddSubtractImm {
        op: u32,
        rd: u32,
        offset: u32,
    },
    AluOperation {
        op: ThumbAluInstruction,
        rs: u32,
        rd: u32,
    },
    HiRegisterOp {
        op: HiRegisterOp,
        source: u32,
        destination: u32,
    },
    PcRelativeLoad {
        rd: u32,
        offset: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        ro: u32,
        rb: u32,
        rd: u32,
    },
    LoadStoreSignExtended {
        halfword: bool,
        signed: bool,
        ro: u32,
        rb: u32,
        rd: u32,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        offset: u32,
        rb: u32,
        rd: u32,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        rb: u32,
        rd: u32,
    },
    SpRelativeLoadStore {
        load_store: LoadStoreKind,
        rd: u32,
        offset: u32,
    },
    LoadAddress {
        sp: bool,
        rd: u32,
        offset: u32,
    },
    AddOffsetStackPointer {
        negative: bool,
        offset: u32,
    },
    SignZeroExtend {
        kind: ExtendKind,
        rs: u32,
        rd: u32,
    },
    PushPopRegister {
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    },
    ReverseBytes {
        kind: ReverseKind,
        rs: u32,
        rd: u32,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        rb: u32,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        offset: u32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        offset: u32,
    },
    LongBranchLinkPrefix {
        offset: u32,
    },
    LongBranchLinkSuffix {
        offset: u32,
        exchange: bool,
    },
    Breakpoint,
    StateControl,
    Undefined,
}

impl From<u16> for ThumbInstruction {
    fn from(op_code: u16) -> Self {
        use ThumbInstruction::*;

        if op_code.get_bits(8..=15) == 0b1101_1111 {
            Swi {
                comment: u32::from(op_code.get_bits(0..=7)),
            }
        } else if op_code.get_bits(11..=15) == 0b00011 {
            AddSubtract {
                subtract: op_code.is_bit_on(9),
                immediate: op_code.is_bit_on(10),
                rn_or_offset: u32::from(op_code.get_bits(6..=8)),
                rs: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            MoveShiftedRegister {
                shift_kind: u32::from(op_code.get_bits(11..=12)).into(),
                offset: u32::from(op_code.get_bits(6..=10)),
                rs: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            MoveCompareAddSubtractImm {
                op: u32::from(op_code.get_bits(11..=12)),
                rd: u32::from(op_code.get_bits(8..=10)),
                offset: u32::from(op_code.get_bits(0..=7)),
            }
        } else if op_code.get_bits(10..=15) == 0b010000 {
            AluOperation {
                op: op_code.get_bits(6..=9).into(),
                rs: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(10..=15) == 0b010001 {
            // `self::` keeps the op enum from being shadowed by the
            // glob-imported variant of the same name.
            let op = match op_code.get_bits(8..=9) {
                0b00 => self::HiRegisterOp::Add,
                0b01 => self::HiRegisterOp::Cmp,
                0b10 => self::HiRegisterOp::Mov,
                _ => self::HiRegisterOp::BranchExchange {
                    link: op_code.is_bit_on(7),
                },
            };
            let h2 = u32::from(op_code.get_bit(6));

            HiRegisterOp {
                op,
                source: (h2 << 3) | u32::from(op_code.get_bits(3..=5)),
                destination: (u32::from(op_code.get_bit(7)) << 3)
                    | u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(11..=15) == 0b01001 {
            PcRelativeLoad {
                rd: u32::from(op_code.get_bits(8..=10)),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 && op_code.is_bit_off(9) {
            LoadStoreRegisterOffset {
                load_store: op_code.is_bit_on(11).into(),
                quantity: op_code.is_bit_on(10).into(),
                ro: u32::from(op_code.get_bits(6..=8)),
                rb: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(12..=15) == 0b0101 {
            LoadStoreSignExtended {
                halfword: op_code.is_bit_on(11),
                signed: op_code.is_bit_on(10),
                ro: u32::from(op_code.get_bits(6..=8)),
                rb: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(13..=15) == 0b011 {
            LoadStoreImmOffset {
                load_store: op_code.is_bit_on(11).into(),
                quantity: op_code.is_bit_on(12).into(),
                offset: u32::from(op_code.get_bits(6..=10)),
                rb: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(12..=15) == 0b1000 {
            LoadStoreHalfword {
                load_store: op_code.is_bit_on(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                rb: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(12..=15) == 0b1001 {
            SpRelativeLoadStore {
                load_store: op_code.is_bit_on(11).into(),
                rd: u32::from(op_code.get_bits(8..=10)),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1010 {
            LoadAddress {
                sp: op_code.is_bit_on(11),
                rd: u32::from(op_code.get_bits(8..=10)),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1011 {
            Self::decode_misc(op_code)
        } else if op_code.get_bits(12..=15) == 0b1100 {
            MultipleLoadStore {
                load_store: op_code.is_bit_on(11).into(),
                rb: u32::from(op_code.get_bits(8..=10)),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(12..=15) == 0b1101 {
            match op_code.get_bits(8..=11) {
                // The all-but-one condition row is permanently undefined,
                // the last one was matched as SWI above.
                0b1110 => Undefined,
                cond => CondBranch {
                    condition: Condition::from(cond as u8),
                    offset: u32::from(op_code.get_bits(0..=7)) << 1,
                },
            }
        } else if op_code.get_bits(11..=15) == 0b11100 {
            UncondBranch {
                offset: u32::from(op_code.get_bits(0..=10)) << 1,
            }
        } else if op_code.get_bits(11..=15) == 0b11110 {
            LongBranchLinkPrefix {
                offset: u32::from(op_code.get_bits(0..=10)),
            }
        } else if op_code.get_bits(11..=15) == 0b11111 {
            LongBranchLinkSuffix {
                offset: u32::from(op_code.get_bits(0..=10)),
                exchange: false,
            }
        } else if op_code.get_bits(11..=15) == 0b11101 && op_code.is_bit_off(0) {
            LongBranchLinkSuffix {
                offset: u32::from(op_code.get_bits(0..=10)),
                exchange: true,
            }
        } else {
            Undefined
        }
    }
}

impl ThumbInstruction {
    /// The 1011 row packs stack adjustment, extension, push/pop, byte
    /// reversal, breakpoints and state control.
    fn decode_misc(op_code: u16) -> Self {
        use ThumbInstruction::*;

        if op_code.get_bits(8..=11) == 0b0000 {
            AddOffsetStackPointer {
                negative: op_code.is_bit_on(7),
                offset: u32::from(op_code.get_bits(0..=6)) << 2,
            }
        } else if op_code.get_bits(8..=11) == 0b0010 {
            let kind = match op_code.get_bits(6..=7) {
                0b00 => ExtendKind::SignedHalfword,
                0b01 => ExtendKind::SignedByte,
                0b10 => ExtendKind::UnsignedHalfword,
                _ => ExtendKind::UnsignedByte,
            };
            SignZeroExtend {
                kind,
                rs: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(9..=10) == 0b10 {
            PushPopRegister {
                load_store: op_code.is_bit_on(11).into(),
                pc_lr: op_code.is_bit_on(8),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(8..=11) == 0b1010 {
            let kind = match op_code.get_bits(6..=7) {
                0b00 => ReverseKind::Word,
                0b01 => ReverseKind::PackedHalfwords,
                0b11 => ReverseKind::SignedHalfword,
                _ => return Undefined,
            };
            ReverseBytes {
                kind,
                rs: u32::from(op_code.get_bits(3..=5)),
                rd: u32::from(op_code.get_bits(0..=2)),
            }
        } else if op_code.get_bits(8..=11) == 0b0110 {
            StateControl
        } else if op_code.get_bits(8..=11) == 0b1110 {
            Breakpoint
        } else {
            Undefined
        }
    }
}
