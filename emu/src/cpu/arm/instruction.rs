use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::ArmAluInstruction;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind, ShiftKind};

/// Offset source of a halfword or signed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfwordDataTransferOffsetInfo {
    Immediate { offset: u32 },
    Register { reg: u32 },
}

/// What a halfword or signed transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfwordTransferKind {
    UnsignedHalfword,
    SignedByte,
    SignedHalfword,
}

impl From<u32> for HalfwordTransferKind {
    fn from(sh: u32) -> Self {
        match sh {
            0b01 => Self::UnsignedHalfword,
            0b10 => Self::SignedByte,
            0b11 => Self::SignedHalfword,
            _ => unreachable!("0b00 decodes elsewhere"),
        }
    }
}

/// Offset source of a word or byte transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterShift {
        shift_kind: ShiftKind,
        amount: u32,
        reg: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmInstruction {
    DataProcessing {
        alu_instruction: ArmAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
    },
    Mrs {
        destination: u32,
        saved: bool,
    },
    Msr,
    BranchAndExchange {
        link: bool,
        register: u32,
    },
    CountLeadingZeros {
        destination: u32,
        operand: u32,
    },
    Multiply {
        accumulate: bool,
        set_conditions: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    },
    MultiplyLong,
    SingleDataSwap,
    EnhancedDsp,
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_info: HalfwordDataTransferOffsetInfo,
        base_register: u32,
        source_destination: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        base_register: u32,
        source_destination: u32,
        offset_info: SingleDataTransferOffsetInfo,
    },
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u32,
    },
    Branch {
        link: bool,
        offset: u32,
    },
    CoprocessorOperation,
    Media,
    SoftwareInterrupt {
        comment: u32,
    },
    Undefined,
}

impl From<u32> for ArmInstruction {
    fn from(op_code: u32) -> Self {
        use ArmInstruction::*;

        // Decode order matters: the misc patterns squat on data processing
        // encodings with S clear.
        if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0001 {
            BranchAndExchange {
                link: false,
                register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(4..=27) == 0b0001_0010_1111_1111_1111_0011 {
            BranchAndExchange {
                link: true,
                register: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(16..=27) == 0b0001_0110_1111
            && op_code.get_bits(4..=11) == 0b1111_0001
        {
            CountLeadingZeros {
                destination: op_code.get_bits(12..=15),
                operand: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b0_0010
            && op_code.is_bit_off(20)
            && (op_code.get_bits(4..=7) == 0b0101
                || (op_code.is_bit_on(7) && op_code.is_bit_off(4)))
        {
            EnhancedDsp
        } else if op_code.get_bits(23..=27) == 0b0_0010
            && op_code.get_bits(16..=21) == 0b00_1111
            && op_code.get_bits(0..=11) == 0
        {
            Mrs {
                destination: op_code.get_bits(12..=15),
                saved: op_code.is_bit_on(22),
            }
        } else if op_code.get_bits(26..=27) == 0
            && op_code.is_bit_on(24)
            && op_code.is_bit_off(23)
            && op_code.is_bit_on(21)
            && op_code.is_bit_off(20)
            && op_code.get_bits(12..=15) == 0b1111
        {
            Msr
        } else if op_code.get_bits(22..=27) == 0 && op_code.get_bits(4..=7) == 0b1001 {
            Multiply {
                accumulate: op_code.is_bit_on(21),
                set_conditions: op_code.is_bit_on(20),
                rd: op_code.get_bits(16..=19),
                rn: op_code.get_bits(12..=15),
                rs: op_code.get_bits(8..=11),
                rm: op_code.get_bits(0..=3),
            }
        } else if op_code.get_bits(23..=27) == 0b0_0001 && op_code.get_bits(4..=7) == 0b1001 {
            MultiplyLong
        } else if op_code.get_bits(23..=27) == 0b0_0010
            && op_code.get_bits(20..=21) == 0
            && op_code.get_bits(4..=11) == 0b0000_1001
        {
            SingleDataSwap
        } else if op_code.get_bits(25..=27) == 0
            && op_code.is_bit_on(7)
            && op_code.is_bit_on(4)
            && op_code.get_bits(5..=6) != 0
        {
            let offset_info = if op_code.is_bit_on(22) {
                HalfwordDataTransferOffsetInfo::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                }
            } else {
                HalfwordDataTransferOffsetInfo::Register {
                    reg: op_code.get_bits(0..=3),
                }
            };

            HalfwordDataTransfer {
                indexing: op_code.is_bit_on(24).into(),
                offsetting: op_code.is_bit_on(23).into(),
                write_back: op_code.is_bit_on(21),
                load_store: op_code.is_bit_on(20).into(),
                offset_info,
                base_register: op_code.get_bits(16..=19),
                source_destination: op_code.get_bits(12..=15),
                transfer_kind: op_code.get_bits(5..=6).into(),
            }
        } else if op_code.get_bits(26..=27) == 0 {
            DataProcessing {
                alu_instruction: op_code.get_bits(21..=24).into(),
                set_conditions: op_code.is_bit_on(20),
                op_kind: op_code.is_bit_on(25).into(),
                rn: op_code.get_bits(16..=19),
                destination: op_code.get_bits(12..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.is_bit_on(4) {
            Media
        } else if op_code.get_bits(26..=27) == 0b01 {
            let offset_info = if op_code.is_bit_on(25) {
                SingleDataTransferOffsetInfo::RegisterShift {
                    shift_kind: op_code.get_bits(5..=6).into(),
                    amount: op_code.get_bits(7..=11),
                    reg: op_code.get_bits(0..=3),
                }
            } else {
                SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                }
            };

            SingleDataTransfer {
                load_store: op_code.is_bit_on(20).into(),
                quantity: op_code.is_bit_on(22).into(),
                indexing: op_code.is_bit_on(24).into(),
                offsetting: op_code.is_bit_on(23).into(),
                write_back: op_code.is_bit_on(21),
                base_register: op_code.get_bits(16..=19),
                source_destination: op_code.get_bits(12..=15),
                offset_info,
            }
        } else if op_code.get_bits(25..=27) == 0b100 {
            BlockDataTransfer {
                indexing: op_code.is_bit_on(24).into(),
                offsetting: op_code.is_bit_on(23).into(),
                write_back: op_code.is_bit_on(21),
                load_store: op_code.is_bit_on(20).into(),
                base_register: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            Branch {
                link: op_code.is_bit_on(24),
                offset: op_code.get_bits(0..=23) << 2,
            }
        } else if op_code.get_bits(25..=27) == 0b110 || op_code.get_bits(24..=27) == 0b1110 {
            CoprocessorOperation
        } else if op_code.get_bits(24..=27) == 0b1111 {
            SoftwareInterrupt {
                comment: op_code.get_bits(0..=23),
            }
        } else {
            Undefined
        }
    }
}
