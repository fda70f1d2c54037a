use crate::bitwise::Bits;
use crate::cpu::alu::{self, ArithmeticOpResult};
use crate::cpu::arm::Arm;
use crate::cpu::arm::alu_instruction::{AluInstructionKind, ArmAluInstruction, Kind};
use crate::cpu::arm::instruction::{
    ArmInstruction, HalfwordDataTransferOffsetInfo, HalfwordTransferKind,
    SingleDataTransferOffsetInfo,
};
use crate::cpu::arm::mode::ArmOpcode;
use crate::cpu::flags::{Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};
use crate::fault::{Fault, StepOutcome};

/// Software interrupt comment that routes to the host services shim.
pub const SEMIHOST_SWI: u32 = 0x12_3456;

impl Arm {
    pub(super) fn execute(
        &mut self,
        op_code: &ArmOpcode,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        match op_code.instruction {
            ArmInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                op_kind,
                rn,
                destination,
            } => self.data_processing(
                op_code,
                alu_instruction,
                set_conditions,
                op_kind,
                rn,
                destination,
                address,
            ),
            ArmInstruction::Mrs { destination, saved } => {
                if saved {
                    return Err(Fault::Unimplemented {
                        address,
                        instruction: op_code.raw,
                    });
                }
                self.registers
                    .set_register_at(destination, self.cpsr.into());
                Ok(StepOutcome::Continue)
            }
            ArmInstruction::BranchAndExchange { link, register } => {
                self.branch_and_exchange(link, register, address)
            }
            ArmInstruction::CountLeadingZeros {
                destination,
                operand,
            } => {
                let value = self.registers.register_at(operand);
                self.registers
                    .set_register_at(destination, value.leading_zeros());
                Ok(StepOutcome::Continue)
            }
            ArmInstruction::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
            } => {
                let mut result = self
                    .registers
                    .register_at(rm)
                    .wrapping_mul(self.registers.register_at(rs));
                if accumulate {
                    result = result.wrapping_add(self.registers.register_at(rn));
                }
                self.registers.set_register_at(rd, result);
                if set_conditions {
                    self.cpsr.set_sign_flag(result.is_bit_on(31));
                    self.cpsr.set_zero_flag(result == 0);
                }
                Ok(StepOutcome::Continue)
            }
            ArmInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_info,
                base_register,
                source_destination,
                transfer_kind,
            } => self.halfword_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_info,
                base_register,
                source_destination,
                transfer_kind,
                address,
                op_code.raw,
            ),
            ArmInstruction::SingleDataTransfer {
                load_store,
                quantity,
                indexing,
                offsetting,
                write_back,
                base_register,
                source_destination,
                offset_info,
            } => self.single_data_transfer(
                load_store,
                quantity,
                indexing,
                offsetting,
                write_back,
                base_register,
                source_destination,
                offset_info,
            ),
            ArmInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store,
                base_register,
                register_list,
            ),
            ArmInstruction::Branch { link, offset } => {
                self.branch(link, offset);
                Ok(StepOutcome::Continue)
            }
            ArmInstruction::SoftwareInterrupt { comment } => {
                if comment == SEMIHOST_SWI {
                    self.semihost
                        .handle(&mut self.registers, &mut self.mmu, address)
                } else {
                    tracing::warn!("ignoring software interrupt {comment:#08X} at {address:#010X}");
                    Ok(StepOutcome::Continue)
                }
            }
            ArmInstruction::Msr
            | ArmInstruction::MultiplyLong
            | ArmInstruction::SingleDataSwap
            | ArmInstruction::EnhancedDsp
            | ArmInstruction::CoprocessorOperation
            | ArmInstruction::Media => Err(Fault::Unimplemented {
                address,
                instruction: op_code.raw,
            }),
            ArmInstruction::Undefined => Err(Fault::Undefined {
                address,
                instruction: op_code.raw,
            }),
        }
    }

    /// Register read as an operand. R15 reads one word past the updated
    /// program counter, which lands two instructions after the current one.
    fn read_operand(&self, reg: u32) -> u32 {
        let value = self.registers.register_at(reg);
        if reg == REG_PROGRAM_COUNTER {
            value.wrapping_add(4)
        } else {
            value
        }
    }

    /// Resolves the second operand of a data processing instruction.
    /// For flag-setting logical operations the shifter carry lands in CPSR.
    fn alu_second_operand(&mut self, op_code: &ArmOpcode, op_kind: OperandKind, update_carry: bool) -> u32 {
        let carry_in = self.cpsr.carry_flag();

        let shift_result = match op_kind {
            OperandKind::Immediate => {
                let imm = op_code.get_bits(0..=7);
                let rotate = op_code.get_bits(8..=11) * 2;
                let value = imm.rotate_right(rotate);
                alu::ShiftResult {
                    value,
                    carry: if rotate == 0 {
                        carry_in
                    } else {
                        value.is_bit_on(31)
                    },
                }
            }
            OperandKind::Register => {
                let rm = op_code.get_bits(0..=3);
                let shift_kind = op_code.get_bits(5..=6).into();
                let rm_value = self.read_operand(rm);

                if op_code.is_bit_on(4) {
                    let rs = op_code.get_bits(8..=11);
                    let amount = self.registers.register_at(rs) & 0xFF;
                    alu::shift_register(shift_kind, amount, rm_value, carry_in)
                } else {
                    let amount = op_code.get_bits(7..=11);
                    alu::shift_immediate(shift_kind, amount, rm_value, carry_in)
                }
            }
        };

        if update_carry {
            self.cpsr.set_carry_flag(shift_result.carry);
        }

        shift_result.value
    }

    #[allow(clippy::too_many_arguments)]
    fn data_processing(
        &mut self,
        op_code: &ArmOpcode,
        alu_instruction: ArmAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        use ArmAluInstruction::*;

        // A compare writes no destination, so R15 in that field encodes
        // nothing this core defines.
        if destination == REG_PROGRAM_COUNTER
            && matches!(alu_instruction, Tst | Teq | Cmp | Cmn)
        {
            return Err(Fault::Unimplemented {
                address,
                instruction: op_code.raw,
            });
        }

        let update_carry =
            set_conditions && alu_instruction.kind() == AluInstructionKind::Logical;
        let first_op = self.read_operand(rn);
        let second_op = self.alu_second_operand(op_code, op_kind, update_carry);
        let carry = self.cpsr.carry_flag();

        let (result, write_result) = match alu_instruction {
            And => (self.logical(first_op & second_op, set_conditions), true),
            Eor => (self.logical(first_op ^ second_op, set_conditions), true),
            Orr => (self.logical(first_op | second_op, set_conditions), true),
            Bic => (self.logical(first_op & !second_op, set_conditions), true),
            Mov => (self.logical(second_op, set_conditions), true),
            Mvn => (self.logical(!second_op, set_conditions), true),
            Tst => (self.logical(first_op & second_op, true), false),
            Teq => (self.logical(first_op ^ second_op, true), false),
            Add => (self.arithmetic(alu::add_op(first_op, second_op), set_conditions), true),
            Adc => (
                self.arithmetic(alu::adc_op(first_op, second_op, carry), set_conditions),
                true,
            ),
            Sub => (self.arithmetic(alu::sub_op(first_op, second_op), set_conditions), true),
            Sbc => (
                self.arithmetic(alu::sbc_op(first_op, second_op, carry), set_conditions),
                true,
            ),
            Rsb => (self.arithmetic(alu::sub_op(second_op, first_op), set_conditions), true),
            Rsc => (
                self.arithmetic(alu::sbc_op(second_op, first_op, carry), set_conditions),
                true,
            ),
            Cmp => (self.arithmetic(alu::sub_op(first_op, second_op), true), false),
            Cmn => (self.arithmetic(alu::add_op(first_op, second_op), true), false),
        };

        if write_result {
            if destination == REG_PROGRAM_COUNTER {
                self.registers.set_program_counter(result & !0b11);
            } else {
                self.registers.set_register_at(destination, result);
            }
        }

        Ok(StepOutcome::Continue)
    }

    fn logical(&mut self, result: u32, set_conditions: bool) -> u32 {
        if set_conditions {
            self.cpsr.set_sign_flag(result.is_bit_on(31));
            self.cpsr.set_zero_flag(result == 0);
        }
        result
    }

    fn arithmetic(&mut self, op_result: ArithmeticOpResult, set_conditions: bool) -> u32 {
        if set_conditions {
            self.cpsr.set_flags(&op_result);
        }
        op_result.result
    }

    fn branch(&mut self, link: bool, offset: u32) {
        // pc already points past the current instruction; the target is
        // relative to one word further, matching the fetch pipeline.
        let pc = self.registers.program_counter();
        if link {
            self.registers.set_register_at(REG_LR, pc);
        }

        let offset = offset.sign_extended(26) as i32;
        self.registers
            .set_program_counter(pc.wrapping_add(4).wrapping_add_signed(offset));
    }

    fn branch_and_exchange(
        &mut self,
        link: bool,
        register: u32,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        let target = self.registers.register_at(register);
        if target.is_bit_on(0) {
            return Err(Fault::ModeSwitchUnsupported { address });
        }

        if link {
            self.registers
                .set_register_at(REG_LR, self.registers.program_counter());
        }
        self.registers.set_program_counter(target & !0b11);
        Ok(StepOutcome::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    fn halfword_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_info: HalfwordDataTransferOffsetInfo,
        base_register: u32,
        source_destination: u32,
        transfer_kind: HalfwordTransferKind,
        address: u32,
        raw: u32,
    ) -> Result<StepOutcome, Fault> {
        let base = self.read_operand(base_register);
        let offset = match offset_info {
            HalfwordDataTransferOffsetInfo::Immediate { offset } => offset,
            HalfwordDataTransferOffsetInfo::Register { reg } => self.registers.register_at(reg),
        };
        let offset_base = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let effective = match indexing {
            Indexing::Pre => offset_base,
            Indexing::Post => base,
        };

        if matches!(indexing, Indexing::Post) || write_back {
            self.registers.set_register_at(base_register, offset_base);
        }

        match load_store {
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfword => {
                        u32::from(self.mmu.read_half(effective)?)
                    }
                    HalfwordTransferKind::SignedByte => {
                        u32::from(self.mmu.read_byte(effective)?).sign_extended(8)
                    }
                    HalfwordTransferKind::SignedHalfword => {
                        u32::from(self.mmu.read_half(effective)?).sign_extended(16)
                    }
                };
                if source_destination == REG_PROGRAM_COUNTER {
                    self.registers.set_program_counter(value & !0b11);
                } else {
                    self.registers.set_register_at(source_destination, value);
                }
            }
            LoadStoreKind::Store => {
                if transfer_kind != HalfwordTransferKind::UnsignedHalfword {
                    return Err(Fault::Undefined {
                        address,
                        instruction: raw,
                    });
                }
                let value = self.read_operand(source_destination);
                self.mmu.write_half(effective, value as u16)?;
            }
        }

        Ok(StepOutcome::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        base_register: u32,
        source_destination: u32,
        offset_info: SingleDataTransferOffsetInfo,
    ) -> Result<StepOutcome, Fault> {
        let base = self.read_operand(base_register);
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterShift {
                shift_kind,
                amount,
                reg,
            } => {
                let value = self.read_operand(reg);
                alu::shift_immediate(shift_kind, amount, value, self.cpsr.carry_flag()).value
            }
        };
        let offset_base = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let effective = match indexing {
            Indexing::Pre => offset_base,
            Indexing::Post => base,
        };

        if matches!(indexing, Indexing::Post) || write_back {
            self.registers.set_register_at(base_register, offset_base);
        }

        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => self.mmu.read_word(effective)?,
                    ReadWriteKind::Byte => u32::from(self.mmu.read_byte(effective)?),
                };
                if source_destination == REG_PROGRAM_COUNTER {
                    self.registers.set_program_counter(value & !0b11);
                } else {
                    self.registers.set_register_at(source_destination, value);
                }
            }
            LoadStoreKind::Store => {
                let value = self.read_operand(source_destination);
                match quantity {
                    ReadWriteKind::Word => self.mmu.write_word(effective, value)?,
                    ReadWriteKind::Byte => self.mmu.write_byte(effective, value as u8)?,
                }
            }
        }

        Ok(StepOutcome::Continue)
    }

    fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        base_register: u32,
        register_list: u32,
    ) -> Result<StepOutcome, Fault> {
        let base = self.registers.register_at(base_register);
        let count = register_list.count_ones();
        let span = count * 4;

        // The lowest register always sits at the lowest address, so every
        // variant is an ascending transfer from a computed start slot.
        let start = match (indexing, offsetting) {
            (Indexing::Post, Offsetting::Up) => base,
            (Indexing::Pre, Offsetting::Up) => base.wrapping_add(4),
            (Indexing::Pre, Offsetting::Down) => base.wrapping_sub(span),
            (Indexing::Post, Offsetting::Down) => base.wrapping_sub(span).wrapping_add(4),
        };
        let final_base = match offsetting {
            Offsetting::Up => base.wrapping_add(span),
            Offsetting::Down => base.wrapping_sub(span),
        };

        if write_back {
            self.registers.set_register_at(base_register, final_base);
        }

        let mut slot = start;
        for reg in 0..16 {
            if register_list.is_bit_off(reg as u8) {
                continue;
            }

            match load_store {
                LoadStoreKind::Load => {
                    let value = self.mmu.read_word(slot)?;
                    if reg == REG_PROGRAM_COUNTER {
                        self.registers.set_program_counter(value & !0b11);
                    } else {
                        self.registers.set_register_at(reg, value);
                    }
                }
                LoadStoreKind::Store => {
                    let value = self.read_operand(reg);
                    self.mmu.write_word(slot, value)?;
                }
            }
            slot = slot.wrapping_add(4);
        }

        Ok(StepOutcome::Continue)
    }
}
