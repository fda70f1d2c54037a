use crate::bitwise::Bits;
use crate::cpu::alu;
use crate::cpu::flags::{LoadStoreKind, ReadWriteKind, ShiftKind};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::REG_PROGRAM_COUNTER;
use crate::cpu::thumb::Thumb;
use crate::cpu::thumb::alu_instructions::ThumbAluInstruction;
use crate::cpu::thumb::instruction::{
    ExtendKind, HiRegisterOp, ReverseKind, ThumbInstruction,
};
use crate::fault::{Fault, StepOutcome};

/// Software interrupt comment that routes to the host services shim.
pub const SEMIHOST_SWI: u32 = 0xAB;

impl Thumb {
    pub(super) fn execute(
        &mut self,
        instruction: ThumbInstruction,
        raw: u16,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        match instruction {
            ThumbInstruction::MoveShiftedRegister {
                shift_kind,
                offset,
                rs,
                rd,
            } => {
                let shifted = alu::shift_immediate(
                    shift_kind,
                    offset,
                    self.registers.register_at(rs),
                    self.cpsr.carry_flag(),
                );
                self.registers.set_register_at(rd, shifted.value);
                self.cpsr.set_carry_flag(shifted.carry);
                self.set_sign_zero(shifted.value);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::AddSubtract {
                subtract,
                immediate,
                rn_or_offset,
                rs,
                rd,
            } => {
                let first_op = self.registers.register_at(rs);
                let second_op = if immediate {
                    rn_or_offset
                } else {
                    self.registers.register_at(rn_or_offset)
                };
                let result = if subtract {
                    alu::sub_op(first_op, second_op)
                } else {
                    alu::add_op(first_op, second_op)
                };
                self.registers.set_register_at(rd, result.result);
                self.cpsr.set_flags(&result);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::MoveCompareAddSubtractImm { op, rd, offset } => {
                let current = self.registers.register_at(rd);
                match op {
                    0b00 => {
                        self.registers.set_register_at(rd, offset);
                        self.set_sign_zero(offset);
                    }
                    0b01 => self.cpsr.set_flags(&alu::sub_op(current, offset)),
                    0b10 => {
                        let result = alu::add_op(current, offset);
                        self.registers.set_register_at(rd, result.result);
                        self.cpsr.set_flags(&result);
                    }
                    _ => {
                        let result = alu::sub_op(current, offset);
                        self.registers.set_register_at(rd, result.result);
                        self.cpsr.set_flags(&result);
                    }
                }
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::AluOperation { op, rs, rd } => {
                self.alu_operation(op, rs, rd);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::HiRegisterOp {
                op,
                source,
                destination,
            } => self.hi_register_op(op, source, destination),
            ThumbInstruction::PcRelativeLoad { rd, offset } => {
                let base = self
                    .registers
                    .program_counter()
                    .wrapping_add(2)
                    & !0b11;
                let value = self.mmu.read_word(base.wrapping_add(offset))?;
                self.registers.set_register_at(rd, value);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::LoadStoreRegisterOffset {
                load_store,
                quantity,
                ro,
                rb,
                rd,
            } => {
                let address = self
                    .registers
                    .register_at(rb)
                    .wrapping_add(self.registers.register_at(ro));
                self.transfer(load_store, quantity, address, rd)
            }
            ThumbInstruction::LoadStoreSignExtended {
                halfword,
                signed,
                ro,
                rb,
                rd,
            } => {
                let address = self
                    .registers
                    .register_at(rb)
                    .wrapping_add(self.registers.register_at(ro));
                let value = match (signed, halfword) {
                    (false, false) => {
                        let value = self.registers.register_at(rd);
                        self.mmu.write_half(address, value as u16)?;
                        return Ok(StepOutcome::Continue);
                    }
                    (false, true) => u32::from(self.mmu.read_half(address)?),
                    (true, false) => u32::from(self.mmu.read_byte(address)?).sign_extended(8),
                    (true, true) => u32::from(self.mmu.read_half(address)?).sign_extended(16),
                };
                self.registers.set_register_at(rd, value);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::LoadStoreImmOffset {
                load_store,
                quantity,
                offset,
                rb,
                rd,
            } => {
                let scaled = match quantity {
                    ReadWriteKind::Word => offset << 2,
                    ReadWriteKind::Byte => offset,
                };
                let address = self.registers.register_at(rb).wrapping_add(scaled);
                self.transfer(load_store, quantity, address, rd)
            }
            ThumbInstruction::LoadStoreHalfword {
                load_store,
                offset,
                rb,
                rd,
            } => {
                let address = self.registers.register_at(rb).wrapping_add(offset);
                match load_store {
                    LoadStoreKind::Load => {
                        let value = u32::from(self.mmu.read_half(address)?);
                        self.registers.set_register_at(rd, value);
                    }
                    LoadStoreKind::Store => {
                        let value = self.registers.register_at(rd);
                        self.mmu.write_half(address, value as u16)?;
                    }
                }
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::SpRelativeLoadStore {
                load_store,
                rd,
                offset,
            } => {
                let address = self.registers.stack_pointer().wrapping_add(offset);
                self.transfer(load_store, ReadWriteKind::Word, address, rd)
            }
            ThumbInstruction::LoadAddress { sp, rd, offset } => {
                let base = if sp {
                    self.registers.stack_pointer()
                } else {
                    self.registers.program_counter().wrapping_add(2) & !0b11
                };
                self.registers
                    .set_register_at(rd, base.wrapping_add(offset));
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::AddOffsetStackPointer { negative, offset } => {
                let sp = self.registers.stack_pointer();
                let new_sp = if negative {
                    sp.wrapping_sub(offset)
                } else {
                    sp.wrapping_add(offset)
                };
                self.registers.set_stack_pointer(new_sp);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::SignZeroExtend { kind, rs, rd } => {
                let value = self.registers.register_at(rs);
                let extended = match kind {
                    ExtendKind::SignedHalfword => (value & 0xFFFF).sign_extended(16),
                    ExtendKind::SignedByte => (value & 0xFF).sign_extended(8),
                    ExtendKind::UnsignedHalfword => value & 0xFFFF,
                    ExtendKind::UnsignedByte => value & 0xFF,
                };
                self.registers.set_register_at(rd, extended);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::PushPopRegister {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop(load_store, pc_lr, register_list, address),
            ThumbInstruction::ReverseBytes { kind, rs, rd } => {
                let value = self.registers.register_at(rs);
                let reversed = match kind {
                    ReverseKind::Word => value.swap_bytes(),
                    ReverseKind::PackedHalfwords => {
                        ((value & 0xFF00_FF00) >> 8) | ((value & 0x00FF_00FF) << 8)
                    }
                    ReverseKind::SignedHalfword => {
                        u32::from((value as u16).swap_bytes()).sign_extended(16)
                    }
                };
                self.registers.set_register_at(rd, reversed);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::MultipleLoadStore {
                load_store,
                rb,
                register_list,
            } => self.multiple_load_store(load_store, rb, register_list),
            ThumbInstruction::CondBranch { condition, offset } => {
                if self.cpsr.can_execute(condition) {
                    let offset = offset.sign_extended(9) as i32;
                    let pc = self.registers.program_counter();
                    self.registers
                        .set_program_counter(pc.wrapping_add(2).wrapping_add_signed(offset));
                }
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::Swi { comment } => {
                if comment == SEMIHOST_SWI {
                    self.semihost
                        .handle(&mut self.registers, &mut self.mmu, address)
                } else {
                    Err(Fault::Unimplemented {
                        address,
                        instruction: u32::from(raw),
                    })
                }
            }
            ThumbInstruction::UncondBranch { offset } => {
                let offset = offset.sign_extended(12) as i32;
                let pc = self.registers.program_counter();
                self.registers
                    .set_program_counter(pc.wrapping_add(2).wrapping_add_signed(offset));
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::LongBranchLinkPrefix { offset } => {
                let upper = offset.sign_extended(11) << 12;
                let pc = self.registers.program_counter();
                self.registers
                    .set_link_register(pc.wrapping_add(2).wrapping_add(upper));
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::LongBranchLinkSuffix { offset, exchange } => {
                if exchange {
                    return Err(Fault::Unimplemented {
                        address,
                        instruction: u32::from(raw),
                    });
                }
                let return_address = self.registers.program_counter();
                let target = self.registers.link_register().wrapping_add(offset << 1);
                self.registers.set_program_counter(target & !0b1);
                self.registers.set_link_register(return_address | 0b1);
                Ok(StepOutcome::Continue)
            }
            ThumbInstruction::Breakpoint | ThumbInstruction::StateControl => {
                Err(Fault::Unimplemented {
                    address,
                    instruction: u32::from(raw),
                })
            }
            ThumbInstruction::Undefined => Err(Fault::Undefined {
                address,
                instruction: u32::from(raw),
            }),
        }
    }

    fn set_sign_zero(&mut self, value: u32) {
        self.cpsr.set_sign_flag(value.is_bit_on(31));
        self.cpsr.set_zero_flag(value == 0);
    }

    fn alu_operation(&mut self, op: ThumbAluInstruction, rs: u32, rd: u32) {
        use ThumbAluInstruction::*;

        let rs_value = self.registers.register_at(rs);
        let rd_value = self.registers.register_at(rd);
        let carry = self.cpsr.carry_flag();

        match op {
            And => self.logical(rd, rd_value & rs_value),
            Eor => self.logical(rd, rd_value ^ rs_value),
            Orr => self.logical(rd, rd_value | rs_value),
            Bic => self.logical(rd, rd_value & !rs_value),
            Mvn => self.logical(rd, !rs_value),
            Tst => self.set_sign_zero(rd_value & rs_value),
            Lsl => self.shift(ShiftKind::Lsl, rd, rd_value, rs_value),
            Lsr => self.shift(ShiftKind::Lsr, rd, rd_value, rs_value),
            Asr => self.shift(ShiftKind::Asr, rd, rd_value, rs_value),
            Ror => self.shift(ShiftKind::Ror, rd, rd_value, rs_value),
            Adc => {
                let result = alu::adc_op(rd_value, rs_value, carry);
                self.registers.set_register_at(rd, result.result);
                self.cpsr.set_flags(&result);
            }
            Sbc => {
                let result = alu::sbc_op(rd_value, rs_value, carry);
                self.registers.set_register_at(rd, result.result);
                self.cpsr.set_flags(&result);
            }
            Neg => {
                let result = alu::sub_op(0, rs_value);
                self.registers.set_register_at(rd, result.result);
                self.cpsr.set_flags(&result);
            }
            Cmp => self.cpsr.set_flags(&alu::sub_op(rd_value, rs_value)),
            Cmn => self.cpsr.set_flags(&alu::add_op(rd_value, rs_value)),
            Mul => {
                let result = rd_value.wrapping_mul(rs_value);
                self.registers.set_register_at(rd, result);
                self.set_sign_zero(result);
            }
        }
    }

    fn logical(&mut self, rd: u32, result: u32) {
        self.registers.set_register_at(rd, result);
        self.set_sign_zero(result);
    }

    fn shift(&mut self, kind: ShiftKind, rd: u32, value: u32, amount: u32) {
        let shifted = alu::shift_register(kind, amount, value, self.cpsr.carry_flag());
        self.registers.set_register_at(rd, shifted.value);
        self.cpsr.set_carry_flag(shifted.carry);
        self.set_sign_zero(shifted.value);
    }

    /// Register read for the hi-register row. R15 reads one halfword past
    /// the updated program counter.
    fn read_operand(&self, reg: u32) -> u32 {
        let value = self.registers.register_at(reg);
        if reg == REG_PROGRAM_COUNTER {
            value.wrapping_add(2)
        } else {
            value
        }
    }

    fn hi_register_op(
        &mut self,
        op: HiRegisterOp,
        source: u32,
        destination: u32,
    ) -> Result<StepOutcome, Fault> {
        let source_value = self.read_operand(source);

        match op {
            HiRegisterOp::Add => {
                let result = self.read_operand(destination).wrapping_add(source_value);
                if destination == REG_PROGRAM_COUNTER {
                    self.registers.set_program_counter(result & !0b1);
                } else {
                    self.registers.set_register_at(destination, result);
                }
                Ok(StepOutcome::Continue)
            }
            HiRegisterOp::Cmp => {
                let result = alu::sub_op(self.read_operand(destination), source_value);
                self.cpsr.set_flags(&result);
                Ok(StepOutcome::Continue)
            }
            HiRegisterOp::Mov => {
                if destination == REG_PROGRAM_COUNTER {
                    self.registers.set_program_counter(source_value & !0b1);
                } else {
                    self.registers.set_register_at(destination, source_value);
                }
                Ok(StepOutcome::Continue)
            }
            HiRegisterOp::BranchExchange { link } => {
                if link {
                    let return_address = self.registers.program_counter();
                    self.registers.set_link_register(return_address | 0b1);
                }
                self.exchange(source_value)
            }
        }
    }

    /// Branch to an exchanging target: the low bit picks the encoding.
    fn exchange(&mut self, target: u32) -> Result<StepOutcome, Fault> {
        self.registers.set_program_counter(target & !0b1);
        if target.is_bit_on(0) {
            Ok(StepOutcome::Continue)
        } else {
            Ok(StepOutcome::ModeSwitch(CpuState::Arm))
        }
    }

    fn transfer(
        &mut self,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        address: u32,
        rd: u32,
    ) -> Result<StepOutcome, Fault> {
        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => self.mmu.read_word(address)?,
                    ReadWriteKind::Byte => u32::from(self.mmu.read_byte(address)?),
                };
                self.registers.set_register_at(rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.registers.register_at(rd);
                match quantity {
                    ReadWriteKind::Word => self.mmu.write_word(address, value)?,
                    ReadWriteKind::Byte => self.mmu.write_byte(address, value as u8)?,
                }
            }
        }
        Ok(StepOutcome::Continue)
    }

    fn push_pop(
        &mut self,
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
        address: u32,
    ) -> Result<StepOutcome, Fault> {
        let count = u32::from(register_list.count_ones()) + u32::from(pc_lr);
        let sp = self.registers.stack_pointer();

        match load_store {
            LoadStoreKind::Store => {
                let mut slot = sp.wrapping_sub(count * 4);
                self.registers.set_stack_pointer(slot);
                for reg in 0..8 {
                    if register_list.is_bit_on(reg) {
                        let value = self.registers.register_at(u32::from(reg));
                        self.mmu.write_word(slot, value)?;
                        slot = slot.wrapping_add(4);
                    }
                }
                if pc_lr {
                    self.mmu.write_word(slot, self.registers.link_register())?;
                }
                Ok(StepOutcome::Continue)
            }
            LoadStoreKind::Load => {
                let mut slot = sp;
                for reg in 0..8 {
                    if register_list.is_bit_on(reg) {
                        let value = self.mmu.read_word(slot)?;
                        self.registers.set_register_at(u32::from(reg), value);
                        slot = slot.wrapping_add(4);
                    }
                }
                self.registers.set_stack_pointer(sp.wrapping_add(count * 4));
                if pc_lr {
                    // A popped return address must stay in this encoding;
                    // a clear low bit asks for the other one.
                    let target = self.mmu.read_word(slot)?;
                    if target.is_bit_off(0) {
                        return Err(Fault::ModeSwitchUnsupported { address });
                    }
                    self.registers.set_program_counter(target & !0b1);
                }
                Ok(StepOutcome::Continue)
            }
        }
    }

    fn multiple_load_store(
        &mut self,
        load_store: LoadStoreKind,
        rb: u32,
        register_list: u16,
    ) -> Result<StepOutcome, Fault> {
        let base = self.registers.register_at(rb);
        let count = u32::from(register_list.count_ones());

        // Writeback lands first so a loaded base wins.
        self.registers
            .set_register_at(rb, base.wrapping_add(count * 4));

        let mut slot = base;
        for reg in 0..8 {
            if register_list.is_bit_off(reg) {
                continue;
            }

            match load_store {
                LoadStoreKind::Load => {
                    let value = self.mmu.read_word(slot)?;
                    self.registers.set_register_at(u32::from(reg), value);
                }
                LoadStoreKind::Store => {
                    let value = self.registers.register_at(u32::from(reg));
                    self.mmu.write_word(slot, value)?;
                }
            }
            slot = slot.wrapping_add(4);
        }

        Ok(StepOutcome::Continue)
    }
}
