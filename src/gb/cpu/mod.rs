use crate::gb::cpu::instruction::Instruction;
use crate::gb::cpu::ops::{
    ByteSource, ByteTarget, JumpCondition, JumpTarget, Load, PairedRegister, ResetCode, WordSource,
};
use crate::gb::cpu::registers::{FlagsRegister, Registers};
use crate::gb::{Bus, GBError, GBResult, utils};

mod instruction;
mod ops;
pub mod interrupt;
pub mod registers;
#[cfg(test)]
mod tests;

/// Tracks the one instruction delay of the EI instruction.
/// `Pending` is promoted to `Enabled` after the instruction
/// that follows EI has been executed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ImeState {
    #[default]
    Disabled,
    Pending,
    Enabled,
}

/// Implements the CPU for the GB (DMG-01),
/// the CPU is a Sharp LR35902 which is a subset of i8080 & Z80.
#[derive(Default)]
pub struct CPU {
    pub r: Registers,
    pub ime: ImeState,
    pub is_halted: bool,
    halt_bug: bool,
}

impl CPU {
    /// Creates a CPU with the register contents the boot ROM leaves behind.
    pub fn post_boot() -> Self {
        let mut r = Registers {
            a: 0x01,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ..Default::default()
        };
        r.f = FlagsRegister::from_bits_truncate(0xB0);
        Self {
            r,
            ime: ImeState::Disabled,
            is_halted: false,
            halt_bug: false,
        }
    }

    /// Executes one instruction and returns once it's complete.
    /// While halted this only burns one M-cycle and checks for a wake-up.
    pub fn step<T: Bus>(&mut self, bus: &mut T) -> GBResult<()> {
        if self.is_halted {
            bus.cycle();
            // The CPU always wakes from HALT once an interrupt is pending,
            // even with IME disabled. Dispatching is a separate concern.
            if bus.has_irq() {
                self.is_halted = false;
            }
            return Ok(());
        }

        let pending_ime = self.ime == ImeState::Pending;

        let start = self.r.pc;
        let opcode = bus.read(start);
        // The HALT bug suppresses one PC increment: the byte after HALT is
        // used as opcode and as first operand byte.
        let operand_address = match self.halt_bug {
            true => start,
            false => start.wrapping_add(1),
        };
        self.halt_bug = false;

        let (instruction, next_address) = Instruction::decode(opcode, operand_address, bus);
        let Some(instruction) = instruction else {
            return Err(GBError::IllegalOpcode { opcode, pc: start });
        };
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("{start:#06x}: {instruction}");
        }
        self.r.pc = next_address;
        self.execute(instruction, bus);

        // EI takes effect after the instruction that follows it
        if pending_ime && self.ime == ImeState::Pending {
            self.ime = ImeState::Enabled;
        }
        Ok(())
    }

    /// Executes the given instruction.
    /// Memory traffic advances the bus implicitly, handlers only charge
    /// the internal delay cycles of their instruction.
    fn execute<T: Bus>(&mut self, instruction: Instruction, bus: &mut T) {
        match instruction {
            Instruction::ADD(source) => self.handle_add(source, bus),
            Instruction::ADDHL(source) => self.handle_add_hl(source, bus),
            Instruction::ADDSP(offset) => self.handle_add_sp(offset, bus),
            Instruction::ADC(source) => self.handle_adc(source, bus),
            Instruction::AND(source) => self.handle_and(source, bus),
            Instruction::BIT(bit, target) => self.handle_bit(bit, target, bus),
            Instruction::CALL(condition, address) => self.handle_call(condition, address, bus),
            Instruction::CCF => self.handle_ccf(),
            Instruction::CP(source) => self.handle_cp(source, bus),
            Instruction::CPL => self.handle_cpl(),
            Instruction::DAA => self.handle_daa(),
            Instruction::DI => self.handle_di(),
            Instruction::DEC(target) => self.handle_dec_byte(target, bus),
            Instruction::DEC2(target) => self.handle_dec_word(target, bus),
            Instruction::EI => self.handle_ei(),
            Instruction::HALT => self.handle_halt(bus),
            Instruction::INC(target) => self.handle_inc_byte(target, bus),
            Instruction::INC2(target) => self.handle_inc_word(target, bus),
            Instruction::JR(condition, offset) => self.handle_jr(condition, offset, bus),
            Instruction::JP(condition, target) => self.handle_jp(condition, target, bus),
            Instruction::LD(load) => self.handle_ld(load, bus),
            Instruction::NOP => {}
            Instruction::OR(source) => self.handle_or(source, bus),
            Instruction::PUSH(target) => self.handle_push(target, bus),
            Instruction::POP(target) => self.handle_pop(target, bus),
            Instruction::RES(bit, target) => self.handle_res(bit, target, bus),
            Instruction::RET(condition) => self.handle_ret(condition, bus),
            Instruction::RETI => self.handle_reti(bus),
            Instruction::RL(target) => self.handle_rl(target, bus),
            Instruction::RLA => self.handle_rla(),
            Instruction::RLC(target) => self.handle_rlc(target, bus),
            Instruction::RLCA => self.handle_rlca(),
            Instruction::RR(target) => self.handle_rr(target, bus),
            Instruction::RRA => self.handle_rra(),
            Instruction::RRC(target) => self.handle_rrc(target, bus),
            Instruction::RRCA => self.handle_rrca(),
            Instruction::RST(code) => self.handle_rst(code, bus),
            Instruction::SBC(source) => self.handle_sbc(source, bus),
            Instruction::SCF => self.handle_scf(),
            Instruction::SET(bit, target) => self.handle_set(bit, target, bus),
            Instruction::SLA(target) => self.handle_sla(target, bus),
            Instruction::SRA(target) => self.handle_sra(target, bus),
            Instruction::SRL(target) => self.handle_srl(target, bus),
            Instruction::STOP => self.handle_stop(),
            Instruction::SUB(source) => self.handle_sub(source, bus),
            Instruction::SWAP(target) => self.handle_swap(target, bus),
            Instruction::XOR(source) => self.handle_xor(source, bus),
        }
    }

    /// Push a u16 value onto the stack, most significant byte first.
    pub fn push<T: Bus>(&mut self, value: u16, bus: &mut T) {
        self.r.sp = self.r.sp.wrapping_sub(1);
        bus.write(self.r.sp, (value >> 8) as u8);

        self.r.sp = self.r.sp.wrapping_sub(1);
        bus.write(self.r.sp, value as u8);
    }

    /// Pop a u16 value from the stack.
    fn pop<T: Bus>(&mut self, bus: &mut T) -> u16 {
        let lsb = bus.read(self.r.sp) as u16;
        self.r.sp = self.r.sp.wrapping_add(1);

        let msb = bus.read(self.r.sp) as u16;
        self.r.sp = self.r.sp.wrapping_add(1);

        msb << 8 | lsb
    }

    /// Handles ADD instructions
    fn handle_add<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        let (result, did_overflow) = self.r.a.overflowing_add(value);
        // Half Carry is set if adding the lower nibbles of the value and
        // register A together results in a carry from bit 3 to bit 4.
        self.r.f.update(
            result == 0,
            false,
            utils::half_carry_add(self.r.a, value),
            did_overflow,
        );
        self.r.a = result;
    }

    /// Handles ADD HL, nn instructions
    fn handle_add_hl<T: Bus>(&mut self, source: PairedRegister, bus: &mut T) {
        let value = source.read(self);
        let hl = self.r.get_hl();
        let (result, overflow) = hl.overflowing_add(value);

        // The zero flag is left untouched, half carry is the bit 11 carry
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(
            FlagsRegister::HALF_CARRY,
            (hl ^ value ^ result) & 0x1000 != 0,
        );
        self.r.f.set(FlagsRegister::CARRY, overflow);
        self.r.set_hl(result);
        bus.cycle();
    }

    /// Handles ADD SP, i8 instruction
    fn handle_add_sp<T: Bus>(&mut self, offset: i8, bus: &mut T) {
        let sp = self.r.sp as i32;
        let value = offset as i32;
        let result = sp.wrapping_add(value);
        self.r.sp = result as u16;

        // Carry and half carry are computed on the low byte
        let half_carry = (sp ^ value ^ result) & 0x10 != 0;
        let carry = (sp ^ value ^ result) & 0x100 != 0;
        self.r.f.update(false, false, half_carry, carry);
        bus.cycle();
        bus.cycle();
    }

    /// Handles ADC instructions
    fn handle_adc<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        let carry_in = self.r.f.contains(FlagsRegister::CARRY) as u8;
        let half_carry = (self.r.a & 0x0F) + (value & 0x0F) + carry_in > 0x0F;

        let (result, overflow) = self.r.a.overflowing_add(value);
        let mut carry = overflow;
        let (result, overflow) = result.overflowing_add(carry_in);
        carry |= overflow;
        self.r.f.update(result == 0, false, half_carry, carry);
        self.r.a = result;
    }

    /// Handles AND instructions
    fn handle_and<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        self.r.a &= value;
        self.r.f.update(self.r.a == 0, false, true, false);
    }

    /// Handles BIT instructions
    fn handle_bit<T: Bus>(&mut self, bit: u8, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        self.r.f.set(FlagsRegister::ZERO, !utils::bit(value, bit));
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, true);
    }

    /// Handles CALL instructions
    fn handle_call<T: Bus>(&mut self, condition: JumpCondition, address: u16, bus: &mut T) {
        if condition.resolve(self) {
            bus.cycle();
            self.push(self.r.pc, bus);
            self.r.pc = address;
        }
    }

    /// Handles CCF instruction
    fn handle_ccf(&mut self) {
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
        self.r.f.toggle(FlagsRegister::CARRY);
    }

    /// Handles CP instructions
    fn handle_cp<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        let result = u32::from(self.r.a).wrapping_sub(u32::from(value));

        self.r.f.update(
            result as u8 == 0,
            true,
            (self.r.a ^ value ^ result as u8) & 0x10 != 0,
            result & 0x100 != 0,
        );
    }

    /// Handles CPL instruction
    fn handle_cpl(&mut self) {
        self.r.a = !self.r.a;
        self.r.f.set(FlagsRegister::SUBTRACTION, true);
        self.r.f.set(FlagsRegister::HALF_CARRY, true);
    }

    /// Handles DAA instruction, the only instruction that meaningfully
    /// consults prior flag state to adjust A into a valid BCD value.
    fn handle_daa(&mut self) {
        if self.r.f.contains(FlagsRegister::SUBTRACTION) {
            if self.r.f.contains(FlagsRegister::CARRY) {
                self.r.a = self.r.a.wrapping_sub(0x60);
            }
            if self.r.f.contains(FlagsRegister::HALF_CARRY) {
                self.r.a = self.r.a.wrapping_sub(0x06);
            }
        } else {
            if self.r.f.contains(FlagsRegister::CARRY) || self.r.a > 0x99 {
                self.r.a = self.r.a.wrapping_add(0x60);
                self.r.f.insert(FlagsRegister::CARRY);
            }
            if self.r.f.contains(FlagsRegister::HALF_CARRY) || (self.r.a & 0x0F) > 0x09 {
                self.r.a = self.r.a.wrapping_add(0x06);
            }
        }
        self.r.f.set(FlagsRegister::ZERO, self.r.a == 0);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
    }

    /// Handles DI instruction, interrupt handling is disabled immediately.
    fn handle_di(&mut self) {
        self.ime = ImeState::Disabled;
    }

    /// Handles EI instruction, interrupt handling is enabled
    /// after the next instruction.
    fn handle_ei(&mut self) {
        if self.ime == ImeState::Disabled {
            self.ime = ImeState::Pending;
        }
    }

    /// Handles DEC instructions for bytes
    fn handle_dec_byte<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let result = value.wrapping_sub(1);
        target.write(self, bus, result);
        self.r
            .f
            .set(FlagsRegister::HALF_CARRY, value.trailing_zeros() >= 4);
        self.r.f.set(FlagsRegister::ZERO, result == 0);
        self.r.f.set(FlagsRegister::SUBTRACTION, true);
    }

    /// Handles DEC instructions for words
    fn handle_dec_word<T: Bus>(&mut self, target: PairedRegister, bus: &mut T) {
        let value = target.read(self);
        target.write(self, value.wrapping_sub(1));
        bus.cycle();
    }

    /// Handles HALT instruction.
    /// Entering HALT with IME disabled while an interrupt is already pending
    /// triggers the HALT bug: the CPU doesn't halt and the byte after HALT
    /// is executed twice.
    fn handle_halt<T: Bus>(&mut self, bus: &mut T) {
        if self.ime != ImeState::Enabled && bus.has_irq() {
            self.halt_bug = true;
        } else {
            self.is_halted = true;
        }
    }

    /// Handles INC instructions for bytes
    fn handle_inc_byte<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let result = value.wrapping_add(1);
        target.write(self, bus, result);
        self.r.f.set(FlagsRegister::HALF_CARRY, value & 0x0F == 0x0F);
        self.r.f.set(FlagsRegister::ZERO, result == 0);
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
    }

    /// Handles INC instructions for words
    fn handle_inc_word<T: Bus>(&mut self, target: PairedRegister, bus: &mut T) {
        let value = target.read(self);
        target.write(self, value.wrapping_add(1));
        bus.cycle();
    }

    /// Handles JR instructions
    fn handle_jr<T: Bus>(&mut self, condition: JumpCondition, offset: i8, bus: &mut T) {
        if condition.resolve(self) {
            bus.cycle();
            self.r.pc = self.r.pc.wrapping_add_signed(i16::from(offset));
        }
    }

    /// Handles JP instructions, a jump through HL has no internal delay.
    fn handle_jp<T: Bus>(&mut self, condition: JumpCondition, target: JumpTarget, bus: &mut T) {
        if condition.resolve(self) {
            if let JumpTarget::D16(_) = target {
                bus.cycle();
            }
            self.r.pc = target.read(self);
        }
    }

    /// Handles LD instructions
    fn handle_ld<T: Bus>(&mut self, load: Load, bus: &mut T) {
        match load {
            Load::Byte(target, source) => {
                let value = source.read(self, bus);
                target.write(self, bus, value);
            }
            Load::Word(target, source) => {
                let value = source.read(self);
                // Register to register word moves take an extra cycle
                if let WordSource::R(_) = source {
                    bus.cycle();
                }
                target.write(self, value);
            }
            Load::IndirectFrom(indirect, source) => {
                let value = source.read(self, bus);
                bus.write(indirect.resolve(self), value);
            }
            Load::HLIFromAInc => {
                let address = self.r.get_hl();
                bus.write(address, self.r.a);
                self.r.set_hl(address.wrapping_add(1));
            }
            Load::HLIFromADec => {
                let address = self.r.get_hl();
                bus.write(address, self.r.a);
                self.r.set_hl(address.wrapping_sub(1));
            }
            Load::HLIToAInc => {
                let address = self.r.get_hl();
                self.r.a = bus.read(address);
                self.r.set_hl(address.wrapping_add(1));
            }
            Load::HLIToADec => {
                let address = self.r.get_hl();
                self.r.a = bus.read(address);
                self.r.set_hl(address.wrapping_sub(1));
            }
            Load::IndirectFromSP(address) => {
                bus.write(address, self.r.sp as u8);
                bus.write(address.wrapping_add(1), (self.r.sp >> 8) as u8);
            }
            Load::HLFromSPi8(offset) => {
                let sp = self.r.sp as i32;
                let value = offset as i32;
                let result = sp.wrapping_add(value);

                let half_carry = (sp ^ value ^ result) & 0x10 != 0;
                let carry = (sp ^ value ^ result) & 0x100 != 0;
                self.r.f.update(false, false, half_carry, carry);
                self.r.set_hl(result as u16);
                bus.cycle();
            }
        }
    }

    /// Handles OR instructions
    fn handle_or<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        self.r.a |= value;
        self.r.f.update(self.r.a == 0, false, false, false);
    }

    /// Handles POP instruction
    fn handle_pop<T: Bus>(&mut self, target: PairedRegister, bus: &mut T) {
        let result = self.pop(bus);
        target.write(self, result);
    }

    /// Handles PUSH instruction
    fn handle_push<T: Bus>(&mut self, target: PairedRegister, bus: &mut T) {
        bus.cycle();
        let value = target.read(self);
        self.push(value, bus);
    }

    /// Handles RES instructions
    fn handle_res<T: Bus>(&mut self, bit: u8, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        target.write(self, bus, utils::with_bit(value, bit, false));
    }

    /// Handles RET instruction
    fn handle_ret<T: Bus>(&mut self, condition: JumpCondition, bus: &mut T) {
        if condition == JumpCondition::Always {
            self.r.pc = self.pop(bus);
            bus.cycle();
            return;
        }
        // The condition check itself costs one cycle
        bus.cycle();
        if condition.resolve(self) {
            self.r.pc = self.pop(bus);
            bus.cycle();
        }
    }

    /// Handles RETI instruction
    fn handle_reti<T: Bus>(&mut self, bus: &mut T) {
        self.r.pc = self.pop(bus);
        bus.cycle();
        self.ime = ImeState::Enabled;
    }

    /// Handles RL instructions
    /// Rotate n left through Carry flag.
    fn handle_rl<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x80 != 0;
        let result = value << 1 | self.r.f.contains(FlagsRegister::CARRY) as u8;
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles RLA instruction
    /// Rotate A left through carry, zero flag is always cleared.
    fn handle_rla(&mut self) {
        let carry = self.r.a & 0x80 != 0;
        self.r.a = self.r.a << 1 | self.r.f.contains(FlagsRegister::CARRY) as u8;
        self.r.f.update(false, false, false, carry);
    }

    /// Handles RLC instructions
    fn handle_rlc<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x80 != 0;
        let result = value.rotate_left(1);
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles RLCA instruction
    fn handle_rlca(&mut self) {
        let carry = self.r.a & 0x80 != 0;
        self.r.a = self.r.a.rotate_left(1);
        self.r.f.update(false, false, false, carry);
    }

    /// Handles RR instructions
    fn handle_rr<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x01 != 0;
        let result = value >> 1 | (self.r.f.contains(FlagsRegister::CARRY) as u8) << 7;
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles RRA instruction
    fn handle_rra(&mut self) {
        let carry = self.r.a & 0x01 != 0;
        self.r.a = self.r.a >> 1 | (self.r.f.contains(FlagsRegister::CARRY) as u8) << 7;
        self.r.f.update(false, false, false, carry);
    }

    /// Handles RRC instructions
    fn handle_rrc<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x01 != 0;
        let result = value.rotate_right(1);
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles RRCA instruction
    fn handle_rrca(&mut self) {
        let carry = self.r.a & 0x01 != 0;
        self.r.a = self.r.a.rotate_right(1);
        self.r.f.update(false, false, false, carry);
    }

    /// Handles RST instructions
    fn handle_rst<T: Bus>(&mut self, code: ResetCode, bus: &mut T) {
        bus.cycle();
        self.push(self.r.pc, bus);
        self.r.pc = code as u16;
    }

    /// Handles SBC instructions
    fn handle_sbc<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let a = self.r.a as u32;
        let value = source.read(self, bus) as u32;
        let carry_in = self.r.f.contains(FlagsRegister::CARRY) as u32;
        let result = a.wrapping_sub(value).wrapping_sub(carry_in);
        self.r.a = result as u8;
        self.r.f.update(
            result as u8 == 0,
            true,
            (a ^ value ^ result) & 0x10 != 0,
            result & 0x100 != 0,
        );
    }

    /// Handles SCF instruction
    fn handle_scf(&mut self) {
        self.r.f.set(FlagsRegister::SUBTRACTION, false);
        self.r.f.set(FlagsRegister::HALF_CARRY, false);
        self.r.f.set(FlagsRegister::CARRY, true);
    }

    /// Handles SET instructions
    fn handle_set<T: Bus>(&mut self, bit: u8, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        target.write(self, bus, utils::with_bit(value, bit, true));
    }

    /// Handles SLA instructions
    fn handle_sla<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x80 != 0;
        let result = value << 1;
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles SRA instructions, the most significant bit doesn't change.
    fn handle_sra<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x01 != 0;
        let result = value >> 1 | (value & 0x80);
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles SRL instructions
    fn handle_srl<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        let carry = value & 0x01 != 0;
        let result = value >> 1;
        self.r.f.update(result == 0, false, false, carry);
        target.write(self, bus, result);
    }

    /// Handles STOP instruction.
    /// The DMG has no speed switch, so this behaves like HALT and waits
    /// for the next interrupt.
    fn handle_stop(&mut self) {
        self.is_halted = true;
    }

    /// Handles SUB instructions
    fn handle_sub<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let a = u16::from(self.r.a);
        let value = u16::from(source.read(self, bus));
        let result = a.wrapping_sub(value);

        let carry_bits = a ^ value ^ result;
        self.r.f.update(
            result == 0,
            true,
            carry_bits & 0x10 != 0,
            carry_bits & 0x100 != 0,
        );
        self.r.a = result as u8;
    }

    /// Handles SWAP instructions, exchanges the two nibbles.
    fn handle_swap<T: Bus>(&mut self, target: ByteTarget, bus: &mut T) {
        let value = target.read(self, bus);
        self.r.f.update(value == 0, false, false, false);
        target.write(self, bus, value.rotate_right(4));
    }

    /// Handles XOR instructions
    fn handle_xor<T: Bus>(&mut self, source: ByteSource, bus: &mut T) {
        let value = source.read(self, bus);
        self.r.a ^= value;
        self.r.f.update(self.r.a == 0, false, false, false);
    }
}
