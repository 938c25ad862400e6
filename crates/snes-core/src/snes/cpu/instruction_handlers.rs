use super::addressing::Operand;
use super::interrupts;
use super::{CPU, CpuError, Event, Flags};

type Handled = Result<(), CpuError>;

fn sign_bit(wide: bool) -> u16 {
    if wide { 0x8000 } else { 0x0080 }
}

fn width_mask(wide: bool) -> u16 {
    if wide { 0xFFFF } else { 0x00FF }
}

/// Packed BCD (four digits) to binary
pub fn bcd_to_uint(value: u16) -> u32 {
    (0..4).fold(0, |acc, digit| {
        let nibble = ((value >> (12 - digit * 4)) & 0xF) as u32;
        acc * 10 + nibble
    })
}

/// Binary to packed BCD, keeping the four lowest decimal digits
pub fn uint_to_bcd(value: u32) -> u16 {
    let mut value = value;
    let mut result = 0u16;
    for digit in 0..4 {
        result |= ((value % 10) as u16) << (digit * 4);
        value /= 10;
    }
    result
}

impl CPU {
    /// Sets N and Z from `value` at the given width and hands it back
    fn set_nz(&mut self, value: u16, wide: bool) -> u16 {
        let value = value & width_mask(wide);
        self.registers.status.set(Flags::ZERO, value == 0);
        self.registers.status.set(Flags::NEGATIVE, value & sign_bit(wide) != 0);
        value
    }

    fn carry(&self) -> u16 {
        self.registers.status.contains(Flags::CARRY) as u16
    }

    fn jump(&mut self, target: u32, mask: u32, event: Event) {
        self.registers.set_program_counter(target, mask);
        self.event = event;
    }

    /// Stores a read-modify-write result into A or back to memory
    fn write_back(&mut self, operand: &Operand, value: u16) -> Handled {
        if operand.is_accumulator() {
            self.registers.set_a(value, operand.mask());
        } else {
            let address = operand.effective_address(self.context.pc_before)?;
            self.write_value(address, value, operand.wide, operand.kind);
        }
        Ok(())
    }

    //
    // Arithmetic
    /////////////

    pub(super) fn adc(&mut self, operand: &Operand) {
        if self.registers.status.contains(Flags::DECIMAL_MODE) {
            self.adc_decimal(operand);
        } else {
            self.adc_binary(operand);
        }
    }

    fn adc_binary(&mut self, operand: &Operand) {
        let wide = operand.wide;
        let mask = operand.mask() as u32;
        let a = self.registers.register_a as u32 & mask;
        let value = operand.value as u32 & mask;
        let sum = a + value + self.carry() as u32;
        let sign = sign_bit(wide) as u32;

        self.registers.status.set(Flags::CARRY, sum > mask);
        self.registers
            .status
            .set(Flags::OVERFLOW, (!(a ^ value) & (value ^ sum)) & sign != 0);
        let result = self.set_nz(sum as u16, wide);
        self.registers.set_a(result, operand.mask());
    }

    /// Decimal mode: digits are added in binary and re-encoded; V is left clear
    fn adc_decimal(&mut self, operand: &Operand) {
        let wide = operand.wide;
        let a = bcd_to_uint(self.registers.register_a & operand.mask());
        let value = bcd_to_uint(operand.value & operand.mask());
        let sum = a + value + self.carry() as u32;
        let result = uint_to_bcd(sum);

        let carry_limit = if wide { 0x10000 } else { 0x100 };
        self.registers.status.set(Flags::CARRY, sum >= carry_limit);
        self.registers.status.remove(Flags::OVERFLOW);
        let result = self.set_nz(result, wide);
        self.registers.set_a(result, operand.mask());
    }

    pub(super) fn sbc(&mut self, operand: &Operand) {
        if self.registers.status.contains(Flags::DECIMAL_MODE) {
            self.sbc_decimal(operand);
        } else {
            self.sbc_binary(operand);
        }
    }

    fn sbc_binary(&mut self, operand: &Operand) {
        let wide = operand.wide;
        let a = self.registers.register_a & operand.mask();
        let value = operand.value & operand.mask();
        let borrow = 1 - self.carry() as i32;
        let signed = a as i32 - value as i32 - borrow;
        let result = signed as u16 & operand.mask();

        self.registers.status.set(Flags::CARRY, signed >= 0);
        self.registers
            .status
            .set(Flags::OVERFLOW, (a ^ value) & (a ^ result) & sign_bit(wide) != 0);
        let result = self.set_nz(result, wide);
        self.registers.set_a(result, operand.mask());
    }

    /// Ten's complement on the decimal values; V is left clear
    fn sbc_decimal(&mut self, operand: &Operand) {
        let wide = operand.wide;
        let modulus: i32 = if wide { 10_000 } else { 100 };
        let a = bcd_to_uint(self.registers.register_a & operand.mask()) as i32;
        let value = bcd_to_uint(operand.value & operand.mask()) as i32;
        let borrow = 1 - self.carry() as i32;
        let difference = a - value - borrow;

        self.registers.status.set(Flags::CARRY, difference >= 0);
        self.registers.status.remove(Flags::OVERFLOW);
        let result = uint_to_bcd(difference.rem_euclid(modulus) as u32);
        let result = self.set_nz(result, wide);
        self.registers.set_a(result, operand.mask());
    }

    //
    // Logic
    ////////

    pub(super) fn and(&mut self, operand: &Operand) {
        let result = self.registers.register_a & operand.value;
        let result = self.set_nz(result, operand.wide);
        self.registers.set_a(result, operand.mask());
    }

    pub(super) fn ora(&mut self, operand: &Operand) {
        let result = self.registers.register_a | operand.value;
        let result = self.set_nz(result, operand.wide);
        self.registers.set_a(result, operand.mask());
    }

    pub(super) fn eor(&mut self, operand: &Operand) {
        let result = self.registers.register_a ^ operand.value;
        let result = self.set_nz(result, operand.wide);
        self.registers.set_a(result, operand.mask());
    }

    /// Immediate BIT only touches Z
    pub(super) fn bit(&mut self, operand: &Operand) {
        let wide = operand.wide;
        let value = operand.value & operand.mask();
        let result = self.registers.register_a & value;
        self.registers.status.set(Flags::ZERO, result & operand.mask() == 0);
        if operand.address.is_some() {
            self.registers
                .status
                .set(Flags::NEGATIVE, value & sign_bit(wide) != 0);
            self.registers
                .status
                .set(Flags::OVERFLOW, value & (sign_bit(wide) >> 1) != 0);
        }
    }

    fn compare(&mut self, register: u16, operand: &Operand) {
        let wide = operand.wide;
        let register = register & operand.mask();
        let value = operand.value & operand.mask();
        self.registers.status.set(Flags::ZERO, register == value);
        self.registers.status.set(Flags::CARRY, register >= value);
        let difference = register.wrapping_sub(value);
        self.registers
            .status
            .set(Flags::NEGATIVE, difference & sign_bit(wide) != 0);
    }

    pub(super) fn cmp(&mut self, operand: &Operand) {
        self.compare(self.registers.register_a, operand);
    }

    pub(super) fn cpx(&mut self, operand: &Operand) {
        let x = self.x(operand.mask());
        self.compare(x, operand);
    }

    pub(super) fn cpy(&mut self, operand: &Operand) {
        let y = self.y(operand.mask());
        self.compare(y, operand);
    }

    pub(super) fn tsb(&mut self, operand: &Operand) -> Handled {
        let a = self.registers.register_a & operand.mask();
        self.registers
            .status
            .set(Flags::ZERO, a & operand.value == 0);
        self.write_back(operand, operand.value | a)
    }

    pub(super) fn trb(&mut self, operand: &Operand) -> Handled {
        let a = self.registers.register_a & operand.mask();
        self.registers
            .status
            .set(Flags::ZERO, a & operand.value == 0);
        self.write_back(operand, operand.value & !a)
    }

    //
    // Read-modify-write
    ////////////////////

    pub(super) fn inc(&mut self, operand: &Operand) -> Handled {
        let result = self.set_nz(operand.value.wrapping_add(1), operand.wide);
        self.write_back(operand, result)
    }

    pub(super) fn dec(&mut self, operand: &Operand) -> Handled {
        let result = self.set_nz(operand.value.wrapping_sub(1), operand.wide);
        self.write_back(operand, result)
    }

    fn shift(&mut self, operand: &Operand, left: bool, rotate: bool) -> Handled {
        let wide = operand.wide;
        let value = operand.value & operand.mask();
        let shift_in = if rotate { self.carry() } else { 0 };
        let (carry_out, result) = if left {
            (value & sign_bit(wide) != 0, (value << 1) | shift_in)
        } else {
            let top = if wide { 15 } else { 7 };
            (value & 1 != 0, (value >> 1) | (shift_in << top))
        };
        self.registers.status.set(Flags::CARRY, carry_out);
        let result = self.set_nz(result, wide);
        self.write_back(operand, result)
    }

    pub(super) fn asl(&mut self, operand: &Operand) -> Handled {
        self.shift(operand, true, false)
    }

    pub(super) fn lsr(&mut self, operand: &Operand) -> Handled {
        self.shift(operand, false, false)
    }

    pub(super) fn rol(&mut self, operand: &Operand) -> Handled {
        self.shift(operand, true, true)
    }

    pub(super) fn ror(&mut self, operand: &Operand) -> Handled {
        self.shift(operand, false, true)
    }

    pub(super) fn inx(&mut self) {
        let wide = self.registers.index_is_16bit();
        let x = self.x(width_mask(wide));
        let result = self.set_nz(x.wrapping_add(1), wide);
        self.registers.set_x(result, width_mask(wide));
    }

    pub(super) fn iny(&mut self) {
        let wide = self.registers.index_is_16bit();
        let y = self.y(width_mask(wide));
        let result = self.set_nz(y.wrapping_add(1), wide);
        self.registers.set_y(result, width_mask(wide));
    }

    pub(super) fn dex(&mut self) {
        let wide = self.registers.index_is_16bit();
        let x = self.x(width_mask(wide));
        let result = self.set_nz(x.wrapping_sub(1), wide);
        self.registers.set_x(result, width_mask(wide));
    }

    pub(super) fn dey(&mut self) {
        let wide = self.registers.index_is_16bit();
        let y = self.y(width_mask(wide));
        let result = self.set_nz(y.wrapping_sub(1), wide);
        self.registers.set_y(result, width_mask(wide));
    }

    //
    // Loads and stores
    ///////////////////

    pub(super) fn lda(&mut self, operand: &Operand) {
        let value = self.set_nz(operand.value, operand.wide);
        self.registers.set_a(value, operand.mask());
    }

    pub(super) fn ldx(&mut self, operand: &Operand) {
        let value = self.set_nz(operand.value, operand.wide);
        self.registers.set_x(value, operand.mask());
    }

    pub(super) fn ldy(&mut self, operand: &Operand) {
        let value = self.set_nz(operand.value, operand.wide);
        self.registers.set_y(value, operand.mask());
    }

    fn store(&mut self, operand: &Operand, value: u16) -> Handled {
        let address = operand.effective_address(self.context.pc_before)?;
        self.write_value(address, value, operand.wide, operand.kind);
        Ok(())
    }

    pub(super) fn sta(&mut self, operand: &Operand) -> Handled {
        self.store(operand, self.registers.register_a)
    }

    pub(super) fn stx(&mut self, operand: &Operand) -> Handled {
        let x = self.x(operand.mask());
        self.store(operand, x)
    }

    pub(super) fn sty(&mut self, operand: &Operand) -> Handled {
        let y = self.y(operand.mask());
        self.store(operand, y)
    }

    pub(super) fn stz(&mut self, operand: &Operand) -> Handled {
        self.store(operand, 0)
    }

    //
    // Branches
    ///////////

    fn branch_if(&mut self, operand: &Operand, condition: bool) -> Handled {
        let target = operand.effective_address(self.context.pc_before)?;
        if condition {
            self.jump(target, 0xFFFF, Event::Branch);
        }
        Ok(())
    }

    pub(super) fn bcc(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, !self.registers.status.contains(Flags::CARRY))
    }

    pub(super) fn bcs(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, self.registers.status.contains(Flags::CARRY))
    }

    pub(super) fn beq(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, self.registers.status.contains(Flags::ZERO))
    }

    pub(super) fn bne(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, !self.registers.status.contains(Flags::ZERO))
    }

    pub(super) fn bmi(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, self.registers.status.contains(Flags::NEGATIVE))
    }

    pub(super) fn bpl(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, !self.registers.status.contains(Flags::NEGATIVE))
    }

    pub(super) fn bvc(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, !self.registers.status.contains(Flags::OVERFLOW))
    }

    pub(super) fn bvs(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, self.registers.status.contains(Flags::OVERFLOW))
    }

    /// BRA and BRL
    pub(super) fn bra(&mut self, operand: &Operand) -> Handled {
        self.branch_if(operand, true)
    }

    //
    // Jumps, calls and returns
    ///////////////////////////

    /// Never leaves the current bank
    pub(super) fn jmp(&mut self, operand: &Operand) -> Handled {
        let target = operand.effective_address(self.context.pc_before)?;
        self.jump(target, 0xFFFF, Event::JmpOrJml);
        Ok(())
    }

    pub(super) fn jml(&mut self, operand: &Operand) -> Handled {
        let target = operand.effective_address(self.context.pc_before)?;
        self.jump(target, 0xFF_FFFF, Event::JmpOrJml);
        Ok(())
    }

    /// Pushes the address of the last operand byte
    pub(super) fn jsr(&mut self, operand: &Operand) -> Handled {
        let target = operand.effective_address(self.context.pc_before)?;
        let return_offset = self.registers.program_offset().wrapping_sub(1);
        self.push_word(return_offset);
        self.jump(target, 0xFFFF, Event::JsrOrJsl);
        Ok(())
    }

    pub(super) fn jsl(&mut self, operand: &Operand) -> Handled {
        let target = operand.effective_address(self.context.pc_before)?;
        let bank = (self.registers.program_bank() as u32) << 16;
        let return_offset = self.registers.program_offset().wrapping_sub(1);
        self.push_long(bank | return_offset as u32);
        self.jump(target, 0xFF_FFFF, Event::JsrOrJsl);
        Ok(())
    }

    pub(super) fn rts(&mut self) {
        let target = self.pop_word().wrapping_add(1);
        self.jump(target as u32, 0xFFFF, Event::RtsOrRtl);
    }

    pub(super) fn rtl(&mut self) {
        let pulled = self.pop_long();
        let offset = (pulled as u16).wrapping_add(1);
        self.jump((pulled & 0xFF_0000) | offset as u32, 0xFF_FFFF, Event::RtsOrRtl);
    }

    /// Emulation mode pulls no program bank and keeps M and X forced
    pub(super) fn rti(&mut self) {
        let (frame, mask) = if self.registers.is_emulation() {
            (self.pop_long(), 0xFFFF)
        } else {
            (self.pop_dword(), 0xFF_FFFF)
        };
        self.registers.set_p(frame as u16, 0x00FF);
        self.registers.apply_mode_constraints();
        self.jump(frame >> 8, mask, Event::Rti);
    }

    /// The signature byte after BRK/COP is skipped on return
    pub(super) fn brk(&mut self) {
        let return_offset = self.registers.program_offset().wrapping_add(1);
        self.enter_interrupt(interrupts::BRK, return_offset);
    }

    pub(super) fn cop(&mut self) {
        let return_offset = self.registers.program_offset().wrapping_add(1);
        self.enter_interrupt(interrupts::COP, return_offset);
    }

    //
    // Status flags
    ///////////////

    pub(super) fn clc(&mut self) {
        self.registers.status.remove(Flags::CARRY);
    }

    pub(super) fn cld(&mut self) {
        self.registers.status.remove(Flags::DECIMAL_MODE);
    }

    pub(super) fn cli(&mut self) {
        self.registers.status.remove(Flags::INTERRUPT_DISABLE);
    }

    pub(super) fn clv(&mut self) {
        self.registers.status.remove(Flags::OVERFLOW);
    }

    pub(super) fn sec(&mut self) {
        self.registers.status.insert(Flags::CARRY);
    }

    pub(super) fn sed(&mut self) {
        self.registers.status.insert(Flags::DECIMAL_MODE);
    }

    pub(super) fn sei(&mut self) {
        self.registers.status.insert(Flags::INTERRUPT_DISABLE);
    }

    pub(super) fn sep(&mut self) {
        let bits = self.fetch_byte() as u16;
        self.registers.set_p(0xFFFF, bits);
        self.registers.apply_mode_constraints();
    }

    pub(super) fn rep(&mut self) {
        let bits = self.fetch_byte() as u16;
        self.registers.set_p(0x0000, bits);
        self.registers.apply_mode_constraints();
    }

    /// Swaps carry and emulation
    pub(super) fn xce(&mut self) {
        let carry = self.registers.status.contains(Flags::CARRY);
        let emulation = self.registers.is_emulation();
        self.registers.status.set(Flags::CARRY, emulation);
        self.registers.status.set(Flags::EMULATION, carry);
        self.registers.apply_mode_constraints();
    }

    //
    // Transfers
    ////////////

    pub(super) fn tax(&mut self) {
        let wide = self.registers.index_is_16bit();
        let value = self.set_nz(self.registers.register_a, wide);
        self.registers.set_x(value, width_mask(wide));
    }

    pub(super) fn tay(&mut self) {
        let wide = self.registers.index_is_16bit();
        let value = self.set_nz(self.registers.register_a, wide);
        self.registers.set_y(value, width_mask(wide));
    }

    pub(super) fn txa(&mut self) {
        let wide = self.registers.memory_is_16bit();
        let x = self.x(width_mask(wide));
        let value = self.set_nz(x, wide);
        self.registers.set_a(value, width_mask(wide));
    }

    pub(super) fn tya(&mut self) {
        let wide = self.registers.memory_is_16bit();
        let y = self.y(width_mask(wide));
        let value = self.set_nz(y, wide);
        self.registers.set_a(value, width_mask(wide));
    }

    pub(super) fn txy(&mut self) {
        let wide = self.registers.index_is_16bit();
        let x = self.x(width_mask(wide));
        let value = self.set_nz(x, wide);
        self.registers.set_y(value, width_mask(wide));
    }

    pub(super) fn tyx(&mut self) {
        let wide = self.registers.index_is_16bit();
        let y = self.y(width_mask(wide));
        let value = self.set_nz(y, wide);
        self.registers.set_x(value, width_mask(wide));
    }

    pub(super) fn tsx(&mut self) {
        let wide = self.registers.index_is_16bit();
        let value = self.set_nz(self.registers.stack_pointer, wide);
        self.registers.set_x(value, width_mask(wide));
    }

    /// No flags
    pub(super) fn txs(&mut self) {
        let x = self.x(0xFFFF);
        self.set_stack_pointer(x);
    }

    pub(super) fn tcd(&mut self) {
        self.registers.direct_page = self.set_nz(self.registers.register_a, true);
    }

    pub(super) fn tdc(&mut self) {
        self.registers.register_a = self.set_nz(self.registers.direct_page, true);
    }

    /// No flags
    pub(super) fn tcs(&mut self) {
        self.set_stack_pointer(self.registers.register_a);
    }

    pub(super) fn tsc(&mut self) {
        self.registers.register_a = self.set_nz(self.registers.stack_pointer, true);
    }

    /// Swaps the accumulator halves whatever M says; flags follow the new low byte
    pub(super) fn xba(&mut self) {
        let swapped = self.registers.register_a.rotate_left(8);
        self.registers.register_a = swapped;
        self.set_nz(swapped, false);
    }

    //
    // Stack
    ////////

    pub(super) fn pha(&mut self) {
        let wide = self.registers.memory_is_16bit();
        self.push_value(self.registers.register_a, wide);
    }

    pub(super) fn phb(&mut self) {
        self.push_byte(self.registers.data_bank);
    }

    pub(super) fn phd(&mut self) {
        self.push_word(self.registers.direct_page);
    }

    pub(super) fn phk(&mut self) {
        self.push_byte(self.registers.program_bank());
    }

    pub(super) fn php(&mut self) {
        self.push_byte(self.registers.p() as u8);
    }

    pub(super) fn phx(&mut self) {
        let wide = self.registers.index_is_16bit();
        let x = self.x(width_mask(wide));
        self.push_value(x, wide);
    }

    pub(super) fn phy(&mut self) {
        let wide = self.registers.index_is_16bit();
        let y = self.y(width_mask(wide));
        self.push_value(y, wide);
    }

    pub(super) fn pla(&mut self) {
        let wide = self.registers.memory_is_16bit();
        let pulled = self.pop_value(wide);
        let value = self.set_nz(pulled, wide);
        self.registers.set_a(value, width_mask(wide));
    }

    pub(super) fn plb(&mut self) {
        let pulled = self.pop_byte();
        self.registers.data_bank = self.set_nz(pulled as u16, false) as u8;
    }

    pub(super) fn pld(&mut self) {
        let pulled = self.pop_word();
        self.registers.direct_page = self.set_nz(pulled, true);
    }

    pub(super) fn plp(&mut self) {
        let pulled = self.pop_byte();
        self.registers.set_p(pulled as u16, 0x00FF);
        self.registers.apply_mode_constraints();
    }

    pub(super) fn plx(&mut self) {
        let wide = self.registers.index_is_16bit();
        let pulled = self.pop_value(wide);
        let value = self.set_nz(pulled, wide);
        self.registers.set_x(value, width_mask(wide));
    }

    pub(super) fn ply(&mut self) {
        let wide = self.registers.index_is_16bit();
        let pulled = self.pop_value(wide);
        let value = self.set_nz(pulled, wide);
        self.registers.set_y(value, width_mask(wide));
    }

    pub(super) fn pea(&mut self) {
        let value = self.fetch_word();
        self.push_word(value);
    }

    /// Pushes the word found at a direct page address (bank 0)
    pub(super) fn pei(&mut self) {
        let offset = self.fetch_byte();
        let pointer = self.registers.direct_page.wrapping_add(offset as u16) as u32;
        let value = self.read_word(pointer, crate::snes::bus::MemoryAccessType::Random);
        self.push_word(value);
    }

    /// Pushes PC-relative address: end of this instruction plus displacement
    pub(super) fn per(&mut self) {
        let displacement = self.fetch_word();
        let value = self.registers.program_offset().wrapping_add(displacement);
        self.push_word(value);
    }

    /// Reserved; skips its signature byte
    pub(super) fn wdm(&mut self) {
        self.fetch_byte();
    }
}
