use super::Flags;

/// 65816 register file
///
/// Register widths are never cached: every accessor consults the current
/// status bits, and narrow writes leave the untouched half alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Registers {
    /// Program bank in bits 16-23
    pub program_counter: u32,
    pub register_a: u16,
    pub register_x: u16,
    pub register_y: u16,
    pub stack_pointer: u16,
    pub direct_page: u16,
    pub data_bank: u8,
    pub status: Flags,
}

/// `(value & mask) | (old & !mask)`
#[inline]
pub fn masked(old: u16, value: u16, mask: u16) -> u16 {
    (value & mask) | (old & !mask)
}

impl Registers {
    pub fn set_a(&mut self, value: u16, mask: u16) {
        self.register_a = masked(self.register_a, value, mask);
    }

    pub fn set_x(&mut self, value: u16, mask: u16) {
        self.register_x = masked(self.register_x, value, mask);
    }

    pub fn set_y(&mut self, value: u16, mask: u16) {
        self.register_y = masked(self.register_y, value, mask);
    }

    pub fn set_s(&mut self, value: u16, mask: u16) {
        self.stack_pointer = masked(self.stack_pointer, value, mask);
    }

    pub fn p(&self) -> u16 {
        self.status.bits()
    }

    pub fn set_p(&mut self, value: u16, mask: u16) {
        self.status = Flags::from_bits_retain(masked(self.status.bits(), value, mask));
    }

    pub fn set_program_counter(&mut self, value: u32, mask: u32) {
        self.program_counter = ((value & mask) | (self.program_counter & !mask)) & 0xFF_FFFF;
    }

    pub fn program_bank(&self) -> u8 {
        (self.program_counter >> 16) as u8
    }

    pub fn program_offset(&self) -> u16 {
        self.program_counter as u16
    }

    pub fn index_is_16bit(&self) -> bool {
        !self.status.contains(Flags::INDEX_8BIT)
    }

    pub fn memory_is_16bit(&self) -> bool {
        !self.status.contains(Flags::MEMORY_8BIT)
    }

    pub fn is_emulation(&self) -> bool {
        self.status.contains(Flags::EMULATION)
    }

    pub fn index_mask(&self) -> u16 {
        if self.index_is_16bit() { 0xFFFF } else { 0x00FF }
    }

    pub fn memory_mask(&self) -> u16 {
        if self.memory_is_16bit() { 0xFFFF } else { 0x00FF }
    }

    /// Re-establishes what the current mode bits imply
    ///
    /// Emulation mode pins M and X to 8-bit and the stack to page 1; an 8-bit
    /// index width clears the high bytes of X and Y.
    pub fn apply_mode_constraints(&mut self) {
        if self.is_emulation() {
            self.status.insert(Flags::MEMORY_8BIT | Flags::INDEX_8BIT);
            self.stack_pointer = 0x0100 | (self.stack_pointer & 0x00FF);
        }
        if !self.index_is_16bit() {
            self.register_x &= 0x00FF;
            self.register_y &= 0x00FF;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_low_byte_write_preserves_high_byte() {
        let mut regs = Registers::default();
        regs.register_a = 0xAB12;
        regs.set_a(0x0034, 0x00FF);
        assert_eq!(regs.register_a, 0xAB34);
    }

    #[test]
    fn test_set_p_keeps_emulation_bit_outside_mask() {
        let mut regs = Registers::default();
        regs.status = Flags::EMULATION | Flags::CARRY;
        regs.set_p(0x00, 0xFF);
        assert_eq!(regs.status, Flags::EMULATION);
    }

    #[test]
    fn test_program_counter_mask_keeps_bank() {
        let mut regs = Registers::default();
        regs.program_counter = 0x12_3456;
        regs.set_program_counter(0x99_8000, 0xFFFF);
        assert_eq!(regs.program_counter, 0x12_8000);
    }

    #[test]
    fn test_narrow_index_clears_high_bytes() {
        let mut regs = Registers::default();
        regs.register_x = 0x1234;
        regs.register_y = 0xABCD;
        regs.status = Flags::INDEX_8BIT;
        regs.apply_mode_constraints();
        assert_eq!(regs.register_x, 0x0034);
        assert_eq!(regs.register_y, 0x00CD);
    }

    #[test]
    fn test_emulation_pins_stack_to_page_one() {
        let mut regs = Registers::default();
        regs.stack_pointer = 0x1FF0;
        regs.status = Flags::EMULATION;
        regs.apply_mode_constraints();
        assert_eq!(regs.stack_pointer, 0x01F0);
        assert!(regs.status.contains(Flags::MEMORY_8BIT | Flags::INDEX_8BIT));
    }
}
