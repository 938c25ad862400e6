use super::opcodes::{AddressingMode, Opcode, OperandSize, Operation};
use super::{CPU, CpuError};
use crate::snes::bus::MemoryAccessType;

const ADDRESS_MASK: u32 = 0xFF_FFFF;

/// Resolved operand of the instruction being executed
#[derive(Debug, Clone, Copy)]
pub(super) struct Operand {
    pub operation: Operation,
    pub mode: AddressingMode,
    /// Effective address, when the mode produces one
    pub address: Option<u32>,
    /// Immediate, accumulator, or loaded value
    pub value: u16,
    pub wide: bool,
    pub kind: MemoryAccessType,
}

impl Operand {
    pub fn mask(&self) -> u16 {
        if self.wide { 0xFFFF } else { 0x00FF }
    }

    pub fn is_accumulator(&self) -> bool {
        self.mode == AddressingMode::Accumulator
    }

    pub fn effective_address(&self, pc: u32) -> Result<u32, CpuError> {
        self.address.ok_or(CpuError::UnsupportedAddressingMode {
            operation: self.operation,
            mode: self.mode,
            pc,
        })
    }
}

/// Jumps take their bank from PB rather than DB
fn uses_program_bank(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::Jmp | Operation::Jml | Operation::Jsr | Operation::Jsl
    )
}

impl CPU {
    pub(super) fn operand_is_wide(&self, size: OperandSize) -> bool {
        match size {
            OperandSize::Small => false,
            OperandSize::Wide => true,
            OperandSize::Memory => self.registers.memory_is_16bit(),
            OperandSize::Index => self.registers.index_is_16bit(),
        }
    }

    fn data_bank_address(&self, offset: u16) -> u32 {
        ((self.registers.data_bank as u32) << 16) | offset as u32
    }

    fn program_bank_address(&self, offset: u16) -> u32 {
        ((self.registers.program_bank() as u32) << 16) | offset as u32
    }

    /// Direct page offset, wrapping inside bank 0
    fn direct_page_address(&self, offset: u8, index: u16) -> u32 {
        self.registers
            .direct_page
            .wrapping_add(offset as u16)
            .wrapping_add(index) as u32
    }

    fn indirect_word(&mut self, pointer: u32) -> u16 {
        self.context.indirect_pointer = Some(pointer);
        self.read_word(pointer, MemoryAccessType::FetchIndirect)
    }

    fn indirect_long(&mut self, pointer: u32) -> u32 {
        self.context.indirect_pointer = Some(pointer);
        self.read_long(pointer, MemoryAccessType::FetchIndirect)
    }

    /// Fetches operand bytes and computes the effective address or immediate value
    ///
    /// Loads the operand from memory when the decode entry asks for it.
    pub(super) fn resolve_operand(&mut self, opcode: &Opcode) -> Operand {
        let wide = self.operand_is_wide(opcode.size);
        let index_mask = self.registers.index_mask();
        let mut operand = Operand {
            operation: opcode.operation,
            mode: opcode.mode,
            address: None,
            value: 0,
            wide,
            kind: MemoryAccessType::Random,
        };

        let address = match opcode.mode {
            AddressingMode::Implied => None,
            AddressingMode::Accumulator => {
                operand.value = self.registers.register_a & operand.mask();
                None
            }
            AddressingMode::ImmediateMemory => {
                let wide = self.registers.memory_is_16bit();
                operand.value = if wide { self.fetch_word() } else { self.fetch_byte() as u16 };
                None
            }
            AddressingMode::ImmediateIndex => {
                let wide = self.registers.index_is_16bit();
                operand.value = if wide { self.fetch_word() } else { self.fetch_byte() as u16 };
                None
            }
            AddressingMode::Absolute => {
                let offset = self.fetch_word();
                if uses_program_bank(opcode.operation) {
                    Some(self.program_bank_address(offset))
                } else {
                    Some(self.data_bank_address(offset))
                }
            }
            AddressingMode::AbsoluteIndexedX => {
                let offset = self.fetch_word();
                let base = self.data_bank_address(offset);
                let x = self.x(index_mask) as u32;
                Some((base + x) & ADDRESS_MASK)
            }
            AddressingMode::AbsoluteIndexedY => {
                let offset = self.fetch_word();
                let base = self.data_bank_address(offset);
                let y = self.y(index_mask) as u32;
                Some((base + y) & ADDRESS_MASK)
            }
            AddressingMode::AbsoluteLong => Some(self.fetch_long()),
            AddressingMode::AbsoluteLongIndexedX => {
                let base = self.fetch_long();
                let x = self.x(index_mask) as u32;
                Some((base + x) & ADDRESS_MASK)
            }
            AddressingMode::AbsoluteIndirect => {
                let pointer = self.fetch_word() as u32;
                let target = self.indirect_word(pointer);
                Some(self.program_bank_address(target))
            }
            AddressingMode::AbsoluteIndirectLong => {
                let pointer = self.fetch_word() as u32;
                Some(self.indirect_long(pointer))
            }
            AddressingMode::AbsoluteIndexedXIndirect => {
                let offset = self.fetch_word().wrapping_add(self.x(index_mask));
                let pointer = self.program_bank_address(offset);
                let target = self.indirect_word(pointer);
                Some(self.program_bank_address(target))
            }
            AddressingMode::DirectPage => {
                let offset = self.fetch_byte();
                Some(self.direct_page_address(offset, 0))
            }
            AddressingMode::DirectPageIndexedX => {
                let offset = self.fetch_byte();
                let x = self.x(index_mask);
                Some(self.direct_page_address(offset, x))
            }
            AddressingMode::DirectPageIndexedY => {
                let offset = self.fetch_byte();
                let y = self.y(index_mask);
                Some(self.direct_page_address(offset, y))
            }
            AddressingMode::DirectPageIndirect => {
                let offset = self.fetch_byte();
                let pointer = self.direct_page_address(offset, 0);
                let target = self.indirect_word(pointer);
                Some(self.data_bank_address(target))
            }
            AddressingMode::DirectPageIndirectLong => {
                let offset = self.fetch_byte();
                let pointer = self.direct_page_address(offset, 0);
                Some(self.indirect_long(pointer))
            }
            AddressingMode::DirectPageIndexedXIndirect => {
                let offset = self.fetch_byte();
                let x = self.x(index_mask);
                let pointer = self.direct_page_address(offset, x);
                let target = self.indirect_word(pointer);
                Some(self.data_bank_address(target))
            }
            AddressingMode::DirectPageIndirectIndexedY => {
                let offset = self.fetch_byte();
                let pointer = self.direct_page_address(offset, 0);
                let target = self.indirect_word(pointer);
                let base = self.data_bank_address(target);
                let y = self.y(index_mask) as u32;
                Some((base + y) & ADDRESS_MASK)
            }
            AddressingMode::DirectPageIndirectLongIndexedY => {
                let offset = self.fetch_byte();
                let pointer = self.direct_page_address(offset, 0);
                let base = self.indirect_long(pointer);
                let y = self.y(index_mask) as u32;
                Some((base + y) & ADDRESS_MASK)
            }
            AddressingMode::StackRelative => {
                let offset = self.fetch_byte();
                operand.kind = MemoryAccessType::StackRelative;
                Some(self.registers.stack_pointer.wrapping_add(offset as u16) as u32)
            }
            AddressingMode::StackRelativeIndirectIndexedY => {
                let offset = self.fetch_byte();
                let pointer = self.registers.stack_pointer.wrapping_add(offset as u16) as u32;
                let target = self.indirect_word(pointer);
                let base = self.data_bank_address(target);
                let y = self.y(index_mask) as u32;
                Some((base + y) & ADDRESS_MASK)
            }
            AddressingMode::Branch8 => {
                let displacement = self.fetch_byte() as i8 as i16;
                let target = self.registers.program_offset().wrapping_add_signed(displacement);
                Some(self.program_bank_address(target))
            }
            AddressingMode::Branch16 => {
                let displacement = self.fetch_word() as i16;
                let target = self.registers.program_offset().wrapping_add_signed(displacement);
                Some(self.program_bank_address(target))
            }
        };
        operand.address = address;

        if opcode.load_operand {
            if let Some(address) = address {
                operand.value = self.read_value(address, wide, operand.kind);
            }
        }
        operand
    }
}
