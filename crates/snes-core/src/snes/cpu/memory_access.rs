use super::CPU;
use crate::snes::bus::memory::Memory;
use crate::snes::bus::{MemoryAccess, MemoryAccessType, MemoryObserver};

const ADDRESS_MASK: u32 = 0xFF_FFFF;

impl CPU {
    pub fn attach_observer(&mut self, observer: Box<dyn MemoryObserver>) {
        self.observer = Some(observer);
    }

    pub fn detach_observer(&mut self) -> Option<Box<dyn MemoryObserver>> {
        self.observer.take()
    }

    pub(crate) fn observer_mut(&mut self) -> Option<&mut Box<dyn MemoryObserver>> {
        if self.observers_suppressed {
            return None;
        }
        self.observer.as_mut()
    }

    /// Observers see nothing while suppressed (NMI entry)
    pub(crate) fn suppress_observers(&mut self, suppressed: bool) {
        self.observers_suppressed = suppressed;
    }

    fn notify(&mut self, is_write: bool, address: u32, remapped: u32, value: u32, bytes: u8, kind: MemoryAccessType) {
        let pc = self.context.pc_before;
        if let Some(observer) = self.observer_mut() {
            let access = MemoryAccess {
                pc,
                address,
                remapped,
                value,
                bytes,
                kind,
            };
            if is_write {
                observer.on_write(&access);
            } else {
                observer.on_read(&access);
            }
        }
    }

    //
    // Classified reads
    ///////////////////

    pub fn read(&mut self, address: u32, bytes: u8, kind: MemoryAccessType) -> u32 {
        let address = address & ADDRESS_MASK;
        let (remapped, value) = self.memory.read(address, bytes);
        self.notify(false, address, remapped, value, bytes, kind);
        value
    }

    pub fn read_byte(&mut self, address: u32, kind: MemoryAccessType) -> u8 {
        self.read(address, 1, kind) as u8
    }

    pub fn read_word(&mut self, address: u32, kind: MemoryAccessType) -> u16 {
        self.read(address, 2, kind) as u16
    }

    pub fn read_long(&mut self, address: u32, kind: MemoryAccessType) -> u32 {
        self.read(address, 3, kind)
    }

    pub fn read_dword(&mut self, address: u32, kind: MemoryAccessType) -> u32 {
        self.read(address, 4, kind)
    }

    //
    // Classified writes
    ////////////////////

    /// Stores through the write rules, then notifies, then runs any DMA the store started
    pub fn write(&mut self, address: u32, value: u32, bytes: u8, kind: MemoryAccessType) {
        let address = address & ADDRESS_MASK;
        let outcome = self.memory.write(address, value, bytes);
        self.notify(true, address, outcome.remapped, value, bytes, kind);
        if let Some(channels) = outcome.dma_channels {
            self.execute_dma(channels);
        }
    }

    pub fn write_byte(&mut self, address: u32, value: u8, kind: MemoryAccessType) {
        self.write(address, value as u32, 1, kind);
    }

    pub fn write_word(&mut self, address: u32, value: u16, kind: MemoryAccessType) {
        self.write(address, value as u32, 2, kind);
    }

    pub fn write_long(&mut self, address: u32, value: u32, kind: MemoryAccessType) {
        self.write(address, value & 0xFF_FFFF, 3, kind);
    }

    pub fn write_dword(&mut self, address: u32, value: u32, kind: MemoryAccessType) {
        self.write(address, value, 4, kind);
    }

    /// Writes one or two bytes depending on `wide`
    pub(super) fn write_value(&mut self, address: u32, value: u16, wide: bool, kind: MemoryAccessType) {
        if wide {
            self.write_word(address, value, kind);
        } else {
            self.write_byte(address, value as u8, kind);
        }
    }

    pub(super) fn read_value(&mut self, address: u32, wide: bool, kind: MemoryAccessType) -> u16 {
        if wide {
            self.read_word(address, kind)
        } else {
            self.read_byte(address, kind) as u16
        }
    }

    //
    // Instruction stream
    /////////////////////

    fn fetch(&mut self, bytes: u8) -> u32 {
        let pc = self.registers.program_counter;
        let value = self.read(pc, bytes, MemoryAccessType::ProgramCounterRelative);
        let offset = (pc as u16).wrapping_add(bytes as u16);
        self.registers.program_counter = (pc & 0xFF_0000) | offset as u32;
        value
    }

    pub(super) fn fetch_byte(&mut self) -> u8 {
        self.fetch(1) as u8
    }

    pub(super) fn fetch_word(&mut self) -> u16 {
        self.fetch(2) as u16
    }

    pub(super) fn fetch_long(&mut self) -> u32 {
        self.fetch(3)
    }

    //
    // Stack
    ////////

    pub(super) fn set_stack_pointer(&mut self, value: u16) {
        self.registers.stack_pointer = if self.registers.is_emulation() {
            0x0100 | (value & 0x00FF)
        } else {
            value
        };
    }

    fn push(&mut self, value: u32, bytes: u8) {
        let s = self.registers.stack_pointer;
        let lowest = s.wrapping_sub(bytes as u16 - 1);
        self.write(lowest as u32, value, bytes, MemoryAccessType::StackRelative);
        self.set_stack_pointer(s.wrapping_sub(bytes as u16));
    }

    fn pop(&mut self, bytes: u8) -> u32 {
        let s = self.registers.stack_pointer.wrapping_add(bytes as u16);
        self.set_stack_pointer(s);
        let lowest = s.wrapping_sub(bytes as u16 - 1);
        self.read(lowest as u32, bytes, MemoryAccessType::StackRelative)
    }

    pub(super) fn push_byte(&mut self, value: u8) {
        self.push(value as u32, 1);
    }

    pub(super) fn push_word(&mut self, value: u16) {
        self.push(value as u32, 2);
    }

    pub(super) fn push_long(&mut self, value: u32) {
        self.push(value & 0xFF_FFFF, 3);
    }

    pub(super) fn push_dword(&mut self, value: u32) {
        self.push(value, 4);
    }

    pub(super) fn push_value(&mut self, value: u16, wide: bool) {
        if wide {
            self.push_word(value);
        } else {
            self.push_byte(value as u8);
        }
    }

    pub(super) fn pop_byte(&mut self) -> u8 {
        self.pop(1) as u8
    }

    pub(super) fn pop_word(&mut self) -> u16 {
        self.pop(2) as u16
    }

    pub(super) fn pop_long(&mut self) -> u32 {
        self.pop(3)
    }

    pub(super) fn pop_dword(&mut self) -> u32 {
        self.pop(4)
    }

    pub(super) fn pop_value(&mut self, wide: bool) -> u16 {
        if wide {
            self.pop_word()
        } else {
            self.pop_byte() as u16
        }
    }

    //
    // Index registers, tracking which bits a step consumed
    ///////////////////////////////////////////////////////

    pub(super) fn x(&mut self, mask: u16) -> u16 {
        self.context.used_x_mask |= mask;
        self.registers.register_x & mask
    }

    pub(super) fn y(&mut self, mask: u16) -> u16 {
        self.context.used_y_mask |= mask;
        self.registers.register_y & mask
    }

    /// Byte at `address` after remapping, without notifying anyone
    pub fn peek_byte(&self, address: u32) -> u8 {
        self.memory.peek(Memory::remap(address))
    }
}
