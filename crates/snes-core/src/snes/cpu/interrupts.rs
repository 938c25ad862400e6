use super::registers::Registers;
use super::{CPU, Event, Flags};
use crate::snes::bus::MemoryAccessType;
use crate::trace_cpu_event;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InterruptType {
    Nmi,
    Irq,
    Brk,
    Cop,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Interrupt {
    pub interrupt_type: InterruptType,
    pub native_vector: u16,
    pub emulation_vector: u16,
    pub vector_kind: MemoryAccessType,
    pub event: Event,
}

pub const NMI: Interrupt = Interrupt {
    interrupt_type: InterruptType::Nmi,
    native_vector: 0xFFEA,
    emulation_vector: 0xFFFA,
    vector_kind: MemoryAccessType::FetchNmiVector,
    event: Event::Nmi,
};

pub const IRQ: Interrupt = Interrupt {
    interrupt_type: InterruptType::Irq,
    native_vector: 0xFFEE,
    emulation_vector: 0xFFFE,
    vector_kind: MemoryAccessType::FetchIrqVector,
    event: Event::Irq,
};

pub const BRK: Interrupt = Interrupt {
    interrupt_type: InterruptType::Brk,
    native_vector: 0xFFE6,
    emulation_vector: 0xFFFE,
    vector_kind: MemoryAccessType::FetchIrqVector,
    event: Event::Irq,
};

pub const COP: Interrupt = Interrupt {
    interrupt_type: InterruptType::Cop,
    native_vector: 0xFFE4,
    emulation_vector: 0xFFF4,
    vector_kind: MemoryAccessType::FetchIrqVector,
    event: Event::Irq,
};

impl CPU {
    /// Pushes the return state, then jumps through the vector into bank 0
    ///
    /// Native mode pushes PB, the 16-bit return offset and P as one frame;
    /// emulation mode leaves PB out.
    pub(super) fn enter_interrupt(&mut self, interrupt: Interrupt, return_offset: u16) {
        let is_nmi = interrupt.interrupt_type == InterruptType::Nmi;
        if is_nmi {
            self.suppress_observers(true);
        }
        self.block_move = None;

        let emulation = self.registers.is_emulation();
        let frame = ((return_offset as u32) << 8) | (self.registers.p() & 0xFF) as u32;
        if emulation {
            self.push_long(frame);
        } else {
            let bank = (self.registers.program_bank() as u32) << 24;
            self.push_dword(bank | frame);
        }

        let vector = if emulation {
            interrupt.emulation_vector
        } else {
            interrupt.native_vector
        };
        let target = self.read_word(vector as u32, interrupt.vector_kind);
        self.registers.program_counter = target as u32;
        self.registers.status.insert(Flags::INTERRUPT_DISABLE);
        self.registers.status.remove(Flags::DECIMAL_MODE);
        self.event = interrupt.event;

        if is_nmi {
            self.suppress_observers(false);
        }
        trace_cpu_event!(
            "[{:?}] vector={:04X} target={:06X}",
            interrupt.interrupt_type,
            vector,
            self.registers.program_counter
        );
    }

    /// Loads the complete machine state carried by a RESET record
    pub fn apply_reset(&mut self, registers: Registers, wram_address: u32, wram: &[u8]) {
        self.begin_step();
        self.block_move = None;
        self.registers = registers;
        self.memory.wram_address = wram_address & 0x1_FFFF;
        let ram = self.memory.wram_mut();
        let len = ram.len().min(wram.len());
        ram[..len].copy_from_slice(&wram[..len]);
        self.event = Event::Reset;
        trace_cpu_event!("[RESET] PC={:06X}", self.registers.program_counter);
    }
}
