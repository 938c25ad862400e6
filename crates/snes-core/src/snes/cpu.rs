use bitflags::bitflags;
use thiserror::Error;

use super::bus::MemoryObserver;
use super::bus::memory::Memory;
use super::tracer::traceable::Traceable;
use opcodes::{AddressingMode, Opcode, Operation};
use registers::Registers;

pub mod addressing;
pub mod instruction_handlers;
pub mod interrupts;
pub mod memory_access;
pub mod opcodes;
pub mod processor;
pub mod registers;


bitflags! {
    /// Status word
    ///
    ///  8 7 6 5 4 3 2 1 0
    ///  E N V M X D I Z C
    ///  | | | | | | | | |
    ///  | | | | | | | | +--- Carry
    ///  | | | | | | | +----- Zero
    ///  | | | | | | +------- IRQ disable
    ///  | | | | | +--------- Decimal mode
    ///  | | | | +----------- Index registers are 8-bit
    ///  | | | +------------- Accumulator/memory is 8-bit
    ///  | | +--------------- Overflow
    ///  | +----------------- Negative
    ///  +------------------- Emulation (only reachable through XCE)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        const CARRY             = 0b0000_0000_0001;
        const ZERO              = 0b0000_0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0000_0100;
        const DECIMAL_MODE      = 0b0000_0000_1000;
        const INDEX_8BIT        = 0b0000_0001_0000;
        const MEMORY_8BIT       = 0b0000_0010_0000;
        const OVERFLOW          = 0b0000_0100_0000;
        const NEGATIVE          = 0b0000_1000_0000;
        const EMULATION         = 0b0001_0000_0000;
    }
}

/// Control-flow classification of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Event {
    #[default]
    None,
    Nmi,
    Irq,
    Reset,
    JmpOrJml,
    JsrOrJsl,
    RtsOrRtl,
    /// A branch that was taken
    Branch,
    Rti,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("Unsupported opcode: 0x{0:02X}")]
    UnsupportedOpcode(u8),

    #[error("{operation:?} has no effective address in mode {mode:?} (PC={pc:06X})")]
    UnsupportedAddressingMode {
        operation: Operation,
        mode: AddressingMode,
        pc: u32,
    },

    #[error("Unsupported instruction {0:?} at {1:06X}")]
    UnsupportedInstruction(Operation, u32),

    #[error("Unsupported DMA on channel {channel} (PC={pc:06X}): {reason}")]
    UnsupportedDma {
        channel: u8,
        pc: u32,
        reason: &'static str,
    },
}

/// Facts about the step that just ran, for trace summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepContext {
    /// PC at the start of the step
    pub pc_before: u32,
    /// Bits of X the step actually consumed
    pub used_x_mask: u16,
    pub used_y_mask: u16,
    /// Address an indirect operand pointer was fetched from
    pub indirect_pointer: Option<u32>,
}

/// MVN/MVP in flight
///
/// PC stays on the instruction while bytes remain so an interrupt between two
/// bytes returns to it, exactly like the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockMove {
    pub pc: u32,
    pub operation: Operation,
    pub destination_bank: u8,
    pub source_bank: u8,
}

pub struct CPU {
    pub registers: Registers,
    pub memory: Memory,
    pub event: Event,
    pub context: StepContext,
    pub error: Option<CpuError>,
    /// Fault on DMA shapes that are reported but not modeled
    pub strict_dma: bool,
    pub last_opcode: Option<&'static Opcode>,
    pub(crate) block_move: Option<BlockMove>,
    observer: Option<Box<dyn MemoryObserver>>,
    observers_suppressed: bool,
}

impl Traceable for CPU {
    fn trace_name(&self) -> &'static str {
        "CPU"
    }

    fn trace_state(&self) -> Option<String> {
        let r = &self.registers;
        Some(format!(
            "PC={:06X} A={:04X} X={:04X} Y={:04X} S={:04X} DP={:04X} DB={:02X} P={:03X} [{}] {:?}",
            r.program_counter,
            r.register_a,
            r.register_x,
            r.register_y,
            r.stack_pointer,
            r.direct_page,
            r.data_bank,
            r.status.bits(),
            self.last_opcode
                .map(|op| op.operation.mnemonic())
                .unwrap_or_default(),
            self.event
        ))
    }
}
