use std::cell::RefCell;
use std::rc::Rc;

use crate::snes::dma::DmaTransfer;

pub mod consts;
pub mod memory;

#[cfg(test)]
mod memory_tests;

/// Why the CPU touched memory
///
/// Observers use this to tell operand traffic apart from opcode fetches,
/// stack traffic and block moves. The executor never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemoryAccessType {
    ProgramCounterRelative,
    StackRelative,
    FetchMvnMvp,
    WriteMvnMvp,
    FetchNmiVector,
    FetchIrqVector,
    FetchIndirect,
    Random,
    DmaRead,
    DmaWrite,
}

/// One observed memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    /// PC of the instruction (or interrupt entry) performing the access
    pub pc: u32,
    /// Address as computed by the CPU
    pub address: u32,
    /// Address after bank mirroring
    pub remapped: u32,
    pub value: u32,
    pub bytes: u8,
    pub kind: MemoryAccessType,
}

/// Receives every classified access the CPU and DMA unit perform
pub trait MemoryObserver {
    fn on_read(&mut self, _access: &MemoryAccess) {}

    fn on_write(&mut self, _access: &MemoryAccess) {}

    /// Every parsed DMA channel, whether executed or not
    fn on_dma(&mut self, _transfer: &DmaTransfer) {}
}

/// Shared handle so a caller can keep reading what an attached observer collected
impl<T: MemoryObserver + ?Sized> MemoryObserver for Rc<RefCell<T>> {
    fn on_read(&mut self, access: &MemoryAccess) {
        self.borrow_mut().on_read(access);
    }

    fn on_write(&mut self, access: &MemoryAccess) {
        self.borrow_mut().on_write(access);
    }

    fn on_dma(&mut self, transfer: &DmaTransfer) {
        self.borrow_mut().on_dma(transfer);
    }
}
