use bitflags::bitflags;

use super::bus::consts::{DMA_CHANNEL_BASE, WRAM_ADDRESS_MASK, WRAM_START};
use super::bus::memory::Memory;
use super::bus::{MemoryAccess, MemoryAccessType};
use super::cpu::{CPU, CpuError};

/// B-bus address of the WRAM data port ($2180)
const WRAM_PORT: u8 = 0x80;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DmaFlags: u8 {
        /// B bus to A bus
        const REVERSE   = 0b0000_0001;
        const FIXED     = 0b0000_0010;
        const DECREMENT = 0b0000_0100;
    }
}

/// One channel's parameters as programmed at $43x0-$43x6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DmaTransfer {
    /// Instruction that wrote $420B
    pub pc: u32,
    pub a_address: u16,
    /// Raw byte count register, 0 meaning 0x10000
    pub transfer_bytes: u16,
    pub transfer_mode: u8,
    pub b_address: u8,
    pub a_bank: u8,
    pub channel: u8,
    pub flags: DmaFlags,
}

/// What the DMA unit does with a parsed channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaShape {
    /// CPU memory to $2180, one register, forward
    WramPort,
    /// $2180 target with a multi-register unit; cannot be replayed
    Unsupported(&'static str),
    /// Reported only
    Unmodeled(&'static str),
}

impl DmaTransfer {
    /// Reads channel `channel` from the hardware register shadow
    pub fn parse(memory: &Memory, channel: u8, pc: u32) -> DmaTransfer {
        let base = DMA_CHANNEL_BASE | ((channel as u32) << 4);
        let reg = |offset: u32| memory.peek(base | offset);

        let params = reg(0);
        let mut flags = DmaFlags::empty();
        flags.set(DmaFlags::REVERSE, params & 0x80 != 0);
        flags.set(DmaFlags::DECREMENT, params & 0x10 != 0);
        flags.set(DmaFlags::FIXED, params & 0x08 != 0);

        DmaTransfer {
            pc,
            a_address: u16::from_le_bytes([reg(2), reg(3)]),
            transfer_bytes: u16::from_le_bytes([reg(5), reg(6)]),
            transfer_mode: params & 0x07,
            b_address: reg(1),
            a_bank: reg(4),
            channel,
            flags,
        }
    }

    pub fn byte_count(&self) -> u32 {
        if self.transfer_bytes == 0 {
            0x10000
        } else {
            self.transfer_bytes as u32
        }
    }

    pub fn shape(&self) -> DmaShape {
        if self.b_address != WRAM_PORT {
            return DmaShape::Unmodeled("destination is not the WRAM port");
        }
        if self.flags.contains(DmaFlags::REVERSE) {
            return DmaShape::Unmodeled("reverse transfer");
        }
        if self.a_bank == 0x7E || self.a_bank == 0x7F {
            return DmaShape::Unmodeled("WRAM to WRAM transfer");
        }
        if self.transfer_mode != 0 {
            return DmaShape::Unsupported("WRAM port transfer with a multi-register unit");
        }
        DmaShape::WramPort
    }

    fn step(&self) -> i32 {
        if self.flags.contains(DmaFlags::FIXED) {
            0
        } else if self.flags.contains(DmaFlags::DECREMENT) {
            -1
        } else {
            1
        }
    }
}

impl CPU {
    /// Runs every channel set in `channels`, lowest first
    pub(crate) fn execute_dma(&mut self, channels: u8) {
        for channel in 0..8u8 {
            if channels & (1 << channel) == 0 {
                continue;
            }
            let transfer = DmaTransfer::parse(&self.memory, channel, self.context.pc_before);
            if let Some(observer) = self.observer_mut() {
                observer.on_dma(&transfer);
            }

            match transfer.shape() {
                DmaShape::WramPort => self.copy_to_wram_port(&transfer),
                DmaShape::Unsupported(reason) => self.dma_fault(&transfer, reason),
                DmaShape::Unmodeled(reason) => {
                    log::warn!(
                        "DMA channel {} at {:06X} not replayed ({}): {:?}",
                        channel,
                        transfer.pc,
                        reason,
                        transfer
                    );
                    if self.strict_dma {
                        self.dma_fault(&transfer, reason);
                    }
                }
            }
        }
    }

    fn dma_fault(&mut self, transfer: &DmaTransfer, reason: &'static str) {
        if self.error.is_none() {
            self.error = Some(CpuError::UnsupportedDma {
                channel: transfer.channel,
                pc: transfer.pc,
                reason,
            });
        }
    }

    fn copy_to_wram_port(&mut self, transfer: &DmaTransfer) {
        let bank = (transfer.a_bank as u32) << 16;
        let step = transfer.step();
        let mut a_address = transfer.a_address;
        let mut wram = self.memory.wram_address;

        for _ in 0..transfer.byte_count() {
            let source = Memory::remap(bank | a_address as u32);
            let destination = Memory::remap(WRAM_START + wram);
            let value = self.memory.peek(source);
            self.memory.poke(destination, value);

            let pc = transfer.pc;
            if let Some(observer) = self.observer_mut() {
                let mut access = MemoryAccess {
                    pc,
                    address: bank | a_address as u32,
                    remapped: source,
                    value: value as u32,
                    bytes: 1,
                    kind: MemoryAccessType::DmaRead,
                };
                observer.on_read(&access);
                access.address = WRAM_START + wram;
                access.remapped = destination;
                access.kind = MemoryAccessType::DmaWrite;
                observer.on_write(&access);
            }

            a_address = a_address.wrapping_add_signed(step as i16);
            wram = (wram + 1) & WRAM_ADDRESS_MASK;
        }
        self.memory.wram_address = wram;
    }
}
