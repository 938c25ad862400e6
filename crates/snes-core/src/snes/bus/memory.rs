use super::consts::*;
use crate::snes::cartridge::rom::Rom;

/// Result of a store through the write rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub remapped: u32,
    /// Channel mask written to MDMAEN, if this store started DMA
    pub dma_channels: Option<u8>,
}

/// Flat 24-bit address space
///
/// Every access goes through [`Memory::remap`]. Only the two WRAM banks and the
/// two mirrored hardware register windows in bank 0 accept writes; everything
/// else (ROM, SRAM, unmapped I/O) silently drops them.
pub struct Memory {
    data: Vec<u8>,
    /// WRAM port pointer ($2181-$2183), 17 bits
    pub wram_address: u32,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE],
            wram_address: 0,
        }
    }

    pub fn new_with_rom(rom: &Rom) -> Self {
        let mut memory = Memory::new();
        memory.load_rom(rom);
        memory
    }

    /// Copies the program image into the upper half of every non-WRAM bank
    pub fn load_rom(&mut self, rom: &Rom) {
        if rom.is_empty() {
            return;
        }
        for bank in 0..=0xFFu32 {
            if bank == WRAM_BANK_LO as u32 || bank == WRAM_BANK_HI as u32 {
                continue;
            }
            for offset in ROM_AREA_START as u32..=0xFFFF {
                let address = (bank << 16) | offset;
                self.data[address as usize] = rom.eval_byte(address);
            }
        }
    }

    /// Maps a CPU address onto backing storage
    ///
    /// In the system banks ($00-$3F, $80-$BF) the lower half is shared: $0000-$1FFF
    /// is low WRAM (bank $7E) and $2000-$7FFF collapses onto bank $00 so hardware
    /// registers exist exactly once.
    pub fn remap(address: u32) -> u32 {
        let bank = ((address >> 16) & 0xFF) as u8;
        let offset = (address & 0xFFFF) as u16;
        if offset > SYSTEM_AREA_END {
            return address & ADDRESS_MASK;
        }
        match bank {
            0x00..=0x3F | 0x80..=0xBF => {
                if offset <= LOW_RAM_END {
                    ((WRAM_BANK_LO as u32) << 16) | offset as u32
                } else {
                    offset as u32
                }
            }
            _ => address & ADDRESS_MASK,
        }
    }

    /// Raw byte at an already remapped address
    pub fn peek(&self, remapped: u32) -> u8 {
        self.data[(remapped & ADDRESS_MASK) as usize]
    }

    /// Raw store at an already remapped address, no write rules applied
    pub fn poke(&mut self, remapped: u32, value: u8) {
        self.data[(remapped & ADDRESS_MASK) as usize] = value;
    }

    /// Little-endian read of `bytes` (1-4) bytes, returns (remapped, value)
    pub fn read(&self, address: u32, bytes: u8) -> (u32, u32) {
        let remapped = Memory::remap(address);
        let mut value = 0u32;
        for k in 0..bytes as u32 {
            value |= (self.peek(remapped.wrapping_add(k)) as u32) << (8 * k);
        }
        (remapped, value)
    }

    /// Little-endian store of `bytes` (1-4) bytes through the write rules
    pub fn write(&mut self, address: u32, value: u32, bytes: u8) -> WriteOutcome {
        let remapped = Memory::remap(address);
        let mut dma_channels = None;
        for k in 0..bytes as u32 {
            let target = remapped.wrapping_add(k) & ADDRESS_MASK;
            let byte = (value >> (8 * k)) as u8;
            if (PPU_REGISTERS_START..=PPU_REGISTERS_END).contains(&target) {
                self.write_wram_port(target, byte);
                self.poke(target, byte);
            } else if (CPU_REGISTERS_START..=CPU_REGISTERS_END).contains(&target) {
                if target == MDMAEN {
                    dma_channels = Some(byte);
                }
                self.poke(target, byte);
            } else if Memory::is_wram(target) {
                self.poke(target, byte);
            }
        }
        WriteOutcome {
            remapped,
            dma_channels,
        }
    }

    fn write_wram_port(&mut self, register: u32, value: u8) {
        match register {
            WMDATA => self.push_wram_port(value),
            WMADDL => self.wram_address = (self.wram_address & 0x1FF00) | value as u32,
            WMADDM => self.wram_address = (self.wram_address & 0x100FF) | ((value as u32) << 8),
            WMADDH => {
                self.wram_address =
                    ((self.wram_address & 0x0FFFF) | ((value as u32) << 16)) & WRAM_ADDRESS_MASK
            }
            _ => {}
        }
    }

    /// Stores through $2180: lands at the WRAM pointer, which then advances
    pub fn push_wram_port(&mut self, value: u8) {
        self.poke(WRAM_START + self.wram_address, value);
        self.wram_address = (self.wram_address + 1) & WRAM_ADDRESS_MASK;
    }

    pub fn is_wram(remapped: u32) -> bool {
        let bank = (remapped >> 16) as u8;
        bank == WRAM_BANK_LO || bank == WRAM_BANK_HI
    }

    pub fn bank(&self, bank: u8) -> &[u8] {
        let start = bank as usize * BANK_SIZE;
        &self.data[start..start + BANK_SIZE]
    }

    pub fn bank_mut(&mut self, bank: u8) -> &mut [u8] {
        let start = bank as usize * BANK_SIZE;
        &mut self.data[start..start + BANK_SIZE]
    }

    /// Both WRAM banks, $7E0000-$7FFFFF
    pub fn wram(&self) -> &[u8] {
        let start = WRAM_START as usize;
        &self.data[start..start + WRAM_SIZE]
    }

    pub fn wram_mut(&mut self) -> &mut [u8] {
        let start = WRAM_START as usize;
        &mut self.data[start..start + WRAM_SIZE]
    }

    /// Hardware register windows as stored by prior writes
    pub fn io_shadow(&self) -> Vec<u8> {
        let mut shadow = Vec::with_capacity(IO_SHADOW_SIZE);
        shadow.extend_from_slice(&self.data[Self::ppu_window()]);
        shadow.extend_from_slice(&self.data[Self::cpu_window()]);
        shadow
    }

    pub fn restore_io_shadow(&mut self, shadow: &[u8]) {
        let ppu_len = Self::ppu_window().len();
        self.data[Self::ppu_window()].copy_from_slice(&shadow[..ppu_len]);
        self.data[Self::cpu_window()].copy_from_slice(&shadow[ppu_len..]);
    }

    fn ppu_window() -> std::ops::Range<usize> {
        PPU_REGISTERS_START as usize..PPU_REGISTERS_END as usize + 1
    }

    fn cpu_window() -> std::ops::Range<usize> {
        JOYPAD_PORTS_START as usize..CPU_REGISTERS_END as usize + 1
    }
}
