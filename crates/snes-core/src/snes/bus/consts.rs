pub const MEMORY_SIZE: usize = 0x100_0000;
pub const BANK_SIZE: usize = 0x1_0000;
pub const ADDRESS_MASK: u32 = 0xFF_FFFF;

pub const WRAM_BANK_LO: u8 = 0x7E;
pub const WRAM_BANK_HI: u8 = 0x7F;
pub const WRAM_START: u32 = 0x7E_0000;
pub const WRAM_SIZE: usize = 0x2_0000;
pub const WRAM_ADDRESS_MASK: u32 = 0x1_FFFF;

pub const LOW_RAM_END: u16 = 0x1FFF;
pub const SYSTEM_AREA_END: u16 = 0x7FFF;
pub const ROM_AREA_START: u16 = 0x8000;

pub const PPU_REGISTERS_START: u32 = 0x2100;
pub const PPU_REGISTERS_END: u32 = 0x21FF;
pub const JOYPAD_PORTS_START: u32 = 0x4000;
pub const CPU_REGISTERS_START: u32 = 0x4200;
pub const CPU_REGISTERS_END: u32 = 0x44FF;

pub const WMDATA: u32 = 0x2180;
pub const WMADDL: u32 = 0x2181;
pub const WMADDM: u32 = 0x2182;
pub const WMADDH: u32 = 0x2183;
pub const MDMAEN: u32 = 0x420B;
pub const DMA_CHANNEL_BASE: u32 = 0x4300;

/// Bytes of hardware register state carried by snapshots ($2100-$21FF + $4000-$44FF)
pub const IO_SHADOW_SIZE: usize = 0x600;
