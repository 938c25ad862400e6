//! Wire layout of trace logs
//!
//! Everything is little-endian with no padding between fields.
//!
//! ```text
//! header   magic[8] version:u32 fingerprint[8] rom_size:u32 rom_checksum:u16 rom_mode:u8 reserved[5]
//! event    tag:u8 op_delta:u32 payload
//! ```
//!
//! | tag | event     | payload                                     |
//! |-----|-----------|---------------------------------------------|
//! | 0   | NMI       | -                                           |
//! | 1   | RESET     | register record, bank $7E, bank $7F         |
//! | 2   | IRQ       | -                                           |
//! | 3   | READ_BYTE | address:u32 value:u8                        |
//! | 4   | READ_WORD | address:u32 value:u16                       |
//! | 5   | FINISHED  | -                                           |
//! | 6   | DMA       | rejected                                    |

use super::TraceError;
use crate::snes::cpu::Flags;
use crate::snes::cpu::registers::Registers;

pub const MAGIC: [u8; 8] = *b"SNESTRCE";
pub const VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 32;
pub const EVENT_SIZE: usize = 5;
pub const REGISTER_RECORD_SIZE: usize = 19;
pub const RAM_BANK_SIZE: usize = 0x1_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventTag {
    Nmi = 0,
    Reset = 1,
    Irq = 2,
    ReadByte = 3,
    ReadWord = 4,
    Finished = 5,
    Dma = 6,
}

impl TryFrom<u8> for EventTag {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => EventTag::Nmi,
            1 => EventTag::Reset,
            2 => EventTag::Irq,
            3 => EventTag::ReadByte,
            4 => EventTag::ReadWord,
            5 => EventTag::Finished,
            6 => EventTag::Dma,
            _ => return Err(tag),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceHeader {
    /// Identifies the capture; skip caches carry a copy
    pub fingerprint: [u8; 8],
    pub rom_size: u32,
    pub rom_checksum: u16,
    pub rom_mode: u8,
}

impl TraceHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&MAGIC);
        bytes[8..12].copy_from_slice(&VERSION.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.fingerprint);
        bytes[20..24].copy_from_slice(&self.rom_size.to_le_bytes());
        bytes[24..26].copy_from_slice(&self.rom_checksum.to_le_bytes());
        bytes[26] = self.rom_mode;
        bytes
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<TraceHeader, TraceError> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        if magic != MAGIC {
            return Err(TraceError::BadMagic(magic));
        }
        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if version != VERSION {
            return Err(TraceError::VersionMismatch {
                found: version,
                expected: VERSION,
            });
        }
        let mut fingerprint = [0u8; 8];
        fingerprint.copy_from_slice(&bytes[12..20]);
        Ok(TraceHeader {
            fingerprint,
            rom_size: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
            rom_checksum: u16::from_le_bytes([bytes[24], bytes[25]]),
            rom_mode: bytes[26],
        })
    }
}

/// Registers plus the WRAM port pointer, as stored in RESET events and snapshots
///
/// ```text
/// pc_offset:u16 wram_offset:u16 P:u16 A:u16 DP:u16 S:u16 X:u16 Y:u16 pc_bank:u8 wram_bank:u8 DB:u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterRecord {
    pub registers: Registers,
    pub wram_address: u32,
}

impl RegisterRecord {
    pub fn new(registers: Registers, wram_address: u32) -> Self {
        RegisterRecord {
            registers,
            wram_address,
        }
    }

    pub fn encode(&self) -> [u8; REGISTER_RECORD_SIZE] {
        let r = &self.registers;
        let words = [
            r.program_counter as u16,
            self.wram_address as u16,
            r.status.bits(),
            r.register_a,
            r.direct_page,
            r.stack_pointer,
            r.register_x,
            r.register_y,
        ];
        let mut bytes = [0u8; REGISTER_RECORD_SIZE];
        for (k, word) in words.iter().enumerate() {
            bytes[k * 2..k * 2 + 2].copy_from_slice(&word.to_le_bytes());
        }
        bytes[16] = r.program_bank();
        bytes[17] = (self.wram_address >> 16) as u8;
        bytes[18] = r.data_bank;
        bytes
    }

    pub fn decode(bytes: &[u8; REGISTER_RECORD_SIZE]) -> RegisterRecord {
        let word = |k: usize| u16::from_le_bytes([bytes[k * 2], bytes[k * 2 + 1]]);
        let registers = Registers {
            program_counter: ((bytes[16] as u32) << 16) | word(0) as u32,
            register_a: word(3),
            register_x: word(6),
            register_y: word(7),
            stack_pointer: word(5),
            direct_page: word(4),
            data_bank: bytes[18],
            status: Flags::from_bits_retain(word(2)),
        };
        RegisterRecord {
            registers,
            wram_address: ((bytes[17] as u32) << 16) | word(1) as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Nmi,
    /// Full machine state: registers, WRAM pointer and both WRAM banks
    Reset {
        record: RegisterRecord,
        wram: Vec<u8>,
    },
    Irq,
    /// A value the CPU read from hardware that is not emulated
    ReadByte { address: u32, value: u8 },
    ReadWord { address: u32, value: u16 },
    Finished,
}

impl TraceEvent {
    pub fn tag(&self) -> EventTag {
        match self {
            TraceEvent::Nmi => EventTag::Nmi,
            TraceEvent::Reset { .. } => EventTag::Reset,
            TraceEvent::Irq => EventTag::Irq,
            TraceEvent::ReadByte { .. } => EventTag::ReadByte,
            TraceEvent::ReadWord { .. } => EventTag::ReadWord,
            TraceEvent::Finished => EventTag::Finished,
        }
    }

    /// NMI, IRQ and RESET take over the step they are due at
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            TraceEvent::Nmi | TraceEvent::Irq | TraceEvent::Reset { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = TraceHeader {
            fingerprint: [1, 2, 3, 4, 5, 6, 7, 8],
            rom_size: 0x0008_0000,
            rom_checksum: 0xBEEF,
            rom_mode: 0x20,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[0..8], b"SNESTRCE");
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[0x00, 0x00, 0x08, 0x00]);
        assert_eq!(&bytes[24..26], &[0xEF, 0xBE]);
        assert_eq!(TraceHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_other_versions() {
        let mut bytes = TraceHeader::default().encode();
        bytes[8] = 2;
        assert!(matches!(
            TraceHeader::decode(&bytes),
            Err(TraceError::VersionMismatch { found: 2, expected: 1 })
        ));
        bytes[0] = b'X';
        assert!(matches!(TraceHeader::decode(&bytes), Err(TraceError::BadMagic(_))));
    }

    #[test]
    fn test_register_record_layout() {
        let registers = Registers {
            program_counter: 0x80_8123,
            register_a: 0x1122,
            register_x: 0x3344,
            register_y: 0x5566,
            stack_pointer: 0x01FF,
            direct_page: 0x0200,
            data_bank: 0x7E,
            status: Flags::MEMORY_8BIT | Flags::EMULATION,
        };
        let record = RegisterRecord::new(registers, 0x1_2345);
        let bytes = record.encode();
        assert_eq!(&bytes[0..2], &[0x23, 0x81]);
        assert_eq!(&bytes[2..4], &[0x45, 0x23]);
        assert_eq!(&bytes[4..6], &[0x20, 0x01]);
        assert_eq!(bytes[16], 0x80);
        assert_eq!(bytes[17], 0x01);
        assert_eq!(bytes[18], 0x7E);
        assert_eq!(RegisterRecord::decode(&bytes), record);
    }

    #[test]
    fn test_event_tags() {
        assert_eq!(EventTag::try_from(4), Ok(EventTag::ReadWord));
        assert_eq!(EventTag::try_from(7), Err(7));
        assert_eq!(TraceEvent::Irq.tag() as u8, 2);
        assert!(TraceEvent::Nmi.is_interrupt());
        assert!(!TraceEvent::Finished.is_interrupt());
    }
}
