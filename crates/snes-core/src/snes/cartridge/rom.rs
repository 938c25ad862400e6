use thiserror::Error;

const COPIER_HEADER_SIZE: usize = 512;
const HEADER_ALIGNMENT: usize = 0x8000;
const SIZE_GRANULARITY: usize = 0x2000;
const LOROM_BANK_SIZE: u32 = 0x8000;
const MAP_MODE_OFFSET: usize = 0x7FD5;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("{0}")]
    InvalidFormat(String),

    #[error("ROM image is empty after stripping a {0} byte header")]
    Empty(usize),
}

/// How to find the start of the program image in a ROM file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RomHeader {
    /// File size modulo 32 KiB
    #[default]
    Auto,
    None,
    /// 512 byte copier header
    Copier,
}

/// LoROM program image
///
/// Each bank maps 32 KiB of image at $8000-$FFFF. Images smaller than the
/// address space repeat the way cartridge address decoding mirrors them.
pub struct Rom {
    data: Vec<u8>,
    calculated_size: u32,
}

impl Rom {
    pub fn parse(raw: &[u8], header: RomHeader) -> Result<Rom, RomError> {
        let offset = match header {
            RomHeader::Auto => raw.len() % HEADER_ALIGNMENT,
            RomHeader::None => 0,
            RomHeader::Copier => COPIER_HEADER_SIZE,
        };
        if offset > raw.len() {
            return Err(RomError::InvalidFormat(format!(
                "ROM file is {} bytes, smaller than its {} byte header",
                raw.len(),
                offset
            )));
        }
        let data = raw[offset..].to_vec();
        let calculated_size = (data.len() / SIZE_GRANULARITY * SIZE_GRANULARITY) as u32;
        if calculated_size == 0 {
            return Err(RomError::Empty(offset));
        }
        Ok(Rom {
            data,
            calculated_size,
        })
    }

    /// Image without a header, padded up to the 8 KiB granularity
    pub fn from_image(image: &[u8]) -> Rom {
        let mut data = image.to_vec();
        let padded = data.len().div_ceil(SIZE_GRANULARITY).max(1) * SIZE_GRANULARITY;
        data.resize(padded, 0);
        Rom {
            calculated_size: padded as u32,
            data,
        }
    }

    /// No program image at all; memory starts out zeroed
    pub fn empty() -> Rom {
        Rom {
            data: vec![],
            calculated_size: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calculated_size == 0
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// 16-bit wrapping sum of every image byte
    pub fn checksum(&self) -> u16 {
        self.data
            .iter()
            .fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16))
    }

    /// Map mode byte from the internal header, 0 when the image is too small to have one
    pub fn map_mode(&self) -> u8 {
        self.data.get(MAP_MODE_OFFSET).copied().unwrap_or(0)
    }

    pub fn is_rom(address: u32) -> bool {
        let bank = (address >> 16) as u8;
        if bank == 0x7E || bank == 0x7F {
            return false;
        }
        address & 0x8000 != 0
    }

    /// Byte visible at a ROM address ($8000-$FFFF of a non-WRAM bank)
    pub fn eval_byte(&self, address: u32) -> u8 {
        if self.is_empty() {
            return 0;
        }
        let offset = Self::image_offset(address, self.calculated_size) as usize;
        self.data.get(offset).copied().unwrap_or(0)
    }

    fn image_offset(address: u32, calculated_size: u32) -> u32 {
        let bank = (address >> 16) & 0x7F;
        let offset = address & 0xFFFF;
        let base = map_mirror(calculated_size, bank * LOROM_BANK_SIZE);
        base + offset - (offset & 0x8000)
    }
}

/// Folds `pos` into an image of `size` bytes the way bsnes mirrors ROM
pub fn map_mirror(size: u32, pos: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    if pos < size {
        return pos;
    }
    let mut mask = 1u32 << 31;
    while pos & mask == 0 {
        mask >>= 1;
    }
    if size <= (pos & mask) {
        map_mirror(size, pos - mask)
    } else {
        mask + map_mirror(size - mask, pos - mask)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_auto_header_detection_strips_copier_header() {
        let mut raw = vec![0xFFu8; COPIER_HEADER_SIZE];
        raw.extend(vec![0x11u8; 0x8000]);
        let rom = Rom::parse(&raw, RomHeader::Auto).unwrap();
        assert_eq!(rom.size(), 0x8000);
        assert_eq!(rom.eval_byte(0x00_8000), 0x11);
    }

    #[test]
    fn test_lorom_banks_map_consecutive_32k_pages() {
        let mut image = vec![0u8; 0x10000];
        image[0x0000] = 0xAA;
        image[0x8000] = 0xBB;
        image[0xFFFF] = 0xCC;
        let rom = Rom::from_image(&image);
        assert_eq!(rom.eval_byte(0x00_8000), 0xAA);
        assert_eq!(rom.eval_byte(0x01_8000), 0xBB);
        assert_eq!(rom.eval_byte(0x01_FFFF), 0xCC);
        // FastROM mirror
        assert_eq!(rom.eval_byte(0x81_8000), 0xBB);
    }

    #[test]
    fn test_small_image_mirrors_across_banks() {
        let mut image = vec![0u8; 0x8000];
        image[0x1234] = 0x5A;
        let rom = Rom::from_image(&image);
        assert_eq!(rom.eval_byte(0x00_9234), 0x5A);
        assert_eq!(rom.eval_byte(0x05_9234), 0x5A);
    }

    #[test]
    fn test_map_mirror_uneven_size() {
        // 3 x 32 KiB: the fourth page repeats the third
        assert_eq!(map_mirror(0x18000, 0x00000), 0x00000);
        assert_eq!(map_mirror(0x18000, 0x10000), 0x10000);
        assert_eq!(map_mirror(0x18000, 0x18000), 0x10000);
    }

    #[test]
    fn test_checksum_wraps() {
        let rom = Rom::from_image(&[0xFF; 0x2000]);
        assert_eq!(rom.checksum(), (0xFFu32 * 0x2000 % 0x10000) as u16);
    }

    #[test]
    fn test_is_rom() {
        assert!(Rom::is_rom(0x00_8000));
        assert!(!Rom::is_rom(0x7E_8000));
        assert!(!Rom::is_rom(0x00_7FFF));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        assert!(matches!(Rom::parse(&[], RomHeader::None), Err(RomError::Empty(0))));
    }
}
