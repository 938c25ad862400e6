#[cfg(test)]
mod tests {
    use crate::snes::bus::memory::Memory;
    use crate::snes::cartridge::rom::Rom;

    #[test]
    fn test_low_ram_mirror_remaps_to_wram() {
        assert_eq!(Memory::remap(0x01_1234), 0x7E_1234);
        assert_eq!(Memory::remap(0x80_0000), 0x7E_0000);
        assert_eq!(Memory::remap(0xBF_1FFF), 0x7E_1FFF);
    }

    #[test]
    fn test_register_window_remaps_to_bank_zero() {
        assert_eq!(Memory::remap(0x01_2100), 0x00_2100);
        assert_eq!(Memory::remap(0x82_420B), 0x00_420B);
    }

    #[test]
    fn test_other_addresses_pass_through() {
        assert_eq!(Memory::remap(0x01_8000), 0x01_8000);
        assert_eq!(Memory::remap(0x7E_1234), 0x7E_1234);
        assert_eq!(Memory::remap(0x40_1234), 0x40_1234);
        assert_eq!(Memory::remap(0xC0_2100), 0xC0_2100);
    }

    #[test]
    fn test_wram_read_write() {
        let mut memory = Memory::new();
        memory.write(0x7F_0102, 0xBEEF, 2);
        assert_eq!(memory.read(0x7F_0102, 2), (0x7F_0102, 0xBEEF));
        assert_eq!(memory.peek(0x7F_0102), 0xEF);
        assert_eq!(memory.peek(0x7F_0103), 0xBE);
    }

    #[test]
    fn test_low_ram_mirroring() {
        let mut memory = Memory::new();
        memory.write(0x00_0002, 0x55, 1);
        assert_eq!(memory.read(0x3F_0002, 1).1, 0x55);
        assert_eq!(memory.read(0x7E_0002, 1).1, 0x55);
    }

    #[test]
    fn test_rom_writes_are_dropped() {
        let mut memory = Memory::new_with_rom(&Rom::from_image(&[0xAA; 0x8000]));
        let outcome = memory.write(0x00_8000, 0x12, 1);
        assert_eq!(outcome.remapped, 0x00_8000);
        assert_eq!(memory.peek(0x00_8000), 0xAA);
    }

    #[test]
    fn test_unmapped_io_writes_are_dropped() {
        let mut memory = Memory::new();
        memory.write(0x00_3000, 0x12, 1);
        memory.write(0x70_0000, 0x34, 1);
        assert_eq!(memory.peek(0x00_3000), 0x00);
        assert_eq!(memory.peek(0x70_0000), 0x00);
    }

    #[test]
    fn test_rom_is_loaded_into_every_non_wram_bank() {
        let mut image = vec![0u8; 0x8000];
        image[0] = 0x11;
        image[0x7FFF] = 0x22;
        let memory = Memory::new_with_rom(&Rom::from_image(&image));
        assert_eq!(memory.peek(0x00_8000), 0x11);
        assert_eq!(memory.peek(0x80_FFFF), 0x22);
        assert_eq!(memory.peek(0x7E_8000), 0x00);
        assert_eq!(memory.peek(0x00_0000), 0x00);
    }

    #[test]
    fn test_wram_port_auto_increments() {
        let mut memory = Memory::new();
        memory.write(0x00_2181, 0x10, 1);
        memory.write(0x00_2182, 0x00, 1);
        memory.write(0x00_2183, 0x01, 1);
        assert_eq!(memory.wram_address, 0x1_0010);

        memory.write(0x00_2180, 0xAB, 1);
        memory.write(0x80_2180, 0xCD, 1);

        assert_eq!(memory.peek(0x7F_0010), 0xAB);
        assert_eq!(memory.peek(0x7F_0011), 0xCD);
        assert_eq!(memory.wram_address, 0x1_0012);
    }

    #[test]
    fn test_wram_port_pointer_wraps() {
        let mut memory = Memory::new();
        memory.wram_address = 0x1_FFFF;
        memory.push_wram_port(0x99);
        assert_eq!(memory.peek(0x7F_FFFF), 0x99);
        assert_eq!(memory.wram_address, 0);
    }

    #[test]
    fn test_mdmaen_write_reports_channels() {
        let mut memory = Memory::new();
        let outcome = memory.write(0x00_420B, 0x05, 1);
        assert_eq!(outcome.dma_channels, Some(0x05));
        assert_eq!(memory.peek(0x00_420B), 0x05);

        let outcome = memory.write(0x00_420C, 0x05, 1);
        assert_eq!(outcome.dma_channels, None);
    }

    #[test]
    fn test_io_shadow_round_trip() {
        let mut memory = Memory::new();
        memory.write(0x00_2105, 0x09, 1);
        memory.write(0x00_4300, 0x01, 1);
        memory.poke(0x00_4016, 0x40);
        let shadow = memory.io_shadow();
        assert_eq!(shadow.len(), 0x600);

        let mut restored = Memory::new();
        restored.restore_io_shadow(&shadow);
        assert_eq!(restored.peek(0x00_2105), 0x09);
        assert_eq!(restored.peek(0x00_4300), 0x01);
        assert_eq!(restored.peek(0x00_4016), 0x40);
    }
}
