//! Builders for in-memory ROMs, traces and replays

use std::io::Cursor;

use super::bus::memory::Memory;
use super::cartridge::rom::Rom;
use super::cpu::registers::Registers;
use super::cpu::{CPU, Flags};
use super::replay::{Replay, ReplayError};
use super::trace::format::{RAM_BANK_SIZE, RegisterRecord, TraceHeader};
use super::trace::{TraceError, TraceReader, TraceWriter};

pub const PROGRAM_ORIGIN: u32 = 0x00_8000;
pub const NMI_HANDLER: u32 = 0x00_9000;
pub const IRQ_HANDLER: u32 = 0x00_9800;
pub const SUBROUTINE: u32 = 0x00_A000;
pub const TEST_FINGERPRINT: [u8; 8] = *b"TESTTRCE";

const IMAGE_SIZE: usize = 0x8000;

fn image_offset(address: u32) -> usize {
    (address & 0x7FFF) as usize
}

/// 32 KiB LoROM image: `program` at $8000, `nmi_handler` at $9000, an RTI at
/// $9800 and every interrupt vector pointing at the matching handler
pub fn build_rom(program: &[u8], nmi_handler: &[u8], subroutine: &[u8]) -> Rom {
    let mut image = vec![0xEAu8; IMAGE_SIZE];
    let mut place = |address: u32, bytes: &[u8]| {
        let start = image_offset(address);
        image[start..start + bytes.len()].copy_from_slice(bytes);
    };
    place(PROGRAM_ORIGIN, program);
    place(NMI_HANDLER, nmi_handler);
    place(IRQ_HANDLER, &[0x40]);
    place(SUBROUTINE, subroutine);

    let nmi = (NMI_HANDLER as u16).to_le_bytes();
    let irq = (IRQ_HANDLER as u16).to_le_bytes();
    for vector in [0xFFEA, 0xFFFA] {
        place(vector, &nmi);
    }
    for vector in [0xFFE4, 0xFFE6, 0xFFEE, 0xFFF4, 0xFFFE] {
        place(vector, &irq);
    }
    Rom::from_image(&image)
}

pub fn trace_header(rom: &Rom) -> TraceHeader {
    TraceHeader {
        fingerprint: TEST_FINGERPRINT,
        rom_size: rom.size(),
        rom_checksum: rom.checksum(),
        rom_mode: rom.map_mode(),
    }
}

/// Native mode, 8-bit A and index, stack at $1FFF
pub fn reset_record(pc: u32) -> RegisterRecord {
    let registers = Registers {
        program_counter: pc,
        stack_pointer: 0x1FFF,
        status: Flags::MEMORY_8BIT | Flags::INDEX_8BIT | Flags::INTERRUPT_DISABLE,
        ..Registers::default()
    };
    RegisterRecord::new(registers, 0)
}

/// Both WRAM banks with a recognizable pattern
pub fn patterned_wram() -> Vec<u8> {
    (0..RAM_BANK_SIZE * 2).map(|k| (k % 251) as u8).collect()
}

pub fn replay_over(rom: Rom, log: Vec<u8>) -> Result<Replay<Cursor<Vec<u8>>>, ReplayError> {
    let reader = TraceReader::new(Cursor::new(log))?;
    Replay::new(rom, reader)
}

/// CPU over empty memory with `program` at $008000, 8-bit registers, native mode
pub fn cpu_with_program(program: &[u8]) -> CPU {
    let mut cpu = CPU::new(Memory::new());
    for (k, &byte) in program.iter().enumerate() {
        cpu.memory.poke(PROGRAM_ORIGIN + k as u32, byte);
    }
    cpu.registers = reset_record(PROGRAM_ORIGIN).registers;
    cpu
}

/// CPU with the given registers and raw bytes stored at remapped addresses
pub fn cpu_with_state(registers: Registers, ram: &[(u32, u8)]) -> CPU {
    let mut cpu = CPU::new(Memory::new());
    for &(address, value) in ram {
        cpu.memory.poke(Memory::remap(address), value);
    }
    cpu.registers = registers;
    cpu
}

//
// Sample capture
/////////////////

/// Ops between two NMIs in [`frame_loop_trace`]
pub const FRAME_OPS: u64 = 40;

#[rustfmt::skip]
const MAIN_LOOP: [u8; 14] = [
    0xE6, 0x10,             // INC $10
    0xA5, 0x10,             // LDA $10
    0x18,                   // CLC
    0x69, 0x03,             // ADC #$03
    0x85, 0x11,             // STA $11
    0x20, 0x00, 0xA0,       // JSR $A000
    0x80, 0xF2,             // BRA $8000
];

#[rustfmt::skip]
const FRAME_HANDLER: [u8; 10] = [
    0xAD, 0x18, 0x42,       // LDA $4218
    0x8D, 0x00, 0x03,       // STA $0300
    0xEE, 0x01, 0x03,       // INC $0301
    0x40,                   // RTI
];

#[rustfmt::skip]
const SUBROUTINE_BODY: [u8; 2] = [
    0xE8,                   // INX
    0x60,                   // RTS
];

/// Joypad value the sample capture supplies in frame `frame`
pub fn joypad_value(frame: u32) -> u8 {
    (frame as u8).wrapping_mul(7) ^ 0x5A
}

/// A RESET at op 0, then one NMI every [`FRAME_OPS`] ops for `frames` frames
///
/// The NMI handler reads the joypad, which the capture supplies through a
/// READ_BYTE event one op after each NMI.
pub fn frame_loop_trace(frames: u32) -> Result<(Rom, Vec<u8>), TraceError> {
    let rom = build_rom(&MAIN_LOOP, &FRAME_HANDLER, &SUBROUTINE_BODY);
    let mut writer = TraceWriter::new(Vec::new(), &trace_header(&rom))?;
    writer.reset(0, &reset_record(PROGRAM_ORIGIN), &patterned_wram())?;
    for frame in 1..=frames as u64 {
        let op = frame * FRAME_OPS;
        writer.nmi(op)?;
        writer.read_byte(op + 1, 0x00_4218, joypad_value(frame as u32))?;
    }
    let log = writer.finish((frames as u64 + 1) * FRAME_OPS)?;
    Ok((rom, log))
}
