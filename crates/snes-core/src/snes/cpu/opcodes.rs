use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Bra, Brk, Brl, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cop, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jml, Jmp,
    Jsl, Jsr, Lda, Ldx, Ldy, Lsr, Mvn, Mvp, Nop, Ora, Pea, Pei, Per, Pha, Phb, Phd,
    Phk, Php, Phx, Phy, Pla, Plb, Pld, Plp, Plx, Ply, Rep, Rol, Ror, Rti, Rtl, Rts,
    Sbc, Sec, Sed, Sei, Sep, Sta, Stp, Stx, Sty, Stz, Tax, Tay, Tcd, Tcs, Tdc, Trb,
    Tsb, Tsc, Tsx, Txa, Txs, Txy, Tya, Tyx, Wai, Wdm, Xba, Xce,
}

impl Operation {
    /// Upper-case assembler mnemonic
    pub fn mnemonic(&self) -> String {
        format!("{:?}", self).to_ascii_uppercase()
    }
}

/// Width of the operand an instruction works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSize {
    /// Always 8-bit (or irrelevant)
    Small,
    /// Always 16-bit
    Wide,
    /// Follows the accumulator/memory width flag
    Memory,
    /// Follows the index width flag
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// No generic operand; the handler fetches whatever it needs
    Implied,
    Accumulator,
    ImmediateMemory,
    ImmediateIndex,
    Absolute,
    AbsoluteIndexedX,
    AbsoluteIndexedY,
    AbsoluteLong,
    AbsoluteLongIndexedX,
    AbsoluteIndirect,
    AbsoluteIndirectLong,
    AbsoluteIndexedXIndirect,
    DirectPage,
    DirectPageIndexedX,
    DirectPageIndexedY,
    DirectPageIndirect,
    DirectPageIndirectLong,
    DirectPageIndexedXIndirect,
    DirectPageIndirectIndexedY,
    DirectPageIndirectLongIndexedY,
    StackRelative,
    StackRelativeIndirectIndexedY,
    Branch8,
    Branch16,
}

#[derive(Debug)]
pub struct Opcode {
    pub code: u8,
    pub operation: Operation,
    pub size: OperandSize,
    pub mode: AddressingMode,
    /// Operand is read from the effective address before dispatch
    pub load_operand: bool,
}

impl Opcode {
    pub const fn new(
        code: u8,
        operation: Operation,
        size: OperandSize,
        mode: AddressingMode,
        load_operand: bool,
    ) -> Self {
        Self {
            code,
            operation,
            size,
            mode,
            load_operand,
        }
    }
}

#[rustfmt::skip]
const OPCODES: &[Opcode] = &[
    Opcode::new(0x00, Operation::Brk,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x01, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0x02, Operation::Cop,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x03, Operation::Ora,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0x04, Operation::Tsb,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x05, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x06, Operation::Asl,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x07, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0x08, Operation::Php,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x09, Operation::Ora,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0x0A, Operation::Asl,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x0B, Operation::Phd,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x0C, Operation::Tsb,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x0D, Operation::Ora,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x0E, Operation::Asl,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x0F, Operation::Ora,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0x10, Operation::Bpl,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x11, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0x12, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0x13, Operation::Ora,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0x14, Operation::Trb,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x15, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x16, Operation::Asl,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x17, Operation::Ora,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0x18, Operation::Clc,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x19, Operation::Ora,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0x1A, Operation::Inc,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x1B, Operation::Tcs,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x1C, Operation::Trb,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x1D, Operation::Ora,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x1E, Operation::Asl,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x1F, Operation::Ora,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0x20, Operation::Jsr,  OperandSize::Small,  AddressingMode::Absolute,                       false),
    Opcode::new(0x21, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0x22, Operation::Jsl,  OperandSize::Small,  AddressingMode::AbsoluteLong,                   false),
    Opcode::new(0x23, Operation::And,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0x24, Operation::Bit,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x25, Operation::And,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x26, Operation::Rol,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x27, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0x28, Operation::Plp,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x29, Operation::And,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0x2A, Operation::Rol,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x2B, Operation::Pld,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x2C, Operation::Bit,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x2D, Operation::And,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x2E, Operation::Rol,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x2F, Operation::And,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0x30, Operation::Bmi,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x31, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0x32, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0x33, Operation::And,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0x34, Operation::Bit,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x35, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x36, Operation::Rol,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x37, Operation::And,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0x38, Operation::Sec,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x39, Operation::And,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0x3A, Operation::Dec,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x3B, Operation::Tsc,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x3C, Operation::Bit,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x3D, Operation::And,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x3E, Operation::Rol,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x3F, Operation::And,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0x40, Operation::Rti,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x41, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0x42, Operation::Wdm,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x43, Operation::Eor,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0x44, Operation::Mvp,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x45, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x46, Operation::Lsr,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x47, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0x48, Operation::Pha,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x49, Operation::Eor,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0x4A, Operation::Lsr,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x4B, Operation::Phk,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x4C, Operation::Jmp,  OperandSize::Small,  AddressingMode::Absolute,                       false),
    Opcode::new(0x4D, Operation::Eor,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x4E, Operation::Lsr,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x4F, Operation::Eor,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0x50, Operation::Bvc,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x51, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0x52, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0x53, Operation::Eor,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0x54, Operation::Mvn,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x55, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x56, Operation::Lsr,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x57, Operation::Eor,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0x58, Operation::Cli,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x59, Operation::Eor,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0x5A, Operation::Phy,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x5B, Operation::Tcd,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x5C, Operation::Jml,  OperandSize::Small,  AddressingMode::AbsoluteLong,                   false),
    Opcode::new(0x5D, Operation::Eor,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x5E, Operation::Lsr,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x5F, Operation::Eor,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0x60, Operation::Rts,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x61, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0x62, Operation::Per,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x63, Operation::Adc,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0x64, Operation::Stz,  OperandSize::Memory, AddressingMode::DirectPage,                     false),
    Opcode::new(0x65, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x66, Operation::Ror,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0x67, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0x68, Operation::Pla,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x69, Operation::Adc,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0x6A, Operation::Ror,  OperandSize::Memory, AddressingMode::Accumulator,                    false),
    Opcode::new(0x6B, Operation::Rtl,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x6C, Operation::Jmp,  OperandSize::Small,  AddressingMode::AbsoluteIndirect,               false),
    Opcode::new(0x6D, Operation::Adc,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x6E, Operation::Ror,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0x6F, Operation::Adc,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0x70, Operation::Bvs,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x71, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0x72, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0x73, Operation::Adc,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0x74, Operation::Stz,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             false),
    Opcode::new(0x75, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x76, Operation::Ror,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0x77, Operation::Adc,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0x78, Operation::Sei,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x79, Operation::Adc,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0x7A, Operation::Ply,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x7B, Operation::Tdc,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x7C, Operation::Jmp,  OperandSize::Small,  AddressingMode::AbsoluteIndexedXIndirect,       false),
    Opcode::new(0x7D, Operation::Adc,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x7E, Operation::Ror,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0x7F, Operation::Adc,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0x80, Operation::Bra,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x81, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     false),
    Opcode::new(0x82, Operation::Brl,  OperandSize::Small,  AddressingMode::Branch16,                       false),
    Opcode::new(0x83, Operation::Sta,  OperandSize::Memory, AddressingMode::StackRelative,                  false),
    Opcode::new(0x84, Operation::Sty,  OperandSize::Index,  AddressingMode::DirectPage,                     false),
    Opcode::new(0x85, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPage,                     false),
    Opcode::new(0x86, Operation::Stx,  OperandSize::Index,  AddressingMode::DirectPage,                     false),
    Opcode::new(0x87, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         false),
    Opcode::new(0x88, Operation::Dey,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x89, Operation::Bit,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0x8A, Operation::Txa,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x8B, Operation::Phb,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x8C, Operation::Sty,  OperandSize::Index,  AddressingMode::Absolute,                       false),
    Opcode::new(0x8D, Operation::Sta,  OperandSize::Memory, AddressingMode::Absolute,                       false),
    Opcode::new(0x8E, Operation::Stx,  OperandSize::Index,  AddressingMode::Absolute,                       false),
    Opcode::new(0x8F, Operation::Sta,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   false),
    Opcode::new(0x90, Operation::Bcc,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0x91, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     false),
    Opcode::new(0x92, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             false),
    Opcode::new(0x93, Operation::Sta,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  false),
    Opcode::new(0x94, Operation::Sty,  OperandSize::Index,  AddressingMode::DirectPageIndexedX,             false),
    Opcode::new(0x95, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             false),
    Opcode::new(0x96, Operation::Stx,  OperandSize::Index,  AddressingMode::DirectPageIndexedY,             false),
    Opcode::new(0x97, Operation::Sta,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, false),
    Opcode::new(0x98, Operation::Tya,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x99, Operation::Sta,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               false),
    Opcode::new(0x9A, Operation::Txs,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x9B, Operation::Txy,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0x9C, Operation::Stz,  OperandSize::Memory, AddressingMode::Absolute,                       false),
    Opcode::new(0x9D, Operation::Sta,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               false),
    Opcode::new(0x9E, Operation::Stz,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               false),
    Opcode::new(0x9F, Operation::Sta,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           false),
    Opcode::new(0xA0, Operation::Ldy,  OperandSize::Index,  AddressingMode::ImmediateIndex,                 false),
    Opcode::new(0xA1, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0xA2, Operation::Ldx,  OperandSize::Index,  AddressingMode::ImmediateIndex,                 false),
    Opcode::new(0xA3, Operation::Lda,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0xA4, Operation::Ldy,  OperandSize::Index,  AddressingMode::DirectPage,                     true),
    Opcode::new(0xA5, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0xA6, Operation::Ldx,  OperandSize::Index,  AddressingMode::DirectPage,                     true),
    Opcode::new(0xA7, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0xA8, Operation::Tay,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xA9, Operation::Lda,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0xAA, Operation::Tax,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xAB, Operation::Plb,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xAC, Operation::Ldy,  OperandSize::Index,  AddressingMode::Absolute,                       true),
    Opcode::new(0xAD, Operation::Lda,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0xAE, Operation::Ldx,  OperandSize::Index,  AddressingMode::Absolute,                       true),
    Opcode::new(0xAF, Operation::Lda,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0xB0, Operation::Bcs,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0xB1, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0xB2, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0xB3, Operation::Lda,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0xB4, Operation::Ldy,  OperandSize::Index,  AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xB5, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xB6, Operation::Ldx,  OperandSize::Index,  AddressingMode::DirectPageIndexedY,             true),
    Opcode::new(0xB7, Operation::Lda,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0xB8, Operation::Clv,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xB9, Operation::Lda,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0xBA, Operation::Tsx,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xBB, Operation::Tyx,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xBC, Operation::Ldy,  OperandSize::Index,  AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xBD, Operation::Lda,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xBE, Operation::Ldx,  OperandSize::Index,  AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0xBF, Operation::Lda,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0xC0, Operation::Cpy,  OperandSize::Index,  AddressingMode::ImmediateIndex,                 false),
    Opcode::new(0xC1, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0xC2, Operation::Rep,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xC3, Operation::Cmp,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0xC4, Operation::Cpy,  OperandSize::Index,  AddressingMode::DirectPage,                     true),
    Opcode::new(0xC5, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0xC6, Operation::Dec,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0xC7, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0xC8, Operation::Iny,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xC9, Operation::Cmp,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0xCA, Operation::Dex,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xCB, Operation::Wai,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xCC, Operation::Cpy,  OperandSize::Index,  AddressingMode::Absolute,                       true),
    Opcode::new(0xCD, Operation::Cmp,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0xCE, Operation::Dec,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0xCF, Operation::Cmp,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0xD0, Operation::Bne,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0xD1, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0xD2, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0xD3, Operation::Cmp,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0xD4, Operation::Pei,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xD5, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xD6, Operation::Dec,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xD7, Operation::Cmp,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0xD8, Operation::Cld,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xD9, Operation::Cmp,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0xDA, Operation::Phx,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xDB, Operation::Stp,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xDC, Operation::Jml,  OperandSize::Small,  AddressingMode::AbsoluteIndirectLong,           false),
    Opcode::new(0xDD, Operation::Cmp,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xDE, Operation::Dec,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xDF, Operation::Cmp,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
    Opcode::new(0xE0, Operation::Cpx,  OperandSize::Index,  AddressingMode::ImmediateIndex,                 false),
    Opcode::new(0xE1, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndexedXIndirect,     true),
    Opcode::new(0xE2, Operation::Sep,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xE3, Operation::Sbc,  OperandSize::Memory, AddressingMode::StackRelative,                  true),
    Opcode::new(0xE4, Operation::Cpx,  OperandSize::Index,  AddressingMode::DirectPage,                     true),
    Opcode::new(0xE5, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0xE6, Operation::Inc,  OperandSize::Memory, AddressingMode::DirectPage,                     true),
    Opcode::new(0xE7, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndirectLong,         true),
    Opcode::new(0xE8, Operation::Inx,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xE9, Operation::Sbc,  OperandSize::Memory, AddressingMode::ImmediateMemory,                false),
    Opcode::new(0xEA, Operation::Nop,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xEB, Operation::Xba,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xEC, Operation::Cpx,  OperandSize::Index,  AddressingMode::Absolute,                       true),
    Opcode::new(0xED, Operation::Sbc,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0xEE, Operation::Inc,  OperandSize::Memory, AddressingMode::Absolute,                       true),
    Opcode::new(0xEF, Operation::Sbc,  OperandSize::Memory, AddressingMode::AbsoluteLong,                   true),
    Opcode::new(0xF0, Operation::Beq,  OperandSize::Small,  AddressingMode::Branch8,                        false),
    Opcode::new(0xF1, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndirectIndexedY,     true),
    Opcode::new(0xF2, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndirect,             true),
    Opcode::new(0xF3, Operation::Sbc,  OperandSize::Memory, AddressingMode::StackRelativeIndirectIndexedY,  true),
    Opcode::new(0xF4, Operation::Pea,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xF5, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xF6, Operation::Inc,  OperandSize::Memory, AddressingMode::DirectPageIndexedX,             true),
    Opcode::new(0xF7, Operation::Sbc,  OperandSize::Memory, AddressingMode::DirectPageIndirectLongIndexedY, true),
    Opcode::new(0xF8, Operation::Sed,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xF9, Operation::Sbc,  OperandSize::Memory, AddressingMode::AbsoluteIndexedY,               true),
    Opcode::new(0xFA, Operation::Plx,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xFB, Operation::Xce,  OperandSize::Small,  AddressingMode::Implied,                        false),
    Opcode::new(0xFC, Operation::Jsr,  OperandSize::Small,  AddressingMode::AbsoluteIndexedXIndirect,       false),
    Opcode::new(0xFD, Operation::Sbc,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xFE, Operation::Inc,  OperandSize::Memory, AddressingMode::AbsoluteIndexedX,               true),
    Opcode::new(0xFF, Operation::Sbc,  OperandSize::Memory, AddressingMode::AbsoluteLongIndexedX,           true),
];

pub static OPCODES_MAP: Lazy<HashMap<u8, &'static Opcode>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for opcode in OPCODES {
        map.insert(opcode.code, opcode);
    }
    map
});

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_every_opcode_is_decodable() {
        for code in 0..=0xFFu8 {
            let opcode = OPCODES_MAP.get(&code);
            assert!(opcode.is_some(), "missing opcode {:02X}", code);
            assert_eq!(opcode.unwrap().code, code);
        }
        assert_eq!(OPCODES.len(), 256);
    }

    #[test]
    fn test_stores_never_load_their_operand() {
        for opcode in OPCODES {
            if matches!(
                opcode.operation,
                Operation::Sta | Operation::Stx | Operation::Sty | Operation::Stz
            ) {
                assert!(!opcode.load_operand, "{:02X}", opcode.code);
            }
        }
    }

    #[test]
    fn test_index_immediates_follow_index_width() {
        for code in [0xA0u8, 0xA2, 0xC0, 0xE0] {
            let opcode = OPCODES_MAP[&code];
            assert_eq!(opcode.mode, AddressingMode::ImmediateIndex);
            assert_eq!(opcode.size, OperandSize::Index);
        }
        assert_eq!(OPCODES_MAP[&0xA9].mode, AddressingMode::ImmediateMemory);
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(Operation::Jsl.mnemonic(), "JSL");
        assert_eq!(OPCODES_MAP[&0x54].operation, Operation::Mvn);
    }
}
