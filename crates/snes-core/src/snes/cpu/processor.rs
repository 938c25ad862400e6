use super::interrupts::Interrupt;
use super::opcodes::{OPCODES_MAP, Opcode, Operation};
use super::registers::Registers;
use super::{BlockMove, CPU, CpuError, Event, StepContext};
use crate::snes::bus::MemoryAccessType;
use crate::snes::bus::memory::Memory;
use crate::snes::cartridge::rom::Rom;
use crate::{trace, trace_obj};

impl CPU {
    pub fn new(memory: Memory) -> Self {
        CPU {
            registers: Registers::default(),
            memory,
            event: Event::None,
            context: StepContext::default(),
            error: None,
            strict_dma: false,
            last_opcode: None,
            block_move: None,
            observer: None,
            observers_suppressed: false,
        }
    }

    pub fn new_with_rom(rom: &Rom) -> Self {
        CPU::new(Memory::new_with_rom(rom))
    }

    pub(super) fn begin_step(&mut self) {
        self.event = Event::None;
        self.error = None;
        self.context = StepContext {
            pc_before: self.registers.program_counter,
            ..StepContext::default()
        };
    }

    fn finish_step(&mut self) -> Result<Event, CpuError> {
        trace_obj!(self);
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self.event),
        }
    }

    /// Executes one instruction, or one byte of a block move in progress
    pub fn step(&mut self) -> Result<Event, CpuError> {
        self.begin_step();

        let resumed = self
            .block_move
            .filter(|state| state.pc == self.registers.program_counter);
        match resumed {
            Some(state) => self.block_move_step(state),
            None => {
                self.block_move = None;
                let code = self.fetch_byte();
                let opcode: &'static Opcode = OPCODES_MAP
                    .get(&code)
                    .copied()
                    .ok_or(CpuError::UnsupportedOpcode(code))?;
                self.last_opcode = Some(opcode);
                trace!(
                    "[CPU] {:06X} {:02X} {}",
                    self.context.pc_before,
                    code,
                    opcode.operation.mnemonic()
                );
                if let Err(err) = self.execute(opcode) {
                    self.error.get_or_insert(err);
                }
            }
        }

        self.finish_step()
    }

    /// Runs an interrupt entry sequence as one step
    pub fn step_interrupt(&mut self, interrupt: Interrupt) -> Result<Event, CpuError> {
        self.begin_step();
        let return_offset = self.registers.program_offset();
        self.enter_interrupt(interrupt, return_offset);
        self.finish_step()
    }

    fn execute(&mut self, opcode: &'static Opcode) -> Result<(), CpuError> {
        let operand = self.resolve_operand(opcode);
        match opcode.operation {
            // Arithmetic and logic
            Operation::Adc => self.adc(&operand),
            Operation::Sbc => self.sbc(&operand),
            Operation::And => self.and(&operand),
            Operation::Ora => self.ora(&operand),
            Operation::Eor => self.eor(&operand),
            Operation::Bit => self.bit(&operand),
            Operation::Cmp => self.cmp(&operand),
            Operation::Cpx => self.cpx(&operand),
            Operation::Cpy => self.cpy(&operand),
            Operation::Tsb => self.tsb(&operand)?,
            Operation::Trb => self.trb(&operand)?,

            // Read-modify-write
            Operation::Inc => self.inc(&operand)?,
            Operation::Dec => self.dec(&operand)?,
            Operation::Asl => self.asl(&operand)?,
            Operation::Lsr => self.lsr(&operand)?,
            Operation::Rol => self.rol(&operand)?,
            Operation::Ror => self.ror(&operand)?,
            Operation::Inx => self.inx(),
            Operation::Iny => self.iny(),
            Operation::Dex => self.dex(),
            Operation::Dey => self.dey(),

            // Loads and stores
            Operation::Lda => self.lda(&operand),
            Operation::Ldx => self.ldx(&operand),
            Operation::Ldy => self.ldy(&operand),
            Operation::Sta => self.sta(&operand)?,
            Operation::Stx => self.stx(&operand)?,
            Operation::Sty => self.sty(&operand)?,
            Operation::Stz => self.stz(&operand)?,

            // Branches
            Operation::Bcc => self.bcc(&operand)?,
            Operation::Bcs => self.bcs(&operand)?,
            Operation::Beq => self.beq(&operand)?,
            Operation::Bne => self.bne(&operand)?,
            Operation::Bmi => self.bmi(&operand)?,
            Operation::Bpl => self.bpl(&operand)?,
            Operation::Bvc => self.bvc(&operand)?,
            Operation::Bvs => self.bvs(&operand)?,
            Operation::Bra | Operation::Brl => self.bra(&operand)?,

            // Jumps, calls and returns
            Operation::Jmp => self.jmp(&operand)?,
            Operation::Jml => self.jml(&operand)?,
            Operation::Jsr => self.jsr(&operand)?,
            Operation::Jsl => self.jsl(&operand)?,
            Operation::Rts => self.rts(),
            Operation::Rtl => self.rtl(),
            Operation::Rti => self.rti(),
            Operation::Brk => self.brk(),
            Operation::Cop => self.cop(),

            // Status flags
            Operation::Clc => self.clc(),
            Operation::Cld => self.cld(),
            Operation::Cli => self.cli(),
            Operation::Clv => self.clv(),
            Operation::Sec => self.sec(),
            Operation::Sed => self.sed(),
            Operation::Sei => self.sei(),
            Operation::Sep => self.sep(),
            Operation::Rep => self.rep(),
            Operation::Xce => self.xce(),

            // Transfers
            Operation::Tax => self.tax(),
            Operation::Tay => self.tay(),
            Operation::Txa => self.txa(),
            Operation::Tya => self.tya(),
            Operation::Txy => self.txy(),
            Operation::Tyx => self.tyx(),
            Operation::Tsx => self.tsx(),
            Operation::Txs => self.txs(),
            Operation::Tcd => self.tcd(),
            Operation::Tdc => self.tdc(),
            Operation::Tcs => self.tcs(),
            Operation::Tsc => self.tsc(),
            Operation::Xba => self.xba(),

            // Stack
            Operation::Pha => self.pha(),
            Operation::Phb => self.phb(),
            Operation::Phd => self.phd(),
            Operation::Phk => self.phk(),
            Operation::Php => self.php(),
            Operation::Phx => self.phx(),
            Operation::Phy => self.phy(),
            Operation::Pla => self.pla(),
            Operation::Plb => self.plb(),
            Operation::Pld => self.pld(),
            Operation::Plp => self.plp(),
            Operation::Plx => self.plx(),
            Operation::Ply => self.ply(),
            Operation::Pea => self.pea(),
            Operation::Pei => self.pei(),
            Operation::Per => self.per(),

            // Misc
            Operation::Nop | Operation::Wai => {}
            Operation::Wdm => self.wdm(),
            Operation::Stp => {
                return Err(CpuError::UnsupportedInstruction(
                    Operation::Stp,
                    self.context.pc_before,
                ));
            }
            Operation::Mvn | Operation::Mvp => self.begin_block_move(opcode.operation),
        }
        Ok(())
    }

    //
    // Block moves
    //////////////

    fn begin_block_move(&mut self, operation: Operation) {
        let destination_bank = self.fetch_byte();
        let source_bank = self.fetch_byte();
        let state = BlockMove {
            pc: self.context.pc_before,
            operation,
            destination_bank,
            source_bank,
        };
        self.block_move_step(state);
    }

    /// Moves one byte; PC stays on the instruction until A wraps to 0xFFFF
    fn block_move_step(&mut self, state: BlockMove) {
        let index_mask = self.registers.index_mask();
        let source = self.x(index_mask);
        let destination = self.y(index_mask);

        let value = self.read_byte(
            ((state.source_bank as u32) << 16) | source as u32,
            MemoryAccessType::FetchMvnMvp,
        );
        self.write_byte(
            ((state.destination_bank as u32) << 16) | destination as u32,
            value,
            MemoryAccessType::WriteMvnMvp,
        );

        let delta: u16 = match state.operation {
            Operation::Mvp => 0xFFFF,
            _ => 0x0001,
        };
        self.registers.register_x = source.wrapping_add(delta) & index_mask;
        self.registers.register_y = destination.wrapping_add(delta) & index_mask;
        self.registers.register_a = self.registers.register_a.wrapping_sub(1);
        self.registers.data_bank = state.destination_bank;

        let bank = state.pc & 0xFF_0000;
        if self.registers.register_a == 0xFFFF {
            self.block_move = None;
            self.registers.program_counter = bank | (state.pc as u16).wrapping_add(3) as u32;
        } else {
            self.block_move = Some(state);
            self.registers.program_counter = state.pc;
        }
    }
}
