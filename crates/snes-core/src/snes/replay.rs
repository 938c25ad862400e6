use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use super::address_set::AddressSet;
use super::bus::memory::Memory;
use super::cartridge::rom::{Rom, RomError};
use super::cpu::registers::Registers;
use super::cpu::{CPU, CpuError, Event, interrupts};
use super::skip_cache::{CacheError, SkipCache, Snapshot};
use super::trace::format::{RegisterRecord, TraceEvent};
use super::trace::reference::ReferenceReader;
use super::trace::{TraceError, TraceReader};
use crate::trace_replay_event;

pub mod options;

#[cfg(test)]
mod replay_tests;

pub use options::ReplayOptions;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error(transparent)]
    Rom(#[from] RomError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("writing output failed: {0}")]
    Output(#[source] io::Error),

    #[error(
        "ROM does not match the trace: trace expects {expected_size} bytes with checksum {expected_checksum:04X}, ROM has {found_size} bytes with checksum {found_checksum:04X}"
    )]
    RomMismatch {
        expected_size: u32,
        expected_checksum: u16,
        found_size: u32,
        found_checksum: u16,
    },

    #[error("NMI {requested} is out of range, the trace ends after {available} NMIs")]
    NmiOutOfRange { requested: u32, available: u32 },

    #[error("Replay diverged from the reference at op {op}\n{details}")]
    Divergence { op: u64, details: String },
}

/// A trace event whose op has been resolved but that is not yet due
#[derive(Debug)]
struct PendingEvent {
    op: u64,
    event: TraceEvent,
}

/// What the event drain decided the next step is
enum Due {
    Instruction,
    Nmi,
    Irq,
    Reset(RegisterRecord, Vec<u8>),
    Finished,
}

/// Deterministic re-execution of a captured session
///
/// Owns one CPU and one trace reader. Every call to [`Replay::next`] applies
/// the events due at the current op count, then runs exactly one step.
pub struct Replay<R = BufReader<File>> {
    pub cpu: CPU,
    rom: Rom,
    reader: TraceReader<R>,
    pending: Option<PendingEvent>,
    /// Absolute op of the last event taken from the log
    last_event_op: u64,
    op_count: u64,
    nmi_count: u32,
    finished: bool,
    /// Polled by callers against the PC; the replay never stops on its own
    pub breakpoints: AddressSet,
    reference: Option<ReferenceReader<Box<dyn Read>>>,
}

impl Replay<BufReader<File>> {
    pub fn open(options: &ReplayOptions) -> Result<Self, ReplayError> {
        let raw = read_file(&options.rom_path)?;
        let rom = Rom::parse(&raw, options.rom_header)?;
        let reader = TraceReader::open(&options.trace_path)?;
        let mut replay = Replay::new(rom, reader)?;
        replay.cpu.strict_dma = options.strict_dma;

        if let Some(path) = &options.reference_path {
            let file = File::open(path).map_err(|source| ReplayError::Io {
                path: path.clone(),
                source,
            })?;
            let source: Box<dyn Read> = Box::new(BufReader::new(file));
            replay.set_reference(ReferenceReader::new(source));
        }
        info!(
            "Opened {} ({} byte ROM, checksum {:04X})",
            options.trace_path.display(),
            replay.rom.size(),
            replay.rom.checksum()
        );
        Ok(replay)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ReplayError> {
    fs::read(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl<R: Read + Seek> Replay<R> {
    /// Checks the ROM against the size and checksum recorded in the trace
    pub fn new(rom: Rom, reader: TraceReader<R>) -> Result<Self, ReplayError> {
        let header = *reader.header();
        if header.rom_size != rom.size() || header.rom_checksum != rom.checksum() {
            return Err(ReplayError::RomMismatch {
                expected_size: header.rom_size,
                expected_checksum: header.rom_checksum,
                found_size: rom.size(),
                found_checksum: rom.checksum(),
            });
        }
        Ok(Replay {
            cpu: CPU::new_with_rom(&rom),
            rom,
            reader,
            pending: None,
            last_event_op: 0,
            op_count: 0,
            nmi_count: 0,
            finished: false,
            breakpoints: AddressSet::new(),
            reference: None,
        })
    }

    pub fn set_reference(&mut self, reference: ReferenceReader<Box<dyn Read>>) {
        self.reference = Some(reference);
    }

    pub fn fingerprint(&self) -> [u8; 8] {
        self.reader.header().fingerprint
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.registers
    }

    /// Control-flow classification of the last step
    pub fn event(&self) -> Event {
        self.cpu.event
    }

    /// Steps executed so far, instructions and interrupt entries alike
    pub fn op_count(&self) -> u64 {
        self.op_count
    }

    /// NMIs handled so far, RESET included
    pub fn nmi_count(&self) -> u32 {
        self.nmi_count
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn breakpoint_hit(&self) -> bool {
        self.breakpoints.contains(self.cpu.registers.program_counter)
    }

    pub fn read_byte(&self, address: u32) -> u8 {
        self.cpu.memory.peek(Memory::remap(address))
    }

    pub fn read_word(&self, address: u32) -> u16 {
        self.cpu.memory.read(address, 2).1 as u16
    }

    pub fn read_long(&self, address: u32) -> u32 {
        self.cpu.memory.read(address, 3).1
    }

    pub fn record(&self) -> RegisterRecord {
        RegisterRecord::new(self.cpu.registers, self.cpu.memory.wram_address)
    }

    /// Runs one step; `false` once the log says the capture ended
    pub fn next(&mut self) -> Result<bool, ReplayError> {
        if self.finished {
            return Ok(false);
        }
        let due = self.drain_events()?;
        let before = self.record();

        match due {
            Due::Finished => {
                self.finished = true;
                info!(
                    "Trace finished after {} ops and {} NMIs",
                    self.op_count, self.nmi_count
                );
                return Ok(false);
            }
            Due::Instruction => {
                self.cpu.step()?;
            }
            Due::Nmi => {
                self.cpu.step_interrupt(interrupts::NMI)?;
            }
            Due::Irq => {
                self.cpu.step_interrupt(interrupts::IRQ)?;
            }
            Due::Reset(record, wram) => {
                self.cpu
                    .apply_reset(record.registers, record.wram_address, &wram);
            }
        }

        self.verify_step(&before)?;
        self.op_count += 1;
        if matches!(self.cpu.event, Event::Nmi | Event::Reset) {
            self.nmi_count += 1;
        }
        Ok(true)
    }

    /// Resolves the next event's absolute op, reading it from the log
    fn take_pending(&mut self) -> Result<PendingEvent, ReplayError> {
        if let Some(pending) = self.pending.take() {
            return Ok(pending);
        }
        let (delta, event) = self.reader.next_event()?;
        let op = self.last_event_op + delta as u64;
        self.last_event_op = op;
        Ok(PendingEvent { op, event })
    }

    /// Applies everything due at the current op, stopping at an interrupt
    fn drain_events(&mut self) -> Result<Due, ReplayError> {
        loop {
            let pending = self.take_pending()?;
            if pending.op > self.op_count {
                self.pending = Some(pending);
                return Ok(Due::Instruction);
            }
            if pending.op < self.op_count {
                return Err(TraceError::Desync {
                    event_op: pending.op,
                    current_op: self.op_count,
                }
                .into());
            }
            match pending.event {
                TraceEvent::ReadByte { address, value } => {
                    self.cpu.memory.poke(Memory::remap(address), value);
                }
                TraceEvent::ReadWord { address, value } => {
                    let remapped = Memory::remap(address);
                    let [lo, hi] = value.to_le_bytes();
                    self.cpu.memory.poke(remapped, lo);
                    self.cpu.memory.poke(remapped.wrapping_add(1), hi);
                }
                TraceEvent::Nmi => return Ok(Due::Nmi),
                TraceEvent::Irq => return Ok(Due::Irq),
                TraceEvent::Reset { record, wram } => return Ok(Due::Reset(record, wram)),
                TraceEvent::Finished => return Ok(Due::Finished),
            }
        }
    }

    fn verify_step(&mut self, before: &RegisterRecord) -> Result<(), ReplayError> {
        let op = self.op_count;
        let after = self.record();
        let Some(reference) = self.reference.as_mut() else {
            return Ok(());
        };

        let expected = loop {
            match reference.next_step()? {
                Some(step) if step.op < op => continue,
                Some(step) => break step,
                None => {
                    info!("Reference stream ended at op {op}, verification stops");
                    self.reference = None;
                    return Ok(());
                }
            }
        };

        if expected.op != op || expected.before != *before || expected.after != after {
            let details = format!(
                "{}\n{}\n{}\n{}\n{}",
                record_columns(),
                record_line("expected before", &expected.before),
                record_line("actual before", before),
                record_line("expected after", &expected.after),
                record_line("actual after", &after),
            );
            return Err(ReplayError::Divergence {
                op: expected.op.min(op),
                details,
            });
        }
        Ok(())
    }

    /// Full machine state, only available right after an NMI or RESET step
    pub fn snapshot(&self) -> Option<Snapshot> {
        if !self.snapshot_boundary() || self.nmi_count == 0 {
            return None;
        }
        Some(Snapshot {
            nmi: self.nmi_count - 1,
            seek_offset: self.reader.offset(),
            current_op: self.op_count,
            record: self.record(),
            wram: self.cpu.memory.wram().to_vec(),
            io_shadow: self.cpu.memory.io_shadow(),
        })
    }

    /// Puts the session where it was when `snapshot` was taken
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), ReplayError> {
        self.reader.seek(snapshot.seek_offset)?;
        if snapshot.current_op < self.op_count && self.reference.take().is_some() {
            warn!("Reference stream cannot rewind, verification stops after restoring an earlier snapshot");
        }
        self.pending = None;
        self.finished = false;
        self.op_count = snapshot.current_op;
        self.last_event_op = snapshot.current_op.saturating_sub(1);
        self.nmi_count = snapshot.nmi + 1;

        self.cpu.registers = snapshot.record.registers;
        self.cpu.block_move = None;
        self.cpu.error = None;
        self.cpu.event = Event::Nmi;
        self.cpu.memory.wram_address = snapshot.record.wram_address;
        self.cpu.memory.wram_mut().copy_from_slice(&snapshot.wram);
        self.cpu.memory.restore_io_shadow(&snapshot.io_shadow);
        trace_replay_event!(
            "restore nmi={} op={} PC={:06X}",
            snapshot.nmi,
            snapshot.current_op,
            self.cpu.registers.program_counter
        );
        debug!(
            "Restored snapshot at NMI {} (op {}, trace offset {})",
            snapshot.nmi, snapshot.current_op, snapshot.seek_offset
        );
        Ok(())
    }

    /// Back to the state before the first event
    pub fn restart(&mut self) -> Result<(), ReplayError> {
        self.reader.rewind()?;
        let observer = self.cpu.detach_observer();
        let strict_dma = self.cpu.strict_dma;
        self.cpu = CPU::new_with_rom(&self.rom);
        self.cpu.strict_dma = strict_dma;
        if let Some(observer) = observer {
            self.cpu.attach_observer(observer);
        }
        self.pending = None;
        self.last_event_op = 0;
        self.op_count = 0;
        self.nmi_count = 0;
        self.finished = false;
        if self.reference.take().is_some() {
            warn!("Reference stream cannot rewind, verification stops after a restart");
        }
        Ok(())
    }

    fn at_nmi(&self, nmi: u32) -> bool {
        self.nmi_count == nmi + 1 && self.snapshot_boundary()
    }

    fn snapshot_boundary(&self) -> bool {
        matches!(self.cpu.event, Event::Nmi | Event::Reset) && self.pending.is_none()
    }

    /// Stops right after the step that handled NMI `nmi`, replaying linearly
    pub fn skip_until_nmi(&mut self, nmi: u32) -> Result<(), ReplayError> {
        if self.at_nmi(nmi) {
            return Ok(());
        }
        self.skip_from(nmi, None)
    }

    /// Like [`Replay::skip_until_nmi`], starting from the newest usable snapshot
    pub fn skip_until_nmi_cached<C: Read + Seek>(
        &mut self,
        nmi: u32,
        cache: &mut SkipCache<C>,
    ) -> Result<(), ReplayError> {
        if self.at_nmi(nmi) {
            return Ok(());
        }
        let snapshot = cache.snapshot_at_or_before(nmi)?;
        self.skip_from(nmi, snapshot)
    }

    /// A snapshot is used when it lies between the current position and the
    /// target. Without one the replay steps forward, restarting first if the
    /// target is already behind.
    fn skip_from(&mut self, nmi: u32, snapshot: Option<Snapshot>) -> Result<(), ReplayError> {
        let behind = self.nmi_count > nmi;
        match snapshot {
            Some(snapshot) if behind || snapshot.nmi >= self.nmi_count => {
                self.restore(&snapshot)?;
            }
            _ if behind => self.restart()?,
            _ => {}
        }

        while self.nmi_count <= nmi {
            if !self.next()? {
                return Err(ReplayError::NmiOutOfRange {
                    requested: nmi,
                    available: self.nmi_count,
                });
            }
        }
        debug!("At NMI {nmi}, op {}", self.op_count);
        Ok(())
    }
}

impl Replay<BufReader<File>> {
    /// Seeks through the cache at `cache_path`, replaying linearly when it is unusable
    pub fn seek(&mut self, nmi: u32, cache_path: &Path) -> Result<(), ReplayError> {
        match SkipCache::open(cache_path, self.fingerprint()) {
            Ok(mut cache) if cache.covers(nmi) => {
                info!(
                    "Seeking to NMI {nmi} through {} ({} snapshots)",
                    cache_path.display(),
                    cache.snapshot_count()
                );
                self.skip_until_nmi_cached(nmi, &mut cache)
            }
            Ok(cache) => {
                warn!(
                    "Skip cache covers {} NMIs, not {nmi}; replaying from the start",
                    cache.nmi_count()
                );
                self.skip_until_nmi(nmi)
            }
            Err(err) => {
                warn!("Skip cache unusable ({err}); replaying from the start");
                self.skip_until_nmi(nmi)
            }
        }
    }
}

fn record_columns() -> String {
    format!(
        "{:<16} {:>6} {:>4} {:>4} {:>4} {:>4} {:>4} {:>2} {:>3} {:>5}",
        "", "PC", "A", "X", "Y", "S", "DP", "DB", "P", "WRAM"
    )
}

fn record_line(label: &str, record: &RegisterRecord) -> String {
    let r = &record.registers;
    format!(
        "{:<16} {:06X} {:04X} {:04X} {:04X} {:04X} {:04X} {:02X} {:03X} {:05X}",
        label,
        r.program_counter,
        r.register_a,
        r.register_x,
        r.register_y,
        r.stack_pointer,
        r.direct_page,
        r.data_bank,
        r.status.bits(),
        record.wram_address
    )
}
