//! Skip cache: periodic full snapshots of a replay plus the trace summary
//!
//! ```text
//! header    magic:u64 version:u32 fingerprint[8] nmi_per_skip:u32 nmi_count:u32
//!           summary_offset:u64 snapshot_offset:u64
//! snapshot  nmi:u32 seek_offset:u64 current_op:u64 register-record
//!           bank $7E, bank $7F, hardware register shadow
//! summary   see [`TraceSummary::write_to`]
//! ```
//!
//! Snapshot `k` is taken right after NMI `k * nmi_per_skip` was handled. The
//! header is written twice: once as a placeholder, and again with the final
//! counts when the pass completes, so a cache from an interrupted pass is
//! recognizable by its zero summary offset.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use super::bus::consts::{IO_SHADOW_SIZE, WRAM_SIZE};
use super::cpu::Event;
use super::replay::{Replay, ReplayError};
use super::summary::{SummaryBuilder, TraceSummary};
use super::trace::format::{REGISTER_RECORD_SIZE, RegisterRecord};

pub const CACHE_MAGIC: u64 = 0x534E_5354_4341_4348;
pub const CACHE_VERSION: u32 = 1;
pub const CACHE_HEADER_SIZE: usize = 44;
pub const SNAPSHOT_SIZE: usize = 4 + 8 + 8 + REGISTER_RECORD_SIZE + WRAM_SIZE + IO_SHADOW_SIZE;

const PROGRESS_INTERVAL: u32 = 100;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("skip cache I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("not a skip cache (magic {0:016X})")]
    BadMagic(u64),

    #[error("skip cache version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("skip cache was built from a different trace")]
    FingerprintMismatch,

    #[error("skip cache is incomplete, its build pass never finished")]
    Incomplete,

    #[error("snapshot interval must be at least 1")]
    ZeroInterval,

    #[error("snapshot {index} holds NMI {found}, expected NMI {expected}")]
    SnapshotOutOfOrder { index: u32, found: u32, expected: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheHeader {
    pub fingerprint: [u8; 8],
    pub nmi_per_skip: u32,
    pub nmi_count: u32,
    pub summary_offset: u64,
    pub snapshot_offset: u64,
}

impl CacheHeader {
    pub fn encode(&self) -> [u8; CACHE_HEADER_SIZE] {
        let mut bytes = [0u8; CACHE_HEADER_SIZE];
        bytes[0..8].copy_from_slice(&CACHE_MAGIC.to_le_bytes());
        bytes[8..12].copy_from_slice(&CACHE_VERSION.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.fingerprint);
        bytes[20..24].copy_from_slice(&self.nmi_per_skip.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.nmi_count.to_le_bytes());
        bytes[28..36].copy_from_slice(&self.summary_offset.to_le_bytes());
        bytes[36..44].copy_from_slice(&self.snapshot_offset.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; CACHE_HEADER_SIZE]) -> Result<CacheHeader, CacheError> {
        let u32_at = |k: usize| u32::from_le_bytes([bytes[k], bytes[k + 1], bytes[k + 2], bytes[k + 3]]);
        let u64_at = |k: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[k..k + 8]);
            u64::from_le_bytes(word)
        };
        let magic = u64_at(0);
        if magic != CACHE_MAGIC {
            return Err(CacheError::BadMagic(magic));
        }
        let version = u32_at(8);
        if version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                found: version,
                expected: CACHE_VERSION,
            });
        }
        let mut fingerprint = [0u8; 8];
        fingerprint.copy_from_slice(&bytes[12..20]);
        Ok(CacheHeader {
            fingerprint,
            nmi_per_skip: u32_at(20),
            nmi_count: u32_at(24),
            summary_offset: u64_at(28),
            snapshot_offset: u64_at(36),
        })
    }
}

/// Complete replay state right after an NMI (or RESET) step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Index of the NMI that was just handled
    pub nmi: u32,
    /// Trace offset of the first event not yet consumed
    pub seek_offset: u64,
    /// Op count after the NMI step
    pub current_op: u64,
    pub record: RegisterRecord,
    /// Banks $7E and $7F
    pub wram: Vec<u8>,
    pub io_shadow: Vec<u8>,
}

impl Snapshot {
    pub fn write_to<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(&self.nmi.to_le_bytes())?;
        sink.write_all(&self.seek_offset.to_le_bytes())?;
        sink.write_all(&self.current_op.to_le_bytes())?;
        sink.write_all(&self.record.encode())?;
        sink.write_all(&self.wram)?;
        sink.write_all(&self.io_shadow)
    }

    pub fn read_from<R: Read>(source: &mut R) -> io::Result<Snapshot> {
        let mut nmi = [0u8; 4];
        source.read_exact(&mut nmi)?;
        let mut seek_offset = [0u8; 8];
        source.read_exact(&mut seek_offset)?;
        let mut current_op = [0u8; 8];
        source.read_exact(&mut current_op)?;
        let mut record = [0u8; REGISTER_RECORD_SIZE];
        source.read_exact(&mut record)?;
        let mut wram = vec![0u8; WRAM_SIZE];
        source.read_exact(&mut wram)?;
        let mut io_shadow = vec![0u8; IO_SHADOW_SIZE];
        source.read_exact(&mut io_shadow)?;
        Ok(Snapshot {
            nmi: u32::from_le_bytes(nmi),
            seek_offset: u64::from_le_bytes(seek_offset),
            current_op: u64::from_le_bytes(current_op),
            record: RegisterRecord::decode(&record),
            wram,
            io_shadow,
        })
    }
}

//
// Writing
//////////

pub struct SkipCacheWriter<W: Write + Seek = BufWriter<File>> {
    sink: W,
    header: CacheHeader,
    snapshot_count: u32,
}

impl SkipCacheWriter<BufWriter<File>> {
    pub fn create(
        path: impl AsRef<Path>,
        fingerprint: [u8; 8],
        nmi_per_skip: u32,
    ) -> Result<Self, CacheError> {
        let file = File::create(path)?;
        SkipCacheWriter::new(BufWriter::new(file), fingerprint, nmi_per_skip)
    }
}

impl<W: Write + Seek> SkipCacheWriter<W> {
    pub fn new(mut sink: W, fingerprint: [u8; 8], nmi_per_skip: u32) -> Result<Self, CacheError> {
        if nmi_per_skip == 0 {
            return Err(CacheError::ZeroInterval);
        }
        let header = CacheHeader {
            fingerprint,
            nmi_per_skip,
            nmi_count: 0,
            summary_offset: 0,
            snapshot_offset: CACHE_HEADER_SIZE as u64,
        };
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&header.encode())?;
        Ok(SkipCacheWriter {
            sink,
            header,
            snapshot_count: 0,
        })
    }

    pub fn nmi_per_skip(&self) -> u32 {
        self.header.nmi_per_skip
    }

    /// Snapshots must arrive in order, one per interval
    pub fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), CacheError> {
        let expected = self.snapshot_count * self.header.nmi_per_skip;
        if snapshot.nmi != expected {
            return Err(CacheError::SnapshotOutOfOrder {
                index: self.snapshot_count,
                found: snapshot.nmi,
                expected,
            });
        }
        snapshot.write_to(&mut self.sink)?;
        self.snapshot_count += 1;
        Ok(())
    }

    /// Appends the summary and rewrites the header with the final counts
    pub fn finish(mut self, nmi_count: u32, summary: &TraceSummary) -> Result<W, CacheError> {
        self.header.nmi_count = nmi_count;
        self.header.summary_offset =
            self.header.snapshot_offset + self.snapshot_count as u64 * SNAPSHOT_SIZE as u64;
        summary.write_to(&mut self.sink)?;
        self.sink.seek(SeekFrom::Start(0))?;
        self.sink.write_all(&self.header.encode())?;
        self.sink.flush()?;
        debug!(
            "Skip cache holds {} snapshots for {} NMIs",
            self.snapshot_count, nmi_count
        );
        Ok(self.sink)
    }
}

//
// Reading
//////////

pub struct SkipCache<R = BufReader<File>> {
    source: R,
    header: CacheHeader,
}

impl SkipCache<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, fingerprint: [u8; 8]) -> Result<Self, CacheError> {
        let file = File::open(path)?;
        SkipCache::from_reader(BufReader::new(file), fingerprint)
    }
}

impl<R: Read + Seek> SkipCache<R> {
    /// Validates the header against the trace's fingerprint
    pub fn from_reader(mut source: R, fingerprint: [u8; 8]) -> Result<Self, CacheError> {
        source.seek(SeekFrom::Start(0))?;
        let mut bytes = [0u8; CACHE_HEADER_SIZE];
        source.read_exact(&mut bytes)?;
        let header = CacheHeader::decode(&bytes)?;
        if header.fingerprint != fingerprint {
            return Err(CacheError::FingerprintMismatch);
        }
        if header.summary_offset == 0 {
            return Err(CacheError::Incomplete);
        }
        if header.nmi_per_skip == 0 {
            return Err(CacheError::ZeroInterval);
        }
        Ok(SkipCache { source, header })
    }

    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    pub fn nmi_count(&self) -> u32 {
        self.header.nmi_count
    }

    pub fn snapshot_count(&self) -> u32 {
        let bytes = self
            .header
            .summary_offset
            .saturating_sub(self.header.snapshot_offset);
        (bytes / SNAPSHOT_SIZE as u64) as u32
    }

    /// Whether the pass that built this cache reached NMI `nmi`
    pub fn covers(&self, nmi: u32) -> bool {
        nmi < self.header.nmi_count
    }

    /// Newest snapshot taken at or before NMI `nmi`
    pub fn snapshot_at_or_before(&mut self, nmi: u32) -> Result<Option<Snapshot>, CacheError> {
        let count = self.snapshot_count();
        if count == 0 {
            return Ok(None);
        }
        let index = (nmi / self.header.nmi_per_skip).min(count - 1);
        let offset = self.header.snapshot_offset + index as u64 * SNAPSHOT_SIZE as u64;
        self.source.seek(SeekFrom::Start(offset))?;
        let snapshot = Snapshot::read_from(&mut self.source)?;
        let expected = index * self.header.nmi_per_skip;
        if snapshot.nmi != expected {
            return Err(CacheError::SnapshotOutOfOrder {
                index,
                found: snapshot.nmi,
                expected,
            });
        }
        Ok(Some(snapshot))
    }

    pub fn load_summary(&mut self) -> Result<TraceSummary, CacheError> {
        self.source
            .seek(SeekFrom::Start(self.header.summary_offset))?;
        Ok(TraceSummary::read_from(&mut self.source)?)
    }
}

//
// Build pass
/////////////

/// Replays the whole trace from its current position, collecting a summary
/// and, when `cache` is given, writing a snapshot every `nmi_per_skip` NMIs
///
/// Returns the summary and the number of NMIs the trace contains.
pub fn build_pass<R, W>(
    replay: &mut Replay<R>,
    mut cache: Option<&mut SkipCacheWriter<W>>,
) -> Result<(TraceSummary, u32), ReplayError>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let builder = Rc::new(RefCell::new(SummaryBuilder::default()));
    replay.cpu.attach_observer(Box::new(Rc::clone(&builder)));
    let result = run_pass(replay, &builder, cache.as_deref_mut());
    replay.cpu.detach_observer();
    result?;

    let summary = builder.take().finish();
    info!(
        "Pass complete: {} NMIs, {} ops, {} instruction variants",
        replay.nmi_count(),
        replay.op_count(),
        summary.variant_count()
    );
    Ok((summary, replay.nmi_count()))
}

fn run_pass<R, W>(
    replay: &mut Replay<R>,
    builder: &Rc<RefCell<SummaryBuilder>>,
    mut cache: Option<&mut SkipCacheWriter<W>>,
) -> Result<(), ReplayError>
where
    R: Read + Seek,
    W: Write + Seek,
{
    loop {
        let before = replay.cpu.registers;
        if !replay.next()? {
            return Ok(());
        }
        builder.borrow_mut().record_step(&before, &replay.cpu);

        if !matches!(replay.event(), Event::Nmi | Event::Reset) {
            continue;
        }
        let nmi = replay.nmi_count() - 1;
        if nmi % PROGRESS_INTERVAL == 0 {
            info!("NMI {nmi} (op {})", replay.op_count());
        }
        if let Some(writer) = cache.as_deref_mut() {
            if nmi % writer.nmi_per_skip() == 0 {
                if let Some(snapshot) = replay.snapshot() {
                    writer.write_snapshot(&snapshot)?;
                }
            }
        }
    }
}

/// Runs a build pass from the start of the trace and writes the cache at `path`
pub fn build_cache_file<R: Read + Seek>(
    replay: &mut Replay<R>,
    path: &Path,
    nmi_per_skip: u32,
) -> Result<TraceSummary, ReplayError> {
    replay.restart()?;
    let mut writer = SkipCacheWriter::create(path, replay.fingerprint(), nmi_per_skip)?;
    let (summary, nmi_count) = build_pass(replay, Some(&mut writer))?;
    writer.finish(nmi_count, &summary)?;
    info!("Wrote skip cache {}", path.display());
    Ok(summary)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::snes::cpu::registers::Registers;

    fn snapshot(nmi: u32) -> Snapshot {
        let mut registers = Registers::default();
        registers.program_counter = 0x80_8000 + nmi;
        let mut wram = vec![0u8; WRAM_SIZE];
        wram[nmi as usize] = 0xAA;
        Snapshot {
            nmi,
            seek_offset: 32 + nmi as u64 * 5,
            current_op: nmi as u64 * 100 + 1,
            record: RegisterRecord::new(registers, 0x1_0000),
            wram,
            io_shadow: vec![nmi as u8; IO_SHADOW_SIZE],
        }
    }

    fn cache_bytes(fingerprint: [u8; 8], nmi_per_skip: u32, nmis: &[u32]) -> Vec<u8> {
        let mut writer = SkipCacheWriter::new(Cursor::new(Vec::new()), fingerprint, nmi_per_skip).unwrap();
        for &nmi in nmis {
            writer.write_snapshot(&snapshot(nmi)).unwrap();
        }
        let mut summary = TraceSummary::default();
        summary.labels.insert(0x80_8000);
        writer.finish(25, &summary).unwrap().into_inner()
    }

    #[test]
    fn test_snapshot_layout_size() {
        let mut bytes = Vec::new();
        snapshot(3).write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), SNAPSHOT_SIZE);
        assert_eq!(Snapshot::read_from(&mut bytes.as_slice()).unwrap(), snapshot(3));
    }

    #[test]
    fn test_header_is_rewritten_on_finish() {
        let bytes = cache_bytes([7; 8], 10, &[0, 10, 20]);
        let mut header = [0u8; CACHE_HEADER_SIZE];
        header.copy_from_slice(&bytes[..CACHE_HEADER_SIZE]);
        let header = CacheHeader::decode(&header).unwrap();
        assert_eq!(header.nmi_count, 25);
        assert_eq!(header.snapshot_offset, 44);
        assert_eq!(header.summary_offset, 44 + 3 * SNAPSHOT_SIZE as u64);
    }

    #[test]
    fn test_snapshot_lookup() {
        let bytes = cache_bytes([7; 8], 10, &[0, 10, 20]);
        let mut cache = SkipCache::from_reader(Cursor::new(bytes), [7; 8]).unwrap();
        assert_eq!(cache.snapshot_count(), 3);
        assert!(cache.covers(24));
        assert!(!cache.covers(25));
        assert_eq!(cache.snapshot_at_or_before(9).unwrap().map(|s| s.nmi), Some(0));
        assert_eq!(cache.snapshot_at_or_before(10).unwrap().map(|s| s.nmi), Some(10));
        assert_eq!(cache.snapshot_at_or_before(24).unwrap(), Some(snapshot(20)));
        assert_eq!(cache.snapshot_at_or_before(99).unwrap().map(|s| s.nmi), Some(20));
        assert!(cache.load_summary().unwrap().labels.contains(0x80_8000));
    }

    #[test]
    fn test_mismatched_or_unfinished_caches_are_refused() {
        let bytes = cache_bytes([7; 8], 10, &[0]);
        assert!(matches!(
            SkipCache::from_reader(Cursor::new(bytes.clone()), [8; 8]),
            Err(CacheError::FingerprintMismatch)
        ));

        let mut unfinished = SkipCacheWriter::new(Cursor::new(Vec::new()), [7; 8], 10).unwrap();
        unfinished.write_snapshot(&snapshot(0)).unwrap();
        let raw = unfinished.sink.into_inner();
        assert!(matches!(
            SkipCache::from_reader(Cursor::new(raw), [7; 8]),
            Err(CacheError::Incomplete)
        ));

        let mut other_version = bytes;
        other_version[8] = 9;
        assert!(matches!(
            SkipCache::from_reader(Cursor::new(other_version), [7; 8]),
            Err(CacheError::VersionMismatch { found: 9, .. })
        ));
    }

    #[test]
    fn test_snapshots_must_follow_the_interval() {
        let mut writer = SkipCacheWriter::new(Cursor::new(Vec::new()), [0; 8], 10).unwrap();
        writer.write_snapshot(&snapshot(0)).unwrap();
        assert!(matches!(
            writer.write_snapshot(&snapshot(11)),
            Err(CacheError::SnapshotOutOfOrder { index: 1, found: 11, expected: 10 })
        ));
        assert!(matches!(
            SkipCacheWriter::new(Cursor::new(Vec::new()), [0; 8], 0),
            Err(CacheError::ZeroInterval)
        ));
    }
}
