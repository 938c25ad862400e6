//! What a full pass over a trace observed
//!
//! Built as an observer during the first pass and saved with the skip cache.
//! Consumers (annotation, disassembly, jump prediction) read the per-address
//! register contexts and the memory references without replaying again.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::{self, Read, Write};

use super::address_set::AddressSet;
use super::bus::{MemoryAccess, MemoryAccessType, MemoryObserver};
use super::cpu::registers::Registers;
use super::cpu::{CPU, Event, Flags};
use super::dma::{DmaFlags, DmaTransfer};

const NO_ADDRESS: u32 = 0xFFFF_FFFF;

/// Set on [`MemoryReference::pc`] for stores
pub const WRITE_FLAG: u32 = 0x8000_0000;

/// One distinct register context an instruction ran with
///
/// Field order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpVariant {
    pub data_bank: u8,
    pub direct_page: u16,
    /// Address the indirect operand pointer was read from
    pub indirect_pointer: Option<u32>,
    /// X masked down to the bits the instruction used
    pub register_x: u16,
    pub register_y: u16,
    /// Only the width and emulation bits
    pub status: u16,
    /// Where a taken jump, branch, call or return went
    pub jump_target: Option<u32>,
}

const VARIANT_STATUS_MASK: u16 = Flags::INDEX_8BIT.bits() | Flags::MEMORY_8BIT.bits() | Flags::EMULATION.bits();

impl OpVariant {
    /// `before` holds the registers the step started with
    pub fn observe(before: &Registers, cpu: &CPU) -> OpVariant {
        let jumped = matches!(
            cpu.event,
            Event::JmpOrJml | Event::JsrOrJsl | Event::RtsOrRtl | Event::Branch | Event::Rti
        );
        OpVariant {
            data_bank: before.data_bank,
            direct_page: before.direct_page,
            indirect_pointer: cpu.context.indirect_pointer,
            register_x: before.register_x & cpu.context.used_x_mask,
            register_y: before.register_y & cpu.context.used_y_mask,
            status: before.status.bits() & VARIANT_STATUS_MASK,
            jump_target: jumped.then_some(cpu.registers.program_counter),
        }
    }
}

/// A remapped address touched by the instruction at `pc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryReference {
    pub address: u32,
    /// Instruction address, [`WRITE_FLAG`] set for stores
    pub pc: u32,
}

impl MemoryReference {
    pub fn is_write(&self) -> bool {
        self.pc & WRITE_FLAG != 0
    }

    pub fn instruction(&self) -> u32 {
        self.pc & !WRITE_FLAG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VariantRange {
    offset: u32,
    count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSummary {
    /// Grouped by PC, each group sorted
    variants: Vec<OpVariant>,
    ranges: BTreeMap<u32, VariantRange>,
    pub labels: AddressSet,
    pub memory_references: BTreeSet<MemoryReference>,
    pub dma_transfers: HashSet<DmaTransfer>,
}

impl TraceSummary {
    fn pack(grouped: BTreeMap<u32, BTreeSet<OpVariant>>) -> (Vec<OpVariant>, BTreeMap<u32, VariantRange>) {
        let mut variants = Vec::new();
        let mut ranges = BTreeMap::new();
        for (pc, group) in grouped {
            let range = VariantRange {
                offset: variants.len() as u32,
                count: group.len() as u32,
            };
            variants.extend(group);
            ranges.insert(pc, range);
        }
        (variants, ranges)
    }

    fn grouped(&self) -> BTreeMap<u32, BTreeSet<OpVariant>> {
        self.ranges
            .keys()
            .map(|&pc| (pc, self.variants(pc).iter().copied().collect()))
            .collect()
    }

    /// Every context the instruction at `pc` ran with, empty if it never ran
    pub fn variants(&self, pc: u32) -> &[OpVariant] {
        match self.ranges.get(&pc) {
            Some(range) => {
                let start = range.offset as usize;
                &self.variants[start..start + range.count as usize]
            }
            None => &[],
        }
    }

    /// Addresses of every executed instruction, ascending
    pub fn executed(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.keys().copied()
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// DMA transfers in a stable order
    pub fn sorted_dma_transfers(&self) -> Vec<DmaTransfer> {
        let mut transfers: Vec<DmaTransfer> = self.dma_transfers.iter().copied().collect();
        transfers.sort_by_key(dma_sort_key);
        transfers
    }

    /// Union of two passes, e.g. over different captures of one ROM
    pub fn merge(&mut self, other: &TraceSummary) {
        let mut grouped = self.grouped();
        for (pc, group) in other.grouped() {
            grouped.entry(pc).or_default().extend(group);
        }
        let (variants, ranges) = Self::pack(grouped);
        self.variants = variants;
        self.ranges = ranges;
        self.labels.union_with(&other.labels);
        self.memory_references
            .extend(other.memory_references.iter().copied());
        self.dma_transfers.extend(other.dma_transfers.iter().copied());
    }

    //
    // Serialization
    ////////////////

    pub fn write_to<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        sink.write_all(&(self.variants.len() as u32).to_le_bytes())?;
        for (&pc, range) in &self.ranges {
            let start = range.offset as usize;
            for variant in &self.variants[start..start + range.count as usize] {
                write_variant(sink, pc, variant)?;
            }
        }

        self.labels.write_to(sink)?;

        sink.write_all(&(self.memory_references.len() as u32).to_le_bytes())?;
        for reference in &self.memory_references {
            sink.write_all(&reference.address.to_le_bytes())?;
            sink.write_all(&reference.pc.to_le_bytes())?;
        }

        let transfers = self.sorted_dma_transfers();
        sink.write_all(&(transfers.len() as u32).to_le_bytes())?;
        for transfer in &transfers {
            write_dma(sink, transfer)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(source: &mut R) -> io::Result<TraceSummary> {
        let mut grouped: BTreeMap<u32, BTreeSet<OpVariant>> = BTreeMap::new();
        for _ in 0..read_u32(source)? {
            let (pc, variant) = read_variant(source)?;
            grouped.entry(pc).or_default().insert(variant);
        }
        let (variants, ranges) = Self::pack(grouped);

        let labels = AddressSet::read_from(source)?;

        let mut memory_references = BTreeSet::new();
        for _ in 0..read_u32(source)? {
            let address = read_u32(source)?;
            let pc = read_u32(source)?;
            memory_references.insert(MemoryReference { address, pc });
        }

        let mut dma_transfers = HashSet::new();
        for _ in 0..read_u32(source)? {
            dma_transfers.insert(read_dma(source)?);
        }

        Ok(TraceSummary {
            variants,
            ranges,
            labels,
            memory_references,
            dma_transfers,
        })
    }
}

fn dma_sort_key(t: &DmaTransfer) -> (u32, u8, u16, u16, u8, u8, u8) {
    (
        t.pc,
        t.channel,
        t.a_address,
        t.transfer_bytes,
        t.transfer_mode,
        t.a_bank,
        t.flags.bits(),
    )
}

fn optional(address: Option<u32>) -> u32 {
    address.unwrap_or(NO_ADDRESS)
}

fn from_optional(raw: u32) -> Option<u32> {
    (raw != NO_ADDRESS).then_some(raw)
}

fn write_variant<W: Write>(sink: &mut W, pc: u32, v: &OpVariant) -> io::Result<()> {
    sink.write_all(&pc.to_le_bytes())?;
    sink.write_all(&optional(v.indirect_pointer).to_le_bytes())?;
    sink.write_all(&optional(v.jump_target).to_le_bytes())?;
    sink.write_all(&v.status.to_le_bytes())?;
    sink.write_all(&v.direct_page.to_le_bytes())?;
    sink.write_all(&v.register_x.to_le_bytes())?;
    sink.write_all(&v.register_y.to_le_bytes())?;
    sink.write_all(&[v.data_bank])
}

fn read_variant<R: Read>(source: &mut R) -> io::Result<(u32, OpVariant)> {
    let pc = read_u32(source)?;
    let indirect_pointer = from_optional(read_u32(source)?);
    let jump_target = from_optional(read_u32(source)?);
    let status = read_u16(source)?;
    let direct_page = read_u16(source)?;
    let register_x = read_u16(source)?;
    let register_y = read_u16(source)?;
    let data_bank = read_u8(source)?;
    Ok((
        pc,
        OpVariant {
            data_bank,
            direct_page,
            indirect_pointer,
            register_x,
            register_y,
            status,
            jump_target,
        },
    ))
}

fn write_dma<W: Write>(sink: &mut W, t: &DmaTransfer) -> io::Result<()> {
    sink.write_all(&t.pc.to_le_bytes())?;
    sink.write_all(&t.a_address.to_le_bytes())?;
    sink.write_all(&t.transfer_bytes.to_le_bytes())?;
    sink.write_all(&[
        t.transfer_mode,
        t.b_address,
        t.a_bank,
        t.channel,
        t.flags.bits(),
    ])
}

fn read_dma<R: Read>(source: &mut R) -> io::Result<DmaTransfer> {
    let pc = read_u32(source)?;
    let a_address = read_u16(source)?;
    let transfer_bytes = read_u16(source)?;
    let mut tail = [0u8; 5];
    source.read_exact(&mut tail)?;
    Ok(DmaTransfer {
        pc,
        a_address,
        transfer_bytes,
        transfer_mode: tail[0],
        b_address: tail[1],
        a_bank: tail[2],
        channel: tail[3],
        flags: DmaFlags::from_bits_retain(tail[4]),
    })
}

fn read_u8<R: Read>(source: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    source.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(source: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    source.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(source: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    source.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Collects a [`TraceSummary`] while attached to the CPU
#[derive(Default)]
pub struct SummaryBuilder {
    variants: HashMap<u32, BTreeSet<OpVariant>>,
    labels: AddressSet,
    memory_references: BTreeSet<MemoryReference>,
    dma_transfers: HashSet<DmaTransfer>,
}

impl SummaryBuilder {
    fn record_access(&mut self, access: &MemoryAccess, pc: u32) {
        if !matches!(
            access.kind,
            MemoryAccessType::Random | MemoryAccessType::FetchIndirect
        ) {
            return;
        }
        for k in 0..access.bytes as u32 {
            self.memory_references.insert(MemoryReference {
                address: access.remapped.wrapping_add(k) & 0xFF_FFFF,
                pc,
            });
        }
    }

    /// Call after every replay step with the registers it started from
    pub fn record_step(&mut self, before: &Registers, cpu: &CPU) {
        match cpu.event {
            Event::Nmi | Event::Irq | Event::Reset => {
                self.labels.insert(cpu.registers.program_counter);
            }
            event => {
                let variant = OpVariant::observe(before, cpu);
                self.variants
                    .entry(cpu.context.pc_before)
                    .or_default()
                    .insert(variant);
                if matches!(event, Event::JmpOrJml | Event::JsrOrJsl | Event::Branch) {
                    self.labels.insert(cpu.registers.program_counter);
                }
            }
        }
    }

    pub fn finish(self) -> TraceSummary {
        let grouped: BTreeMap<u32, BTreeSet<OpVariant>> = self.variants.into_iter().collect();
        let (variants, ranges) = TraceSummary::pack(grouped);
        TraceSummary {
            variants,
            ranges,
            labels: self.labels,
            memory_references: self.memory_references,
            dma_transfers: self.dma_transfers,
        }
    }
}

impl MemoryObserver for SummaryBuilder {
    fn on_read(&mut self, access: &MemoryAccess) {
        self.record_access(access, access.pc);
    }

    fn on_write(&mut self, access: &MemoryAccess) {
        self.record_access(access, access.pc | WRITE_FLAG);
    }

    fn on_dma(&mut self, transfer: &DmaTransfer) {
        self.dma_transfers.insert(*transfer);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn variant(direct_page: u16, jump_target: Option<u32>) -> OpVariant {
        OpVariant {
            data_bank: 0x80,
            direct_page,
            indirect_pointer: None,
            register_x: 0,
            register_y: 0,
            status: 0x30,
            jump_target,
        }
    }

    fn summary_of(steps: &[(u32, OpVariant)]) -> TraceSummary {
        let mut builder = SummaryBuilder::default();
        for &(pc, v) in steps {
            builder.variants.entry(pc).or_default().insert(v);
        }
        builder.finish()
    }

    #[test]
    fn test_variants_are_grouped_by_pc() {
        let summary = summary_of(&[
            (0x80_8010, variant(0x0200, None)),
            (0x80_8000, variant(0x0100, None)),
            (0x80_8010, variant(0x0000, None)),
            (0x80_8010, variant(0x0200, None)),
        ]);
        assert_eq!(summary.variant_count(), 3);
        assert_eq!(summary.variants(0x80_8000), &[variant(0x0100, None)]);
        assert_eq!(
            summary.variants(0x80_8010),
            &[variant(0x0000, None), variant(0x0200, None)]
        );
        assert!(summary.variants(0x80_9000).is_empty());
        assert_eq!(summary.executed().collect::<Vec<_>>(), vec![0x80_8000, 0x80_8010]);
    }

    #[test]
    fn test_memory_references_cover_each_byte() {
        let mut builder = SummaryBuilder::default();
        let access = MemoryAccess {
            pc: 0x80_8005,
            address: 0x00_0010,
            remapped: 0x7E_0010,
            value: 0x1234,
            bytes: 2,
            kind: MemoryAccessType::Random,
        };
        builder.on_write(&access);
        builder.on_read(&MemoryAccess {
            kind: MemoryAccessType::StackRelative,
            ..access
        });
        let summary = builder.finish();
        let refs: Vec<_> = summary.memory_references.iter().copied().collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].address, 0x7E_0010);
        assert_eq!(refs[1].address, 0x7E_0011);
        assert!(refs.iter().all(|r| r.is_write() && r.instruction() == 0x80_8005));
    }

    #[test]
    fn test_merge_is_a_union() {
        let mut a = summary_of(&[(0x80_8000, variant(0, None))]);
        a.labels.insert(0x80_8000);
        let mut b = summary_of(&[
            (0x80_8000, variant(0, Some(0x80_9000))),
            (0x80_8000, variant(0, None)),
            (0x81_0000, variant(0, None)),
        ]);
        b.labels.insert(0x80_9000);

        a.merge(&b);
        assert_eq!(a.variants(0x80_8000).len(), 2);
        assert_eq!(a.variants(0x81_0000).len(), 1);
        assert!(a.labels.contains(0x80_8000) && a.labels.contains(0x80_9000));
    }

    #[test]
    fn test_serialized_summary_reads_back() {
        let mut summary = summary_of(&[
            (0x80_8000, variant(0x0100, Some(0x80_8100))),
            (0x80_8003, OpVariant {
                indirect_pointer: Some(0x00_0040),
                ..variant(0, None)
            }),
        ]);
        summary.labels.insert(0x80_8100);
        summary.memory_references.insert(MemoryReference {
            address: 0x7E_0040,
            pc: 0x80_8003,
        });
        summary.dma_transfers.insert(DmaTransfer {
            pc: 0x80_8010,
            a_address: 0x9000,
            transfer_bytes: 0x20,
            transfer_mode: 0,
            b_address: 0x80,
            a_bank: 0x81,
            channel: 2,
            flags: DmaFlags::FIXED,
        });

        let mut bytes = Vec::new();
        summary.write_to(&mut bytes).unwrap();
        let restored = TraceSummary::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(restored, summary);
    }
}
