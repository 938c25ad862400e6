use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{
    EVENT_SIZE, EventTag, HEADER_SIZE, RAM_BANK_SIZE, REGISTER_RECORD_SIZE, RegisterRecord,
    TraceEvent, TraceHeader,
};
use super::{TraceError, truncated};

/// Forward-only reader over a trace log
pub struct TraceReader<R> {
    source: R,
    header: TraceHeader,
    /// Offset of the next unread event
    offset: u64,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let file = File::open(path)?;
        TraceReader::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> TraceReader<R> {
    /// Reads and validates the header
    pub fn new(mut source: R) -> Result<Self, TraceError> {
        source.seek(SeekFrom::Start(0))?;
        let mut bytes = [0u8; HEADER_SIZE];
        source
            .read_exact(&mut bytes)
            .map_err(truncated("trace header", 0))?;
        let header = TraceHeader::decode(&bytes)?;
        Ok(TraceReader {
            source,
            header,
            offset: HEADER_SIZE as u64,
        })
    }

    pub fn header(&self) -> &TraceHeader {
        &self.header
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Repositions to an event boundary previously reported by [`TraceReader::offset`]
    pub fn seek(&mut self, offset: u64) -> Result<(), TraceError> {
        self.source.seek(SeekFrom::Start(offset))?;
        self.offset = offset;
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<(), TraceError> {
        self.seek(HEADER_SIZE as u64)
    }

    fn read_bytes(&mut self, buf: &mut [u8], what: &'static str) -> Result<(), TraceError> {
        self.source
            .read_exact(buf)
            .map_err(truncated(what, self.offset))?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, TraceError> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf, what)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, what: &'static str) -> Result<u16, TraceError> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf, what)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, TraceError> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf, what)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Next event and its op-count delta
    pub fn next_event(&mut self) -> Result<(u32, TraceEvent), TraceError> {
        let event_offset = self.offset;
        let mut head = [0u8; EVENT_SIZE];
        self.read_bytes(&mut head, "event header")?;
        let op_delta = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);
        let tag = EventTag::try_from(head[0]).map_err(|tag| TraceError::UnknownEvent {
            tag,
            offset: event_offset,
        })?;

        let event = match tag {
            EventTag::Nmi => TraceEvent::Nmi,
            EventTag::Irq => TraceEvent::Irq,
            EventTag::Finished => TraceEvent::Finished,
            EventTag::ReadByte => TraceEvent::ReadByte {
                address: self.read_u32("READ_BYTE event")?,
                value: self.read_u8("READ_BYTE event")?,
            },
            EventTag::ReadWord => TraceEvent::ReadWord {
                address: self.read_u32("READ_WORD event")?,
                value: self.read_u16("READ_WORD event")?,
            },
            EventTag::Reset => {
                let mut record = [0u8; REGISTER_RECORD_SIZE];
                self.read_bytes(&mut record, "RESET registers")?;
                let mut wram = vec![0u8; RAM_BANK_SIZE * 2];
                self.read_bytes(&mut wram, "RESET memory")?;
                TraceEvent::Reset {
                    record: RegisterRecord::decode(&record),
                    wram,
                }
            }
            EventTag::Dma => return Err(TraceError::UnsupportedEvent("DMA")),
        };
        Ok((op_delta, event))
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use crate::snes::trace::writer::TraceWriter;

    fn sample_log() -> Vec<u8> {
        let mut writer = TraceWriter::new(Vec::new(), &TraceHeader::default()).unwrap();
        writer.nmi(3).unwrap();
        writer.read_byte(10, 0x00_4218, 0x80).unwrap();
        writer.read_word(10, 0x00_2137, 0xBEEF).unwrap();
        writer.finish(20).unwrap()
    }

    #[test]
    fn test_reads_events_with_deltas() {
        let mut reader = TraceReader::new(Cursor::new(sample_log())).unwrap();
        assert_eq!(reader.offset(), HEADER_SIZE as u64);
        assert_eq!(reader.next_event().unwrap(), (3, TraceEvent::Nmi));
        assert_eq!(
            reader.next_event().unwrap(),
            (7, TraceEvent::ReadByte { address: 0x00_4218, value: 0x80 })
        );
        assert_eq!(
            reader.next_event().unwrap(),
            (0, TraceEvent::ReadWord { address: 0x00_2137, value: 0xBEEF })
        );
        assert_eq!(reader.next_event().unwrap(), (10, TraceEvent::Finished));
    }

    #[test]
    fn test_seek_back_to_event_boundary() {
        let mut reader = TraceReader::new(Cursor::new(sample_log())).unwrap();
        reader.next_event().unwrap();
        let boundary = reader.offset();
        let first = reader.next_event().unwrap();
        reader.next_event().unwrap();
        reader.seek(boundary).unwrap();
        assert_eq!(reader.next_event().unwrap(), first);
    }

    #[test]
    fn test_truncated_payload() {
        let mut log = sample_log();
        log.truncate(HEADER_SIZE + EVENT_SIZE + EVENT_SIZE + 2);
        let mut reader = TraceReader::new(Cursor::new(log)).unwrap();
        reader.next_event().unwrap();
        assert!(matches!(
            reader.next_event(),
            Err(TraceError::Truncated { what: "READ_BYTE event", .. })
        ));
    }

    #[test]
    fn test_unknown_and_dma_tags_are_rejected() {
        let mut log = TraceHeader::default().encode().to_vec();
        log.extend_from_slice(&[9, 0, 0, 0, 0]);
        let mut reader = TraceReader::new(Cursor::new(log.clone())).unwrap();
        assert!(matches!(
            reader.next_event(),
            Err(TraceError::UnknownEvent { tag: 9, offset: 32 })
        ));

        log[HEADER_SIZE] = 6;
        let mut reader = TraceReader::new(Cursor::new(log)).unwrap();
        assert!(matches!(reader.next_event(), Err(TraceError::UnsupportedEvent("DMA"))));
    }

    #[test]
    fn test_short_header() {
        let result = TraceReader::new(Cursor::new(vec![0u8; 10]));
        assert!(matches!(result, Err(TraceError::Truncated { what: "trace header", .. })));
    }
}
