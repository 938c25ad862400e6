use std::io::Write;

use super::TraceError;
use super::format::{EventTag, RAM_BANK_SIZE, RegisterRecord, TraceHeader};

/// Produces trace logs
///
/// Callers pass absolute op counts; the writer turns them into deltas. An
/// interrupt takes over the step it is due at, so the next event must come
/// at least one op later.
pub struct TraceWriter<W: Write> {
    sink: W,
    last_op: u64,
    earliest_next_op: u64,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(mut sink: W, header: &TraceHeader) -> Result<Self, TraceError> {
        sink.write_all(&header.encode())?;
        Ok(TraceWriter {
            sink,
            last_op: 0,
            earliest_next_op: 0,
        })
    }

    fn event(&mut self, tag: EventTag, op: u64) -> Result<(), TraceError> {
        if op < self.earliest_next_op {
            return Err(TraceError::Desync {
                event_op: op,
                current_op: self.earliest_next_op,
            });
        }
        let delta = u32::try_from(op - self.last_op).map_err(|_| TraceError::Desync {
            event_op: op,
            current_op: self.last_op,
        })?;
        self.sink.write_all(&[tag as u8])?;
        self.sink.write_all(&delta.to_le_bytes())?;
        self.last_op = op;
        self.earliest_next_op = match tag {
            EventTag::Nmi | EventTag::Irq | EventTag::Reset => op + 1,
            _ => op,
        };
        Ok(())
    }

    pub fn nmi(&mut self, op: u64) -> Result<(), TraceError> {
        self.event(EventTag::Nmi, op)
    }

    pub fn irq(&mut self, op: u64) -> Result<(), TraceError> {
        self.event(EventTag::Irq, op)
    }

    /// `wram` holds bank $7E followed by bank $7F
    pub fn reset(&mut self, op: u64, record: &RegisterRecord, wram: &[u8]) -> Result<(), TraceError> {
        if wram.len() != RAM_BANK_SIZE * 2 {
            return Err(TraceError::Truncated {
                what: "RESET memory",
                offset: 0,
            });
        }
        self.event(EventTag::Reset, op)?;
        self.sink.write_all(&record.encode())?;
        self.sink.write_all(wram)?;
        Ok(())
    }

    pub fn read_byte(&mut self, op: u64, address: u32, value: u8) -> Result<(), TraceError> {
        self.event(EventTag::ReadByte, op)?;
        self.sink.write_all(&address.to_le_bytes())?;
        self.sink.write_all(&[value])?;
        Ok(())
    }

    pub fn read_word(&mut self, op: u64, address: u32, value: u16) -> Result<(), TraceError> {
        self.event(EventTag::ReadWord, op)?;
        self.sink.write_all(&address.to_le_bytes())?;
        self.sink.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    /// Terminates the stream and hands back the sink
    pub fn finish(mut self, op: u64) -> Result<W, TraceError> {
        self.event(EventTag::Finished, op)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snes::trace::format::{EVENT_SIZE, HEADER_SIZE};

    #[test]
    fn test_event_bytes() {
        let mut writer = TraceWriter::new(Vec::new(), &TraceHeader::default()).unwrap();
        writer.read_byte(0x0102, 0x00_4016, 0x01).unwrap();
        let log = writer.finish(0x0102).unwrap();
        assert_eq!(
            &log[HEADER_SIZE..HEADER_SIZE + EVENT_SIZE + 5],
            &[3, 0x02, 0x01, 0, 0, 0x16, 0x40, 0x00, 0x00, 0x01]
        );
        assert_eq!(&log[log.len() - EVENT_SIZE..], &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_reset_payload_size() {
        let mut writer = TraceWriter::new(Vec::new(), &TraceHeader::default()).unwrap();
        let wram = vec![0u8; RAM_BANK_SIZE * 2];
        writer.reset(0, &RegisterRecord::default(), &wram).unwrap();
        let log = writer.finish(1).unwrap();
        assert_eq!(log.len(), HEADER_SIZE + EVENT_SIZE + 19 + 0x20000 + EVENT_SIZE);
    }

    #[test]
    fn test_event_inside_interrupt_step_is_refused() {
        let mut writer = TraceWriter::new(Vec::new(), &TraceHeader::default()).unwrap();
        writer.nmi(5).unwrap();
        assert!(matches!(
            writer.read_byte(5, 0x4218, 0),
            Err(TraceError::Desync { event_op: 5, .. })
        ));
        assert!(writer.read_byte(6, 0x4218, 0).is_ok());
        assert!(matches!(writer.irq(4), Err(TraceError::Desync { .. })));
    }
}
