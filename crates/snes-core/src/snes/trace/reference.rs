//! Reference register stream
//!
//! Written next to a capture by an instrumented emulator: for every op the
//! registers before and after it. Replays can be checked against it step by
//! step.
//!
//! ```text
//! record   op:u64 before:register-record after:register-record
//! ```

use std::io::{ErrorKind, Read, Write};

use super::format::{REGISTER_RECORD_SIZE, RegisterRecord};
use super::{TraceError, truncated};

pub const REFERENCE_RECORD_SIZE: usize = 8 + REGISTER_RECORD_SIZE * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceStep {
    pub op: u64,
    pub before: RegisterRecord,
    pub after: RegisterRecord,
}

impl ReferenceStep {
    pub fn encode(&self) -> [u8; REFERENCE_RECORD_SIZE] {
        let mut bytes = [0u8; REFERENCE_RECORD_SIZE];
        bytes[0..8].copy_from_slice(&self.op.to_le_bytes());
        bytes[8..8 + REGISTER_RECORD_SIZE].copy_from_slice(&self.before.encode());
        bytes[8 + REGISTER_RECORD_SIZE..].copy_from_slice(&self.after.encode());
        bytes
    }

    pub fn decode(bytes: &[u8; REFERENCE_RECORD_SIZE]) -> ReferenceStep {
        let mut op = [0u8; 8];
        op.copy_from_slice(&bytes[0..8]);
        let mut before = [0u8; REGISTER_RECORD_SIZE];
        before.copy_from_slice(&bytes[8..8 + REGISTER_RECORD_SIZE]);
        let mut after = [0u8; REGISTER_RECORD_SIZE];
        after.copy_from_slice(&bytes[8 + REGISTER_RECORD_SIZE..]);
        ReferenceStep {
            op: u64::from_le_bytes(op),
            before: RegisterRecord::decode(&before),
            after: RegisterRecord::decode(&after),
        }
    }
}

pub struct ReferenceReader<R> {
    source: R,
    offset: u64,
}

impl<R: Read> ReferenceReader<R> {
    pub fn new(source: R) -> Self {
        ReferenceReader { source, offset: 0 }
    }

    /// `None` once the stream ends on a record boundary
    pub fn next_step(&mut self) -> Result<Option<ReferenceStep>, TraceError> {
        let mut bytes = [0u8; REFERENCE_RECORD_SIZE];
        let mut filled = 0;
        while filled < bytes.len() {
            match self.source.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(TraceError::Truncated {
                        what: "reference record",
                        offset: self.offset,
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(truncated("reference record", self.offset)(err)),
            }
        }
        self.offset += REFERENCE_RECORD_SIZE as u64;
        Ok(Some(ReferenceStep::decode(&bytes)))
    }
}

pub struct ReferenceWriter<W> {
    sink: W,
}

impl<W: Write> ReferenceWriter<W> {
    pub fn new(sink: W) -> Self {
        ReferenceWriter { sink }
    }

    pub fn write_step(&mut self, step: &ReferenceStep) -> Result<(), TraceError> {
        self.sink.write_all(&step.encode())?;
        Ok(())
    }

    pub fn into_inner(mut self) -> Result<W, TraceError> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snes::cpu::registers::Registers;

    fn step(op: u64) -> ReferenceStep {
        let mut after = Registers::default();
        after.register_a = op as u16;
        ReferenceStep {
            op,
            before: RegisterRecord::default(),
            after: RegisterRecord::new(after, 0),
        }
    }

    #[test]
    fn test_stream_ends_cleanly_on_record_boundary() {
        let mut writer = ReferenceWriter::new(Vec::new());
        writer.write_step(&step(0)).unwrap();
        writer.write_step(&step(1)).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), 2 * REFERENCE_RECORD_SIZE);

        let mut reader = ReferenceReader::new(bytes.as_slice());
        assert_eq!(reader.next_step().unwrap(), Some(step(0)));
        assert_eq!(reader.next_step().unwrap(), Some(step(1)));
        assert_eq!(reader.next_step().unwrap(), None);
    }

    #[test]
    fn test_partial_record_is_truncation() {
        let bytes = step(7).encode();
        let mut reader = ReferenceReader::new(&bytes[..20]);
        assert!(matches!(
            reader.next_step(),
            Err(TraceError::Truncated { what: "reference record", offset: 0 })
        ));
    }
}
