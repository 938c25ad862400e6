use thiserror::Error;

pub mod format;
pub mod reader;
pub mod reference;
pub mod writer;

pub use format::{RegisterRecord, TraceEvent, TraceHeader};
pub use reader::TraceReader;
pub use writer::TraceWriter;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a trace log (magic {0:02X?})")]
    BadMagic([u8; 8]),

    #[error("trace version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("trace ends inside {what} at offset {offset}")]
    Truncated { what: &'static str, offset: u64 },

    #[error("unknown event tag {tag} at offset {offset}")]
    UnknownEvent { tag: u8, offset: u64 },

    #[error("{0} events cannot be replayed")]
    UnsupportedEvent(&'static str),

    #[error("event due at op {event_op} but replay is already at op {current_op}")]
    Desync { event_op: u64, current_op: u64 },
}

/// Maps a short read to [`TraceError::Truncated`]
pub(crate) fn truncated(what: &'static str, offset: u64) -> impl FnOnce(std::io::Error) -> TraceError {
    move |err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            TraceError::Truncated { what, offset }
        } else {
            TraceError::Io(err)
        }
    }
}
