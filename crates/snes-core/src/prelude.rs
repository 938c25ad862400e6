//! Convenient imports for consumers of snes-core
//!
//! Pull in everything commonly needed in one line:
//! ```rust
//! use snes_core::prelude::*;
//! ```

// Replay API
pub use crate::snes::replay::{Replay, ReplayError, ReplayOptions};
pub use crate::snes::report::write_report;
pub use crate::snes::skip_cache::{
    CacheError, SkipCache, SkipCacheWriter, Snapshot, build_cache_file, build_pass,
};
pub use crate::snes::summary::{MemoryReference, OpVariant, TraceSummary};

// Machine model
pub use crate::snes::address_set::AddressSet;
pub use crate::snes::bus::memory::Memory;
pub use crate::snes::bus::{MemoryAccess, MemoryAccessType, MemoryObserver};
pub use crate::snes::cartridge::{Rom, RomError, RomHeader};
pub use crate::snes::cpu::registers::Registers;
pub use crate::snes::cpu::{CPU, CpuError, Event, Flags};
pub use crate::snes::dma::DmaTransfer;

// Trace logs
pub use crate::snes::trace::reference::{ReferenceReader, ReferenceStep, ReferenceWriter};
pub use crate::snes::trace::{
    RegisterRecord, TraceError, TraceEvent, TraceHeader, TraceReader, TraceWriter,
};

// Macros
pub use crate::trace_dump;

// Conditional testing utilities
#[cfg(feature = "testing-utils")]
pub use crate::snes::test_utils::*;
