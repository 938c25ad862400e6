pub mod address_set;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod dma;
pub mod replay;
pub mod report;
pub mod skip_cache;
pub mod summary;
pub mod trace;
pub mod tracer;

#[cfg(any(test, feature = "testing-utils"))]
pub mod test_utils;

pub use replay::{Replay, ReplayError, ReplayOptions};
