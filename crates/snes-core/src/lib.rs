// 65816 replay core modules
pub mod snes;

pub mod prelude;

// Re-exports
pub use snes::cartridge::{Rom, RomError, RomHeader};
pub use snes::cpu::CPU;
pub use snes::replay::{Replay, ReplayError, ReplayOptions};
