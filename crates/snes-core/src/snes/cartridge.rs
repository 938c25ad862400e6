pub mod rom;

pub use rom::{Rom, RomError, RomHeader};
