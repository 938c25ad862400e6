use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::snes::cartridge::rom::RomHeader;

pub const DEFAULT_NMI_PER_SKIP: u32 = 10;
const CACHE_SUFFIX: &str = ".emulation_cache";

/// Everything needed to open a replay session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOptions {
    pub trace_path: PathBuf,
    pub rom_path: PathBuf,
    pub rom_header: RomHeader,
    /// Skip cache location; next to the trace when unset
    pub cache_path: Option<PathBuf>,
    /// Reference register stream to verify every step against
    pub reference_path: Option<PathBuf>,
    /// Snapshot every this many NMIs while building the cache
    pub nmi_per_skip: u32,
    pub strict_dma: bool,
}

impl ReplayOptions {
    pub fn new(trace_path: impl Into<PathBuf>, rom_path: impl Into<PathBuf>) -> Self {
        ReplayOptions {
            trace_path: trace_path.into(),
            rom_path: rom_path.into(),
            rom_header: RomHeader::Auto,
            cache_path: None,
            reference_path: None,
            nmi_per_skip: DEFAULT_NMI_PER_SKIP,
            strict_dma: false,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        match &self.cache_path {
            Some(path) => path.clone(),
            None => default_cache_path(&self.trace_path),
        }
    }
}

fn default_cache_path(trace_path: &Path) -> PathBuf {
    let mut name = OsString::from(trace_path.as_os_str());
    name.push(CACHE_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cache_path_defaults_next_to_trace() {
        let mut options = ReplayOptions::new("captures/intro.trace", "game.sfc");
        assert_eq!(
            options.cache_path(),
            PathBuf::from("captures/intro.trace.emulation_cache")
        );
        options.cache_path = Some(PathBuf::from("/tmp/intro.cache"));
        assert_eq!(options.cache_path(), PathBuf::from("/tmp/intro.cache"));
        assert_eq!(options.nmi_per_skip, 10);
        assert!(!options.strict_dma);
    }
}
