use super::{
    mem::{DEFAULT_MEMORY_SIZE, MAX_MEMORY_SIZE, MIN_MEMORY_SIZE, PROGRAM_STARTING_ADDRESS},
    quirk::{Quirks, RomKind},
};

use std::{ffi::OsStr, fs::read, io, path::Path};

#[derive(Clone, Debug)]
pub struct RomConfig {
    pub name: String,
    pub kind: RomKind,
    pub quirks: Quirks,
    pub memory_size: usize,
    pub logging: bool,
    pub halt_on_illegal: bool,
}

impl RomConfig {
    pub fn new(name: impl Into<String>, kind: RomKind) -> Self {
        RomConfig {
            name: name.into(),
            kind,
            quirks: kind.quirks(),
            memory_size: DEFAULT_MEMORY_SIZE,
            logging: false,
            halt_on_illegal: false,
        }
    }

    pub fn max_size(&self) -> usize {
        self.memory_size.clamp(MIN_MEMORY_SIZE, MAX_MEMORY_SIZE) - PROGRAM_STARTING_ADDRESS as usize
    }
}

#[derive(Clone, Debug)]
pub struct Rom {
    pub config: RomConfig,
    pub data: Vec<u8>,
}

impl Rom {
    /// Reads a ROM from disk, naming it after the file stem.
    ///
    /// ROMs bigger than program memory are accepted and truncated on load.
    pub fn read<P: AsRef<Path>>(path: P, mut config: RomConfig) -> io::Result<Rom> {
        let data = read(path.as_ref())?;

        config.name = path
            .as_ref()
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("Untitled")
            .into();

        Rom::new(config, data)
    }

    pub fn new(config: RomConfig, data: Vec<u8>) -> io::Result<Rom> {
        let max_rom_size = config.max_size();

        if data.len() < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ROM size ({}B) is below minimum size (2B)", data.len()),
            ));
        }

        if data.len() > max_rom_size {
            log::warn!(
                "ROM size ({}B) exceeds maximum size ({}B), the last {}B will not be loaded",
                data.len(),
                max_rom_size,
                data.len() - max_rom_size
            );
        }

        Ok(Rom { config, data })
    }
}
