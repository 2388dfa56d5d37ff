//! sflash-dummy - In-memory flash emulators for testing
//!
//! [`DummyNor`] emulates an SFDP-described SPI NOR part and [`DummyNand`] a
//! Winbond W25N SPI NAND part. Both implement
//! [`Transport`](sflash_core::transport::Transport), so the engines in
//! `sflash-core` can be exercised end to end without hardware. Every
//! executed descriptor is recorded in a [`Trace`].

mod config;
mod nand;
mod nor;
pub mod sfdp_image;

pub use config::{ConfigError, EraseType, NandConfig, NorConfig};
pub use nand::DummyNand;
pub use nor::DummyNor;

use sflash_core::spi::{Direction, PhaseDescriptor};

/// One descriptor as the emulator saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Opcode
    pub opcode: u8,
    /// Address value, if there was an address phase
    pub address: Option<u32>,
    /// Dummy bytes
    pub dummy_bytes: u8,
    /// Data direction, if there was a data phase
    pub direction: Option<Direction>,
    /// Data phase length
    pub len: usize,
}

impl TraceEntry {
    fn capture(opcode: u8, phase: &PhaseDescriptor<'_>) -> Self {
        Self {
            opcode,
            address: phase.address_value(),
            dummy_bytes: phase.dummy_bytes,
            direction: phase.direction(),
            len: phase.data_len(),
        }
    }
}

/// Recorded descriptors, oldest first
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries
    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.entries.iter()
    }

    /// Entries carrying `opcode`
    pub fn with_opcode(&self, opcode: u8) -> impl Iterator<Item = &TraceEntry> + '_ {
        self.entries.iter().filter(move |e| e.opcode == opcode)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
