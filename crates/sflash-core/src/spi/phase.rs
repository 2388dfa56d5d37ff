//! Phase descriptor - one complete SPI/QSPI/OSPI transaction

use super::{AddressSize, LineWidth};
use crate::error::{Error, Result};

/// Command (instruction) phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandPhase {
    /// The opcode byte
    pub opcode: u8,
    /// Lines the opcode is driven on
    pub width: LineWidth,
}

/// Address phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressPhase {
    /// Address value, sent MSB first
    pub value: u32,
    /// Lines the address is driven on
    pub width: LineWidth,
    /// Number of address bytes
    pub size: AddressSize,
}

/// Direction of a data phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Device to host
    Read,
    /// Host to device
    Write,
}

/// Data phase
///
/// An empty buffer is equivalent to no data phase.
#[derive(Debug, Default)]
pub enum DataPhase<'a> {
    /// No data phase
    #[default]
    None,
    /// Read into the buffer
    Read {
        /// Lines the data is sampled on
        width: LineWidth,
        /// Destination buffer
        buf: &'a mut [u8],
    },
    /// Write from the buffer
    Write {
        /// Lines the data is driven on
        width: LineWidth,
        /// Source data
        buf: &'a [u8],
    },
}

/// A single fully-specified transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the descriptor to the buffer it references.
///
/// Address, dummy and data phases are each independently optional. A
/// descriptor without any phase is rejected by [`PhaseDescriptor::validate`].
#[derive(Debug, Default)]
pub struct PhaseDescriptor<'a> {
    /// Command phase
    pub command: Option<CommandPhase>,
    /// Address phase
    pub address: Option<AddressPhase>,
    /// Dummy bytes between address and data, counted on the address lines
    pub dummy_bytes: u8,
    /// Data phase
    pub data: DataPhase<'a>,
    /// Transport may move the data phase by DMA
    pub dma: bool,
}

impl<'a> PhaseDescriptor<'a> {
    /// Create a single-line command with no other phases (e.g. WREN)
    pub fn command(opcode: u8) -> Self {
        Self::command_on(opcode, LineWidth::Single)
    }

    /// Create a command driven on the given lines
    pub fn command_on(opcode: u8, width: LineWidth) -> Self {
        Self {
            command: Some(CommandPhase { opcode, width }),
            ..Default::default()
        }
    }

    /// Add an address phase
    pub fn with_address(mut self, value: u32, size: AddressSize, width: LineWidth) -> Self {
        self.address = Some(AddressPhase { value, width, size });
        self
    }

    /// Set the number of dummy bytes
    pub fn with_dummy_bytes(mut self, bytes: u8) -> Self {
        self.dummy_bytes = bytes;
        self
    }

    /// Add a read data phase
    pub fn reading(mut self, width: LineWidth, buf: &'a mut [u8]) -> Self {
        self.data = DataPhase::Read { width, buf };
        self
    }

    /// Add a write data phase
    pub fn writing(mut self, width: LineWidth, buf: &'a [u8]) -> Self {
        self.data = DataPhase::Write { width, buf };
        self
    }

    /// Mark the data phase as DMA-eligible
    pub fn with_dma(mut self, dma: bool) -> Self {
        self.dma = dma;
        self
    }

    /// Opcode of the command phase, if present
    pub fn opcode(&self) -> Option<u8> {
        self.command
            .filter(|c| c.width.is_present())
            .map(|c| c.opcode)
    }

    /// Returns true if this descriptor has a command phase
    pub fn has_command(&self) -> bool {
        self.opcode().is_some()
    }

    /// Returns true if this descriptor has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some_and(|a| a.width.is_present())
    }

    /// Address value, if an address phase is present
    pub fn address_value(&self) -> Option<u32> {
        self.address
            .filter(|a| a.width.is_present())
            .map(|a| a.value)
    }

    /// Length of the data phase in bytes
    pub fn data_len(&self) -> usize {
        match &self.data {
            DataPhase::None => 0,
            DataPhase::Read { buf, .. } => buf.len(),
            DataPhase::Write { buf, .. } => buf.len(),
        }
    }

    /// Returns true if this descriptor has a non-empty data phase
    pub fn has_data(&self) -> bool {
        self.data_len() > 0 && self.data_width().is_present()
    }

    /// Direction of the data phase, if present
    pub fn direction(&self) -> Option<Direction> {
        if !self.has_data() {
            return None;
        }
        match self.data {
            DataPhase::None => None,
            DataPhase::Read { .. } => Some(Direction::Read),
            DataPhase::Write { .. } => Some(Direction::Write),
        }
    }

    /// Line width of the data phase
    pub fn data_width(&self) -> LineWidth {
        match self.data {
            DataPhase::None => LineWidth::None,
            DataPhase::Read { width, .. } | DataPhase::Write { width, .. } => width,
        }
    }

    /// Data to be written, or an empty slice
    pub fn write_data(&self) -> &[u8] {
        match &self.data {
            DataPhase::Write { buf, .. } => buf,
            _ => &[],
        }
    }

    /// Buffer to read into, or `None` if this is not a read
    pub fn read_buf(&mut self) -> Option<&mut [u8]> {
        match &mut self.data {
            DataPhase::Read { buf, .. } => Some(&mut **buf),
            _ => None,
        }
    }

    /// Check the descriptor carries at least one phase
    pub fn validate(&self) -> Result<()> {
        if self.has_command() || self.has_address() || self.dummy_bytes > 0 || self.has_data() {
            Ok(())
        } else {
            Err(Error::Invalid)
        }
    }

    /// Calculate the total number of bytes on the bus
    pub fn total_bytes(&self) -> usize {
        let mut total = usize::from(self.has_command());
        if let Some(addr) = self.address.filter(|a| a.width.is_present()) {
            total += addr.size.bytes() as usize;
        }
        total += self.dummy_bytes as usize;
        total += self.data_len();
        total
    }
}
