//! Supported SPI NAND parts and the resolved NAND descriptor

use crate::error::{Error, IoFailure, Result};
use crate::protocol::spinand;
use crate::spi::{IoMode, LineWidth, ProgramCommand, ReadCommand};

/// Static geometry of a supported part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandPart {
    /// Marketing name
    pub name: &'static str,
    /// 16-bit JEDEC device ID
    pub device_id: u16,
    /// Erase blocks on the die
    pub blocks: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Main-area bytes per page
    pub page_size: u32,
    /// Spare (OOB) bytes per page
    pub spare_size: u32,
}

impl NandPart {
    const fn new(
        name: &'static str,
        device_id: u16,
        blocks: u32,
        pages_per_block: u32,
        page_size: u32,
        spare_size: u32,
    ) -> Self {
        Self {
            name,
            device_id,
            blocks,
            pages_per_block,
            page_size,
            spare_size,
        }
    }
}

/// Winbond W25N parts the engine knows
pub static PARTS: &[NandPart] = &[
    NandPart::new("W25N01GV", 0xAA21, 1024, 64, 2048, 64),
    NandPart::new("W25N02JW", 0xBF22, 2048, 64, 2048, 64),
    NandPart::new("W25N04KW", 0xBA23, 4096, 64, 2176, 64),
];

/// Find the part for a JEDEC ID
///
/// Anything that is not a Winbond ID listed in [`PARTS`] fails with
/// `Io(UnknownDevice)`.
pub fn lookup(manufacturer: u8, device: u16) -> Result<&'static NandPart> {
    if manufacturer == spinand::MANUFACTURER_WINBOND {
        if let Some(part) = PARTS.iter().find(|p| p.device_id == device) {
            return Ok(part);
        }
    }
    Err(Error::Io(IoFailure::UnknownDevice {
        manufacturer,
        device,
    }))
}

/// Everything the NAND engine needs to drive one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandDescriptor {
    /// Part name
    pub name: &'static str,
    /// Erase blocks
    pub total_blocks: u32,
    /// Pages per block
    pub pages_per_block: u32,
    /// Main-area bytes per page
    pub bytes_per_page: u32,
    /// Spare bytes per page
    pub spare_bytes_per_page: u32,
    /// Random program data load command
    pub program: ProgramCommand,
    /// Cache read command (dummy count in `read.dummy_bytes`)
    pub read: ReadCommand,
}

impl NandDescriptor {
    /// Build the descriptor for a part and the host's I/O mode
    ///
    /// Hosts with four or more lines get the x4 load and quad I/O cache
    /// read; everything else stays on one line.
    pub fn for_part(part: &NandPart, io_mode: IoMode) -> Self {
        let (program, read) = if io_mode.data_width().lines() >= 4 {
            (
                ProgramCommand::new(
                    spinand::RANDOM_PROGRAM_LOAD_X4,
                    LineWidth::Single,
                    LineWidth::Quad,
                ),
                ReadCommand::new(spinand::FAST_READ_QUAD_IO, LineWidth::Quad, LineWidth::Quad, 2),
            )
        } else {
            (
                ProgramCommand::new(
                    spinand::RANDOM_PROGRAM_LOAD,
                    LineWidth::Single,
                    LineWidth::Single,
                ),
                ReadCommand::fast_single(spinand::FAST_READ),
            )
        };

        Self {
            name: part.name,
            total_blocks: part.blocks,
            pages_per_block: part.pages_per_block,
            bytes_per_page: part.page_size,
            spare_bytes_per_page: part.spare_size,
            program,
            read,
        }
    }

    /// Bytes in one erase block (main area only)
    pub const fn block_size(&self) -> u32 {
        self.pages_per_block * self.bytes_per_page
    }

    /// Total pages on the die
    pub const fn total_pages(&self) -> u32 {
        self.total_blocks * self.pages_per_block
    }

    /// Main-area capacity in bytes
    pub const fn size_bytes(&self) -> u64 {
        self.total_pages() as u64 * self.bytes_per_page as u64
    }

    /// Row address of a page, after bounds checking
    pub fn row(&self, block: u32, page: u32) -> Result<u32> {
        if block >= self.total_blocks || page >= self.pages_per_block {
            return Err(Error::Range);
        }
        Ok(block * self.pages_per_block + page)
    }
}
