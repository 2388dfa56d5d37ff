//! Emulated part configuration

use sflash_core::nand::NandPart;
use thiserror::Error;

/// Errors from validating an emulator configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Array size must be a power of two of at least one page
    #[error("flash size {0:#x} is not a power of two")]
    BadSize(u32),
    /// Page size must be a power of two up to 16 KiB
    #[error("page size {0} is not a power of two up to 16 KiB")]
    BadPageSize(u32),
    /// BFPT holds between one and four erase types
    #[error("{0} erase types configured, expected 1 to 4")]
    EraseTypeCount(usize),
    /// Erase type with an unusable size or opcode
    #[error("erase type 0x{opcode:02X} with size {size} is not usable")]
    BadEraseType {
        /// Erase opcode
        opcode: u8,
        /// Erase size in bytes
        size: u32,
    },
    /// QER field is three bits wide
    #[error("quad enable requirement {0} is out of range")]
    BadQuadEnable(u8),
    /// NAND geometry with a zero dimension
    #[error("NAND geometry {blocks}x{pages_per_block}x{page_size}+{spare_size} is not usable")]
    BadGeometry {
        /// Blocks
        blocks: u32,
        /// Pages per block
        pages_per_block: u32,
        /// Main bytes per page
        page_size: u32,
        /// Spare bytes per page
        spare_size: u32,
    },
}

/// One BFPT erase type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseType {
    /// 3-byte address opcode
    pub opcode: u8,
    /// Erase granule in bytes
    pub size: u32,
}

impl EraseType {
    /// Create an erase type
    pub const fn new(opcode: u8, size: u32) -> Self {
        Self { opcode, size }
    }
}

/// Emulated SPI NOR part, described the way its SFDP tables will
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NorConfig {
    /// Array size in bytes
    pub size: u32,
    /// Program page size
    pub page_size: u32,
    /// Erase types in BFPT order
    pub erase_types: Vec<EraseType>,
    /// Raw BFPT QER field (DWORD 15 bits 22:20)
    pub quad_enable: u8,
    /// Advertise 1-1-2 and 1-2-2 reads
    pub dual: bool,
    /// Advertise 1-1-4 and 1-4-4 reads
    pub quad: bool,
    /// Publish a 4-Byte Address Instruction Table
    pub four_byte_table: bool,
    /// Status reads that report busy after each program, erase or status write
    pub busy_polls: u32,
}

impl Default for NorConfig {
    /// 16 MiB part with 4/32/64 KiB erase and QE in SR2 bit 1
    fn default() -> Self {
        Self {
            size: 16 * 1024 * 1024,
            page_size: 256,
            erase_types: vec![
                EraseType::new(0x20, 4 * 1024),
                EraseType::new(0x52, 32 * 1024),
                EraseType::new(0xD8, 64 * 1024),
            ],
            quad_enable: 1,
            dual: true,
            quad: true,
            four_byte_table: false,
            busy_polls: 0,
        }
    }
}

impl NorConfig {
    /// Check that the configuration can be expressed in SFDP
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.size.is_power_of_two() || self.size < self.page_size {
            return Err(ConfigError::BadSize(self.size));
        }
        if !self.page_size.is_power_of_two() || self.page_size > 16 * 1024 {
            return Err(ConfigError::BadPageSize(self.page_size));
        }
        if self.erase_types.is_empty() || self.erase_types.len() > 4 {
            return Err(ConfigError::EraseTypeCount(self.erase_types.len()));
        }
        for e in &self.erase_types {
            if !e.size.is_power_of_two() || e.size < 2 || e.size > self.size || e.opcode == 0x00 || e.opcode == 0xFF {
                return Err(ConfigError::BadEraseType {
                    opcode: e.opcode,
                    size: e.size,
                });
            }
        }
        if self.quad_enable > 7 {
            return Err(ConfigError::BadQuadEnable(self.quad_enable));
        }
        Ok(())
    }
}

/// Emulated SPI NAND part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NandConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Erase blocks
    pub blocks: u32,
    /// Pages per block
    pub pages_per_block: u32,
    /// Main bytes per page
    pub page_size: u32,
    /// Spare bytes per page
    pub spare_size: u32,
    /// Status reads that report busy after each array operation
    pub busy_polls: u32,
}

impl NandConfig {
    /// Configuration matching a supported part
    pub fn for_part(part: &NandPart) -> Self {
        Self {
            manufacturer_id: sflash_core::protocol::spinand::MANUFACTURER_WINBOND,
            device_id: part.device_id,
            blocks: part.blocks,
            pages_per_block: part.pages_per_block,
            page_size: part.page_size,
            spare_size: part.spare_size,
            busy_polls: 0,
        }
    }

    /// Check that the geometry is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks == 0 || self.pages_per_block == 0 || self.page_size == 0 || self.spare_size == 0 {
            return Err(ConfigError::BadGeometry {
                blocks: self.blocks,
                pages_per_block: self.pages_per_block,
                page_size: self.page_size,
                spare_size: self.spare_size,
            });
        }
        Ok(())
    }

    /// Bytes per page including spare
    pub fn raw_page_size(&self) -> usize {
        (self.page_size + self.spare_size) as usize
    }
}

impl Default for NandConfig {
    /// W25N01GV
    fn default() -> Self {
        Self::for_part(&sflash_core::nand::PARTS[0])
    }
}
