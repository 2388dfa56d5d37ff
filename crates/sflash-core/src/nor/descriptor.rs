//! NOR device descriptor and its resolution from SFDP

use crate::error::{IoFailure, Result};
use crate::sfdp::{
    BasicFlashParams, FastReadParams, FourByteInstructions, ParameterTables, SfdpRevision,
};
use crate::spi::{opcodes, AddressSize, IoMode, LineWidth, ProgramCommand, ReadCommand};

/// Largest device reachable with 3-byte addresses
pub const MAX_3BYTE_SIZE: u32 = 16 * 1024 * 1024;

/// Smallest erase granule considered a sector
const MIN_SECTOR_SIZE: u32 = 1024;
/// Erase granules at or above this size are never used as the block erase
const MAX_BLOCK_SIZE: u32 = 1024 * 1024;

/// Everything the NOR engine needs to drive one device
///
/// Built once at attach time and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorDescriptor {
    /// Total size in bytes
    pub size: u32,
    /// Page program buffer size
    pub page_size: u32,
    /// Smallest erase granule
    pub sector_size: u32,
    /// Largest erase granule below 1 MiB
    pub block_size: u32,
    /// Address bytes on the wire (3 or 4)
    pub address_size: AddressSize,
    /// Sector erase opcode
    pub sector_erase_opcode: u8,
    /// Block erase opcode
    pub block_erase_opcode: u8,
    /// Page program command
    pub program: ProgramCommand,
    /// Fast read command
    pub read: ReadCommand,
    /// SFDP revision the descriptor was built from
    pub sfdp_revision: SfdpRevision,
}

impl NorDescriptor {
    /// Descriptor for a plain single-I/O part with 4 KiB / 64 KiB erases
    ///
    /// Useful when attaching to a known device without SFDP.
    pub fn single_io(size: u32, page_size: u32, sector_size: u32, block_size: u32) -> Self {
        let four_byte = size > MAX_3BYTE_SIZE;
        Self {
            size,
            page_size,
            sector_size,
            block_size,
            address_size: if four_byte {
                AddressSize::FourByte
            } else {
                AddressSize::ThreeByte
            },
            sector_erase_opcode: opcodes::SE_20,
            block_erase_opcode: opcodes::BE_D8,
            program: ProgramCommand::new(opcodes::PP, LineWidth::Single, LineWidth::Single),
            read: ReadCommand::fast_single(opcodes::FAST_READ),
            sfdp_revision: SfdpRevision::default(),
        }
    }

    /// Resolve a descriptor from discovered parameter tables
    ///
    /// `io_mode` is the widest data path the host may use; reads and page
    /// programs fall back to narrower widths the device supports.
    pub fn from_sfdp(tables: &ParameterTables, io_mode: IoMode) -> Result<Self> {
        let params = tables.basic_params();
        let four_byte_table = tables.four_byte_instructions();

        if params.density_bytes == 0 || params.density_bytes > u32::MAX as u64 {
            log::warn!("unsupported density: {} bytes", params.density_bytes);
            return Err(IoFailure::UnsupportedGeometry.into());
        }
        let size = params.density_bytes as u32;
        let four_byte = size > MAX_3BYTE_SIZE;

        let (sector, block) = select_erase_types(&params)?;
        let (sector_size, mut sector_erase_opcode) = (sector.1, sector.2);
        let (block_size, mut block_erase_opcode) = (block.1, block.2);

        if four_byte {
            let native = |index: usize, opcode: u8| {
                four_byte_table
                    .and_then(|t| t.erase_opcode(index))
                    .unwrap_or(opcodes::erase_opcode_4b(opcode))
            };
            sector_erase_opcode = native(sector.0, sector_erase_opcode);
            block_erase_opcode = native(block.0, block_erase_opcode);
        }

        let table = if four_byte { four_byte_table } else { None };
        let desc = Self {
            size,
            page_size: params.page_size,
            sector_size,
            block_size,
            address_size: if four_byte {
                AddressSize::FourByte
            } else {
                AddressSize::ThreeByte
            },
            sector_erase_opcode,
            block_erase_opcode,
            program: resolve_program(io_mode, table.as_ref()),
            read: resolve_read(&params, io_mode, four_byte, table.as_ref()),
            sfdp_revision: tables.header.revision,
        };

        log::debug!(
            "NOR: {} bytes, page {}, sector {} (0x{:02X}), block {} (0x{:02X}), {}-byte address",
            desc.size,
            desc.page_size,
            desc.sector_size,
            desc.sector_erase_opcode,
            desc.block_size,
            desc.block_erase_opcode,
            desc.address_size.bytes()
        );
        log::debug!(
            "NOR: program 0x{:02X} (1-{}-{}), read 0x{:02X} (1-{}-{}, {} dummy)",
            desc.program.opcode,
            desc.program.address_width.lines(),
            desc.program.data_width.lines(),
            desc.read.opcode,
            desc.read.address_width.lines(),
            desc.read.data_width.lines(),
            desc.read.dummy_bytes
        );

        Ok(desc)
    }

    /// Returns true if the device is addressed with 4 bytes
    pub fn is_four_byte(&self) -> bool {
        self.address_size == AddressSize::FourByte
    }
}

/// Pick (index, size, opcode) for the sector and block erase
///
/// The sector is the smallest erase type of at least 1 KiB, the block the
/// largest one below 1 MiB. Ties keep the first type seen.
fn select_erase_types(params: &BasicFlashParams) -> Result<((usize, u32, u8), (usize, u32, u8))> {
    let mut sector: Option<(usize, u32, u8)> = None;
    let mut block: Option<(usize, u32, u8)> = None;

    for (index, erase) in params.erase_types() {
        if erase.size < MIN_SECTOR_SIZE {
            continue;
        }
        if sector.map_or(true, |(_, size, _)| erase.size < size) {
            sector = Some((index, erase.size, erase.opcode));
        }
        if erase.size < MAX_BLOCK_SIZE && block.map_or(true, |(_, size, _)| erase.size > size) {
            block = Some((index, erase.size, erase.opcode));
        }
    }

    let sector = sector.ok_or(IoFailure::UnsupportedGeometry)?;
    // No erase type below 1 MiB: every erase uses the sector granule
    Ok((sector, block.unwrap_or(sector)))
}

fn resolve_program(io_mode: IoMode, table: Option<&FourByteInstructions>) -> ProgramCommand {
    let single = LineWidth::Single;
    let quad = io_mode.data_width().lines() >= 4;
    let cmd = ProgramCommand::new;

    match table {
        Some(t) if quad && t.supports(FourByteInstructions::PAGE_PROGRAM_1S_1S_4S) => {
            cmd(opcodes::QPP_4B, single, LineWidth::Quad)
        }
        Some(t) if quad && t.supports(FourByteInstructions::PAGE_PROGRAM_1S_4S_4S) => {
            cmd(opcodes::QPP_144_4B, LineWidth::Quad, LineWidth::Quad)
        }
        Some(t) if t.supports(FourByteInstructions::PAGE_PROGRAM_1S_1S_1S) => {
            cmd(opcodes::PP_4B, single, single)
        }
        _ if quad => cmd(opcodes::QPP, single, LineWidth::Quad),
        _ => cmd(opcodes::PP, single, single),
    }
}

fn resolve_read(
    params: &BasicFlashParams,
    io_mode: IoMode,
    four_byte: bool,
    table: Option<&FourByteInstructions>,
) -> ReadCommand {
    let single = LineWidth::Single;

    // Native 4-byte opcode when the table advertises it, else the BFPT
    // opcode, which works once the device is in 4-byte mode
    let pick = |supported: bool, fr: FastReadParams, flag: u32, native: u8| -> Option<u8> {
        match table {
            Some(t) => t.supports(flag).then_some(native),
            None => (supported && fr.opcode != 0x00 && fr.opcode != 0xFF).then_some(fr.opcode),
        }
    };

    let lines = io_mode.data_width().lines();
    if lines >= 4 {
        let fr = params.fast_read_144_params;
        if let Some(op) = pick(
            params.fast_read_144,
            fr,
            FourByteInstructions::FAST_READ_1S_4S_4S,
            opcodes::QIOR_4B,
        ) {
            return ReadCommand::with_clocks(op, LineWidth::Quad, LineWidth::Quad, fr.wait_clocks());
        }
        let fr = params.fast_read_114_params;
        if let Some(op) = pick(
            params.fast_read_114,
            fr,
            FourByteInstructions::FAST_READ_1S_1S_4S,
            opcodes::QOR_4B,
        ) {
            return ReadCommand::with_clocks(op, single, LineWidth::Quad, fr.wait_clocks());
        }
        log::warn!("no quad read advertised, falling back to single I/O");
    } else if lines == 2 {
        let fr = params.fast_read_122_params;
        if let Some(op) = pick(
            params.fast_read_122,
            fr,
            FourByteInstructions::FAST_READ_1S_2S_2S,
            opcodes::DIOR_4B,
        ) {
            return ReadCommand::with_clocks(op, LineWidth::Dual, LineWidth::Dual, fr.wait_clocks());
        }
        let fr = params.fast_read_112_params;
        if let Some(op) = pick(
            params.fast_read_112,
            fr,
            FourByteInstructions::FAST_READ_1S_1S_2S,
            opcodes::DOR_4B,
        ) {
            return ReadCommand::with_clocks(op, single, LineWidth::Dual, fr.wait_clocks());
        }
        log::warn!("no dual read advertised, falling back to single I/O");
    }

    match table {
        Some(t) if four_byte && t.supports(FourByteInstructions::FAST_READ_1S_1S_1S) => {
            ReadCommand::fast_single(opcodes::FAST_READ_4B)
        }
        _ => ReadCommand::fast_single(opcodes::FAST_READ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sfdp::{QuadEnableRequirement, BFPT_REV_A_LEN};

    /// BFPT for a 16 MiB part with 4K/32K/64K erases and 1-1-2, 1-1-4, 1-4-4 reads
    fn tables_16m() -> ParameterTables {
        let mut t = ParameterTables::default();
        t.basic[0] = 0x0000_20E5 | (1 << 16) | (1 << 21) | (1 << 22);
        t.basic[1] = 0x07FF_FFFF;
        t.basic[2] = 0x6B08_EB44;
        t.basic[3] = 0xBB42_3B08;
        t.basic[7] = 0x520F_200C;
        t.basic[8] = 0x0000_D810;
        t.basic[10] = 0x80;
        t.basic[14] = 1 << 20;
        t.basic_len = BFPT_REV_A_LEN;
        t
    }

    #[test]
    fn test_resolve_16m_quad() {
        let desc = NorDescriptor::from_sfdp(&tables_16m(), IoMode::Quad).unwrap();
        assert_eq!(desc.size, 16 * 1024 * 1024);
        assert_eq!(desc.page_size, 256);
        assert_eq!((desc.sector_size, desc.sector_erase_opcode), (4096, 0x20));
        assert_eq!((desc.block_size, desc.block_erase_opcode), (65536, 0xD8));
        assert_eq!(desc.address_size, AddressSize::ThreeByte);
        assert_eq!(desc.program.opcode, opcodes::QPP);
        // 1-4-4: 2 mode + 4 dummy clocks on four lines
        assert_eq!(desc.read.opcode, 0xEB);
        assert_eq!(desc.read.address_width, LineWidth::Quad);
        assert_eq!(desc.read.dummy_bytes, 3);
        assert_eq!(
            tables_16m().basic_params().quad_enable,
            QuadEnableRequirement::Sr2Bit1WriteSr1Sr2
        );
    }

    #[test]
    fn test_resolve_falls_back_to_114() {
        let mut tables = tables_16m();
        tables.basic[0] &= !(1 << 21);
        let desc = NorDescriptor::from_sfdp(&tables, IoMode::Quad).unwrap();
        assert_eq!(desc.read.opcode, 0x6B);
        assert_eq!(desc.read.address_width, LineWidth::Single);
        assert_eq!(desc.read.data_width, LineWidth::Quad);
        assert_eq!(desc.read.dummy_bytes, 1);
    }

    #[test]
    fn test_resolve_dual_and_single() {
        let desc = NorDescriptor::from_sfdp(&tables_16m(), IoMode::Dual).unwrap();
        assert_eq!(desc.read.opcode, 0x3B);
        assert_eq!(desc.read.data_width, LineWidth::Dual);
        assert_eq!(desc.read.dummy_bytes, 1);
        assert_eq!(desc.program.opcode, opcodes::PP);

        let desc = NorDescriptor::from_sfdp(&tables_16m(), IoMode::Single).unwrap();
        assert_eq!(desc.read, ReadCommand::fast_single(opcodes::FAST_READ));
    }

    #[test]
    fn test_resolve_32m_with_four_byte_table() {
        let mut tables = tables_16m();
        tables.basic[1] = 0x0FFF_FFFF;
        tables.four_byte_enabled = true;
        tables.four_byte[0] = FourByteInstructions::FAST_READ_1S_1S_4S
            | FourByteInstructions::PAGE_PROGRAM_1S_1S_4S
            | FourByteInstructions::ERASE_TYPE_1
            | (FourByteInstructions::ERASE_TYPE_1 << 2);
        tables.four_byte[1] = 0xFF_DC_5C_21;

        let desc = NorDescriptor::from_sfdp(&tables, IoMode::Quad).unwrap();
        assert!(desc.is_four_byte());
        assert_eq!(desc.sector_erase_opcode, 0x21);
        assert_eq!(desc.block_erase_opcode, 0xDC);
        assert_eq!(desc.program.opcode, opcodes::QPP_4B);
        assert_eq!(desc.read.opcode, opcodes::QOR_4B);
        assert_eq!(desc.read.address_width, LineWidth::Single);
    }

    #[test]
    fn test_resolve_32m_without_table_maps_erase() {
        let mut tables = tables_16m();
        tables.basic[1] = 0x0FFF_FFFF;
        let desc = NorDescriptor::from_sfdp(&tables, IoMode::Single).unwrap();
        assert_eq!(desc.sector_erase_opcode, opcodes::SE_21);
        assert_eq!(desc.block_erase_opcode, opcodes::BE_DC);
        assert_eq!(desc.read.opcode, opcodes::FAST_READ);
        assert_eq!(desc.program.opcode, opcodes::PP);
    }

    #[test]
    fn test_erase_selection_skips_small_and_huge() {
        let mut tables = tables_16m();
        // 256 B type, then 4K, 4K duplicate with a different opcode, 1 MiB
        tables.basic[7] = 0x08 | (0x81 << 8) | (0x0C << 16) | (0x20 << 24);
        tables.basic[8] = 0x0C | (0x21 << 8) | (0x14 << 16) | (0xC7 << 24);
        let desc = NorDescriptor::from_sfdp(&tables, IoMode::Single).unwrap();
        assert_eq!((desc.sector_size, desc.sector_erase_opcode), (4096, 0x20));
        assert_eq!((desc.block_size, desc.block_erase_opcode), (4096, 0x20));
    }

    #[test]
    fn test_no_usable_erase_type() {
        let mut tables = tables_16m();
        tables.basic[7] = 0;
        tables.basic[8] = 0;
        assert_eq!(
            NorDescriptor::from_sfdp(&tables, IoMode::Single),
            Err(Error::Io(IoFailure::UnsupportedGeometry))
        );
    }
}
