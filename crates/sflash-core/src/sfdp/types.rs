//! SFDP type definitions
//!
//! Types representing SFDP structures as defined by JEDEC JESD216. Tables
//! are kept as raw little-endian DWORDs; the decoded views below pull
//! individual fields out by shift and mask.

use heapless::Vec;

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// Maximum number of parameter headers read from a device
pub const MAX_PARAMETER_HEADERS: usize = 10;

/// Maximum Basic Flash Parameter Table length in DWORDs (JESD216F)
pub const BFPT_MAX_DWORDS: usize = 23;

/// 4-Byte Address Instruction Table length in DWORDs
pub const FOUR_BYTE_TABLE_DWORDS: usize = 2;

/// BFPT length from which the JESD216A+ fields (DWORD 10-16) are present
pub const BFPT_REV_A_LEN: usize = 64;

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;
/// 4-byte Address Instruction Table ID
pub const PARAM_ID_4BYTE_ADDR: u16 = 0xFF84;

/// Page size fallback when the BFPT does not describe one
pub const DEFAULT_PAGE_SIZE: u32 = 256;

// ============================================================================
// SFDP Revision
// ============================================================================

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl SfdpRevision {
    /// Create a new revision
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ============================================================================
// Headers
// ============================================================================

/// SFDP header structure (first 8 bytes at address 0x00)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpHeader {
    /// SFDP signature (should be 0x50444653)
    pub signature: u32,
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers (0-based, so actual count is nph + 1)
    pub nph: u8,
    /// Access protocol (0xFF for legacy)
    pub access_protocol: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            signature: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            revision: SfdpRevision {
                minor: data[4],
                major: data[5],
            },
            nph: data[6],
            access_protocol: data[7],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Number of parameter headers the engine will read (`nph + 1`, at most 10)
    pub fn num_param_headers(&self) -> usize {
        core::cmp::min(self.nph as usize + 1, MAX_PARAMETER_HEADERS)
    }
}

/// Parameter header structure (8 bytes each, starting at address 0x08)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Parse a parameter header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            id: ((data[7] as u16) << 8) | (data[0] as u16),
            revision: SfdpRevision {
                minor: data[1],
                major: data[2],
            },
            length_dwords: data[3],
            table_pointer: u32::from_le_bytes([data[4], data[5], data[6], 0]),
        }
    }

    /// Get the table length in bytes
    pub fn length_bytes(&self) -> usize {
        (self.length_dwords as usize) * 4
    }

    /// Check if this is the Basic Flash Parameter Table
    pub fn is_basic(&self) -> bool {
        self.id == PARAM_ID_BASIC
    }

    /// Check if this is the 4-Byte Address Instruction Table
    pub fn is_four_byte(&self) -> bool {
        self.id == PARAM_ID_4BYTE_ADDR
    }
}

// ============================================================================
// Raw tables
// ============================================================================

/// Parameter tables captured during discovery
///
/// Words that were not present on the device read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterTables {
    /// SFDP header
    pub header: SfdpHeader,
    /// Parameter headers as read from the device
    pub headers: Vec<ParameterHeader, MAX_PARAMETER_HEADERS>,
    /// Basic Flash Parameter Table, DWORD 1 at index 0
    pub basic: [u32; BFPT_MAX_DWORDS],
    /// Bytes of `basic` actually read from the device
    pub basic_len: usize,
    /// 4-Byte Address Instruction Table
    pub four_byte: [u32; FOUR_BYTE_TABLE_DWORDS],
    /// Whether a 4-Byte Address Instruction Table was present
    pub four_byte_enabled: bool,
}

impl ParameterTables {
    /// Get a BFPT DWORD by its 1-based JESD216 number
    pub fn basic_dword(&self, n: usize) -> u32 {
        match n {
            1..=BFPT_MAX_DWORDS => self.basic[n - 1],
            _ => 0,
        }
    }

    /// Decode the Basic Flash Parameter Table
    pub fn basic_params(&self) -> BasicFlashParams {
        BasicFlashParams::decode(self)
    }

    /// Decode the 4-Byte Address Instruction Table, if present
    pub fn four_byte_instructions(&self) -> Option<FourByteInstructions> {
        self.four_byte_enabled
            .then(|| FourByteInstructions::decode(self.four_byte[0], self.four_byte[1]))
    }
}

// ============================================================================
// Fast Read Parameters
// ============================================================================

/// Parameters for a fast read command
///
/// Contains the opcode, number of mode clocks, and number of dummy/wait cycles
/// needed for a specific fast read mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FastReadParams {
    /// Instruction opcode (0x00 if not supported)
    pub opcode: u8,
    /// Number of mode clock cycles
    pub mode_clocks: u8,
    /// Number of dummy/wait clock cycles before valid output
    pub dummy_clocks: u8,
}

impl FastReadParams {
    /// Parse from DWORD high half
    ///
    /// Layout: [31:24] instruction, [23:21] mode clocks, [20:16] dummy clocks
    pub fn from_high_half(dword: u32) -> Self {
        Self {
            opcode: ((dword >> 24) & 0xFF) as u8,
            mode_clocks: ((dword >> 21) & 0x07) as u8,
            dummy_clocks: ((dword >> 16) & 0x1F) as u8,
        }
    }

    /// Parse from DWORD low half
    ///
    /// Layout: [15:8] instruction, [7:5] mode clocks, [4:0] dummy clocks
    pub fn from_low_half(dword: u32) -> Self {
        Self {
            opcode: ((dword >> 8) & 0xFF) as u8,
            mode_clocks: ((dword >> 5) & 0x07) as u8,
            dummy_clocks: (dword & 0x1F) as u8,
        }
    }

    /// Mode plus dummy clocks between address and data
    pub fn wait_clocks(&self) -> u8 {
        self.mode_clocks + self.dummy_clocks
    }
}

// ============================================================================
// Address Mode
// ============================================================================

/// Flash addressing mode (BFPT DWORD 1 bits [18:17])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// 3-byte addressing only (up to 16 MiB)
    #[default]
    ThreeByteOnly,
    /// 3-byte default, can switch to 4-byte
    ThreeOrFourByte,
    /// 4-byte addressing only
    FourByteOnly,
}

impl AddressMode {
    /// Parse from the two-bit field
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x03 {
            0b01 => Self::ThreeOrFourByte,
            0b10 => Self::FourByteOnly,
            _ => Self::ThreeByteOnly,
        }
    }
}

// ============================================================================
// Erase Type
// ============================================================================

/// Erase type from BFPT DWORDs 8-9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpEraseType {
    /// Erase opcode
    pub opcode: u8,
    /// Erase size in bytes (0 if not supported)
    pub size: u32,
}

impl SfdpEraseType {
    /// Parse from size exponent (N where size = 2^N) and opcode
    pub fn from_raw(size_exp: u8, opcode: u8) -> Self {
        if size_exp == 0 || size_exp >= 32 {
            Self::default()
        } else {
            Self {
                opcode,
                size: 1u32 << size_exp,
            }
        }
    }

    /// Check if this erase type is defined
    pub fn is_valid(&self) -> bool {
        self.size > 0
    }
}

// ============================================================================
// Quad Enable (QE) Requirements
// ============================================================================

/// How to set the Quad Enable bit (BFPT DWORD 15 bits [22:20])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuadEnableRequirement {
    /// No QE bit, or the requirement is unknown; nothing is written
    #[default]
    Ignore,
    /// QE is bit 1 of SR2; written together with SR1 by a 2-byte 0x01
    Sr2Bit1WriteSr1Sr2,
    /// QE is bit 6 of SR1; written with a 1-byte 0x01
    Sr1Bit6,
    /// QE is bit 7 of SR2; read with 0x35 and written with 0x31
    Sr2Bit7,
    /// QE is bit 1 of SR2; read with 0x35 and written with 0x31
    Sr2Bit1WriteSr2,
}

impl QuadEnableRequirement {
    /// Map a raw QER code
    ///
    /// Codes 1, 4 and 5 all place QE in SR2 bit 1 behind a 16-bit status
    /// write. Codes 0 and 7 are treated as "no QE handling".
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x07 {
            1 | 4 | 5 => Self::Sr2Bit1WriteSr1Sr2,
            2 => Self::Sr1Bit6,
            3 => Self::Sr2Bit7,
            6 => Self::Sr2Bit1WriteSr2,
            _ => Self::Ignore,
        }
    }
}

// ============================================================================
// Decoded Basic Flash Parameters
// ============================================================================

/// Decoded Basic Flash Parameter Table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicFlashParams {
    /// Table length in bytes as read from the device
    pub table_len: usize,
    /// Total flash size in bytes
    pub density_bytes: u64,
    /// Page program buffer size in bytes
    pub page_size: u32,
    /// Erase types 1-4
    pub erase_types: [SfdpEraseType; 4],
    /// Address bytes supported
    pub address_mode: AddressMode,
    /// Supports 1-1-2 fast read
    pub fast_read_112: bool,
    /// Supports 1-2-2 fast read
    pub fast_read_122: bool,
    /// Supports 1-1-4 fast read
    pub fast_read_114: bool,
    /// Supports 1-4-4 fast read
    pub fast_read_144: bool,
    /// 1-1-2 fast read parameters (DWORD 4 low)
    pub fast_read_112_params: FastReadParams,
    /// 1-2-2 fast read parameters (DWORD 4 high)
    pub fast_read_122_params: FastReadParams,
    /// 1-1-4 fast read parameters (DWORD 3 high)
    pub fast_read_114_params: FastReadParams,
    /// 1-4-4 fast read parameters (DWORD 3 low)
    pub fast_read_144_params: FastReadParams,
    /// Quad enable requirement (`Ignore` for tables shorter than 64 bytes)
    pub quad_enable: QuadEnableRequirement,
}

impl BasicFlashParams {
    /// Decode the BFPT words of a discovery result
    pub fn decode(tables: &ParameterTables) -> Self {
        let dword1 = tables.basic_dword(1);
        let dword3 = tables.basic_dword(3);
        let dword4 = tables.basic_dword(4);
        let dword8 = tables.basic_dword(8);
        let dword9 = tables.basic_dword(9);
        let rev_a = tables.basic_len >= BFPT_REV_A_LEN;

        Self {
            table_len: tables.basic_len,
            density_bytes: density_bytes(tables.basic_dword(2)),
            page_size: if rev_a {
                page_size(tables.basic_dword(11))
            } else {
                DEFAULT_PAGE_SIZE
            },
            erase_types: [
                SfdpEraseType::from_raw((dword8 & 0xFF) as u8, ((dword8 >> 8) & 0xFF) as u8),
                SfdpEraseType::from_raw(((dword8 >> 16) & 0xFF) as u8, (dword8 >> 24) as u8),
                SfdpEraseType::from_raw((dword9 & 0xFF) as u8, ((dword9 >> 8) & 0xFF) as u8),
                SfdpEraseType::from_raw(((dword9 >> 16) & 0xFF) as u8, (dword9 >> 24) as u8),
            ],
            // DWORD 1: [16] 1-1-2, [18:17] address bytes, [20] 1-2-2,
            // [21] 1-4-4, [22] 1-1-4
            address_mode: AddressMode::from_bfpt(((dword1 >> 17) & 0x03) as u8),
            fast_read_112: dword1 & (1 << 16) != 0,
            fast_read_122: dword1 & (1 << 20) != 0,
            fast_read_144: dword1 & (1 << 21) != 0,
            fast_read_114: dword1 & (1 << 22) != 0,
            fast_read_114_params: FastReadParams::from_high_half(dword3),
            fast_read_144_params: FastReadParams::from_low_half(dword3),
            fast_read_122_params: FastReadParams::from_high_half(dword4),
            fast_read_112_params: FastReadParams::from_low_half(dword4),
            quad_enable: if rev_a {
                QuadEnableRequirement::from_bfpt(((tables.basic_dword(15) >> 20) & 0x07) as u8)
            } else {
                QuadEnableRequirement::Ignore
            },
        }
    }

    /// Defined erase types with their 0-based type index
    pub fn erase_types(&self) -> impl Iterator<Item = (usize, SfdpEraseType)> + '_ {
        self.erase_types
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, e)| e.is_valid())
    }
}

/// Decode BFPT DWORD 2
///
/// Bit 31 clear: bits 30:0 hold the density in bits minus one.
/// Bit 31 set: bits 30:0 hold N where density = 2^N bits.
pub fn density_bytes(dword: u32) -> u64 {
    let value = dword & 0x7FFF_FFFF;
    if dword & (1 << 31) == 0 {
        (value as u64 + 1) >> 3
    } else if (3..64 + 3).contains(&value) {
        1u64 << (value - 3)
    } else {
        0
    }
}

/// Decode BFPT DWORD 11 bits [7:4] (page size exponent)
///
/// An exponent of 0 or 15 falls back to 256 bytes.
pub fn page_size(dword: u32) -> u32 {
    match (dword >> 4) & 0x0F {
        0 | 15 => DEFAULT_PAGE_SIZE,
        exp => 1u32 << exp,
    }
}

// ============================================================================
// 4-Byte Address Instruction Table
// ============================================================================

/// Decoded 4-Byte Address Instruction Table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FourByteInstructions {
    /// Support bits from DWORD 1
    pub flags: u32,
    /// 4-byte erase opcodes for erase types 1-4 (DWORD 2)
    pub erase_opcodes: [u8; 4],
}

impl FourByteInstructions {
    /// 1S-1S-1S FAST_READ (0x0C)
    pub const FAST_READ_1S_1S_1S: u32 = 1 << 1;
    /// 1S-1S-2S FAST_READ (0x3C)
    pub const FAST_READ_1S_1S_2S: u32 = 1 << 2;
    /// 1S-2S-2S FAST_READ (0xBC)
    pub const FAST_READ_1S_2S_2S: u32 = 1 << 3;
    /// 1S-1S-4S FAST_READ (0x6C)
    pub const FAST_READ_1S_1S_4S: u32 = 1 << 4;
    /// 1S-4S-4S FAST_READ (0xEC)
    pub const FAST_READ_1S_4S_4S: u32 = 1 << 5;
    /// 1S-1S-1S PAGE_PROGRAM (0x12)
    pub const PAGE_PROGRAM_1S_1S_1S: u32 = 1 << 6;
    /// 1S-1S-4S PAGE_PROGRAM (0x34)
    pub const PAGE_PROGRAM_1S_1S_4S: u32 = 1 << 7;
    /// 1S-4S-4S PAGE_PROGRAM (0x3E)
    pub const PAGE_PROGRAM_1S_4S_4S: u32 = 1 << 8;
    /// Erase type 1 supported with 4-byte address; types 2-4 follow
    pub const ERASE_TYPE_1: u32 = 1 << 9;

    /// Decode DWORD 1 and DWORD 2
    pub fn decode(dword1: u32, dword2: u32) -> Self {
        Self {
            flags: dword1,
            erase_opcodes: dword2.to_le_bytes(),
        }
    }

    /// Check if a specific instruction is supported
    pub fn supports(&self, flag: u32) -> bool {
        (self.flags & flag) != 0
    }

    /// 4-byte erase opcode for erase type `index` (0-3), if advertised
    pub fn erase_opcode(&self, index: usize) -> Option<u8> {
        if index >= 4 || !self.supports(Self::ERASE_TYPE_1 << index) {
            return None;
        }
        Some(self.erase_opcodes[index]).filter(|&op| op != 0x00 && op != 0xFF)
    }
}
