//! Standard JEDEC SPI NOR flash opcodes
//!
//! This module defines the SPI NOR command opcodes as specified
//! by JEDEC JESD216 (SFDP) and common manufacturer conventions.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Read Status Register 3
pub const RDSR3: u8 = 0x15;
/// Write Status Register 1 (a second data byte writes register 2)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;
/// Write Status Register 3
pub const WRSR3: u8 = 0x11;

// ============================================================================
// Read commands
// ============================================================================

/// Fast Read with 3-byte address (1-1-1, 8 dummy clocks)
pub const FAST_READ: u8 = 0x0B;
/// Fast Read with 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Dual Output Read with 4-byte address
pub const DOR_4B: u8 = 0x3C;
/// Quad Output Read (1-1-4)
pub const QOR: u8 = 0x6B;
/// Quad Output Read with 4-byte address
pub const QOR_4B: u8 = 0x6C;
/// Dual I/O Read (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Dual I/O Read with 4-byte address
pub const DIOR_4B: u8 = 0xBC;
/// Quad I/O Read (1-4-4)
pub const QIOR: u8 = 0xEB;
/// Quad I/O Read with 4-byte address
pub const QIOR_4B: u8 = 0xEC;

// ============================================================================
// Page Program
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;
/// Quad Page Program (1-1-4) with 3-byte address
pub const QPP: u8 = 0x32;
/// Quad Page Program (1-1-4) with 4-byte address
pub const QPP_4B: u8 = 0x34;
/// Quad Page Program (1-4-4) with 4-byte address
pub const QPP_144_4B: u8 = 0x3E;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4KB with 3-byte address
pub const SE_20: u8 = 0x20;
/// Sector Erase 4KB with 4-byte address
pub const SE_21: u8 = 0x21;
/// Block Erase 32KB with 3-byte address
pub const BE_52: u8 = 0x52;
/// Block Erase 32KB with 4-byte address
pub const BE_5C: u8 = 0x5C;
/// Block Erase 64KB with 3-byte address
pub const BE_D8: u8 = 0xD8;
/// Block Erase 64KB with 4-byte address
pub const BE_DC: u8 = 0xDC;

/// Map a 3-byte erase opcode onto its native 4-byte variant
///
/// Opcodes without a known 4-byte twin are returned unchanged; they keep
/// working once the device has entered 4-byte address mode.
pub const fn erase_opcode_4b(opcode: u8) -> u8 {
    match opcode {
        SE_20 => SE_21,
        BE_52 => BE_5C,
        BE_D8 => BE_DC,
        other => other,
    }
}

// ============================================================================
// 4-byte address mode control
// ============================================================================

/// Enter 4-Byte Address Mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-Byte Address Mode
pub const EX4B: u8 = 0xE9;

// ============================================================================
// SFDP (Serial Flash Discoverable Parameters)
// ============================================================================

/// Read SFDP (JEDEC JESD216)
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Status Register 1: Quad Enable (Macronix style, bit 6)
pub const SR1_QE_BIT6: u8 = 0x40;
/// Status Register 2: Quad Enable (Winbond style, bit 1)
pub const SR2_QE_BIT1: u8 = 0x02;
/// Status Register 2: Quad Enable (bit 7)
pub const SR2_QE_BIT7: u8 = 0x80;
