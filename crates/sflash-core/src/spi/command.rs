//! Resolved program and read commands

use super::LineWidth;

/// Page program (or program load) command and its line widths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCommand {
    /// Opcode
    pub opcode: u8,
    /// Address lines
    pub address_width: LineWidth,
    /// Data lines
    pub data_width: LineWidth,
}

impl ProgramCommand {
    /// Create a program command
    pub const fn new(opcode: u8, address_width: LineWidth, data_width: LineWidth) -> Self {
        Self {
            opcode,
            address_width,
            data_width,
        }
    }
}

/// Fast read command, its line widths and dummy bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCommand {
    /// Opcode
    pub opcode: u8,
    /// Address lines
    pub address_width: LineWidth,
    /// Data lines
    pub data_width: LineWidth,
    /// Dummy bytes counted on the address lines (mode clocks included)
    pub dummy_bytes: u8,
}

impl ReadCommand {
    /// Create a read command with an explicit dummy byte count
    pub const fn new(opcode: u8, address_width: LineWidth, data_width: LineWidth, dummy_bytes: u8) -> Self {
        Self {
            opcode,
            address_width,
            data_width,
            dummy_bytes,
        }
    }

    /// Create a read command whose wait cycles are given in clocks
    pub const fn with_clocks(
        opcode: u8,
        address_width: LineWidth,
        data_width: LineWidth,
        clocks: u8,
    ) -> Self {
        Self::new(opcode, address_width, data_width, address_width.clocks_to_bytes(clocks))
    }

    /// 1-1-1 fast read with 8 dummy clocks
    pub const fn fast_single(opcode: u8) -> Self {
        Self::new(opcode, LineWidth::Single, LineWidth::Single, 1)
    }
}
