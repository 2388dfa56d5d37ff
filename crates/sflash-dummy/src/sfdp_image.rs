//! SFDP image synthesis for the NOR emulator

use sflash_core::sfdp::{PARAM_ID_4BYTE_ADDR, PARAM_ID_BASIC};
use sflash_core::spi::opcodes;

use crate::config::NorConfig;

const HEADERS_AT: usize = 0x08;
const BFPT_AT: usize = 0x30;
const BFPT_DWORDS: usize = 16;
const FOUR_BYTE_AT: usize = BFPT_AT + BFPT_DWORDS * 4;
const FOUR_BYTE_DWORDS: usize = 2;

/// 4 KiB erase, 64-byte write granularity
const DW1_ERASE_4K: u32 = 0b01;
const DW1_WRITE_GRANULARITY: u32 = 1 << 2;
const DW1_FAST_READ_112: u32 = 1 << 16;
const DW1_ADDR_3_OR_4: u32 = 0b01 << 17;
const DW1_FAST_READ_122: u32 = 1 << 20;
const DW1_FAST_READ_144: u32 = 1 << 21;
const DW1_FAST_READ_114: u32 = 1 << 22;

/// Fast read parameter half-word: opcode, mode clocks, dummy clocks
const fn fast_read(opcode: u8, mode: u8, dummy: u8) -> u32 {
    ((opcode as u32) << 8) | ((mode as u32) << 5) | dummy as u32
}

/// 1-4-4 parameters (EBh, 2 mode + 4 dummy clocks)
pub const READ_144: u32 = fast_read(opcodes::QIOR, 2, 4);
/// 1-1-4 parameters (6Bh, 8 dummy clocks)
pub const READ_114: u32 = fast_read(opcodes::QOR, 0, 8);
/// 1-2-2 parameters (BBh, 2 mode + 2 dummy clocks)
pub const READ_122: u32 = fast_read(opcodes::DIOR, 2, 2);
/// 1-1-2 parameters (3Bh, 8 dummy clocks)
pub const READ_112: u32 = fast_read(opcodes::DOR, 0, 8);

fn density_dword(size: u32) -> u32 {
    let bits = size as u64 * 8;
    if bits <= 1 << 31 {
        (bits - 1) as u32
    } else {
        (1 << 31) | bits.trailing_zeros()
    }
}

fn erase_dword(config: &NorConfig, first: usize) -> u32 {
    (0..2)
        .map(|i| match config.erase_types.get(first + i) {
            Some(e) => (e.size.trailing_zeros() | (e.opcode as u32) << 8) << (16 * i),
            None => 0,
        })
        .fold(0, |acc, half| acc | half)
}

fn basic_table(config: &NorConfig) -> [u32; BFPT_DWORDS] {
    let mut dw = [0u32; BFPT_DWORDS];

    let mut dword1 = 0xFF80_0000 | DW1_WRITE_GRANULARITY;
    match config.erase_types.iter().find(|e| e.size == 4096) {
        Some(e) => dword1 |= DW1_ERASE_4K | (e.opcode as u32) << 8,
        None => dword1 |= 0b11 | 0xFF << 8,
    }
    if config.size > 16 * 1024 * 1024 {
        dword1 |= DW1_ADDR_3_OR_4;
    }
    if config.dual {
        dword1 |= DW1_FAST_READ_112 | DW1_FAST_READ_122;
        dw[3] = READ_112 | READ_122 << 16;
    }
    if config.quad {
        dword1 |= DW1_FAST_READ_114 | DW1_FAST_READ_144;
        dw[2] = READ_144 | READ_114 << 16;
    }
    dw[0] = dword1;
    dw[1] = density_dword(config.size);
    dw[4] = 0xFFFF_FFEE;
    dw[7] = erase_dword(config, 0);
    dw[8] = erase_dword(config, 2);
    dw[10] = config.page_size.trailing_zeros() << 4;
    dw[14] = (config.quad_enable as u32 & 0x07) << 20;
    dw
}

fn four_byte_table(config: &NorConfig) -> [u32; FOUR_BYTE_DWORDS] {
    // 0Ch and 12h are always present
    let mut flags = (1 << 1) | (1 << 6);
    if config.dual {
        flags |= (1 << 2) | (1 << 3);
    }
    if config.quad {
        flags |= (1 << 4) | (1 << 5) | (1 << 7);
    }
    let mut opcodes4 = [0xFFu8; 4];
    for (i, e) in config.erase_types.iter().enumerate().take(4) {
        flags |= 1 << (9 + i);
        opcodes4[i] = opcodes::erase_opcode_4b(e.opcode);
    }
    [flags, u32::from_le_bytes(opcodes4)]
}

fn parameter_header(id: u16, dwords: usize, pointer: usize) -> [u8; 8] {
    let ptr = (pointer as u32).to_le_bytes();
    [
        id as u8,
        0x06,
        0x01,
        dwords as u8,
        ptr[0],
        ptr[1],
        ptr[2],
        (id >> 8) as u8,
    ]
}

/// Build the SFDP address space for an emulated part
///
/// JESD216B header, a 16-DWORD Basic Flash Parameter Table and, when
/// configured, the 4-Byte Address Instruction Table.
pub fn build(config: &NorConfig) -> Vec<u8> {
    let tables = if config.four_byte_table { 2 } else { 1 };
    let end = if config.four_byte_table {
        FOUR_BYTE_AT + FOUR_BYTE_DWORDS * 4
    } else {
        FOUR_BYTE_AT
    };
    let mut image = vec![0xFF; end];

    image[..8].copy_from_slice(&[b'S', b'F', b'D', b'P', 0x06, 0x01, tables - 1, 0xFF]);
    image[HEADERS_AT..HEADERS_AT + 8]
        .copy_from_slice(&parameter_header(PARAM_ID_BASIC, BFPT_DWORDS, BFPT_AT));

    for (i, word) in basic_table(config).iter().enumerate() {
        let at = BFPT_AT + i * 4;
        image[at..at + 4].copy_from_slice(&word.to_le_bytes());
    }

    if config.four_byte_table {
        image[HEADERS_AT + 8..HEADERS_AT + 16].copy_from_slice(&parameter_header(
            PARAM_ID_4BYTE_ADDR,
            FOUR_BYTE_DWORDS,
            FOUR_BYTE_AT,
        ));
        for (i, word) in four_byte_table(config).iter().enumerate() {
            let at = FOUR_BYTE_AT + i * 4;
            image[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    image
}
