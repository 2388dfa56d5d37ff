//! SFDP (Serial Flash Discoverable Parameters) decoding
//!
//! This module implements the subset of JEDEC JESD216 the NOR engine needs
//! to size and drive a device without a chip database.
//!
//! # Overview
//!
//! SFDP data is stored in a reserved area of the flash chip and can be
//! read using the RDSFDP command (0x5A). The structure contains:
//!
//! - An SFDP header with signature and revision info
//! - One or more parameter headers describing available tables
//! - Parameter tables containing capability information
//!
//! [`discover`] captures the Basic Flash Parameter Table and the 4-Byte
//! Address Instruction Table as raw DWORDs. [`BasicFlashParams`] and
//! [`FourByteInstructions`] decode them.

mod parser;
mod types;

pub use parser::*;
pub use types::*;
