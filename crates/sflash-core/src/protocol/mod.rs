//! Protocol implementations
//!
//! This module contains the command sequences shared by the engines:
//! SPI25 for NOR parts and the Winbond-style SPI NAND register set.

pub mod spi25;
pub mod spinand;
