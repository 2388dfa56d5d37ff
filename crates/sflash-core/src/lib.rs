//! sflash-core - Serial flash protocol engine
//!
//! This crate turns a description of a SPI-attached flash device into
//! sequences of command, address, dummy and data phases and drives erase,
//! program and read through bounded busy-polling state machines. It is
//! `no_std` and never allocates.
//!
//! - [`transport`] - the [`Transport`](transport::Transport) trait a host
//!   controller implements, plus host configuration
//! - [`sfdp`] - JEDEC SFDP discovery and table decoding
//! - [`nor`] - SPI NOR engine configured from SFDP
//! - [`nand`] - SPI NAND engine for the Winbond W25N family
//!
//! # Features
//!
//! - `std` - `std::error::Error` impls for the error types
//! - `serde` - `Deserialize` for the host configuration types
//!
//! # Example
//!
//! ```ignore
//! use sflash_core::nor::NorFlash;
//! use sflash_core::transport::HostConfig;
//!
//! let mut flash = NorFlash::init(my_transport, &HostConfig::default())?;
//! let mut buf = [0u8; 256];
//! flash.read(0, &mut buf)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod error;
pub mod nand;
pub mod nor;
pub mod protocol;
pub mod sfdp;
pub mod spi;
pub mod transport;

pub use error::{status, Error, IoFailure, Result};
