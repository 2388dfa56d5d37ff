//! SPI types and phase structures
//!
//! This module provides the phase descriptor handed to a transport,
//! line widths, address sizes and the standard JEDEC NOR opcodes.

mod address;
mod command;
mod io_mode;
pub mod opcodes;
mod phase;

pub use address::AddressSize;
pub use command::{ProgramCommand, ReadCommand};
pub use io_mode::{check_io_mode_supported, IoMode, LineWidth};
pub use opcodes::*;
pub use phase::{AddressPhase, CommandPhase, DataPhase, Direction, PhaseDescriptor};
