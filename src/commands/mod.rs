//! CLI command implementations
//!
//! Each device family attaches its engine to the matching emulator, runs one
//! subcommand and, when `--image` is given, stores the array afterwards.

pub mod nand;
pub mod nor;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

/// Default chunk size for reading and writing (4 KiB)
pub const CHUNK_SIZE: usize = 4096;

/// Failures detected by the commands themselves
#[derive(Debug, Error)]
pub enum CommandError {
    /// Input does not fit the target
    #[error("input of {len} bytes exceeds the available {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },
    /// Read-back differs from what was written
    #[error("verify failed at 0x{address:08X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    VerifyMismatch { address: u32, expected: u8, found: u8 },
}

/// Byte progress bar in the house style
pub fn progress_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Count progress bar (blocks, pages)
pub fn count_bar(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Format a byte count with a binary unit
pub fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Hex dump with 16 bytes per line
pub fn hex_dump(data: &[u8], base: usize) {
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:08x}  {}", base + i * 16, hex.join(" "));
    }
}
