//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "sflash")]
#[command(author, version, about = "Serial flash protocol engine", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML) describing the host and the emulated parts
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// SPI NOR device discovered through SFDP
    Nor {
        /// Persist the emulated array in this file between runs
        #[arg(long)]
        image: Option<PathBuf>,

        #[command(subcommand)]
        command: NorCommands,
    },

    /// SPI NAND device (Winbond W25N family)
    Nand {
        /// Persist the emulated array in this file between runs
        #[arg(long)]
        image: Option<PathBuf>,

        #[command(subcommand)]
        command: NandCommands,
    },
}

/// NOR subcommands
#[derive(Subcommand)]
pub enum NorCommands {
    /// Run discovery and show the resolved descriptor
    Probe,

    /// Read flash contents to file
    Read {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes to read (defaults to the rest of the device)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write file to flash
    Write {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Don't erase the covered sectors before writing
        #[arg(long)]
        no_erase: bool,

        /// Skip reading the data back
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase a sector-aligned region
    Erase {
        /// Start address (hex, e.g., 0x10000)
        #[arg(long, value_parser = parse_hex_u32)]
        start: u32,

        /// Length of region to erase (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        length: u32,
    },
}

/// NAND subcommands
#[derive(Subcommand)]
pub enum NandCommands {
    /// Identify the device and show its geometry
    Probe,

    /// Read one page
    Read {
        /// Block number
        #[arg(long)]
        block: u32,

        /// Page within the block
        #[arg(long)]
        page: u32,

        /// Write the main area here instead of dumping it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the spare area here
        #[arg(long)]
        spare: Option<PathBuf>,
    },

    /// Program one page
    Write {
        /// Block number
        #[arg(long)]
        block: u32,

        /// Page within the block
        #[arg(long)]
        page: u32,

        /// Main-area data (at most one page)
        #[arg(short, long)]
        input: PathBuf,

        /// Spare-area data
        #[arg(long)]
        spare: Option<PathBuf>,
    },

    /// Erase one block
    Erase {
        /// Block number
        #[arg(long)]
        block: u32,
    },

    /// List blocks carrying a bad-block marker
    Scan,
}
