//! Man page generator for sflash
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    let output_path = output_dir.join("sflash.1");
    fs::write(&output_path, buffer)?;
    println!("Man page generated at: {}", output_path.display());

    println!("\nTo view the man page:");
    println!("  man -l {}", output_path.display());

    Ok(())
}
