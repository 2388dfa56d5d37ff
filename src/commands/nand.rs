//! NAND subcommands

use sflash_core::nand::{EccStatus, NandFlash};
use sflash_dummy::DummyNand;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use super::{count_bar, hex_dump, human_size, CommandError};
use crate::cli::NandCommands;
use crate::config::Config;
use crate::image;

/// Attach to the emulated NAND part and run one subcommand
pub fn run(config: &Config, image_path: Option<&Path>, command: NandCommands) -> Result<(), Box<dyn Error>> {
    let mut dummy = DummyNand::new(config.nand.clone())?;
    if let Some(path) = image_path {
        image::load_nand(path, &mut dummy)?;
    }

    let mut flash = NandFlash::init(dummy, &config.host)?;

    let modified = match command {
        NandCommands::Probe => {
            probe(&flash);
            false
        }
        NandCommands::Read {
            block,
            page,
            output,
            spare,
        } => {
            read(&mut flash, block, page, output, spare)?;
            false
        }
        NandCommands::Write {
            block,
            page,
            input,
            spare,
        } => {
            write(&mut flash, block, page, &input, spare.as_deref())?;
            true
        }
        NandCommands::Erase { block } => {
            flash.erase(block)?;
            println!("Erased block {}", block);
            true
        }
        NandCommands::Scan => {
            scan(&mut flash)?;
            false
        }
    };

    let dummy = flash.deinit()?;
    if modified {
        if let Some(path) = image_path {
            image::save_nand(path, &dummy)?;
        }
    }
    Ok(())
}

fn probe(flash: &NandFlash<DummyNand>) {
    let desc = flash.descriptor();
    println!("Part:           {}", desc.name);
    println!("Size:           {}", human_size(desc.size_bytes()));
    println!("Blocks:         {}", desc.total_blocks);
    println!("Pages/block:    {}", desc.pages_per_block);
    println!(
        "Page:           {} + {} spare bytes",
        desc.bytes_per_page, desc.spare_bytes_per_page
    );
    println!(
        "Program load:   0x{:02X} (x{})",
        desc.program.opcode,
        desc.program.data_width.lines()
    );
    println!(
        "Cache read:     0x{:02X} (x{}, {} dummy bytes)",
        desc.read.opcode,
        desc.read.data_width.lines(),
        desc.read.dummy_bytes
    );
}

fn read(
    flash: &mut NandFlash<DummyNand>,
    block: u32,
    page: u32,
    output: Option<PathBuf>,
    spare_output: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let desc = *flash.descriptor();
    let mut main = vec![0u8; desc.bytes_per_page as usize];
    let mut spare = vec![0u8; desc.spare_bytes_per_page as usize];

    let ecc = flash.read(block, page, &mut main, &mut spare)?;
    if ecc == EccStatus::Corrected {
        log::warn!("block {} page {}: ECC corrected bit errors", block, page);
    }

    match output {
        Some(path) => {
            fs::write(&path, &main)?;
            println!("Wrote {} bytes to {:?}", main.len(), path);
        }
        None => {
            println!("Main area:");
            hex_dump(&main, 0);
        }
    }
    match spare_output {
        Some(path) => {
            fs::write(&path, &spare)?;
            println!("Wrote {} spare bytes to {:?}", spare.len(), path);
        }
        None => {
            println!("Spare area:");
            hex_dump(&spare, main.len());
        }
    }
    Ok(())
}

fn write(
    flash: &mut NandFlash<DummyNand>,
    block: u32,
    page: u32,
    input: &Path,
    spare_input: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let desc = *flash.descriptor();
    let main = fs::read(input)?;
    let spare = match spare_input {
        Some(path) => fs::read(path)?,
        None => Vec::new(),
    };

    for (len, capacity) in [
        (main.len(), desc.bytes_per_page as usize),
        (spare.len(), desc.spare_bytes_per_page as usize),
    ] {
        if len > capacity {
            return Err(CommandError::TooLarge { len, capacity }.into());
        }
    }

    flash.write(block, page, &main, &spare)?;
    println!(
        "Programmed block {} page {} ({} + {} bytes)",
        block,
        page,
        main.len(),
        spare.len()
    );
    Ok(())
}

fn scan(flash: &mut NandFlash<DummyNand>) -> Result<(), Box<dyn Error>> {
    let total = flash.descriptor().total_blocks;
    let pb = count_bar(total as u64, "Scanning");

    let mut bad = Vec::new();
    for block in 0..total {
        if flash.is_bad_block(block)? {
            bad.push(block);
        }
        pb.inc(1);
    }
    pb.finish_with_message("Scan complete");

    if bad.is_empty() {
        println!("No bad blocks");
    } else {
        println!("{} bad block(s): {:?}", bad.len(), bad);
    }
    Ok(())
}
