//! NOR subcommands

use sflash_core::nor::NorFlash;
use sflash_dummy::DummyNor;
use std::error::Error;
use std::fs;
use std::path::Path;

use super::{human_size, progress_bar, CommandError, CHUNK_SIZE};
use crate::cli::NorCommands;
use crate::config::Config;
use crate::image;

/// Attach to the emulated NOR part and run one subcommand
pub fn run(config: &Config, image_path: Option<&Path>, command: NorCommands) -> Result<(), Box<dyn Error>> {
    let mut dummy = DummyNor::new(config.nor.clone())?;
    if let Some(path) = image_path {
        if let Some(data) = image::load_nor(path, dummy.data().len())? {
            dummy.data_mut()[..data.len()].copy_from_slice(&data);
        }
    }

    let mut flash = NorFlash::init(dummy, &config.host)?;

    let modified = match command {
        NorCommands::Probe => {
            probe(&flash);
            false
        }
        NorCommands::Read {
            output,
            address,
            length,
        } => {
            read(&mut flash, &output, address, length)?;
            false
        }
        NorCommands::Write {
            input,
            address,
            no_erase,
            no_verify,
        } => {
            write(&mut flash, &input, address, !no_erase, !no_verify)?;
            true
        }
        NorCommands::Erase { start, length } => {
            flash.erase(start, length)?;
            println!("Erased {} at 0x{:08X}", human_size(length as u64), start);
            true
        }
    };

    let dummy = flash.deinit()?;
    if modified {
        if let Some(path) = image_path {
            image::save_nor(path, dummy.data())?;
        }
    }
    Ok(())
}

fn probe(flash: &NorFlash<DummyNor>) {
    let desc = flash.descriptor();
    println!("SFDP revision:  {}", desc.sfdp_revision);
    println!("Size:           {}", human_size(desc.size as u64));
    println!("Page size:      {} B", desc.page_size);
    println!(
        "Sector erase:   0x{:02X} ({})",
        desc.sector_erase_opcode,
        human_size(desc.sector_size as u64)
    );
    println!(
        "Block erase:    0x{:02X} ({})",
        desc.block_erase_opcode,
        human_size(desc.block_size as u64)
    );
    println!("Address bytes:  {}", desc.address_size.bytes());
    println!(
        "Read:           0x{:02X} (1-{}-{}, {} dummy bytes)",
        desc.read.opcode,
        desc.read.address_width.lines(),
        desc.read.data_width.lines(),
        desc.read.dummy_bytes
    );
    println!(
        "Program:        0x{:02X} (1-{}-{})",
        desc.program.opcode,
        desc.program.address_width.lines(),
        desc.program.data_width.lines()
    );
}

/// Read `len` bytes at `address` in chunks
fn read_range(flash: &mut NorFlash<DummyNor>, address: u32, len: usize) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut data = vec![0u8; len];
    let pb = progress_bar(len as u64, "Reading");

    let mut offset = 0usize;
    while offset < len {
        let chunk_size = std::cmp::min(CHUNK_SIZE, len - offset);
        flash.read(address + offset as u32, &mut data[offset..offset + chunk_size])?;
        offset += chunk_size;
        pb.set_position(offset as u64);
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}

fn read(flash: &mut NorFlash<DummyNor>, output: &Path, address: u32, length: Option<u32>) -> Result<(), Box<dyn Error>> {
    let size = flash.descriptor().size;
    let len = length.unwrap_or(size.saturating_sub(address));
    let data = read_range(flash, address, len as usize)?;
    fs::write(output, &data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}

fn write(
    flash: &mut NorFlash<DummyNor>,
    input: &Path,
    address: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn Error>> {
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let capacity = flash.descriptor().size.saturating_sub(address) as usize;
    if data.len() > capacity {
        return Err(CommandError::TooLarge {
            len: data.len(),
            capacity,
        }
        .into());
    }
    if data.is_empty() {
        return Ok(());
    }

    if erase {
        // Cover the written range with whole sectors
        let sector = flash.descriptor().sector_size;
        let start = address - address % sector;
        let end = address as u64 + data.len() as u64;
        let len = (end - start as u64).div_ceil(sector as u64) * sector as u64;
        log::info!("erasing {} at 0x{:08X}", human_size(len), start);
        flash.erase(start, len as u32)?;
    }

    let pb = progress_bar(data.len() as u64, "Writing");
    for (i, chunk) in data.chunks(CHUNK_SIZE).enumerate() {
        flash.write(address + (i * CHUNK_SIZE) as u32, chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Write complete");

    if verify {
        let back = read_range(flash, address, data.len())?;
        if let Some(pos) = back.iter().zip(&data).position(|(a, b)| a != b) {
            return Err(CommandError::VerifyMismatch {
                address: address + pos as u32,
                expected: data[pos],
                found: back[pos],
            }
            .into());
        }
        println!("Verified {} bytes", data.len());
    }

    println!("Write complete!");
    Ok(())
}
