//! SPI NAND engine (Winbond W25N family)
//!
//! The part is identified by its JEDEC ID against a small table. Pages move
//! through the on-die cache: a program loads main and spare data into the
//! cache and then executes it at a row, a read pulls a row into the cache and
//! then streams it out. The status register (SR3) is polled after every array
//! operation and classified for erase, program and ECC failures.
//!
//! Bad blocks follow the vendor convention: a non-0xFF byte at offset 0 of
//! the spare area of page 0. The engine does not remap anything.

mod parts;
pub mod status;

pub use parts::{lookup, NandDescriptor, NandPart, PARTS};
pub use status::EccStatus;

use crate::error::{Error, Result};
use crate::protocol::spinand;
use crate::spi::{check_io_mode_supported, AddressSize, LineWidth, PhaseDescriptor};
use crate::transport::{HostConfig, PollBudget, Transport, DISCOVERY_FREQUENCY_HZ};

use status::{Config, Protection, Status};

/// Value of an unmarked bad-block byte
const GOOD_BLOCK_MARKER: u8 = 0xFF;

/// An attached SPI NAND device
pub struct NandFlash<T: Transport> {
    transport: T,
    desc: NandDescriptor,
    poll: PollBudget,
}

impl<T: Transport> NandFlash<T> {
    /// Identify the device and unlock it
    ///
    /// Reads the JEDEC ID at 10 MHz, resolves the part, clears every block
    /// protection bit and enables on-die ECC in buffer mode.
    pub fn init(mut transport: T, host: &HostConfig) -> Result<Self> {
        check_io_mode_supported(host.io_mode, transport.features())?;

        transport.init()?;
        transport.set_frequency(DISCOVERY_FREQUENCY_HZ)?;

        let (manufacturer, device) = spinand::read_jedec_id(&mut transport)?;
        log::debug!("JEDEC ID: 0x{:02X} 0x{:04X}", manufacturer, device);
        let part = parts::lookup(manufacturer, device)?;
        let desc = NandDescriptor::for_part(part, host.io_mode);

        if let Some(hz) = host.frequency_hz {
            log::debug!("switching to {} Hz", hz);
            transport.set_frequency(hz)?;
        }

        let mut flash = Self {
            transport,
            desc,
            poll: host.poll,
        };
        flash.unlock(host.io_mode.data_width().lines() >= 4)?;

        log::info!(
            "NAND flash: {} ({} blocks x {} pages x {}+{} bytes)",
            desc.name,
            desc.total_blocks,
            desc.pages_per_block,
            desc.bytes_per_page,
            desc.spare_bytes_per_page
        );

        Ok(flash)
    }

    /// Attach to a device with a known descriptor, without bus traffic
    pub fn from_descriptor(transport: T, desc: NandDescriptor, poll: PollBudget) -> Self {
        Self {
            transport,
            desc,
            poll,
        }
    }

    fn unlock(&mut self, quad: bool) -> Result<()> {
        let raw = spinand::read_register(&mut self.transport, spinand::REG_PROTECTION)?;
        let mut sr1 = Protection::from_bits_retain(raw) - Protection::UNLOCK_MASK;
        if quad {
            // SRP0 with WP-E clear releases /WP for IO2
            sr1 |= Protection::SRP0;
        }
        log::debug!("protection register 0x{:02X} -> 0x{:02X}", raw, sr1.bits());
        spinand::write_register(&mut self.transport, spinand::REG_PROTECTION, sr1.bits())?;

        let raw = spinand::read_register(&mut self.transport, spinand::REG_CONFIG)?;
        let sr2 = Config::from_bits_retain(raw) | Config::ECC_E | Config::BUF;
        log::debug!("configuration register 0x{:02X} -> 0x{:02X}", raw, sr2.bits());
        spinand::write_register(&mut self.transport, spinand::REG_CONFIG, sr2.bits())?;
        Ok(())
    }

    /// The resolved device descriptor
    pub fn descriptor(&self) -> &NandDescriptor {
        &self.desc
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn wait(&mut self) -> Result<Status> {
        spinand::wait_ready(&mut self.transport, &self.poll).map(Status::from_bits_retain)
    }

    fn check_lengths(&self, main: usize, spare: usize) -> Result<()> {
        if main > self.desc.bytes_per_page as usize || spare > self.desc.spare_bytes_per_page as usize {
            return Err(Error::Range);
        }
        Ok(())
    }

    /// Erase one block
    pub fn erase(&mut self, block: u32) -> Result<()> {
        let row = self.desc.row(block, 0)?;

        spinand::write_enable(&mut self.transport)?;
        log::trace!("erase block {} (row 0x{:06X})", block, row);
        spinand::row_command(&mut self.transport, spinand::BLOCK_ERASE, row)?;
        let sr3 = self.wait()?;
        status::check_erase(sr3, block)
    }

    fn load(&mut self, column: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let program = self.desc.program;
        let mut cmd = PhaseDescriptor::command(program.opcode)
            .with_address(column, AddressSize::TwoByte, program.address_width)
            .writing(program.data_width, data)
            .with_dma(true);
        self.transport.execute(&mut cmd)?;
        Ok(())
    }

    /// Program one page
    ///
    /// `buf` lands at column 0 and `spare` at column `bytes_per_page`.
    /// Either may be empty; cache bytes that are not loaded keep their
    /// previous contents.
    pub fn write(&mut self, block: u32, page: u32, buf: &[u8], spare: &[u8]) -> Result<()> {
        let row = self.desc.row(block, page)?;
        self.check_lengths(buf.len(), spare.len())?;

        spinand::write_enable(&mut self.transport)?;
        self.load(0, buf)?;
        self.load(self.desc.bytes_per_page, spare)?;

        log::trace!("program row 0x{:06X} ({}+{} bytes)", row, buf.len(), spare.len());
        spinand::row_command(&mut self.transport, spinand::PROGRAM_EXECUTE, row)?;
        let sr3 = self.wait()?;
        status::check_program(sr3, row)
    }

    fn cache_read(&mut self, column: u32, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let read = self.desc.read;
        let mut cmd = PhaseDescriptor::command(read.opcode)
            .with_address(column, AddressSize::TwoByte, read.address_width)
            .with_dummy_bytes(read.dummy_bytes)
            .reading(read.data_width, buf)
            .with_dma(true);
        self.transport.execute(&mut cmd)?;
        Ok(())
    }

    /// Read one page
    ///
    /// Returns [`EccStatus::Corrected`] when the on-die ECC fixed bit errors;
    /// an uncorrectable page fails with `Io`.
    pub fn read(&mut self, block: u32, page: u32, buf: &mut [u8], spare: &mut [u8]) -> Result<EccStatus> {
        let row = self.desc.row(block, page)?;
        self.check_lengths(buf.len(), spare.len())?;

        log::trace!("read row 0x{:06X} ({}+{} bytes)", row, buf.len(), spare.len());
        spinand::row_command(&mut self.transport, spinand::PAGE_DATA_READ, row)?;
        self.wait()?;

        self.cache_read(0, buf)?;
        self.cache_read(self.desc.bytes_per_page, spare)?;

        let sr3 = self.wait()?;
        let ecc = status::check_ecc(sr3, row)?;
        if ecc == EccStatus::Corrected {
            log::debug!("corrected bit errors at row 0x{:06X}", row);
        }
        Ok(ecc)
    }

    /// Check the factory bad-block marker of a block
    pub fn is_bad_block(&mut self, block: u32) -> Result<bool> {
        let mut marker = [0u8; 1];
        self.read(block, 0, &mut [], &mut marker)?;
        Ok(marker[0] != GOOD_BLOCK_MARKER)
    }

    /// Write a bad-block marker into page 0 of a block
    pub fn mark_bad_block(&mut self, block: u32) -> Result<()> {
        log::warn!("marking block {} bad", block);
        self.write(block, 0, &[], &[0x00])
    }

    /// Release the transport
    pub fn deinit(mut self) -> Result<T> {
        self.transport.deinit()?;
        Ok(self.transport)
    }
}
