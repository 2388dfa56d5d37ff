//! SPI NOR engine
//!
//! [`NorFlash`] owns a transport and the [`NorDescriptor`] resolved at
//! attach time. Erase, program and read are expressed as phase descriptors
//! built from that descriptor; every busy wait is bounded by the host's
//! [`PollBudget`].
//!
//! # Example
//!
//! ```ignore
//! use sflash_core::nor::NorFlash;
//! use sflash_core::transport::HostConfig;
//! use sflash_core::spi::IoMode;
//!
//! let mut flash = NorFlash::init(qspi, &HostConfig::new(IoMode::Quad))?;
//! flash.erase(0, 4096)?;
//! flash.write(0, b"hello")?;
//! let mut buf = [0u8; 5];
//! flash.read(0, &mut buf)?;
//! ```

mod descriptor;
pub mod quad;

pub use descriptor::{NorDescriptor, MAX_3BYTE_SIZE};

use crate::error::{Error, Result};
use crate::protocol::spi25;
use crate::sfdp;
use crate::spi::{check_io_mode_supported, LineWidth, PhaseDescriptor};
use crate::transport::{HostConfig, PollBudget, Transport, DISCOVERY_FREQUENCY_HZ};

/// An attached SPI NOR device
pub struct NorFlash<T: Transport> {
    transport: T,
    desc: NorDescriptor,
    poll: PollBudget,
    in_four_byte_mode: bool,
}

impl<T: Transport> NorFlash<T> {
    /// Discover the device through SFDP and prepare it for use
    ///
    /// Runs discovery at 10 MHz, resolves the descriptor for the host's I/O
    /// mode, sets the Quad Enable bit when the host is quad-capable and
    /// enters 4-byte address mode for devices above 16 MiB.
    pub fn init(mut transport: T, host: &HostConfig) -> Result<Self> {
        check_io_mode_supported(host.io_mode, transport.features())?;

        transport.init()?;
        transport.set_frequency(DISCOVERY_FREQUENCY_HZ)?;

        let tables = sfdp::discover(&mut transport)?;
        let desc = NorDescriptor::from_sfdp(&tables, host.io_mode)?;

        if let Some(hz) = host.frequency_hz {
            log::debug!("switching to {} Hz", hz);
            transport.set_frequency(hz)?;
        }

        if host.io_mode.data_width().lines() >= 4 {
            let req = tables.basic_params().quad_enable;
            quad::enable(&mut transport, req, &host.poll)?;
        }

        let mut flash = Self {
            transport,
            desc,
            poll: host.poll,
            in_four_byte_mode: false,
        };

        if desc.is_four_byte() {
            log::debug!("entering 4-byte address mode");
            spi25::enter_4byte_mode(&mut flash.transport)?;
            flash.in_four_byte_mode = true;
        }

        log::info!(
            "NOR flash: {} KiB, SFDP {}",
            desc.size / 1024,
            desc.sfdp_revision
        );

        Ok(flash)
    }

    /// Attach to a device with a known descriptor
    ///
    /// No discovery and no bus traffic: the device must already be in the
    /// address mode and quad state the descriptor assumes.
    pub fn from_descriptor(transport: T, desc: NorDescriptor, poll: PollBudget) -> Self {
        Self {
            transport,
            desc,
            poll,
            in_four_byte_mode: false,
        }
    }

    /// The resolved device descriptor
    pub fn descriptor(&self) -> &NorDescriptor {
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

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if addr as u64 + len as u64 > self.desc.size as u64 {
            return Err(Error::Range);
        }
        Ok(())
    }

    /// Erase `len` bytes starting at `start`
    ///
    /// Both must be multiples of the sector size. A block erase is used
    /// while more than one block remains and the address is block aligned;
    /// sector erases cover the rest.
    pub fn erase(&mut self, start: u32, len: u32) -> Result<()> {
        let sector = self.desc.sector_size;
        let block = self.desc.block_size;
        if sector == 0 || start % sector != 0 || len % sector != 0 {
            return Err(Error::Invalid);
        }
        self.check_range(start, len as usize)?;

        let mut addr = start;
        let mut remaining = len;
        while remaining > 0 {
            spi25::wait_ready(&mut self.transport, &self.poll)?;
            spi25::write_enable(&mut self.transport)?;

            let (opcode, size) =
                if block > sector && remaining > block && addr % block == 0 {
                    (self.desc.block_erase_opcode, block)
                } else {
                    (self.desc.sector_erase_opcode, sector)
                };

            log::trace!("erase 0x{:02X} at 0x{:08X} ({} bytes)", opcode, addr, size);
            let mut cmd = PhaseDescriptor::command(opcode).with_address(
                addr,
                self.desc.address_size,
                LineWidth::Single,
            );
            self.transport.execute(&mut cmd)?;
            spi25::wait_ready(&mut self.transport, &self.poll)?;

            addr += size;
            remaining -= size;
        }

        Ok(())
    }

    /// Program `buf` at `addr`
    ///
    /// Data is split on page boundaries. The target range must already be
    /// erased; nothing is read back or merged.
    pub fn write(&mut self, addr: u32, buf: &[u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;

        let page = self.desc.page_size;
        if page == 0 {
            return Err(Error::Invalid);
        }
        let program = self.desc.program;
        let mut addr = addr;
        let mut data = buf;

        while !data.is_empty() {
            let room = (page - addr % page) as usize;
            let (chunk, rest) = data.split_at(room.min(data.len()));

            spi25::wait_ready(&mut self.transport, &self.poll)?;
            spi25::write_enable(&mut self.transport)?;

            log::trace!("program 0x{:08X} ({} bytes)", addr, chunk.len());
            let mut cmd = PhaseDescriptor::command(program.opcode)
                .with_address(addr, self.desc.address_size, program.address_width)
                .writing(program.data_width, chunk)
                .with_dma(true);
            self.transport.execute(&mut cmd)?;
            spi25::wait_ready(&mut self.transport, &self.poll)?;

            addr += chunk.len() as u32;
            data = rest;
        }

        Ok(())
    }

    /// Read `buf.len()` bytes at `addr` with the resolved fast read
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let read = self.desc.read;
        let mut cmd = PhaseDescriptor::command(read.opcode)
            .with_address(addr, self.desc.address_size, read.address_width)
            .with_dummy_bytes(read.dummy_bytes)
            .reading(read.data_width, buf)
            .with_dma(true);
        self.transport.execute(&mut cmd)?;
        Ok(())
    }

    /// Leave 4-byte mode if it was entered and release the transport
    pub fn deinit(mut self) -> Result<T> {
        if self.in_four_byte_mode {
            log::debug!("leaving 4-byte address mode");
            spi25::exit_4byte_mode(&mut self.transport)?;
        }
        self.transport.deinit()?;
        Ok(self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoFailure;
    use crate::spi::{opcodes, AddressSize, IoMode};
    use crate::transport::mock::MockTransport;
    use crate::transport::TransportFeatures;
    use std::vec::Vec;

    fn nor(desc: NorDescriptor) -> NorFlash<MockTransport> {
        NorFlash::from_descriptor(MockTransport::idle(), desc, PollBudget::new(0, 8))
    }

    fn erase_ops(flash: &NorFlash<MockTransport>) -> Vec<(u8, u32)> {
        flash
            .transport()
            .log
            .iter()
            .filter(|r| r.address.is_some())
            .map(|r| (r.opcode.unwrap_or(0), r.address.unwrap_or(0)))
            .collect()
    }

    #[test]
    fn test_erase_rejects_misalignment() {
        let mut size = 256;
        while size <= 64 * 1024 {
            let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, size, size));
            assert_eq!(flash.erase(1, size), Err(Error::Invalid));
            assert_eq!(flash.erase(size / 2, size), Err(Error::Invalid));
            assert_eq!(flash.erase(0, size + 1), Err(Error::Invalid));
            assert_eq!(flash.erase(size, size - 1), Err(Error::Invalid));
            assert!(flash.transport().log.is_empty());
            size *= 2;
        }
    }

    #[test]
    fn test_erase_range() {
        let mut flash = nor(NorDescriptor::single_io(1 << 20, 256, 4096, 65536));
        assert_eq!(flash.erase(1 << 20, 4096), Err(Error::Range));
        assert_eq!(flash.erase(0, 0), Ok(()));
        assert!(flash.transport().log.is_empty());
    }

    #[test]
    fn test_erase_picks_block_only_past_one_block() {
        let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, 4096, 65536));
        // Exactly one block: remaining never exceeds the block size
        flash.erase(0, 65536).unwrap();
        let ops = erase_ops(&flash);
        assert_eq!(ops.len(), 16);
        assert!(ops.iter().all(|&(op, _)| op == opcodes::SE_20));

        let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, 4096, 65536));
        flash.erase(0, 65536 + 4096).unwrap();
        assert_eq!(
            erase_ops(&flash),
            [(opcodes::BE_D8, 0), (opcodes::SE_20, 65536)]
        );
    }

    #[test]
    fn test_erase_unaligned_start_uses_sectors() {
        let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, 4096, 65536));
        flash.erase(4096, 3 * 65536).unwrap();
        let ops = erase_ops(&flash);
        // 15 sectors up to the first block boundary, two blocks, one sector
        assert_eq!(ops[0], (opcodes::SE_20, 4096));
        assert_eq!(ops[14], (opcodes::SE_20, 61440));
        assert_eq!(ops[15], (opcodes::BE_D8, 65536));
        assert_eq!(ops[16], (opcodes::BE_D8, 131072));
        assert_eq!(ops[17], (opcodes::SE_20, 196608));
        assert_eq!(ops.len(), 18);
    }

    #[test]
    fn test_erase_sequence_per_granule() {
        let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, 4096, 65536));
        flash.erase(0, 4096).unwrap();
        assert_eq!(
            flash.transport().opcodes(),
            [opcodes::RDSR, opcodes::WREN, opcodes::SE_20, opcodes::RDSR]
        );
    }

    #[test]
    fn test_erase_is_repeatable() {
        let mut flash = nor(NorDescriptor::single_io(16 << 20, 256, 4096, 65536));
        flash.erase(0, 8192).unwrap();
        flash.erase(0, 8192).unwrap();
    }

    #[test]
    fn test_write_chunks_cover_range() {
        for (addr, len) in [(0u32, 300usize), (250, 10), (255, 1), (100, 1000), (512, 256)] {
            let mut flash = nor(NorDescriptor::single_io(1 << 20, 256, 4096, 65536));
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            flash.write(addr, &data).unwrap();

            let chunks: Vec<_> = flash.transport().with_opcode(opcodes::PP);
            let mut next = addr;
            let mut joined = Vec::new();
            for c in &chunks {
                let start = c.address.unwrap_or(0);
                assert_eq!(start, next);
                let end = start + c.written.len() as u32;
                // A chunk never crosses a page boundary
                assert_eq!((start / 256), (end - 1) / 256);
                assert!(c.dma);
                joined.extend_from_slice(&c.written);
                next = end;
            }
            assert_eq!(next, addr + len as u32);
            assert_eq!(joined, data);
        }
    }

    #[test]
    fn test_write_range_and_empty() {
        let mut flash = nor(NorDescriptor::single_io(1 << 20, 256, 4096, 65536));
        assert_eq!(flash.write((1 << 20) - 1, &[0, 0]), Err(Error::Range));
        flash.write(0, &[]).unwrap();
        assert!(flash.transport().log.is_empty());
    }

    #[test]
    fn test_read_single_descriptor() {
        let mut flash = nor(NorDescriptor::single_io(32 << 20, 256, 4096, 65536));
        let mut buf = [0u8; 64];
        flash.read(0x0100_0000, &mut buf).unwrap();
        let log = &flash.transport().log;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].opcode, Some(opcodes::FAST_READ));
        assert_eq!(log[0].address_bytes, 4);
        assert_eq!(log[0].dummy_bytes, 1);
        assert_eq!(log[0].read_len, 64);
        assert_eq!(flash.read(32 << 20, &mut buf), Err(Error::Range));
    }

    #[test]
    fn test_busy_device_times_out() {
        let mock = MockTransport::new(|_, buf| buf.fill(opcodes::SR1_WIP));
        let desc = NorDescriptor::single_io(1 << 20, 256, 4096, 65536);
        let mut flash = NorFlash::from_descriptor(mock, desc, PollBudget::new(0, 3));
        assert_eq!(flash.write(0, &[0xAA]), Err(Error::Timeout));
        assert_eq!(flash.transport().log.len(), 3);
    }

    #[test]
    fn test_transport_failure_surfaces_as_io() {
        let mut mock = MockTransport::idle();
        mock.fail_at = Some(2);
        let desc = NorDescriptor::single_io(1 << 20, 256, 4096, 65536);
        let mut flash = NorFlash::from_descriptor(mock, desc, PollBudget::default());
        assert_eq!(flash.erase(0, 4096), Err(Error::Io(IoFailure::Transport)));
    }

    #[test]
    fn test_init_rejects_unsupported_io_mode() {
        let mock = MockTransport::idle().with_features(TransportFeatures::DUAL);
        let result = NorFlash::init(mock, &HostConfig::new(IoMode::Quad));
        assert!(matches!(result, Err(Error::Invalid)));
    }

    #[test]
    fn test_init_bad_signature() {
        let result = NorFlash::init(MockTransport::idle(), &HostConfig::default());
        assert!(matches!(result, Err(Error::Io(IoFailure::BadSignature))));
    }

    #[test]
    fn test_from_descriptor_address_size() {
        let flash = nor(NorDescriptor::single_io(32 << 20, 256, 4096, 65536));
        assert_eq!(flash.descriptor().address_size, AddressSize::FourByte);
    }
}
