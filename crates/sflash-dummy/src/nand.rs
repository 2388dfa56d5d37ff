//! In-memory W25N-style SPI NAND emulator
//!
//! Pages are stored sparsely; anything never programmed reads as erased.
//! The device powers up write protected (all block-protect bits set), so
//! the engine has to unlock it before any program or erase succeeds.

use std::collections::BTreeMap;

use sflash_core::nand::status::{Config, Protection, Status};
use sflash_core::protocol::spinand;
use sflash_core::spi::{LineWidth, PhaseDescriptor};
use sflash_core::transport::{Transport, TransportError, TransportFeatures};

use crate::config::{ConfigError, NandConfig};
use crate::{Trace, TraceEntry};

const WRDI: u8 = 0x04;

/// Power-on protection register: TB and BP0-BP3 set
const POWER_ON_PROTECTION: u8 = 0x7C;
/// Power-on configuration register: ECC-E and BUF set
const POWER_ON_CONFIG: u8 = 0x18;

/// Emulated SPI NAND device
pub struct DummyNand {
    config: NandConfig,
    pages: BTreeMap<u32, Vec<u8>>,
    cache: Vec<u8>,
    protection: Protection,
    configuration: Config,
    status: Status,
    busy: u32,
    ecc_faults: BTreeMap<u32, u8>,
    frequency_hz: u32,
    trace: Trace,
}

impl DummyNand {
    /// Create an erased, write-protected device
    pub fn new(config: NandConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cache: vec![0xFF; config.raw_page_size()],
            config,
            pages: BTreeMap::new(),
            protection: Protection::from_bits_retain(POWER_ON_PROTECTION),
            configuration: Config::from_bits_retain(POWER_ON_CONFIG),
            status: Status::empty(),
            busy: 0,
            ecc_faults: BTreeMap::new(),
            frequency_hz: 0,
            trace: Trace::default(),
        })
    }

    /// The emulated part
    pub fn config(&self) -> &NandConfig {
        &self.config
    }

    /// Page contents (main followed by spare), if ever programmed
    pub fn page(&self, row: u32) -> Option<&[u8]> {
        self.pages.get(&row).map(Vec::as_slice)
    }

    /// Programmed pages in row order
    pub fn pages(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.pages.iter().map(|(&row, data)| (row, data.as_slice()))
    }

    /// Replace the raw contents of a page
    ///
    /// `data` is main followed by spare; missing bytes read as erased.
    pub fn load_page(&mut self, row: u32, data: &[u8]) {
        let mut page = vec![0xFF; self.config.raw_page_size()];
        let len = data.len().min(page.len());
        page[..len].copy_from_slice(&data[..len]);
        self.pages.insert(row, page);
    }

    /// Put a factory bad-block marker on a block
    pub fn mark_factory_bad(&mut self, block: u32) {
        let row = block * self.config.pages_per_block;
        let mut page = vec![0xFF; self.config.raw_page_size()];
        page[self.config.page_size as usize] = 0x00;
        self.pages.insert(row, page);
    }

    /// Make page data reads of `row` report an ECC field value
    pub fn inject_ecc(&mut self, row: u32, field: u8) {
        self.ecc_faults.insert(row, field & 0x03);
    }

    /// Current protection register
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Current configuration register
    pub fn configuration(&self) -> Config {
        self.configuration
    }

    /// Last clock frequency requested by the host
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Every descriptor executed so far
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Forget the recorded trace
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    fn is_protected(&self) -> bool {
        self.protection
            .intersects(Protection::BP0 | Protection::BP1 | Protection::BP2 | Protection::BP3)
    }

    fn total_rows(&self) -> u32 {
        self.config.blocks * self.config.pages_per_block
    }

    fn row(&self, phase: &PhaseDescriptor<'_>) -> Result<u32, TransportError> {
        match phase.address {
            Some(a) if a.size.bytes() == 3 && a.value < self.total_rows() => Ok(a.value),
            other => {
                log::warn!("bad row address {:?}", other);
                Err(TransportError::Bus)
            }
        }
    }

    fn column(&self, phase: &PhaseDescriptor<'_>, width: LineWidth) -> Result<usize, TransportError> {
        match phase.address {
            Some(a) if a.size.bytes() == 2 && a.width == width => Ok(a.value as usize),
            other => {
                log::warn!("bad column address {:?}", other);
                Err(TransportError::Bus)
            }
        }
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, TransportError> {
        match reg {
            spinand::REG_PROTECTION => Ok(self.protection.bits()),
            spinand::REG_CONFIG => Ok(self.configuration.bits()),
            spinand::REG_STATUS => {
                let mut sr3 = self.status;
                if self.busy > 0 {
                    self.busy -= 1;
                    sr3 |= Status::BUSY;
                }
                Ok(sr3.bits())
            }
            _ => Err(TransportError::Bus),
        }
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), TransportError> {
        match reg {
            spinand::REG_PROTECTION => self.protection = Protection::from_bits_retain(value),
            spinand::REG_CONFIG => self.configuration = Config::from_bits_retain(value),
            _ => {
                log::warn!("write to read-only register 0x{:02X}", reg);
                return Err(TransportError::Bus);
            }
        }
        Ok(())
    }

    fn register_select(phase: &PhaseDescriptor<'_>) -> Result<u8, TransportError> {
        match phase.address {
            Some(a) if a.size.bytes() == 1 => Ok(a.value as u8),
            _ => Err(TransportError::Bus),
        }
    }

    /// Clear WEL and report busy for the configured number of polls
    fn finish_array_op(&mut self) {
        self.status.remove(Status::WEL);
        self.busy = self.config.busy_polls;
    }

    fn erase(&mut self, phase: &PhaseDescriptor<'_>) -> Result<(), TransportError> {
        let row = self.row(phase)?;
        let ppb = self.config.pages_per_block;
        let first = row - row % ppb;

        self.status.remove(Status::E_FAIL);
        if !self.status.contains(Status::WEL) || self.is_protected() {
            log::warn!("block erase at row 0x{:06X} refused", row);
            self.status.insert(Status::E_FAIL);
        } else {
            self.pages.retain(|&r, _| r < first || r >= first + ppb);
        }
        self.finish_array_op();
        Ok(())
    }

    fn load(&mut self, phase: &PhaseDescriptor<'_>, opcode: u8) -> Result<(), TransportError> {
        let width = match opcode {
            spinand::PROGRAM_LOAD_X4 | spinand::RANDOM_PROGRAM_LOAD_X4 => LineWidth::Quad,
            _ => LineWidth::Single,
        };
        let column = self.column(phase, LineWidth::Single)?;
        if phase.data_width() != width {
            return Err(TransportError::Bus);
        }
        if matches!(opcode, spinand::PROGRAM_LOAD | spinand::PROGRAM_LOAD_X4) {
            self.cache.fill(0xFF);
        }
        let data = phase.write_data();
        if column + data.len() > self.cache.len() {
            log::warn!("load of {} bytes at column {} overruns the page", data.len(), column);
            return Err(TransportError::Bus);
        }
        self.cache[column..column + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn program_execute(&mut self, phase: &PhaseDescriptor<'_>) -> Result<(), TransportError> {
        let row = self.row(phase)?;

        self.status.remove(Status::P_FAIL);
        if !self.status.contains(Status::WEL) || self.is_protected() {
            log::warn!("program execute at row 0x{:06X} refused", row);
            self.status.insert(Status::P_FAIL);
        } else {
            let size = self.cache.len();
            let page = self.pages.entry(row).or_insert_with(|| vec![0xFF; size]);
            for (cell, &byte) in page.iter_mut().zip(self.cache.iter()) {
                *cell &= byte;
            }
        }
        self.finish_array_op();
        Ok(())
    }

    fn page_data_read(&mut self, phase: &PhaseDescriptor<'_>) -> Result<(), TransportError> {
        let row = self.row(phase)?;
        match self.pages.get(&row) {
            Some(page) => self.cache.copy_from_slice(page),
            None => self.cache.fill(0xFF),
        }

        let ecc = if self.configuration.contains(Config::ECC_E) {
            self.ecc_faults.get(&row).copied().unwrap_or(0)
        } else {
            0
        };
        self.status.remove(Status::ECC0 | Status::ECC1);
        self.status |= Status::from_bits_retain(ecc << 4);
        self.busy = self.config.busy_polls;
        Ok(())
    }

    fn cache_read(&self, phase: &mut PhaseDescriptor<'_>, opcode: u8) -> Result<(), TransportError> {
        let (width, dummy) = if opcode == spinand::FAST_READ_QUAD_IO {
            (LineWidth::Quad, 2)
        } else {
            (LineWidth::Single, 1)
        };
        let column = self.column(phase, width)?;
        if phase.dummy_bytes != dummy || phase.data_width() != width {
            log::warn!("0x{:02X}: unexpected dummy or data layout", opcode);
            return Err(TransportError::Bus);
        }
        if let Some(buf) = phase.read_buf() {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.cache.get(column + i).copied().unwrap_or(0xFF);
            }
        }
        Ok(())
    }
}

impl Transport for DummyNand {
    fn features(&self) -> TransportFeatures {
        TransportFeatures::DUAL | TransportFeatures::QUAD | TransportFeatures::DMA
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), TransportError> {
        self.frequency_hz = hz;
        Ok(())
    }

    fn execute(&mut self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError> {
        phase.validate().map_err(|_| TransportError::Unsupported)?;
        let opcode = phase.opcode().ok_or(TransportError::Unsupported)?;
        self.trace.push(TraceEntry::capture(opcode, phase));

        if self.busy > 0 && opcode != spinand::RDSR {
            log::warn!("0x{:02X} issued while busy", opcode);
            return Err(TransportError::Bus);
        }

        match opcode {
            spinand::RDID => {
                if phase.dummy_bytes != 1 {
                    return Err(TransportError::Bus);
                }
                let [hi, lo] = self.config.device_id.to_be_bytes();
                let id = [self.config.manufacturer_id, hi, lo];
                if let Some(buf) = phase.read_buf() {
                    for (b, &v) in buf.iter_mut().zip(id.iter().cycle()) {
                        *b = v;
                    }
                }
            }
            spinand::RDSR => {
                let value = self.read_register(Self::register_select(phase)?)?;
                if let Some(buf) = phase.read_buf() {
                    buf.fill(value);
                }
            }
            spinand::WRSR => {
                let reg = Self::register_select(phase)?;
                let value = *phase.write_data().first().ok_or(TransportError::Bus)?;
                self.write_register(reg, value)?;
            }
            spinand::WREN => self.status.insert(Status::WEL),
            WRDI => self.status.remove(Status::WEL),
            spinand::BLOCK_ERASE => self.erase(phase)?,
            spinand::PROGRAM_LOAD
            | spinand::PROGRAM_LOAD_X4
            | spinand::RANDOM_PROGRAM_LOAD
            | spinand::RANDOM_PROGRAM_LOAD_X4 => self.load(phase, opcode)?,
            spinand::PROGRAM_EXECUTE => self.program_execute(phase)?,
            spinand::PAGE_DATA_READ => self.page_data_read(phase)?,
            spinand::FAST_READ | spinand::FAST_READ_QUAD_IO => self.cache_read(phase, opcode)?,
            op => {
                log::warn!("unsupported opcode 0x{:02X}", op);
                return Err(TransportError::Unsupported);
            }
        }
        Ok(())
    }
}
