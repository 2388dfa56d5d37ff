//! In-memory SPI NOR emulator
//!
//! Serves a synthesized SFDP image and checks every phase layout against
//! what a real part would accept: address length for the current address
//! mode, dummy bytes, line widths and the Quad Enable bit for quad data.

use sflash_core::spi::{opcodes, LineWidth, PhaseDescriptor};
use sflash_core::transport::{Transport, TransportError, TransportFeatures};

use crate::config::{ConfigError, NorConfig};
use crate::{sfdp_image, Trace, TraceEntry};

/// Phase layout an opcode requires
#[derive(Debug, Clone, Copy)]
struct Shape {
    /// Always takes a 4-byte address
    native_4b: bool,
    address: LineWidth,
    data: LineWidth,
    /// Mode plus dummy clocks
    wait_clocks: u8,
}

const fn shape(native_4b: bool, address: LineWidth, data: LineWidth, wait_clocks: u8) -> Shape {
    Shape {
        native_4b,
        address,
        data,
        wait_clocks,
    }
}

fn read_shape(opcode: u8) -> Option<Shape> {
    use LineWidth::{Dual, Quad, Single};
    Some(match opcode {
        opcodes::FAST_READ => shape(false, Single, Single, 8),
        opcodes::FAST_READ_4B => shape(true, Single, Single, 8),
        opcodes::DOR => shape(false, Single, Dual, 8),
        opcodes::DOR_4B => shape(true, Single, Dual, 8),
        opcodes::DIOR => shape(false, Dual, Dual, 4),
        opcodes::DIOR_4B => shape(true, Dual, Dual, 4),
        opcodes::QOR => shape(false, Single, Quad, 8),
        opcodes::QOR_4B => shape(true, Single, Quad, 8),
        opcodes::QIOR => shape(false, Quad, Quad, 6),
        opcodes::QIOR_4B => shape(true, Quad, Quad, 6),
        _ => return None,
    })
}

fn program_shape(opcode: u8) -> Option<Shape> {
    use LineWidth::{Dual, Quad, Single};
    Some(match opcode {
        opcodes::PP => shape(false, Single, Single, 0),
        opcodes::PP_4B => shape(true, Single, Single, 0),
        opcodes::QPP => shape(false, Single, Quad, 0),
        opcodes::QPP_4B => shape(true, Single, Quad, 0),
        opcodes::QPP_144_4B => shape(true, Quad, Quad, 0),
        _ => return None,
    })
}

/// Emulated SPI NOR device
pub struct DummyNor {
    config: NorConfig,
    data: Vec<u8>,
    sfdp: Vec<u8>,
    sr1: u8,
    sr2: u8,
    sr3: u8,
    busy: u32,
    four_byte_mode: bool,
    frequency_hz: u32,
    trace: Trace,
}

impl DummyNor {
    /// Create an erased device
    pub fn new(config: NorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sfdp = sfdp_image::build(&config);
        Ok(Self {
            data: vec![0xFF; config.size as usize],
            config,
            sfdp,
            sr1: 0,
            sr2: 0,
            sr3: 0,
            busy: 0,
            four_byte_mode: false,
            frequency_hz: 0,
            trace: Trace::default(),
        })
    }

    /// Create a device whose array starts with `initial`
    pub fn with_data(config: NorConfig, initial: &[u8]) -> Result<Self, ConfigError> {
        let mut flash = Self::new(config)?;
        let len = initial.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial[..len]);
        Ok(flash)
    }

    /// The array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable array contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The emulated part
    pub fn config(&self) -> &NorConfig {
        &self.config
    }

    /// Status registers 1 to 3
    pub fn status_registers(&self) -> [u8; 3] {
        [self.sr1, self.sr2, self.sr3]
    }

    /// Preload the status registers
    pub fn set_status_registers(&mut self, sr1: u8, sr2: u8, sr3: u8) {
        self.sr1 = sr1 & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
        self.sr2 = sr2;
        self.sr3 = sr3;
    }

    /// Whether EN4B is in effect
    pub fn in_four_byte_mode(&self) -> bool {
        self.four_byte_mode
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

    fn quad_enabled(&self) -> bool {
        match self.config.quad_enable {
            1 | 4 | 5 | 6 => self.sr2 & opcodes::SR2_QE_BIT1 != 0,
            2 => self.sr1 & opcodes::SR1_QE_BIT6 != 0,
            3 => self.sr2 & opcodes::SR2_QE_BIT7 != 0,
            _ => true,
        }
    }

    fn write_enabled(&self) -> bool {
        self.sr1 & opcodes::SR1_WEL != 0
    }

    /// Clear WEL and report busy for the configured number of polls
    fn finish_write(&mut self) {
        self.sr1 &= !opcodes::SR1_WEL;
        self.busy = self.config.busy_polls;
    }

    fn status1(&mut self) -> u8 {
        if self.busy > 0 {
            self.busy -= 1;
            self.sr1 | opcodes::SR1_WIP
        } else {
            self.sr1
        }
    }

    /// Check the address phase and return the address
    fn address(&self, phase: &PhaseDescriptor<'_>, native_4b: bool, width: LineWidth) -> Result<u32, TransportError> {
        let expected = if native_4b || self.four_byte_mode { 4 } else { 3 };
        match phase.address {
            Some(a) if a.size.bytes() == expected && a.width == width => Ok(a.value),
            other => {
                log::warn!(
                    "0x{:02X}: expected {}-byte address on {:?}, got {:?}",
                    phase.opcode().unwrap_or(0),
                    expected,
                    width,
                    other
                );
                Err(TransportError::Bus)
            }
        }
    }

    fn check_quad(&self, opcode: u8, width: LineWidth) -> Result<(), TransportError> {
        if width.lines() >= 4 && !self.quad_enabled() {
            log::warn!("0x{:02X}: quad transfer with QE clear", opcode);
            return Err(TransportError::Bus);
        }
        Ok(())
    }

    fn require_wel(&self, opcode: u8) -> Result<(), TransportError> {
        if !self.write_enabled() {
            log::warn!("0x{:02X} without write enable", opcode);
            return Err(TransportError::Bus);
        }
        Ok(())
    }

    fn read(&mut self, phase: &mut PhaseDescriptor<'_>, opcode: u8, shape: Shape) -> Result<(), TransportError> {
        let addr = self.address(phase, shape.native_4b, shape.address)? as usize;
        let dummy = shape.address.clocks_to_bytes(shape.wait_clocks);
        if phase.dummy_bytes != dummy || phase.data_width() != shape.data {
            log::warn!(
                "0x{:02X}: {} dummy bytes on {:?}, expected {} on {:?}",
                opcode,
                phase.dummy_bytes,
                phase.data_width(),
                dummy,
                shape.data
            );
            return Err(TransportError::Bus);
        }
        self.check_quad(opcode, shape.data)?;

        let size = self.data.len();
        if let Some(buf) = phase.read_buf() {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.data[(addr + i) % size];
            }
        }
        Ok(())
    }

    fn program(&mut self, phase: &PhaseDescriptor<'_>, opcode: u8, shape: Shape) -> Result<(), TransportError> {
        let addr = self.address(phase, shape.native_4b, shape.address)? as usize;
        if phase.data_width() != shape.data {
            return Err(TransportError::Bus);
        }
        self.check_quad(opcode, shape.data)?;
        self.require_wel(opcode)?;

        // Programming wraps inside the page and can only clear bits
        let page = self.config.page_size as usize;
        let base = (addr % self.data.len()) & !(page - 1);
        for (i, &byte) in phase.write_data().iter().enumerate() {
            self.data[base + (addr + i) % page] &= byte;
        }
        self.finish_write();
        Ok(())
    }

    fn erase_size(&self, opcode: u8) -> Option<(u32, bool)> {
        self.config.erase_types.iter().find_map(|e| {
            if e.opcode == opcode {
                Some((e.size, false))
            } else if opcodes::erase_opcode_4b(e.opcode) == opcode {
                Some((e.size, true))
            } else {
                None
            }
        })
    }

    fn erase(&mut self, phase: &PhaseDescriptor<'_>, opcode: u8, size: u32, native_4b: bool) -> Result<(), TransportError> {
        let addr = self.address(phase, native_4b, LineWidth::Single)?;
        self.require_wel(opcode)?;

        let start = (addr & !(size - 1)) as usize % self.data.len();
        self.data[start..start + size as usize].fill(0xFF);
        self.finish_write();
        Ok(())
    }

    fn write_status(&mut self, opcode: u8, data: &[u8]) -> Result<(), TransportError> {
        self.require_wel(opcode)?;
        let keep = opcodes::SR1_WIP | opcodes::SR1_WEL;
        match (opcode, data) {
            (opcodes::WRSR, [sr1]) => self.sr1 = sr1 & !keep,
            (opcodes::WRSR, [sr1, sr2]) => {
                self.sr1 = sr1 & !keep;
                self.sr2 = *sr2;
            }
            (opcodes::WRSR2, [sr2]) => self.sr2 = *sr2,
            (opcodes::WRSR3, [sr3]) => self.sr3 = *sr3,
            _ => {
                log::warn!("0x{:02X}: {} status bytes", opcode, data.len());
                return Err(TransportError::Bus);
            }
        }
        self.finish_write();
        Ok(())
    }

    fn read_sfdp(&self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError> {
        let addr = match phase.address {
            Some(a) if a.size.bytes() == 3 && phase.dummy_bytes == 1 => a.value as usize,
            _ => return Err(TransportError::Bus),
        };
        if let Some(buf) = phase.read_buf() {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = self.sfdp.get(addr + i).copied().unwrap_or(0xFF);
            }
        }
        Ok(())
    }
}

fn reply(phase: &mut PhaseDescriptor<'_>, value: u8) {
    if let Some(buf) = phase.read_buf() {
        buf.fill(value);
    }
}

impl Transport for DummyNor {
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

        if self.busy > 0 && opcode != opcodes::RDSR {
            log::warn!("0x{:02X} issued while busy", opcode);
            return Err(TransportError::Bus);
        }

        match opcode {
            opcodes::RDSR => {
                let sr1 = self.status1();
                reply(phase, sr1);
            }
            opcodes::RDSR2 => reply(phase, self.sr2),
            opcodes::RDSR3 => reply(phase, self.sr3),
            opcodes::WREN => self.sr1 |= opcodes::SR1_WEL,
            opcodes::WRDI => self.sr1 &= !opcodes::SR1_WEL,
            opcodes::WRSR | opcodes::WRSR2 | opcodes::WRSR3 => {
                self.write_status(opcode, phase.write_data())?
            }
            opcodes::EN4B => self.four_byte_mode = true,
            opcodes::EX4B => self.four_byte_mode = false,
            opcodes::RDSFDP => self.read_sfdp(phase)?,
            op => {
                if let Some(shape) = read_shape(op) {
                    self.read(phase, op, shape)?;
                } else if let Some(shape) = program_shape(op) {
                    self.program(phase, op, shape)?;
                } else if let Some((size, native_4b)) = self.erase_size(op) {
                    self.erase(phase, op, size, native_4b)?;
                } else {
                    log::warn!("unsupported opcode 0x{:02X}", op);
                    return Err(TransportError::Unsupported);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EraseType;
    use sflash_core::nor::NorFlash;
    use sflash_core::spi::{AddressSize, IoMode};
    use sflash_core::transport::HostConfig;
    use sflash_core::{Error, IoFailure};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_single_io_end_to_end() {
        let dummy = DummyNor::new(NorConfig::default()).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::default()).unwrap();
        assert_eq!(flash.descriptor().size, 16 * 1024 * 1024);
        assert_eq!(flash.descriptor().sector_size, 4096);
        assert_eq!(flash.descriptor().page_size, 256);

        flash.transport_mut().clear_trace();
        flash.erase(0, 4096).unwrap();
        let data = pattern(300);
        flash.write(0, &data).unwrap();

        let chunks: Vec<(u32, usize)> = flash
            .transport()
            .trace()
            .with_opcode(opcodes::PP)
            .map(|e| (e.address.unwrap_or(0), e.len))
            .collect();
        assert_eq!(chunks, [(0, 256), (256, 44)]);

        let mut buf = vec![0u8; 300];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, data);

        // Rest of the sector is still erased
        let mut tail = [0u8; 16];
        flash.read(300, &mut tail).unwrap();
        assert!(tail.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_quad_end_to_end() {
        let dummy = DummyNor::new(NorConfig::default()).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::new(IoMode::Quad)).unwrap();
        assert_eq!(flash.descriptor().read.opcode, opcodes::QIOR);
        assert_eq!(flash.transport().status_registers()[1] & opcodes::SR2_QE_BIT1, 0x02);

        let data = pattern(1000);
        flash.erase(0x10000, 0x1000).unwrap();
        flash.write(0x10010, &data).unwrap();
        let mut buf = vec![0u8; 1000];
        flash.read(0x10010, &mut buf).unwrap();
        assert_eq!(buf, data);
        assert!(flash.transport().trace().with_opcode(opcodes::QPP).count() > 0);
    }

    #[test]
    fn test_quad_enable_in_sr1() {
        let config = NorConfig {
            quad_enable: 2,
            ..Default::default()
        };
        let mut dummy = DummyNor::new(config).unwrap();
        dummy.set_status_registers(0x3C, 0, 0);
        let flash = NorFlash::init(dummy, &HostConfig::new(IoMode::Quad)).unwrap();
        // Block protection cleared along with setting QE
        assert_eq!(flash.transport().status_registers()[0], 0x40);
    }

    #[test]
    fn test_quad_enable_already_set_is_not_rewritten() {
        let mut dummy = DummyNor::new(NorConfig::default()).unwrap();
        dummy.set_status_registers(0, 0x02, 0);
        let flash = NorFlash::init(dummy, &HostConfig::new(IoMode::Quad)).unwrap();
        assert_eq!(flash.transport().trace().with_opcode(opcodes::WRSR).count(), 0);
    }

    #[test]
    fn test_four_byte_part_with_table() {
        let config = NorConfig {
            size: 32 * 1024 * 1024,
            four_byte_table: true,
            ..Default::default()
        };
        let dummy = DummyNor::new(config).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::new(IoMode::Quad)).unwrap();
        assert_eq!(flash.descriptor().address_size, AddressSize::FourByte);
        assert_eq!(flash.descriptor().sector_erase_opcode, opcodes::SE_21);
        assert_eq!(flash.descriptor().read.opcode, opcodes::QIOR_4B);
        assert_eq!(flash.descriptor().program.opcode, opcodes::QPP_4B);
        assert!(flash.transport().in_four_byte_mode());

        let addr = 0x0180_0000;
        let data = pattern(512);
        flash.erase(addr, 0x2_0000).unwrap();
        flash.write(addr, &data).unwrap();
        let mut buf = vec![0u8; 512];
        flash.read(addr, &mut buf).unwrap();
        assert_eq!(buf, data);

        let erases: Vec<u8> = flash
            .transport()
            .trace()
            .iter()
            .filter(|e| e.address.is_some() && e.direction.is_none())
            .map(|e| e.opcode)
            .collect();
        // 128 KiB: one block erase plus sixteen sectors for the last 64 KiB
        assert_eq!(erases.iter().filter(|&&op| op == opcodes::BE_DC).count(), 1);
        assert_eq!(erases.iter().filter(|&&op| op == opcodes::SE_21).count(), 16);

        let dummy = flash.deinit().unwrap();
        assert!(!dummy.in_four_byte_mode());
    }

    #[test]
    fn test_four_byte_part_without_table() {
        let config = NorConfig {
            size: 64 * 1024 * 1024,
            dual: false,
            quad: false,
            ..Default::default()
        };
        let dummy = DummyNor::new(config).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::default()).unwrap();
        assert_eq!(flash.descriptor().read.opcode, opcodes::FAST_READ);
        assert_eq!(flash.descriptor().program.opcode, opcodes::PP);

        let data = pattern(64);
        flash.erase(0x0300_0000, 4096).unwrap();
        flash.write(0x0300_0000, &data).unwrap();
        let mut buf = vec![0u8; 64];
        flash.read(0x0300_0000, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_busy_polls() {
        let config = NorConfig {
            busy_polls: 3,
            ..Default::default()
        };
        let dummy = DummyNor::new(config).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::default()).unwrap();
        flash.transport_mut().clear_trace();
        flash.erase(0, 4096).unwrap();
        // Idle poll, WREN, erase, three busy polls and the idle one
        assert_eq!(flash.transport().trace().with_opcode(opcodes::RDSR).count(), 5);
    }

    #[test]
    fn test_engine_times_out_on_slow_part() {
        let config = NorConfig {
            busy_polls: 100,
            ..Default::default()
        };
        let dummy = DummyNor::new(config).unwrap();
        let host = HostConfig::default().with_poll(sflash_core::transport::PollBudget::new(0, 10));
        let mut flash = NorFlash::init(dummy, &host).unwrap();
        assert_eq!(flash.erase(0, 4096), Err(Error::Timeout));
    }

    #[test]
    fn test_device_rejects_bad_phases() {
        let mut dummy = DummyNor::new(NorConfig::default()).unwrap();

        // Quad read with QE clear
        let mut buf = [0u8; 4];
        let mut cmd = PhaseDescriptor::command(opcodes::QOR)
            .with_address(0, AddressSize::ThreeByte, LineWidth::Single)
            .with_dummy_bytes(1)
            .reading(LineWidth::Quad, &mut buf);
        assert_eq!(dummy.execute(&mut cmd), Err(TransportError::Bus));

        // Program without write enable
        let mut cmd = PhaseDescriptor::command(opcodes::PP)
            .with_address(0, AddressSize::ThreeByte, LineWidth::Single)
            .writing(LineWidth::Single, &[0]);
        assert_eq!(dummy.execute(&mut cmd), Err(TransportError::Bus));

        // 4-byte address outside 4-byte mode
        let mut cmd = PhaseDescriptor::command(opcodes::FAST_READ)
            .with_address(0, AddressSize::FourByte, LineWidth::Single)
            .with_dummy_bytes(1)
            .reading(LineWidth::Single, &mut buf);
        assert_eq!(dummy.execute(&mut cmd), Err(TransportError::Bus));
    }

    #[test]
    fn test_missing_block_erase_falls_back_to_sectors() {
        let config = NorConfig {
            erase_types: vec![EraseType::new(0x20, 4096)],
            ..Default::default()
        };
        let dummy = DummyNor::new(config).unwrap();
        let mut flash = NorFlash::init(dummy, &HostConfig::default()).unwrap();
        assert_eq!(flash.descriptor().block_size, 4096);
        flash.transport_mut().clear_trace();
        flash.erase(0, 0x4000).unwrap();
        assert_eq!(flash.transport().trace().with_opcode(opcodes::SE_20).count(), 4);
    }

    #[test]
    fn test_bad_sfdp_surfaces_as_io() {
        let mut dummy = DummyNor::new(NorConfig::default()).unwrap();
        dummy.sfdp[0] = b'X';
        let err = NorFlash::init(dummy, &HostConfig::default()).err();
        assert_eq!(err, Some(Error::Io(IoFailure::BadSignature)));
    }
}
