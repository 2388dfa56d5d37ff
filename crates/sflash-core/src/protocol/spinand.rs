//! SPI NAND command sequences (W25N family)
//!
//! Register access on these parts goes through "get feature" (0x05) and
//! "set feature" (0x01) with a one-byte register select address.

use crate::error::{Error, Result};
use crate::spi::{AddressSize, LineWidth, PhaseDescriptor};
use crate::transport::{PollBudget, Transport};

/// Read JEDEC ID (one dummy byte, then manufacturer and 16-bit device)
pub const RDID: u8 = 0x9F;
/// Read status register (get feature)
pub const RDSR: u8 = 0x05;
/// Write status register (set feature)
pub const WRSR: u8 = 0x01;
/// Write enable
pub const WREN: u8 = 0x06;
/// 128 KiB block erase
pub const BLOCK_ERASE: u8 = 0xD8;
/// Load program data, single line (clears the unused buffer bytes)
pub const PROGRAM_LOAD: u8 = 0x02;
/// Load program data, quad output
pub const PROGRAM_LOAD_X4: u8 = 0x32;
/// Random load program data, single line
pub const RANDOM_PROGRAM_LOAD: u8 = 0x84;
/// Random load program data, quad output
pub const RANDOM_PROGRAM_LOAD_X4: u8 = 0x34;
/// Program execute (buffer to array)
pub const PROGRAM_EXECUTE: u8 = 0x10;
/// Page data read (array to buffer)
pub const PAGE_DATA_READ: u8 = 0x13;
/// Fast read from the buffer, single line
pub const FAST_READ: u8 = 0x0B;
/// Fast read quad I/O from the buffer
pub const FAST_READ_QUAD_IO: u8 = 0xEB;

/// Protection register (SR1)
pub const REG_PROTECTION: u8 = 0xA0;
/// Configuration register (SR2)
pub const REG_CONFIG: u8 = 0xB0;
/// Status register (SR3)
pub const REG_STATUS: u8 = 0xC0;

/// Winbond JEDEC manufacturer ID
pub const MANUFACTURER_WINBOND: u8 = 0xEF;

/// SR3 busy bit
const SR3_BUSY: u8 = 0x01;

/// Read the JEDEC ID
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<T: Transport + ?Sized>(transport: &mut T) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = PhaseDescriptor::command(RDID)
        .with_dummy_bytes(1)
        .reading(LineWidth::Single, &mut buf);
    transport.execute(&mut cmd)?;
    Ok((buf[0], u16::from_be_bytes([buf[1], buf[2]])))
}

/// Read one of the feature registers
pub fn read_register<T: Transport + ?Sized>(transport: &mut T, reg: u8) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = PhaseDescriptor::command(RDSR)
        .with_address(reg as u32, AddressSize::OneByte, LineWidth::Single)
        .reading(LineWidth::Single, &mut buf);
    transport.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Write one of the feature registers
pub fn write_register<T: Transport + ?Sized>(transport: &mut T, reg: u8, value: u8) -> Result<()> {
    let data = [value];
    let mut cmd = PhaseDescriptor::command(WRSR)
        .with_address(reg as u32, AddressSize::OneByte, LineWidth::Single)
        .writing(LineWidth::Single, &data);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Send the Write Enable command
pub fn write_enable<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut cmd = PhaseDescriptor::command(WREN);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Send a command addressed by page (row) number
///
/// The row goes out as a 24-bit address. Parts with fewer than 65536 pages
/// expect eight dummy clocks followed by a 16-bit row, which is the same
/// bit pattern on the wire.
pub fn row_command<T: Transport + ?Sized>(transport: &mut T, opcode: u8, row: u32) -> Result<()> {
    let mut cmd =
        PhaseDescriptor::command(opcode).with_address(row, AddressSize::ThreeByte, LineWidth::Single);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Poll the status register until BUSY clears
///
/// Returns the final (idle) status register value, or
/// [`Error::Timeout`] when the budget is exhausted.
pub fn wait_ready<T: Transport + ?Sized>(transport: &mut T, budget: &PollBudget) -> Result<u8> {
    for poll in 0..budget.max_polls.max(1) {
        let status = read_register(transport, REG_STATUS)?;
        if status & SR3_BUSY == 0 {
            return Ok(status);
        }
        log::trace!("busy (SR3=0x{:02X}, poll {})", status, poll);
        if budget.interval_us > 0 {
            transport.delay_us(budget.interval_us);
        }
    }

    log::debug!("NAND still busy after {} polls", budget.max_polls);
    Err(Error::Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn test_jedec_id_layout() {
        let mut mock = MockTransport::new(|_, buf| buf.copy_from_slice(&[0xEF, 0xAA, 0x21]));
        assert_eq!(read_jedec_id(&mut mock).unwrap(), (0xEF, 0xAA21));
        assert_eq!(mock.log[0].dummy_bytes, 1);
        assert_eq!(mock.log[0].address, None);
    }

    #[test]
    fn test_register_select_address() {
        let mut mock = MockTransport::idle();
        write_register(&mut mock, REG_CONFIG, 0x18).unwrap();
        let rec = &mock.log[0];
        assert_eq!(rec.opcode, Some(WRSR));
        assert_eq!(rec.address, Some(0xB0));
        assert_eq!(rec.address_bytes, 1);
        assert_eq!(rec.written, [0x18]);
    }

    #[test]
    fn test_row_address_wire_bytes() {
        let mut mock = MockTransport::idle();
        row_command(&mut mock, PAGE_DATA_READ, 0x0040).unwrap();
        let rec = &mock.log[0];
        assert_eq!(rec.address, Some(0x40));
        assert_eq!(rec.address_bytes, 3);
        assert_eq!(rec.dummy_bytes, 0);
    }

    #[test]
    fn test_wait_ready_returns_final_status() {
        let mut mock = MockTransport::new(|_, buf| buf[0] = 0x08);
        assert_eq!(wait_ready(&mut mock, &PollBudget::default()).unwrap(), 0x08);
    }

    #[test]
    fn test_wait_ready_times_out() {
        let mut mock = MockTransport::new(|_, buf| buf[0] = SR3_BUSY);
        assert_eq!(
            wait_ready(&mut mock, &PollBudget::new(0, 4)),
            Err(Error::Timeout)
        );
        assert_eq!(mock.log.len(), 4);
    }
}
