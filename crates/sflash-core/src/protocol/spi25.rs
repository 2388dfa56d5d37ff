//! SPI25 NOR command sequences
//!
//! The small building blocks the NOR engine and the SFDP decoder are made
//! of: status register access, write enable, bounded busy polling and
//! 4-byte address mode switching. All of them are single-line transactions.

use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressSize, LineWidth, PhaseDescriptor};
use crate::transport::{PollBudget, Transport};

/// Read one status register with the given read opcode (0x05, 0x35, 0x15)
pub fn read_status<T: Transport + ?Sized>(transport: &mut T, opcode: u8) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = PhaseDescriptor::command(opcode).reading(LineWidth::Single, &mut buf);
    transport.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Read the status register 1
pub fn read_status1<T: Transport + ?Sized>(transport: &mut T) -> Result<u8> {
    read_status(transport, opcodes::RDSR)
}

/// Read the status register 2
pub fn read_status2<T: Transport + ?Sized>(transport: &mut T) -> Result<u8> {
    read_status(transport, opcodes::RDSR2)
}

/// Send the Write Enable command
pub fn write_enable<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut cmd = PhaseDescriptor::command(opcodes::WREN);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Reads status register 1 at most `budget.max_polls` times, sleeping
/// `budget.interval_us` between reads. Returns [`Error::Timeout`] when the
/// device is still busy after the last read.
pub fn wait_ready<T: Transport + ?Sized>(transport: &mut T, budget: &PollBudget) -> Result<()> {
    for poll in 0..budget.max_polls.max(1) {
        let status = read_status1(transport)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        log::trace!("busy (SR1=0x{:02X}, poll {})", status, poll);
        if budget.interval_us > 0 {
            transport.delay_us(budget.interval_us);
        }
    }

    log::debug!("device still busy after {} polls", budget.max_polls);
    Err(Error::Timeout)
}

/// Write a status register
///
/// Sends WREN, then `opcode` with `data`, then waits for completion. A
/// two-byte write with 0x01 updates SR1 and SR2 together.
pub fn write_status<T: Transport + ?Sized>(
    transport: &mut T,
    opcode: u8,
    data: &[u8],
    budget: &PollBudget,
) -> Result<()> {
    write_enable(transport)?;
    let mut cmd = PhaseDescriptor::command(opcode).writing(LineWidth::Single, data);
    transport.execute(&mut cmd)?;
    wait_ready(transport, budget)
}

/// Enter 4-byte address mode
pub fn enter_4byte_mode<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut cmd = PhaseDescriptor::command(opcodes::EN4B);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Exit 4-byte address mode
pub fn exit_4byte_mode<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut cmd = PhaseDescriptor::command(opcodes::EX4B);
    transport.execute(&mut cmd)?;
    Ok(())
}

/// Read SFDP data
///
/// SFDP reads always use 3-byte addressing, a single line and 8 dummy
/// clocks, whatever mode the device is in.
pub fn read_sfdp<T: Transport + ?Sized>(transport: &mut T, addr: u32, buf: &mut [u8]) -> Result<()> {
    let mut cmd = PhaseDescriptor::command(opcodes::RDSFDP)
        .with_address(addr, AddressSize::ThreeByte, LineWidth::Single)
        .with_dummy_bytes(1)
        .reading(LineWidth::Single, buf);
    transport.execute(&mut cmd)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IoFailure;
    use crate::transport::mock::MockTransport;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_wait_ready_returns_when_idle() {
        let polls = Rc::new(Cell::new(0));
        let counter = polls.clone();
        let mut mock = MockTransport::new(move |_, buf| {
            counter.set(counter.get() + 1);
            buf[0] = if counter.get() < 3 { opcodes::SR1_WIP } else { 0 };
        });
        wait_ready(&mut mock, &PollBudget::new(0, 10)).unwrap();
        assert_eq!(polls.get(), 3);
    }

    #[test]
    fn test_wait_ready_times_out() {
        let mut mock = MockTransport::new(|_, buf| buf[0] = opcodes::SR1_WIP);
        let result = wait_ready(&mut mock, &PollBudget::new(1, 5));
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(mock.log.len(), 5);
    }

    #[test]
    fn test_transport_failure_is_io() {
        let mut mock = MockTransport::idle();
        mock.fail_at = Some(0);
        assert_eq!(
            write_enable(&mut mock),
            Err(Error::Io(IoFailure::Transport))
        );
    }

    #[test]
    fn test_write_status_sequence() {
        let mut mock = MockTransport::idle();
        write_status(&mut mock, opcodes::WRSR, &[0x00, 0x02], &PollBudget::default()).unwrap();
        assert_eq!(
            mock.opcodes(),
            [opcodes::WREN, opcodes::WRSR, opcodes::RDSR]
        );
        assert_eq!(mock.log[1].written, [0x00, 0x02]);
    }

    #[test]
    fn test_read_sfdp_layout() {
        let mut mock = MockTransport::idle();
        let mut buf = [0u8; 8];
        read_sfdp(&mut mock, 0x10, &mut buf).unwrap();
        let rec = &mock.log[0];
        assert_eq!(rec.opcode, Some(opcodes::RDSFDP));
        assert_eq!(rec.address, Some(0x10));
        assert_eq!(rec.address_bytes, 3);
        assert_eq!(rec.dummy_bytes, 1);
        assert_eq!(rec.read_len, 8);
    }
}
