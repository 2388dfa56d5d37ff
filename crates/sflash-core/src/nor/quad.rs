//! Quad Enable sequencing
//!
//! Each variant reads the register holding QE, and writes it back with the
//! bit set only when it is clear. No write happens for devices that are
//! already in quad mode.

use crate::error::Result;
use crate::protocol::spi25;
use crate::sfdp::QuadEnableRequirement;
use crate::spi::opcodes;
use crate::transport::{PollBudget, Transport};

/// SR1 block protect bits BP0-BP3
const SR1_BP_MASK: u8 = 0x3C;

/// Set the Quad Enable bit the way `req` describes
pub fn enable<T: Transport + ?Sized>(
    transport: &mut T,
    req: QuadEnableRequirement,
    budget: &PollBudget,
) -> Result<()> {
    match req {
        QuadEnableRequirement::Ignore => {
            log::debug!("no quad enable sequence for this device");
        }
        QuadEnableRequirement::Sr2Bit1WriteSr1Sr2 => {
            let sr2 = spi25::read_status2(transport)?;
            if sr2 & opcodes::SR2_QE_BIT1 == 0 {
                let sr1 = spi25::read_status1(transport)?;
                log::debug!("setting QE (SR2 bit 1) through 16-bit WRSR");
                spi25::write_status(
                    transport,
                    opcodes::WRSR,
                    &[sr1, sr2 | opcodes::SR2_QE_BIT1],
                    budget,
                )?;
            }
        }
        QuadEnableRequirement::Sr1Bit6 => {
            let sr1 = spi25::read_status1(transport)?;
            if sr1 & opcodes::SR1_QE_BIT6 == 0 {
                log::debug!("setting QE (SR1 bit 6), clearing block protection");
                let value = (sr1 & !SR1_BP_MASK) | opcodes::SR1_QE_BIT6;
                spi25::write_status(transport, opcodes::WRSR, &[value], budget)?;
            }
        }
        QuadEnableRequirement::Sr2Bit7 => {
            let sr2 = spi25::read_status2(transport)?;
            if sr2 & opcodes::SR2_QE_BIT7 == 0 {
                log::debug!("setting QE (SR2 bit 7)");
                spi25::write_status(
                    transport,
                    opcodes::WRSR2,
                    &[sr2 | opcodes::SR2_QE_BIT7],
                    budget,
                )?;
            }
        }
        QuadEnableRequirement::Sr2Bit1WriteSr2 => {
            let sr2 = spi25::read_status2(transport)?;
            if sr2 & opcodes::SR2_QE_BIT1 == 0 {
                log::debug!("setting QE (SR2 bit 1) through WRSR2");
                spi25::write_status(
                    transport,
                    opcodes::WRSR2,
                    &[sr2 | opcodes::SR2_QE_BIT1],
                    budget,
                )?;
            }
        }
    }
    Ok(())
}
