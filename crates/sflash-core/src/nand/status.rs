//! W25N feature registers and ECC classification

use bitflags::bitflags;

use crate::error::{Error, IoFailure, Result};

bitflags! {
    /// Protection register (SR1, select 0xA0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u8 {
        /// Status register protect 1
        const SRP1 = 1 << 0;
        /// /WP pin enable
        const WP_E = 1 << 1;
        /// Top/bottom protect
        const TB   = 1 << 2;
        /// Block protect 0
        const BP0  = 1 << 3;
        /// Block protect 1
        const BP1  = 1 << 4;
        /// Block protect 2
        const BP2  = 1 << 5;
        /// Block protect 3
        const BP3  = 1 << 6;
        /// Status register protect 0
        const SRP0 = 1 << 7;

        /// Bits cleared at attach
        const UNLOCK_MASK = Self::SRP1.bits()
            | Self::WP_E.bits()
            | Self::BP0.bits()
            | Self::BP1.bits()
            | Self::BP2.bits()
            | Self::BP3.bits()
            | Self::SRP0.bits();
    }
}

bitflags! {
    /// Configuration register (SR2, select 0xB0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Config: u8 {
        /// Buffer read mode (page-sized reads from the cache)
        const BUF   = 1 << 3;
        /// On-die ECC enable
        const ECC_E = 1 << 4;
        /// SR1 lock
        const SR1_L = 1 << 5;
        /// OTP access enable
        const OTP_E = 1 << 6;
        /// OTP lock
        const OTP_L = 1 << 7;
    }
}

bitflags! {
    /// Status register (SR3, select 0xC0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        /// Operation in progress
        const BUSY   = 1 << 0;
        /// Write enable latch
        const WEL    = 1 << 1;
        /// Erase failure
        const E_FAIL = 1 << 2;
        /// Program failure
        const P_FAIL = 1 << 3;
        /// ECC status, low bit
        const ECC0   = 1 << 4;
        /// ECC status, high bit
        const ECC1   = 1 << 5;
        /// Bad block lookup table full
        const LUT_F  = 1 << 6;
    }
}

impl Status {
    /// Two-bit ECC status field
    pub const fn ecc_field(&self) -> u8 {
        (self.bits() >> 4) & 0x03
    }
}

/// Outcome of a page read that passed ECC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccStatus {
    /// No bit errors
    Clean,
    /// Bit errors were found and corrected
    Corrected,
}

/// Classify the ECC field of an idle status register
///
/// Field values 0 and 1 succeed; 2 (uncorrectable in one page) and 3
/// (uncorrectable in a continuous read) fail with `Io`.
pub fn check_ecc(status: Status, row: u32) -> Result<EccStatus> {
    match status.ecc_field() {
        0 => Ok(EccStatus::Clean),
        1 => Ok(EccStatus::Corrected),
        _ => Err(Error::Io(IoFailure::EccUncorrectable { row })),
    }
}

/// Classify the status register after a program execute
pub fn check_program(status: Status, row: u32) -> Result<()> {
    if status.contains(Status::P_FAIL) {
        return Err(Error::Io(IoFailure::ProgramFailed { row }));
    }
    check_ecc(status, row).map(|_| ())
}

/// Classify the status register after a block erase
pub fn check_erase(status: Status, block: u32) -> Result<()> {
    if status.contains(Status::E_FAIL) {
        return Err(Error::Io(IoFailure::EraseFailed { block }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecc_classification_table() {
        // Busy and fail bits never change the ECC verdict of a read
        let noise = [
            Status::empty(),
            Status::BUSY,
            Status::WEL,
            Status::E_FAIL,
            Status::P_FAIL,
            Status::BUSY | Status::P_FAIL | Status::E_FAIL,
        ];
        for ecc in 0u8..4 {
            for extra in noise {
                let status = Status::from_bits_retain(extra.bits() | (ecc << 4));
                let result = check_ecc(status, 7);
                match ecc {
                    0 => assert_eq!(result, Ok(EccStatus::Clean)),
                    1 => assert_eq!(result, Ok(EccStatus::Corrected)),
                    _ => assert_eq!(
                        result,
                        Err(Error::Io(IoFailure::EccUncorrectable { row: 7 }))
                    ),
                }
            }
        }
    }

    #[test]
    fn test_program_classification_table() {
        for ecc in 0u8..4 {
            for fail in [false, true] {
                let mut status = Status::from_bits_retain(ecc << 4);
                status.set(Status::P_FAIL, fail);
                let result = check_program(status, 3);
                if fail {
                    assert_eq!(result, Err(Error::Io(IoFailure::ProgramFailed { row: 3 })));
                } else if ecc > 1 {
                    assert_eq!(result, Err(Error::Io(IoFailure::EccUncorrectable { row: 3 })));
                } else {
                    assert_eq!(result, Ok(()));
                }
            }
        }
    }

    #[test]
    fn test_erase_classification() {
        assert_eq!(check_erase(Status::empty(), 2), Ok(()));
        assert_eq!(check_erase(Status::P_FAIL | Status::ECC1, 2), Ok(()));
        assert_eq!(
            check_erase(Status::E_FAIL, 2),
            Err(Error::Io(IoFailure::EraseFailed { block: 2 }))
        );
    }

    #[test]
    fn test_unlock_mask_keeps_tb() {
        let sr1 = Protection::all();
        assert_eq!(sr1 & !Protection::UNLOCK_MASK, Protection::TB);
    }
}
