//! Error types for sflash-core
//!
//! The engine reports failures through a small set of error kinds. Each kind
//! maps onto a negative integer status code so that C-style callers (block
//! translation layers, USB mass-storage glue) can keep their `int` returns.

use core::fmt;

/// Device- or bus-reported cause behind an [`Error::Io`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFailure {
    /// The transport failed to execute a phase descriptor
    Transport,
    /// NAND status register reported an erase failure
    EraseFailed {
        /// Block that failed to erase
        block: u32,
    },
    /// NAND status register reported a program failure
    ProgramFailed {
        /// Absolute row (page) address
        row: u32,
    },
    /// On-die ECC could not correct the page
    EccUncorrectable {
        /// Absolute row (page) address
        row: u32,
    },
    /// SFDP header signature was not "SFDP"
    BadSignature,
    /// SFDP data did not contain a Basic Flash Parameter Table
    MissingBasicTable,
    /// JEDEC ID does not belong to a supported part
    UnknownDevice {
        /// Manufacturer byte
        manufacturer: u8,
        /// 16-bit device ID
        device: u16,
    },
    /// Discovered geometry cannot be represented (no usable erase size,
    /// density beyond 4 GiB)
    UnsupportedGeometry,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed or misaligned argument
    Invalid,
    /// Address, length, block or page outside the device geometry
    Range,
    /// Device-reported or transport failure
    Io(IoFailure),
    /// A busy-poll exhausted its budget
    Timeout,
    /// Allocation failure (the engines never allocate; kept for callers)
    NoMemory,
}

impl Error {
    /// Integer status code for this error (always negative)
    pub const fn code(&self) -> i32 {
        match self {
            Self::NoMemory => -1,
            Self::Invalid => -2,
            Self::Range => -3,
            Self::Io(_) => -4,
            Self::Timeout => -5,
        }
    }

    /// Returns true for any [`Error::Io`] cause
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Fold an engine result into its integer status (0 = success)
pub fn status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

impl From<IoFailure> for Error {
    fn from(cause: IoFailure) -> Self {
        Self::Io(cause)
    }
}

impl fmt::Display for IoFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport failed"),
            Self::EraseFailed { block } => write!(f, "erase failed on block {}", block),
            Self::ProgramFailed { row } => write!(f, "program failed at row 0x{:06X}", row),
            Self::EccUncorrectable { row } => {
                write!(f, "uncorrectable ECC error at row 0x{:06X}", row)
            }
            Self::BadSignature => write!(f, "SFDP signature mismatch"),
            Self::MissingBasicTable => write!(f, "SFDP basic flash parameter table missing"),
            Self::UnknownDevice {
                manufacturer,
                device,
            } => write!(
                f,
                "unsupported device (manufacturer 0x{:02X}, device 0x{:04X})",
                manufacturer, device
            ),
            Self::UnsupportedGeometry => write!(f, "unsupported flash geometry"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid argument"),
            Self::Range => write!(f, "out of range"),
            Self::Io(cause) => write!(f, "I/O error: {}", cause),
            Self::Timeout => write!(f, "operation timed out"),
            Self::NoMemory => write!(f, "out of memory"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status::<()>(&Ok(())), 0);
        assert_eq!(status::<()>(&Err(Error::NoMemory)), -1);
        assert_eq!(status::<()>(&Err(Error::Invalid)), -2);
        assert_eq!(status::<()>(&Err(Error::Range)), -3);
        assert_eq!(status::<()>(&Err(Error::Io(IoFailure::Transport))), -4);
        assert_eq!(status::<()>(&Err(Error::Timeout)), -5);
    }

    #[test]
    fn test_io_causes_share_code() {
        let causes = [
            IoFailure::EraseFailed { block: 3 },
            IoFailure::ProgramFailed { row: 0x40 },
            IoFailure::EccUncorrectable { row: 0x40 },
            IoFailure::BadSignature,
            IoFailure::UnknownDevice {
                manufacturer: 0xEF,
                device: 0x1234,
            },
        ];
        for cause in causes {
            let err: Error = cause.into();
            assert!(err.is_io());
            assert_eq!(err.code(), -4);
        }
    }
}
