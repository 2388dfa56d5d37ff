//! Transport trait definitions

use crate::spi::PhaseDescriptor;
use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// Transport capability flags
    ///
    /// These flags indicate which line widths and transfer modes a
    /// transport backend can drive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransportFeatures: u32 {
        /// Can drive phases on two lines
        const DUAL  = 1 << 0;
        /// Can drive phases on four lines
        const QUAD  = 1 << 1;
        /// Can drive phases on eight lines
        const OCTAL = 1 << 2;
        /// Can move data phases by DMA
        const DMA   = 1 << 3;
    }
}

impl Default for TransportFeatures {
    fn default() -> Self {
        TransportFeatures::empty()
    }
}

/// Failure reported by a transport backend
///
/// The engines do not interpret these beyond "failed"; every variant is
/// surfaced to callers as an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The bus transfer itself failed
    Bus,
    /// The controller timed out waiting for the transfer
    Timeout,
    /// The descriptor uses a phase shape the backend cannot execute
    Unsupported,
    /// The backend is not initialized
    NotReady,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus transfer failed"),
            Self::Timeout => write!(f, "transfer timed out"),
            Self::Unsupported => write!(f, "phase layout not supported"),
            Self::NotReady => write!(f, "transport not initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

impl From<TransportError> for crate::error::Error {
    fn from(_: TransportError) -> Self {
        crate::error::Error::Io(crate::error::IoFailure::Transport)
    }
}

/// Transport trait
///
/// A transport executes one [`PhaseDescriptor`] at a time over real
/// SPI/QSPI/OSPI hardware. It is synchronous: `execute` blocks until the
/// whole transaction has completed.
///
/// ## DMA contract
///
/// Descriptors with `dma` set may be moved by DMA. Any cache maintenance
/// the platform needs (clean before a write, invalidate after a read) is
/// the transport's job and must be finished before `execute` returns. The
/// engines never touch caches.
///
/// ## Example
///
/// ```ignore
/// impl Transport for MyQspi {
///     fn features(&self) -> TransportFeatures {
///         TransportFeatures::DUAL | TransportFeatures::QUAD
///     }
///
///     fn execute(&mut self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError> {
///         self.program_ccr(phase)?;
///         self.run_data_phase(phase)
///     }
/// }
/// ```
pub trait Transport {
    /// Get the line widths and transfer modes supported by this transport
    fn features(&self) -> TransportFeatures {
        TransportFeatures::empty()
    }

    /// Bring up the controller
    fn init(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Shut down the controller
    fn deinit(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Set the bus clock frequency in Hz
    fn set_frequency(&mut self, hz: u32) -> Result<(), TransportError>;

    /// Execute a single phase descriptor
    ///
    /// Read data phases fill the descriptor's buffer before returning.
    fn execute(&mut self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError>;

    /// Delay for the specified number of microseconds
    ///
    /// Called between busy polls. The default does not wait.
    fn delay_us(&mut self, _us: u32) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn features(&self) -> TransportFeatures {
        (**self).features()
    }

    fn init(&mut self) -> Result<(), TransportError> {
        (**self).init()
    }

    fn deinit(&mut self) -> Result<(), TransportError> {
        (**self).deinit()
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), TransportError> {
        (**self).set_frequency(hz)
    }

    fn execute(&mut self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError> {
        (**self).execute(phase)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
