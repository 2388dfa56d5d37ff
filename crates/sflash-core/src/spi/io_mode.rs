//! Line widths and host I/O modes

use crate::error::{Error, Result};
use crate::transport::TransportFeatures;

/// Number of data lines a single phase is driven on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineWidth {
    /// Phase absent
    #[default]
    None,
    /// Standard SPI, one line
    Single,
    /// Two lines
    Dual,
    /// Four lines
    Quad,
    /// Eight lines
    Octal,
}

impl LineWidth {
    /// Returns the number of lines (0 when the phase is absent)
    pub const fn lines(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
            Self::Octal => 8,
        }
    }

    /// Build from a raw line count
    pub const fn from_lines(lines: u8) -> Option<Self> {
        match lines {
            0 => Some(Self::None),
            1 => Some(Self::Single),
            2 => Some(Self::Dual),
            4 => Some(Self::Quad),
            8 => Some(Self::Octal),
            _ => None,
        }
    }

    /// Returns true if this phase is present on the wire
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Convert a number of clock cycles on this width into bytes
    ///
    /// Dummy phases are described in bytes; SFDP describes them in clocks.
    pub const fn clocks_to_bytes(&self, clocks: u8) -> u8 {
        ((clocks as u16 * self.lines() as u16) / 8) as u8
    }
}

/// I/O mode the host controller is wired and configured for
///
/// This is the widest data path the engine may select. Individual
/// operations still fall back to narrower widths when the device
/// does not advertise support.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IoMode {
    /// 1-line data path
    #[default]
    Single,
    /// 2-line data path
    Dual,
    /// 4-line data path
    Quad,
    /// 8-line data path
    Octal,
}

impl IoMode {
    /// Widest data line width available in this mode
    pub const fn data_width(&self) -> LineWidth {
        match self {
            Self::Single => LineWidth::Single,
            Self::Dual => LineWidth::Dual,
            Self::Quad => LineWidth::Quad,
            Self::Octal => LineWidth::Octal,
        }
    }

    /// Returns true if this mode requires quad I/O capability
    pub const fn is_quad(&self) -> bool {
        matches!(self, Self::Quad)
    }
}

/// Check that a transport can drive the requested I/O mode
///
/// Returns `Ok(())` if the mode is supported, or `Err(Invalid)` if not.
pub fn check_io_mode_supported(mode: IoMode, features: TransportFeatures) -> Result<()> {
    let needed = match mode {
        IoMode::Single => return Ok(()),
        IoMode::Dual => TransportFeatures::DUAL,
        IoMode::Quad => TransportFeatures::QUAD,
        IoMode::Octal => TransportFeatures::OCTAL,
    };
    if features.contains(needed) {
        Ok(())
    } else {
        Err(Error::Invalid)
    }
}
