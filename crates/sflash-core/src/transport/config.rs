//! Host-side configuration handed to the engines at attach time

use crate::spi::IoMode;

/// SPI clock used while discovering a NOR device
pub const DISCOVERY_FREQUENCY_HZ: u32 = 10_000_000;

/// Upper bound on a busy-poll loop
///
/// Every status poll the engines perform is bounded by this budget. When
/// `max_polls` status reads have all reported busy the operation fails with
/// [`Error::Timeout`](crate::Error::Timeout).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollBudget {
    /// Delay between two status reads, in microseconds
    pub interval_us: u32,
    /// Maximum number of status reads before giving up
    pub max_polls: u32,
}

impl PollBudget {
    /// Create a new poll budget
    pub const fn new(interval_us: u32, max_polls: u32) -> Self {
        Self {
            interval_us,
            max_polls,
        }
    }

    /// Approximate wall-clock bound in microseconds
    pub const fn timeout_us(&self) -> u64 {
        self.interval_us as u64 * self.max_polls as u64
    }
}

impl Default for PollBudget {
    /// 10 us between polls, roughly 10 s in total
    ///
    /// Large enough for a 64 KiB block erase on slow parts.
    fn default() -> Self {
        Self::new(10, 1_000_000)
    }
}

/// How the host controller is wired and should be driven
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HostConfig {
    /// Widest I/O mode the engine may use
    pub io_mode: IoMode,
    /// Operating frequency applied after discovery, if any
    pub frequency_hz: Option<u32>,
    /// Busy-poll bound
    pub poll: PollBudget,
}

impl HostConfig {
    /// Config for the given I/O mode with default polling
    pub fn new(io_mode: IoMode) -> Self {
        Self {
            io_mode,
            ..Default::default()
        }
    }

    /// Set the post-discovery operating frequency
    pub fn with_frequency(mut self, hz: u32) -> Self {
        self.frequency_hz = Some(hz);
        self
    }

    /// Replace the poll budget
    pub fn with_poll(mut self, poll: PollBudget) -> Self {
        self.poll = poll;
        self
    }
}
