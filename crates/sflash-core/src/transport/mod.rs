//! Transport abstraction
//!
//! A transport is the bus driver that executes phase descriptors. The
//! engines only ever talk to hardware through the [`Transport`] trait.

mod config;
mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{HostConfig, PollBudget, DISCOVERY_FREQUENCY_HZ};
pub use traits::{Transport, TransportError, TransportFeatures};
