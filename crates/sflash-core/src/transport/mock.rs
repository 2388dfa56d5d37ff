//! Scripted transport used by the unit tests

use super::{Transport, TransportError, TransportFeatures};
use crate::spi::{Direction, LineWidth, PhaseDescriptor};
use std::boxed::Box;
use std::vec::Vec;

/// Snapshot of one executed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub opcode: Option<u8>,
    pub address: Option<u32>,
    pub address_bytes: u8,
    pub address_width: LineWidth,
    pub dummy_bytes: u8,
    pub data_width: LineWidth,
    pub direction: Option<Direction>,
    pub written: Vec<u8>,
    pub read_len: usize,
    pub dma: bool,
}

type Responder = Box<dyn FnMut(&Recorded, &mut [u8])>;

/// Transport that records every descriptor and answers reads via a closure
pub struct MockTransport {
    pub features: TransportFeatures,
    pub log: Vec<Recorded>,
    pub frequencies: Vec<u32>,
    /// Fail the n-th executed descriptor (0-based)
    pub fail_at: Option<usize>,
    responder: Responder,
}

impl MockTransport {
    pub fn new(responder: impl FnMut(&Recorded, &mut [u8]) + 'static) -> Self {
        Self {
            features: TransportFeatures::empty(),
            log: Vec::new(),
            frequencies: Vec::new(),
            fail_at: None,
            responder: Box::new(responder),
        }
    }

    /// Transport whose reads always return zeroes
    pub fn idle() -> Self {
        Self::new(|_, buf| buf.fill(0))
    }

    pub fn with_features(mut self, features: TransportFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.log.iter().filter_map(|r| r.opcode).collect()
    }

    pub fn with_opcode(&self, opcode: u8) -> Vec<&Recorded> {
        self.log.iter().filter(|r| r.opcode == Some(opcode)).collect()
    }
}

impl Transport for MockTransport {
    fn features(&self) -> TransportFeatures {
        self.features
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), TransportError> {
        self.frequencies.push(hz);
        Ok(())
    }

    fn execute(&mut self, phase: &mut PhaseDescriptor<'_>) -> Result<(), TransportError> {
        if self.fail_at == Some(self.log.len()) {
            return Err(TransportError::Bus);
        }
        let rec = Recorded {
            opcode: phase.opcode(),
            address: phase.address_value(),
            address_bytes: phase.address.map_or(0, |a| a.size.bytes()),
            address_width: phase.address.map_or(LineWidth::None, |a| a.width),
            dummy_bytes: phase.dummy_bytes,
            data_width: phase.data_width(),
            direction: phase.direction(),
            written: phase.write_data().to_vec(),
            read_len: if phase.direction() == Some(Direction::Read) {
                phase.data_len()
            } else {
                0
            },
            dma: phase.dma,
        };
        if let Some(buf) = phase.read_buf() {
            (self.responder)(&rec, buf);
        }
        self.log.push(rec);
        Ok(())
    }
}
