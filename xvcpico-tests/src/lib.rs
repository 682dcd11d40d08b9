//! Test harness connecting the host bridge to the probe firmware without hardware.
//!
//! [`SimulatedProbe`] runs the firmware main loop over in-memory USB endpoints and loopback
//! pins. OUT packets are put into slots as they arrive but only parsed while the host waits for
//! TDO, so the firmware lags the host by up to a whole pipeline of packets.
use std::collections::VecDeque;

use xvcpico_firmware::{
    Probe,
    loopback::{LoopbackPins, LoopbackSource},
    parser::{DEFAULT_JTAG_DELAY, ParserState},
    usb::VendorEndpoint,
};
use xvcpico_server::{error::TransportError, transport::UsbTransport};
use xvcpico_wire::PACKET_SIZE;

/// USB device stack backed by two packet queues.
#[derive(Default)]
pub struct MemoryEndpoint {
    out: VecDeque<Vec<u8>>,
    r#in: VecDeque<Vec<u8>>,
}

impl VendorEndpoint for MemoryEndpoint {
    fn poll(&mut self) {}

    fn available(&mut self) -> bool {
        !self.out.is_empty()
    }

    fn read_packet(&mut self, buf: &mut [u8; PACKET_SIZE]) -> usize {
        match self.out.pop_front() {
            Some(packet) => {
                buf[..packet.len()].copy_from_slice(&packet);
                packet.len()
            }
            None => 0,
        }
    }

    fn write_packet(&mut self, data: &[u8]) {
        self.r#in.push_back(data.to_vec());
    }
}

pub struct SimulatedProbe {
    probe: Probe<LoopbackPins, MemoryEndpoint>,
}

impl SimulatedProbe {
    pub fn new(source: LoopbackSource) -> SimulatedProbe {
        let probe = match Probe::new(
            LoopbackPins::new(source),
            MemoryEndpoint::default(),
            DEFAULT_JTAG_DELAY,
        ) {
            Ok(probe) => probe,
            Err(never) => match never {},
        };
        SimulatedProbe { probe }
    }

    pub fn pins(&self) -> &LoopbackPins {
        self.probe.pins()
    }

    pub fn parser_state(&self) -> ParserState {
        self.probe.parser().state()
    }

    /// OUT packets stored in slots but not parsed yet.
    pub fn pending_slots(&self) -> usize {
        self.probe.ring().busy_count()
    }

    /// One pass of the firmware main loop. Returns whether anything happened.
    pub fn step(&mut self) -> bool {
        let received = self.probe.poll_host();
        let processed = match self.probe.fetch_command() {
            Ok(outcome) => outcome.is_some(),
            Err(never) => match never {},
        };
        received || processed
    }
}

impl UsbTransport for SimulatedProbe {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.probe.usb_mut().out.push_back(packet.to_vec());
        self.probe.poll_host();
        Ok(())
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            if let Some(packet) = self.probe.usb_mut().r#in.pop_front() {
                buf[..packet.len()].copy_from_slice(&packet);
                return Ok(packet.len());
            }
            if !self.step() {
                log::debug!("Simulated probe has nothing to answer");
                return Err(TransportError::Usb(rusb::Error::Timeout));
            }
        }
    }
}
