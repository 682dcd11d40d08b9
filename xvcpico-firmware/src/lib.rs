//! # xvcpico probe firmware core
//!
//! Board independent part of the probe firmware. A board crate provides
//!
//! - the JTAG lines, through [`hal::JtagPins`] (or [`hal::GpioJtag`] for `embedded-hal` pins)
//! - the vendor USB interface, through [`usb::VendorEndpoint`]
//!
//! and then calls [`Probe::poll_host`] and [`Probe::fetch_command`] from its main loop:
//!
//! ```ignore
//! let mut probe = Probe::new(jtag, vendor_interface, DEFAULT_JTAG_DELAY)?;
//! loop {
//!     probe.poll_host();
//!     if let Err(e) = probe.fetch_command() {
//!         log::error!("JTAG pin failure: {:?}", e);
//!     }
//! }
//! ```
//!
//! Boards that shift on a second core use [`handoff`] instead of [`Probe`].
//!
//! ## Limitations
//!
//! The probe does not track the TAP state, and a lost packet is not detected. Both directions of
//! losing part of a scan are undefined:
//!
//! - A scan whose continuation packet never arrives leaves the parser waiting, and the next
//!   packet is consumed as that scan's payload.
//! - A continuation packet whose header packet never arrived is read as commands. Payload
//!   starting with a byte whose low nibble is 3 decodes as an XFER whose length comes from the
//!   payload, and every following packet, WRITEs included, is swallowed as part of that scan.
#![no_std]

pub mod hal;
pub mod handoff;
#[cfg(any(test, feature = "loopback"))]
pub mod loopback;
pub mod parser;
pub mod scheduler;
pub mod usb;

use hal::{IDLE_SIGNALS, JtagPins};
use parser::{CommandParser, PacketOutcome};
use scheduler::SlotRing;
use usb::VendorEndpoint;

/// Main loop state of a single-core probe.
pub struct Probe<P: JtagPins, U: VendorEndpoint> {
    pins: P,
    usb: U,
    ring: SlotRing,
    parser: CommandParser,
}

impl<P: JtagPins, U: VendorEndpoint> Probe<P, U> {
    /// Drives the JTAG lines to their idle levels and sets up empty receive slots.
    pub fn new(mut pins: P, usb: U, jtag_delay: u32) -> Result<Probe<P, U>, P::Error> {
        pins.set_signals(IDLE_SIGNALS)?;
        Ok(Probe {
            pins,
            usb,
            ring: SlotRing::new(),
            parser: CommandParser::new(jtag_delay),
        })
    }

    /// Moves one packet from the USB stack into a free slot. Returns whether a packet was
    /// stored. The stack is left alone while the next slot is busy.
    pub fn poll_host(&mut self) -> bool {
        let Some(buf) = self.ring.try_acquire_for_write() else {
            return false;
        };
        self.usb.poll();
        if !self.usb.available() {
            return false;
        }
        let len = self.usb.read_packet(buf);
        if len == 0 {
            return false;
        }
        match self.ring.commit_write(len) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping received packet: {}", e);
                false
            }
        }
    }

    /// Runs the parser on the oldest busy slot and frees it.
    pub fn fetch_command(&mut self) -> Result<Option<PacketOutcome>, P::Error> {
        let Some(packet) = self.ring.try_acquire_for_read() else {
            return Ok(None);
        };
        let outcome = self
            .parser
            .handle_packet(packet, &mut self.pins, &mut self.usb);
        if let Err(e) = self.ring.commit_read() {
            log::warn!("Releasing slot failed: {}", e);
        }
        outcome.map(Some)
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn usb(&self) -> &U {
        &self.usb
    }

    pub fn usb_mut(&mut self) -> &mut U {
        &mut self.usb
    }
}
