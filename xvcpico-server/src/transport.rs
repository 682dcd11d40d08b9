//! Bulk packet exchange with the probe's vendor interface.
use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};

use crate::error::TransportError;

/// Packet level access to the probe. One call moves one USB packet.
pub trait UsbTransport {
    /// Sends `packet` on the OUT endpoint. Fails unless all bytes were taken.
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// Receives one non-empty packet from the IN endpoint into `buf` and returns its length.
    fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

impl<T: UsbTransport + ?Sized> UsbTransport for Box<T> {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        (**self).write_packet(packet)
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read_packet(buf)
    }
}

#[derive(Debug, Clone)]
pub struct UsbConfig {
    pub vid: u16,
    pub pid: u16,
    pub interface: u8,
    pub read_endpoint: u8,
    pub write_endpoint: u8,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            vid: 0x1209,
            pid: 0xC0CA,
            interface: 0,
            read_endpoint: 0x82,
            write_endpoint: 0x01,
            write_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(2),
        }
    }
}

/// Probe opened through libusb.
pub struct RusbTransport {
    device: DeviceHandle<GlobalContext>,
    config: UsbConfig,
}

impl RusbTransport {
    /// Opens the first device matching the configured VID/PID and claims its vendor interface.
    pub fn open(config: UsbConfig) -> Result<RusbTransport, TransportError> {
        log::debug!(
            "Looking for probe {:04x}:{:04x}",
            config.vid,
            config.pid
        );
        let mut device = rusb::open_device_with_vid_pid(config.vid, config.pid).ok_or(
            TransportError::NotFound {
                vid: config.vid,
                pid: config.pid,
            },
        )?;
        if let Err(e) = device.set_auto_detach_kernel_driver(true) {
            log::debug!("Kernel driver auto detach unavailable: {}", e);
        }
        device.claim_interface(config.interface)?;
        log::info!(
            "Opened probe {:04x}:{:04x}, interface {}",
            config.vid,
            config.pid,
            config.interface
        );

        let drained = drain_stale(|buf| {
            device.read_bulk(config.read_endpoint, buf, Duration::from_millis(10))
        });
        if drained > 0 {
            log::info!("Dropped {} bytes of TDO from an earlier session", drained);
        }

        Ok(RusbTransport { device, config })
    }

    pub fn config(&self) -> &UsbConfig {
        &self.config
    }
}

impl UsbTransport for RusbTransport {
    fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        let written = self.device.write_bulk(
            self.config.write_endpoint,
            packet,
            self.config.write_timeout,
        )?;
        if written != packet.len() {
            return Err(TransportError::ShortWrite {
                expected: packet.len(),
                written,
            });
        }
        Ok(())
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            let len = self
                .device
                .read_bulk(self.config.read_endpoint, buf, self.config.read_timeout)?;
            if len > 0 {
                return Ok(len);
            }
            log::trace!("Zero length IN packet, reading again");
        }
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        if let Err(e) = self.device.release_interface(self.config.interface) {
            log::debug!("Releasing interface {} failed: {}", self.config.interface, e);
        }
    }
}

/// Reads and discards TDO left over from a scan that was aborted before it was read. Stops at the
/// first empty read or error. Returns the number of bytes discarded.
fn drain_stale(mut read: impl FnMut(&mut [u8]) -> rusb::Result<usize>) -> usize {
    let mut stale = [0u8; xvcpico_wire::PACKET_SIZE];
    let mut discarded = 0;
    loop {
        match read(&mut stale) {
            Ok(0) => break,
            Ok(len) => {
                log::debug!("Discarded {} stale bytes from the probe", len);
                discarded += len;
            }
            Err(rusb::Error::Timeout) => break,
            Err(e) => {
                log::debug!("Draining stale TDO stopped: {}", e);
                break;
            }
        }
    }
    discarded
}
