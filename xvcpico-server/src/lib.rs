//! # xvcpico server
//!
//! Host side of the xvcpico bridge. FPGA tools connect over TCP and speak the Xilinx Virtual
//! Cable 1.0 protocol; every `shift:` is forwarded to a USB attached probe which bit-bangs the
//! JTAG lines and returns TDO.
//!
//! ## Architecture
//!
//! - **[`server::Server`]**: accepts connections, decodes XVC commands and answers them
//! - **[`JtagBackend`]**: what the server needs from the JTAG side
//! - **[`pipeline::PipelineController`]**: the backend for a probe; cuts scans into USB packets
//!   and keeps the next chunk in flight while waiting for TDO of the previous one
//! - **[`transport::UsbTransport`]**: packet exchange with the probe, implemented for libusb
//!   by [`transport::RusbTransport`]
//!
//! ## Starting the Server
//!
//! ```ignore
//! use xvcpico_server::pipeline::{PipelineController, PipelineMode};
//! use xvcpico_server::server::Builder;
//! use xvcpico_server::transport::{RusbTransport, UsbConfig};
//!
//! let probe = RusbTransport::open(UsbConfig::default())?;
//! let server = Builder::new().build(PipelineController::new(probe, PipelineMode::Overlapped));
//! server.listen("0.0.0.0:2542").await?;
//! ```
//!
//! ## Concurrency
//!
//! Any number of clients may be connected. Commands of one connection are answered in order,
//! and only one scan runs on the probe at a time; the backend sits behind a mutex and is
//! driven from tokio's blocking thread pool.
//!
//! ## Error Handling
//!
//! XVC has no way to report errors. A malformed or oversized command, or a failed USB
//! transfer, closes the affected connection without an answer.
//!
//! ## Limitations
//!
//! Neither side tracks the TAP state. A client that disconnects in the middle of a sequence of
//! shifts leaves the TAP wherever that sequence stopped.
pub mod error;
pub mod pipeline;
pub mod server;
pub mod transport;

use error::TransportError;
use pipeline::PipelineController;
use transport::UsbTransport;

/// The JTAG side of the server.
pub trait JtagBackend {
    /// Sets the TCK period and returns the period actually used.
    fn set_tck(&mut self, period_ns: u32) -> u32;

    /// Shifts `num_bits` bits of `tms` and `tdi` (each `ceil(num_bits / 8)` bytes) and returns
    /// the TDO vector of the same length.
    fn shift(&mut self, num_bits: u32, tms: &[u8], tdi: &[u8])
    -> Result<Box<[u8]>, TransportError>;
}

impl<T: UsbTransport> JtagBackend for PipelineController<T> {
    /// The probe clocks at a fixed rate, so the request is echoed.
    fn set_tck(&mut self, period_ns: u32) -> u32 {
        period_ns
    }

    fn shift(
        &mut self,
        num_bits: u32,
        tms: &[u8],
        tdi: &[u8],
    ) -> Result<Box<[u8]>, TransportError> {
        if num_bits == 0 {
            return Ok(Box::default());
        }
        PipelineController::shift(self, num_bits, tms, tdi)
    }
}
