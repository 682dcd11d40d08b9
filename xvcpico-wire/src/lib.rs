//! # xvcpico wire format
//!
//! Packet layout spoken between the xvcpico host bridge and the probe firmware over a
//! vendor-class USB interface. Every OUT packet is at most [`PACKET_SIZE`] bytes and carries a
//! small opcode stream:
//!
//! - **STOP** (`0x00`): end of the command stream in this packet
//! - **XFER** (`0x03`): `[opcode][num_bits: u32 LE][tms0, tdi0, tms1, tdi1, ...]`
//! - **WRITE** (`0x04`): `[opcode][tck][tms][tdi]`, drives the three output lines directly
//!
//! An XFER longer than one packet continues in the following packets, which carry only the
//! interleaved TMS/TDI payload. How a scan is cut into packets is defined in [`chunk`]; both
//! sides derive their chunk boundaries from the same functions, so they cannot disagree.
//!
//! This crate is `no_std` and allocation free so the firmware can link it.
//!
//! ```
//! use xvcpico_wire::chunk::split;
//!
//! let tms = [0u8; 20];
//! let tdi = [0xA5u8; 20];
//! let chunks = split(160, &tms, &tdi).expect("vectors are sized correctly");
//! let sizes: Vec<usize> = chunks.map(|c| c.layout().len).collect();
//! assert_eq!(sizes, [16, 4]);
//! ```
#![no_std]

pub mod chunk;
pub mod error;

pub use error::WireError;

/// Maximum size of a full-speed bulk packet in either direction.
pub const PACKET_SIZE: usize = 64;

/// Size of the opcode plus length prefix of an XFER command.
pub const XFER_HEADER_LEN: usize = 5;

/// Size of a WRITE command including its opcode.
pub const WRITE_COMMAND_LEN: usize = 4;

/// Command identifiers understood by the probe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    Stop = 0x00,
    Xfer = 0x03,
    Write = 0x04,
}

impl Opcode {
    /// Decodes a non-terminating command byte. Only the low nibble selects the command.
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte & 0x0F {
            0x03 => Some(Opcode::Xfer),
            0x04 => Some(Opcode::Write),
            _ => None,
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

/// The prefix of the first packet of a scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct XferHeader {
    pub num_bits: u32,
}

impl XferHeader {
    pub fn new(num_bits: u32) -> XferHeader {
        XferHeader { num_bits }
    }

    pub fn encode(&self) -> [u8; XFER_HEADER_LEN] {
        let len = self.num_bits.to_le_bytes();
        [Opcode::Xfer as u8, len[0], len[1], len[2], len[3]]
    }

    /// Parses a header at the start of `buf`. The opcode byte is not checked here since the
    /// caller already dispatched on it.
    pub fn decode(buf: &[u8]) -> Result<XferHeader, WireError> {
        if buf.len() < XFER_HEADER_LEN {
            return Err(WireError::TruncatedHeader { got: buf.len() });
        }
        let num_bits = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        Ok(XferHeader { num_bits })
    }
}

/// Discrete line levels carried by a WRITE command.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Signals {
    pub tck: bool,
    pub tms: bool,
    pub tdi: bool,
}

impl Signals {
    pub const fn new(tck: bool, tms: bool, tdi: bool) -> Signals {
        Signals { tck, tms, tdi }
    }

    /// Encodes a self-terminated WRITE packet.
    pub fn encode_write(&self) -> [u8; WRITE_COMMAND_LEN + 1] {
        [
            Opcode::Write as u8,
            self.tck as u8,
            self.tms as u8,
            self.tdi as u8,
            Opcode::Stop as u8,
        ]
    }

    /// Reads the three argument bytes following a WRITE opcode. Only bit 0 of each is used.
    pub fn from_write_args(args: [u8; 3]) -> Signals {
        Signals {
            tck: args[0] & 1 != 0,
            tms: args[1] & 1 != 0,
            tdi: args[2] & 1 != 0,
        }
    }
}

/// Number of bytes needed to hold `num_bits` bits.
pub const fn bytes_for_bits(num_bits: u32) -> usize {
    num_bits.div_ceil(8) as usize
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn opcode_uses_low_nibble() {
        assert_eq!(Opcode::from_byte(0x03), Some(Opcode::Xfer));
        assert_eq!(Opcode::from_byte(0x13), Some(Opcode::Xfer));
        assert_eq!(Opcode::from_byte(0xF4), Some(Opcode::Write));
        assert_eq!(Opcode::from_byte(0x10), None);
        assert_eq!(Opcode::from_byte(0x05), None);
    }

    #[test]
    fn xfer_header_layout() {
        let header = XferHeader::new(0x0102_0304);
        assert_eq!(header.encode(), [0x03, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(XferHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn truncated_header() {
        match XferHeader::decode(&[0x03, 0x01]) {
            Err(WireError::TruncatedHeader { got }) => assert_eq!(got, 2),
            other => panic!("expected TruncatedHeader, got {:?}", other),
        }
    }

    #[test]
    fn write_packet() {
        let capture_start = Signals::new(false, true, true);
        assert_eq!(capture_start.encode_write(), [0x04, 0, 1, 1, 0]);
        assert_eq!(
            Signals::from_write_args([0xFE, 0x03, 0x01]),
            Signals::new(false, true, true)
        );
    }
}
