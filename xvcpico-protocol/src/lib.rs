//! # xvcpico protocol
//!
//! Messages of the [Xilinx Virtual Cable (XVC)](https://github.com/Xilinx/XilinxVirtualCable)
//! 1.0 protocol as spoken between the FPGA tools and the xvcpico bridge.
//!
//! ## Message Format
//!
//! - **GetInfo**: `getinfo:`
//! - **SetTck**: `settck:<period in ns: u32>`
//! - **Shift**: `shift:<num_bits: u32><TMS vector><TDI vector>`
//! - **XvcInfo**: `xvcServer_v{version}:<buffer size>\n`
//!
//! Integers are little endian and each vector is `ceil(num_bits / 8)` bytes long. The buffer
//! size announced by the server bounds both vectors together; a `shift:` that would exceed it
//! is rejected with [`error::ReadError::TooManyBytes`] as soon as its length is known.
//!
//! ## Reading
//!
//! ```
//! use xvcpico_protocol::{Message, XvcInfo, Version};
//! use std::io::Cursor;
//!
//! let mut reader = Cursor::new(b"xvcServer_v1.0:2048\n");
//! let info = XvcInfo::from_reader(&mut reader).expect("Info should parse");
//! assert_eq!(info.version(), Version::V1_0);
//! assert_eq!(info.buffer_size(), 2048);
//!
//! let mut reader = Cursor::new(b"shift:\x04\x00\x00\x00\x0a\x05");
//! let msg = Message::from_reader(&mut reader, 2048).expect("Shift should parse");
//! assert_eq!(
//!     msg,
//!     Message::Shift {
//!         num_bits: 4,
//!         tms: vec![0x0a].into_boxed_slice(),
//!         tdi: vec![0x05].into_boxed_slice(),
//!     }
//! );
//! ```
//!
//! ## Writing
//!
//! ```
//! use xvcpico_protocol::Message;
//!
//! let mut buffer = Vec::new();
//! Message::SetTck { period_ns: 100 }
//!     .write_to(&mut buffer)
//!     .expect("Writing to vector shouldn't fail");
//! assert_eq!(buffer, b"settck:\x64\x00\x00\x00");
//! ```
//!
//! With the `tokio` feature, [`framed::MessageDecoder`] decodes the same messages from a
//! `BytesMut` that is filled incrementally.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
#[cfg(feature = "tokio")]
pub mod framed;
