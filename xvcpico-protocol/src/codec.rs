/// Read and write implementations for the protocol messages
use std::io::{self, BufRead, BufReader, Read, Write};

use crate::{
    error::ReadError,
    protocol::{Message, Version, XvcInfo},
};

const XVC_INFO_PREFIX: &[u8] = b"xvcServer";

impl XvcInfo {
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "xvcServer_v{}:{}", self.version(), self.buffer_size())
    }

    pub fn from_reader(reader: &mut impl Read) -> Result<XvcInfo, ReadError> {
        let mut buf_reader = BufReader::with_capacity(32, reader);
        let mut line = Vec::with_capacity(32);
        let _ = buf_reader.read_until(b'\n', &mut line)?;

        let line = line.trim_ascii_end();
        let rest = line
            .strip_prefix(XVC_INFO_PREFIX)
            .and_then(|rest| rest.strip_prefix(b"_v"))
            .ok_or_else(|| ReadError::InvalidFormat("Invalid prefix in info message".to_string()))?;

        let colon_index = rest.iter().position(|l| *l == b':').ok_or_else(|| {
            ReadError::InvalidFormat("Missing ':' separator in info message".to_string())
        })?;
        let (version_part, size_part) = rest.split_at(colon_index);

        let version = match version_part {
            b"1.0" => Version::V1_0,
            _ => {
                return Err(ReadError::UnsupportedVersion(
                    String::from_utf8_lossy(version_part).to_string(),
                ));
            }
        };

        let buffer_size = str::from_utf8(&size_part[1..])?.parse::<u32>()?;
        Ok(XvcInfo::new(version, buffer_size))
    }
}

#[test]
fn write_server_info() {
    let mut out = Vec::new();
    XvcInfo::default().write_to(&mut out).unwrap();
    assert_eq!(out, b"xvcServer_v1.0:2048\n".to_vec());
}

#[test]
fn read_server_info() {
    let data = b"xvcServer_v1.0:32\n";
    let mut cursor = std::io::Cursor::new(data);
    let info = XvcInfo::from_reader(&mut cursor).unwrap();
    assert_eq!(info.version(), Version::V1_0);
    assert_eq!(info.buffer_size(), 32)
}

/// Fixed part of a command: name, delimiter and integer argument.
pub(crate) enum Header {
    Complete(Message),
    /// A `shift:` whose vectors of `num_bytes` bytes each still follow.
    Shift { num_bits: u32, num_bytes: usize },
}

impl Message {
    const CMD_NAME_GET_INFO: &[u8; 7] = b"getinfo";
    const CMD_NAME_SET_TCK: &[u8; 6] = b"settck";
    const CMD_NAME_SHIFT: &[u8; 5] = b"shift";
    const CMD_DELIMITER: u8 = b':';

    /// Longest fixed part, `settck:` plus a u32.
    pub(crate) const MAX_HEADER_LEN: usize = 11;

    /// Length of the fixed part of the command starting with the two byte `prefix`.
    pub(crate) fn header_len(prefix: &[u8]) -> Result<usize, ReadError> {
        match prefix {
            b"ge" => Ok(Self::CMD_NAME_GET_INFO.len() + 1),
            b"se" => Ok(Self::CMD_NAME_SET_TCK.len() + 1 + 4),
            b"sh" => Ok(Self::CMD_NAME_SHIFT.len() + 1 + 4),
            _ => Err(ReadError::InvalidCommandPrefix(
                String::from_utf8_lossy(prefix).to_string(),
            )),
        }
    }

    /// Parses a complete fixed part as sized by [`Message::header_len`]. A `shift:` whose
    /// vectors would not fit into `buffer_size` bytes is rejected before they are read.
    pub(crate) fn parse_header(buf: &[u8], buffer_size: usize) -> Result<Header, ReadError> {
        let check_name = |name: &[u8]| {
            if buf.len() <= name.len()
                || &buf[..name.len()] != name
                || buf[name.len()] != Self::CMD_DELIMITER
            {
                return Err(ReadError::InvalidCommand(
                    String::from_utf8_lossy(buf).to_string(),
                ));
            }
            Ok(&buf[name.len() + 1..])
        };
        let read_u32 = |arg: &[u8]| u32::from_le_bytes([arg[0], arg[1], arg[2], arg[3]]);

        match &buf[..2] {
            b"ge" => {
                check_name(Self::CMD_NAME_GET_INFO)?;
                Ok(Header::Complete(Message::GetInfo))
            }
            b"se" => {
                let arg = check_name(Self::CMD_NAME_SET_TCK)?;
                Ok(Header::Complete(Message::SetTck {
                    period_ns: read_u32(arg),
                }))
            }
            _ => {
                let arg = check_name(Self::CMD_NAME_SHIFT)?;
                let num_bits = read_u32(arg);
                let payload = Message::shift_payload_len(num_bits);
                if payload > buffer_size {
                    return Err(ReadError::TooManyBytes {
                        max: buffer_size,
                        got: payload,
                    });
                }
                Ok(Header::Shift {
                    num_bits,
                    num_bytes: payload / 2,
                })
            }
        }
    }

    /// Reads one command. `buffer_size` bounds the TMS plus TDI payload of a `shift:`.
    pub fn from_reader(reader: &mut impl Read, buffer_size: usize) -> Result<Message, ReadError> {
        let mut buf = [0u8; Self::MAX_HEADER_LEN];
        reader.read_exact(&mut buf[..2])?;
        let header_len = Self::header_len(&buf[..2])?;
        reader.read_exact(&mut buf[2..header_len])?;

        match Self::parse_header(&buf[..header_len], buffer_size)? {
            Header::Complete(message) => Ok(message),
            Header::Shift {
                num_bits,
                num_bytes,
            } => {
                let mut tms = vec![0_u8; num_bytes].into_boxed_slice();
                reader.read_exact(&mut tms[..])?;
                let mut tdi = vec![0_u8; num_bytes].into_boxed_slice();
                reader.read_exact(&mut tdi[..])?;
                Ok(Message::Shift { num_bits, tms, tdi })
            }
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        match self {
            Message::GetInfo => {
                writer.write_all(Self::CMD_NAME_GET_INFO)?;
                writer.write_all(&[Self::CMD_DELIMITER])
            }
            Message::SetTck { period_ns } => {
                writer.write_all(Self::CMD_NAME_SET_TCK)?;
                writer.write_all(&[Self::CMD_DELIMITER])?;
                writer.write_all(&period_ns.to_le_bytes())
            }
            Message::Shift { num_bits, tms, tdi } => {
                writer.write_all(Self::CMD_NAME_SHIFT)?;
                writer.write_all(&[Self::CMD_DELIMITER])?;
                writer.write_all(&num_bits.to_le_bytes())?;
                writer.write_all(tms)?;
                writer.write_all(tdi)
            }
        }
    }
}
