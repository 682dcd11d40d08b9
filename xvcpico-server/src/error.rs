use std::{error::Error, fmt::Display, io};

use xvcpico_protocol::error::ReadError;
use xvcpico_wire::WireError;

/// Failures talking to the probe. Any of these aborts the running scan.
#[derive(Debug)]
pub enum TransportError {
    /// No device with this VID/PID is attached.
    NotFound { vid: u16, pid: u16 },
    Usb(rusb::Error),
    /// The probe accepted fewer bytes than the packet holds.
    ShortWrite { expected: usize, written: usize },
    /// The probe answered a chunk with the wrong number of TDO bytes.
    ShortRead { expected: usize, got: usize },
    /// The probe was unplugged or reset.
    Disconnected,
    Wire(WireError),
}

impl From<rusb::Error> for TransportError {
    fn from(value: rusb::Error) -> Self {
        match value {
            rusb::Error::NoDevice => TransportError::Disconnected,
            other => TransportError::Usb(other),
        }
    }
}

impl From<WireError> for TransportError {
    fn from(value: WireError) -> Self {
        TransportError::Wire(value)
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::NotFound { vid, pid } => {
                write!(f, "No probe with ID {:04x}:{:04x} found", vid, pid)
            }
            TransportError::Usb(error) => write!(f, "USB transfer failed: {}", error),
            TransportError::ShortWrite { expected, written } => {
                write!(f, "Probe took {} of {} bytes", written, expected)
            }
            TransportError::ShortRead { expected, got } => {
                write!(f, "Expected {} bytes of TDO, got {}", expected, got)
            }
            TransportError::Disconnected => write!(f, "Probe disconnected"),
            TransportError::Wire(error) => write!(f, "{}", error),
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Usb(error) => Some(error),
            TransportError::Wire(error) => Some(error),
            _ => None,
        }
    }
}

/// Reasons a client connection is closed.
#[derive(Debug)]
pub enum ServerError {
    Read(ReadError),
    Transport(TransportError),
    Io(io::Error),
    /// No complete command arrived within the read/write timeout.
    Timeout,
}

impl ServerError {
    /// Whether the client went away, as opposed to misbehaving or the probe failing.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ServerError::Read(error) => error.is_disconnect(),
            ServerError::Io(error) => matches!(
                error.kind(),
                io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<ReadError> for ServerError {
    fn from(value: ReadError) -> Self {
        ServerError::Read(value)
    }
}

impl From<TransportError> for ServerError {
    fn from(value: TransportError) -> Self {
        ServerError::Transport(value)
    }
}

impl From<io::Error> for ServerError {
    fn from(value: io::Error) -> Self {
        ServerError::Io(value)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Read(error) => write!(f, "Protocol error: {}", error),
            ServerError::Transport(error) => write!(f, "Transport error: {}", error),
            ServerError::Io(error) => write!(f, "{}", error),
            ServerError::Timeout => write!(f, "Client timed out"),
        }
    }
}

impl Error for ServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServerError::Read(error) => Some(error),
            ServerError::Transport(error) => Some(error),
            ServerError::Io(error) => Some(error),
            ServerError::Timeout => None,
        }
    }
}
