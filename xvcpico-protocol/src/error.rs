use std::{
    error::Error,
    fmt::Display,
    io::{self, ErrorKind},
    num::ParseIntError,
    str::Utf8Error,
};

/// Errors that may occur when reading a message from a stream.
///
/// Apart from [`ReadError::IoError`], every variant means the peer violated the protocol. The
/// stream position is then undefined and the connection should be closed without an answer.
#[derive(Debug)]
pub enum ReadError {
    IoError(io::Error),
    InvalidCommand(String),
    InvalidCommandPrefix(String),
    UnsupportedVersion(String),
    InvalidFormat(String),
    /// The TMS and TDI vectors of a `shift:` (`got` bytes together) exceed the buffer.
    TooManyBytes { max: usize, got: usize },
}

impl ReadError {
    /// Whether the peer went away, as opposed to sending something invalid.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ReadError::IoError(err) => matches!(
                err.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionReset
                    | ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(value: io::Error) -> Self {
        ReadError::IoError(value)
    }
}

impl From<Utf8Error> for ReadError {
    fn from(value: Utf8Error) -> Self {
        ReadError::InvalidFormat(format!("Invalid UTF8: {}", value))
    }
}

impl From<ParseIntError> for ReadError {
    fn from(value: ParseIntError) -> Self {
        ReadError::InvalidFormat(format!("Invalid integer: {}", value))
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::IoError(error) => write!(f, "{}", error),
            ReadError::InvalidCommand(cmd) => write!(f, "Received invalid command {}", cmd),
            ReadError::UnsupportedVersion(version) => write!(f, "Unsupported version {}", version),
            ReadError::InvalidFormat(format) => write!(f, "{}", format),
            ReadError::InvalidCommandPrefix(prefix) => {
                write!(f, "Received invalid command with prefix {}", prefix)
            }
            ReadError::TooManyBytes { max, got } => {
                write!(
                    f,
                    "Shift vectors need {} bytes, but the buffer holds {}",
                    got, max
                )
            }
        }
    }
}

impl Error for ReadError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eof_is_a_disconnect() {
        let err = ReadError::from(io::Error::from(ErrorKind::UnexpectedEof));
        assert!(err.is_disconnect());
        assert!(!ReadError::InvalidCommand("x".to_string()).is_disconnect());
        assert!(!ReadError::from(io::Error::from(ErrorKind::TimedOut)).is_disconnect());
    }
}
