use core::fmt::Display;

/// Errors raised while laying out or reassembling a scan.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum WireError {
    /// A scan must shift at least one bit.
    EmptyScan,
    /// A TMS or TDI vector does not hold `ceil(num_bits / 8)` bytes.
    VectorLength { expected: usize, got: usize },
    /// The output buffer passed to [`crate::chunk::join`] is too small.
    OutputTooSmall { needed: usize, got: usize },
    /// A chunk response does not match the size of the chunk it answers.
    ResponseLength { expected: usize, got: usize },
    /// Fewer bytes than an XFER header were available.
    TruncatedHeader { got: usize },
}

impl Display for WireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireError::EmptyScan => write!(f, "Scan length must be at least one bit"),
            WireError::VectorLength { expected, got } => {
                write!(f, "Vector has {} bytes, expected {}", got, expected)
            }
            WireError::OutputTooSmall { needed, got } => {
                write!(f, "Output buffer holds {} bytes, {} needed", got, needed)
            }
            WireError::ResponseLength { expected, got } => {
                write!(f, "Chunk response has {} bytes, expected {}", got, expected)
            }
            WireError::TruncatedHeader { got } => {
                write!(f, "XFER header truncated after {} bytes", got)
            }
        }
    }
}

impl core::error::Error for WireError {}
