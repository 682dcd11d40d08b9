use std::fmt::Display;

/// Size of the host working buffer that holds the TMS and TDI vectors of one `shift:`.
pub const DEFAULT_BUFFER_SIZE: u32 = 2048;

/// Protocol version announced in the `getinfo:` answer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    major: usize,
    minor: usize,
}

impl Version {
    pub const V1_0: Version = Version { major: 1, minor: 0 };

    pub fn major(&self) -> usize {
        self.major
    }

    pub fn minor(&self) -> usize {
        self.minor
    }
}

#[test]
fn version_ordering() {
    assert!(Version { major: 1, minor: 0 } < Version { major: 1, minor: 1 });
    assert!(Version { major: 2, minor: 0 } > Version { major: 1, minor: 0 });
}

impl Default for Version {
    fn default() -> Self {
        Self::V1_0
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A command sent by the XVC client. Every command gets exactly one answer before the next
/// command on the same connection is read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    /// `getinfo:`, answered with the [`XvcInfo`] line.
    GetInfo,
    /// `settck:<period u32>`, answered with the period the bridge applies. The bridge cannot
    /// change its clock, so the requested period is echoed.
    SetTck { period_ns: u32 },
    /// `shift:<num_bits u32><tms><tdi>`, answered with `ceil(num_bits / 8)` bytes of TDO.
    Shift {
        /// Number of TCK cycles.
        num_bits: u32,
        /// TMS bits, LSB of the first byte is shifted first.
        tms: Box<[u8]>,
        /// TDI bits in the same order as `tms`.
        tdi: Box<[u8]>,
    },
}

impl Message {
    /// Bytes of TMS plus TDI a `shift:` of `num_bits` occupies in the working buffer.
    pub fn shift_payload_len(num_bits: u32) -> usize {
        2 * num_bits.div_ceil(8) as usize
    }
}

/// Server capabilities, sent as `xvcServer_v<version>:<buffer size>\n`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XvcInfo {
    version: Version,
    buffer_size: u32,
}

impl XvcInfo {
    pub fn new(version: Version, buffer_size: u32) -> XvcInfo {
        XvcInfo {
            version,
            buffer_size,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Capacity of the working buffer for the TMS and TDI vectors of one shift.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

impl Default for XvcInfo {
    fn default() -> XvcInfo {
        XvcInfo {
            version: Version::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}
