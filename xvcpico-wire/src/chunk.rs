//! Chunk layout of a scan.
//!
//! A scan of `num_bits` bits is cut into packets as follows:
//!
//! - the first chunk is a *header* chunk: the 5 byte XFER header followed by up to
//!   [`HEADER_CHUNK_BYTES`] bytes each of TMS and TDI
//! - every following chunk is a *continuation* chunk with up to [`CONTINUATION_CHUNK_BYTES`]
//!   bytes each of TMS and TDI and no header
//! - the last chunk only carries the bits that are left
//!
//! Inside a chunk TMS and TDI are interleaved byte by byte. The probe answers every chunk with
//! exactly as many TDO bytes as TMS bytes it consumed.
use crate::{PACKET_SIZE, WireError, XFER_HEADER_LEN, XferHeader, bytes_for_bits};

/// Bytes of each vector carried by the first packet of a scan.
pub const HEADER_CHUNK_BYTES: usize = 16;

/// Bytes of each vector carried by every later packet of a scan.
pub const CONTINUATION_CHUNK_BYTES: usize = 32;

const _: () = assert!(XFER_HEADER_LEN + 2 * HEADER_CHUNK_BYTES <= PACKET_SIZE);
const _: () = assert!(2 * CONTINUATION_CHUNK_BYTES <= PACKET_SIZE);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChunkKind {
    Header,
    Continuation,
}

impl ChunkKind {
    /// Bytes of TMS (and of TDI) a chunk of this kind can carry.
    pub const fn capacity_bytes(self) -> usize {
        match self {
            ChunkKind::Header => HEADER_CHUNK_BYTES,
            ChunkKind::Continuation => CONTINUATION_CHUNK_BYTES,
        }
    }

    pub const fn capacity_bits(self) -> u32 {
        (self.capacity_bytes() * 8) as u32
    }

    /// Number of bits a chunk of this kind shifts when `bits_remaining` bits of the scan are
    /// still outstanding. Host and probe both size their chunks through this function.
    pub fn bits_for(self, bits_remaining: u32) -> u32 {
        bits_remaining.min(self.capacity_bits())
    }

    /// Where the interleaved payload starts inside the packet.
    pub const fn payload_offset(self) -> usize {
        match self {
            ChunkKind::Header => XFER_HEADER_LEN,
            ChunkKind::Continuation => 0,
        }
    }
}

/// Position and size of a chunk within the scan. Offsets and lengths are in bytes of one
/// vector, so they index the TMS, TDI and TDO buffers alike.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChunkLayout {
    pub kind: ChunkKind,
    pub offset: usize,
    pub len: usize,
    pub num_bits: u32,
}

/// One packet worth of a scan.
#[derive(Clone, Debug)]
pub struct Chunk<'a> {
    layout: ChunkLayout,
    total_bits: u32,
    tms: &'a [u8],
    tdi: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    pub fn kind(&self) -> ChunkKind {
        self.layout.kind
    }

    pub fn tms(&self) -> &'a [u8] {
        self.tms
    }

    pub fn tdi(&self) -> &'a [u8] {
        self.tdi
    }

    /// Number of bytes this chunk occupies on the wire.
    pub fn wire_len(&self) -> usize {
        self.layout.kind.payload_offset() + 2 * self.layout.len
    }

    /// Writes the packet for this chunk and returns its length.
    pub fn encode(&self, packet: &mut [u8; PACKET_SIZE]) -> usize {
        let mut pos = 0;
        if self.layout.kind == ChunkKind::Header {
            packet[..XFER_HEADER_LEN].copy_from_slice(&XferHeader::new(self.total_bits).encode());
            pos = XFER_HEADER_LEN;
        }
        for (tms, tdi) in self.tms.iter().zip(self.tdi) {
            packet[pos] = *tms;
            packet[pos + 1] = *tdi;
            pos += 2;
        }
        pos
    }
}

/// Iterator over the chunks of one scan, see [`split`].
#[derive(Clone, Debug)]
pub struct Chunks<'a> {
    tms: &'a [u8],
    tdi: &'a [u8],
    total_bits: u32,
    bits_remaining: u32,
    offset: usize,
    next_kind: ChunkKind,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bits_remaining == 0 {
            return None;
        }
        let kind = self.next_kind;
        let num_bits = kind.bits_for(self.bits_remaining);
        let len = bytes_for_bits(num_bits);
        let range = self.offset..self.offset + len;
        let chunk = Chunk {
            layout: ChunkLayout {
                kind,
                offset: self.offset,
                len,
                num_bits,
            },
            total_bits: self.total_bits,
            tms: &self.tms[range.clone()],
            tdi: &self.tdi[range],
        };
        self.bits_remaining -= num_bits;
        self.offset += len;
        self.next_kind = ChunkKind::Continuation;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let continuation_bits = ChunkKind::Continuation.capacity_bits();
        let count = match (self.bits_remaining, self.next_kind) {
            (0, _) => 0,
            (bits, ChunkKind::Header) => {
                let rest = bits - ChunkKind::Header.bits_for(bits);
                1 + rest.div_ceil(continuation_bits) as usize
            }
            (bits, ChunkKind::Continuation) => bits.div_ceil(continuation_bits) as usize,
        };
        (count, Some(count))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Cuts a scan into packet-sized chunks.
///
/// `tms` and `tdi` must both hold exactly `ceil(num_bits / 8)` bytes.
pub fn split<'a>(num_bits: u32, tms: &'a [u8], tdi: &'a [u8]) -> Result<Chunks<'a>, WireError> {
    if num_bits == 0 {
        return Err(WireError::EmptyScan);
    }
    let expected = bytes_for_bits(num_bits);
    for vector in [tms, tdi] {
        if vector.len() != expected {
            return Err(WireError::VectorLength {
                expected,
                got: vector.len(),
            });
        }
    }
    Ok(Chunks {
        tms,
        tdi,
        total_bits: num_bits,
        bits_remaining: num_bits,
        offset: 0,
        next_kind: ChunkKind::Header,
    })
}

/// Collects per-chunk TDO responses into the result vector of a scan.
#[derive(Debug)]
pub struct TdoAssembler<'a> {
    out: &'a mut [u8],
    received: usize,
}

impl<'a> TdoAssembler<'a> {
    pub fn new(num_bits: u32, out: &'a mut [u8]) -> Result<TdoAssembler<'a>, WireError> {
        let needed = bytes_for_bits(num_bits);
        if out.len() < needed {
            return Err(WireError::OutputTooSmall {
                needed,
                got: out.len(),
            });
        }
        Ok(TdoAssembler {
            out: &mut out[..needed],
            received: 0,
        })
    }

    /// Stores the response to the chunk described by `layout`.
    pub fn place(&mut self, layout: &ChunkLayout, data: &[u8]) -> Result<(), WireError> {
        if data.len() != layout.len {
            return Err(WireError::ResponseLength {
                expected: layout.len,
                got: data.len(),
            });
        }
        let end = layout.offset + layout.len;
        if end > self.out.len() {
            return Err(WireError::OutputTooSmall {
                needed: end,
                got: self.out.len(),
            });
        }
        self.out[layout.offset..end].copy_from_slice(data);
        self.received += data.len();
        Ok(())
    }

    /// Number of TDO bytes stored so far.
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.out.len()
    }
}

/// Reassembles the TDO vector of a scan from its chunk responses and returns the number of
/// bytes written to `out`.
pub fn join<'r, I>(num_bits: u32, responses: I, out: &mut [u8]) -> Result<usize, WireError>
where
    I: IntoIterator<Item = (ChunkLayout, &'r [u8])>,
{
    let mut assembler = TdoAssembler::new(num_bits, out)?;
    for (layout, data) in responses {
        assembler.place(&layout, data)?;
    }
    Ok(assembler.received())
}
