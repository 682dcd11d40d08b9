//! Interpreter for the command stream inside one USB OUT packet.
//!
//! A scan that does not fit into its header packet leaves the parser in
//! [`ParserState::AwaitingScanContinuation`]. In that state the next packet is consumed as raw
//! continuation payload without looking for opcodes. Chunk sizes are derived from
//! [`ChunkKind::bits_for`], the same function the host uses to cut the scan.
use xvcpico_wire::{
    Opcode, Signals, WRITE_COMMAND_LEN, XFER_HEADER_LEN, XferHeader, bytes_for_bits,
    chunk::{CONTINUATION_CHUNK_BYTES, ChunkKind},
};

use crate::{hal::JtagPins, usb::TdoSink};

/// Delay units held after every clock edge.
pub const DEFAULT_JTAG_DELAY: u32 = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParserState {
    Idle,
    AwaitingScanContinuation { bits_remaining: u32 },
}

/// What happened to a packet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PacketOutcome {
    /// The command stream ran up to STOP or to the end of the packet, or the final chunk of a
    /// scan was shifted.
    Completed,
    /// A chunk was shifted and the scan continues in the next packet.
    ScanPending { bits_remaining: u32 },
    /// An unknown opcode stopped processing of the rest of the packet.
    UnsupportedOpcode { opcode: u8, offset: usize },
    /// A command at `offset` was cut off by the end of the packet.
    Truncated { offset: usize },
}

#[derive(Debug)]
pub struct CommandParser {
    state: ParserState,
    jtag_delay: u32,
    tdo: [u8; CONTINUATION_CHUNK_BYTES],
}

impl Default for CommandParser {
    fn default() -> Self {
        CommandParser::new(DEFAULT_JTAG_DELAY)
    }
}

impl CommandParser {
    pub fn new(jtag_delay: u32) -> CommandParser {
        CommandParser {
            state: ParserState::Idle,
            jtag_delay,
            tdo: [0; CONTINUATION_CHUNK_BYTES],
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Bits of the current scan that have not been shifted yet.
    pub fn bits_remaining(&self) -> u32 {
        match self.state {
            ParserState::Idle => 0,
            ParserState::AwaitingScanContinuation { bits_remaining } => bits_remaining,
        }
    }

    /// Runs the commands in `packet`. TDO of a shifted chunk is handed to `sink` before this
    /// returns.
    pub fn handle_packet<P, S>(
        &mut self,
        packet: &[u8],
        pins: &mut P,
        sink: &mut S,
    ) -> Result<PacketOutcome, P::Error>
    where
        P: JtagPins,
        S: TdoSink,
    {
        if let ParserState::AwaitingScanContinuation { bits_remaining } = self.state {
            log::trace!(
                "Continuing scan: bits_remaining={}, packet_len={}",
                bits_remaining,
                packet.len()
            );
            return self.shift(ChunkKind::Continuation, bits_remaining, packet, pins, sink);
        }

        let mut pos = 0;
        while let Some(&byte) = packet.get(pos) {
            if byte == Opcode::Stop as u8 {
                break;
            }
            match Opcode::from_byte(byte) {
                Some(Opcode::Xfer) => {
                    let header = match XferHeader::decode(&packet[pos..]) {
                        Ok(header) => header,
                        Err(e) => {
                            log::warn!("Dropping packet at offset {}: {}", pos, e);
                            return Ok(PacketOutcome::Truncated { offset: pos });
                        }
                    };
                    log::trace!("XFER: num_bits={}", header.num_bits);
                    // Anything behind the payload belongs to no command.
                    return self.shift(
                        ChunkKind::Header,
                        header.num_bits,
                        &packet[pos + XFER_HEADER_LEN..],
                        pins,
                        sink,
                    );
                }
                Some(Opcode::Write) => {
                    let Some(args) = packet.get(pos + 1..pos + WRITE_COMMAND_LEN) else {
                        log::warn!("Dropping truncated WRITE at offset {}", pos);
                        return Ok(PacketOutcome::Truncated { offset: pos });
                    };
                    let signals = Signals::from_write_args([args[0], args[1], args[2]]);
                    log::trace!("WRITE: {:?}", signals);
                    pins.set_signals(signals)?;
                    pins.delay_cycles(self.jtag_delay);
                    pos += WRITE_COMMAND_LEN;
                }
                None | Some(Opcode::Stop) => {
                    log::warn!("Unsupported opcode 0x{:02x} at offset {}", byte, pos);
                    return Ok(PacketOutcome::UnsupportedOpcode { opcode: byte, offset: pos });
                }
            }
        }
        Ok(PacketOutcome::Completed)
    }

    fn shift<P, S>(
        &mut self,
        kind: ChunkKind,
        bits_remaining: u32,
        payload: &[u8],
        pins: &mut P,
        sink: &mut S,
    ) -> Result<PacketOutcome, P::Error>
    where
        P: JtagPins,
        S: TdoSink,
    {
        let num_bits = kind.bits_for(bits_remaining);
        let len = bytes_for_bits(num_bits);
        if payload.len() < 2 * len {
            log::warn!(
                "Chunk payload has {} bytes, expected {}; missing bytes shift as zero",
                payload.len(),
                2 * len
            );
        }

        shift_chunk(pins, self.jtag_delay, num_bits, payload, &mut self.tdo[..len])?;
        if len > 0 {
            sink.send_tdo(&self.tdo[..len]);
        }

        let bits_remaining = bits_remaining - num_bits;
        if bits_remaining > 0 {
            self.state = ParserState::AwaitingScanContinuation { bits_remaining };
            Ok(PacketOutcome::ScanPending { bits_remaining })
        } else {
            self.state = ParserState::Idle;
            Ok(PacketOutcome::Completed)
        }
    }
}

/// Shifts `num_bits` bits of interleaved TMS/TDI `payload` through the pins and stores the
/// sampled TDO bits LSB first into `tdo`, which must hold `ceil(num_bits / 8)` bytes.
///
/// Only the low `num_bits % 8` bits of the last byte are clocked when `num_bits` is not a
/// multiple of eight. Payload bytes past the end of `payload` read as zero.
pub fn shift_chunk<P: JtagPins>(
    pins: &mut P,
    jtag_delay: u32,
    num_bits: u32,
    payload: &[u8],
    tdo: &mut [u8],
) -> Result<(), P::Error> {
    let last = tdo.len();
    for (j, out) in tdo.iter_mut().enumerate() {
        let mut tms = payload.get(2 * j).copied().unwrap_or(0);
        let mut tdi = payload.get(2 * j + 1).copied().unwrap_or(0);
        let bits = if j + 1 == last && num_bits % 8 != 0 {
            num_bits % 8
        } else {
            8
        };

        let mut byte = 0u8;
        for i in 0..bits {
            let (tms_bit, tdi_bit) = (tms & 1 != 0, tdi & 1 != 0);
            pins.set_signals(Signals::new(false, tms_bit, tdi_bit))?;
            pins.delay_cycles(jtag_delay);
            byte |= (pins.read_signal()? as u8) << i;
            pins.set_signals(Signals::new(true, tms_bit, tdi_bit))?;
            pins.delay_cycles(jtag_delay);
            tms >>= 1;
            tdi >>= 1;
        }
        *out = byte;
    }
    Ok(())
}
