//! Drives one scan over the USB transport.
//!
//! The probe answers every chunk with its TDO as soon as the chunk is shifted. The controller
//! therefore sends chunk `k` before collecting the answer to chunk `k - 1`, so the probe never
//! waits for the host between two chunks of a scan:
//!
//! ```text
//! OUT  WRITE(capture start)  chunk0  chunk1         chunk2         WRITE(capture end)
//! IN                                        tdo0           tdo1  tdo2
//! ```
use xvcpico_wire::{
    PACKET_SIZE, Signals, bytes_for_bits,
    chunk::{ChunkLayout, TdoAssembler, split},
};

use crate::{error::TransportError, transport::UsbTransport};

/// Levels written right before the first chunk of a scan.
pub const CAPTURE_START: Signals = Signals::new(false, true, true);

/// Levels written after the last TDO of a scan was received.
pub const CAPTURE_END: Signals = Signals::new(false, true, false);

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PipelineMode {
    /// Send the next chunk before receiving the result of the previous one.
    #[default]
    Overlapped,
    /// Wait for each chunk's result before sending the next chunk.
    Sequential,
}

pub struct PipelineController<T: UsbTransport> {
    transport: T,
    mode: PipelineMode,
}

impl<T: UsbTransport> PipelineController<T> {
    pub fn new(transport: T, mode: PipelineMode) -> PipelineController<T> {
        PipelineController { transport, mode }
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn capture_start(&mut self) -> Result<(), TransportError> {
        self.transport.write_packet(&CAPTURE_START.encode_write())
    }

    pub fn capture_end(&mut self) -> Result<(), TransportError> {
        self.transport.write_packet(&CAPTURE_END.encode_write())
    }

    /// Shifts `num_bits` bits through the probe and returns `ceil(num_bits / 8)` bytes of TDO.
    ///
    /// `tms` and `tdi` must each be `ceil(num_bits / 8)` bytes long and `num_bits` must not be
    /// zero. On error nothing of the scan is returned; the probe may have shifted part of it.
    pub fn shift(
        &mut self,
        num_bits: u32,
        tms: &[u8],
        tdi: &[u8],
    ) -> Result<Box<[u8]>, TransportError> {
        let chunks = split(num_bits, tms, tdi)?;
        log::trace!(
            "Shifting {} bits in {} chunks ({:?})",
            num_bits,
            chunks.len(),
            self.mode
        );
        let mut tdo = vec![0u8; bytes_for_bits(num_bits)].into_boxed_slice();
        let mut assembler = TdoAssembler::new(num_bits, &mut tdo)?;

        self.capture_start()?;
        let mut packet = [0u8; PACKET_SIZE];
        let mut in_flight: Option<ChunkLayout> = None;
        for chunk in chunks {
            let layout = chunk.layout();
            let len = chunk.encode(&mut packet);
            log::trace!(
                "Sending {:?} chunk: offset={}, bytes={}, bits={}",
                layout.kind,
                layout.offset,
                layout.len,
                layout.num_bits
            );
            self.transport.write_packet(&packet[..len])?;

            match self.mode {
                PipelineMode::Overlapped => {
                    if let Some(previous) = in_flight.replace(layout) {
                        self.receive(&previous, &mut assembler)?;
                    }
                }
                PipelineMode::Sequential => self.receive(&layout, &mut assembler)?,
            }
        }
        if let Some(last) = in_flight {
            self.receive(&last, &mut assembler)?;
        }
        debug_assert!(assembler.is_complete());
        self.capture_end()?;

        Ok(tdo)
    }

    fn receive(
        &mut self,
        layout: &ChunkLayout,
        assembler: &mut TdoAssembler<'_>,
    ) -> Result<(), TransportError> {
        let mut buf = [0u8; PACKET_SIZE];
        let got = self.transport.read_packet(&mut buf)?;
        if got != layout.len {
            return Err(TransportError::ShortRead {
                expected: layout.len,
                got,
            });
        }
        log::trace!(
            "Received TDO for offset {}: {:02x?}",
            layout.offset,
            &buf[..got]
        );
        assembler.place(layout, &buf[..got])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;

    use super::*;
    use xvcpico_firmware::{
        loopback::{LoopbackPins, LoopbackSource},
        parser::{CommandParser, ParserState},
        usb::TdoSink,
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Write(usize),
        Read(usize),
    }

    #[derive(Default)]
    struct Answers(VecDeque<Vec<u8>>);

    impl TdoSink for Answers {
        fn send_tdo(&mut self, tdo: &[u8]) {
            self.0.push_back(tdo.to_vec());
        }
    }

    /// Runs every OUT packet through the probe's parser right away.
    struct Device {
        parser: CommandParser,
        pins: LoopbackPins,
        answers: Answers,
        ops: Vec<Op>,
        fail_write_after: Option<usize>,
    }

    impl Device {
        fn new(source: LoopbackSource) -> Device {
            Device {
                parser: CommandParser::default(),
                pins: LoopbackPins::new(source),
                answers: Answers::default(),
                ops: Vec::new(),
                fail_write_after: None,
            }
        }
    }

    impl UsbTransport for Device {
        fn write_packet(&mut self, packet: &[u8]) -> Result<(), TransportError> {
            let writes = self.ops.iter().filter(|op| matches!(op, Op::Write(_))).count();
            if self.fail_write_after == Some(writes) {
                return Err(TransportError::Disconnected);
            }
            self.ops.push(Op::Write(packet.len()));
            self.parser
                .handle_packet(packet, &mut self.pins, &mut self.answers)
                .unwrap();
            Ok(())
        }

        fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let tdo = self.answers.0.pop_front().ok_or(TransportError::ShortRead {
                expected: 1,
                got: 0,
            })?;
            buf[..tdo.len()].copy_from_slice(&tdo);
            self.ops.push(Op::Read(tdo.len()));
            Ok(tdo.len())
        }
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(37).wrapping_add(seed))
            .collect()
    }

    fn masked(mut bytes: Vec<u8>, num_bits: u32) -> Vec<u8> {
        if num_bits % 8 != 0 {
            let last = bytes.len() - 1;
            bytes[last] &= (1u8 << (num_bits % 8)) - 1;
        }
        bytes
    }

    #[test]
    fn loopback_returns_driven_line() {
        for num_bits in [1, 7, 8, 9, 127, 128, 129, 1000] {
            let len = bytes_for_bits(num_bits);
            let (tms, tdi) = (pattern(len, 3), pattern(len, 200));
            for (source, expected) in [
                (LoopbackSource::Tdi, &tdi),
                (LoopbackSource::Tms, &tms),
            ] {
                let mut controller =
                    PipelineController::new(Device::new(source), PipelineMode::Overlapped);
                let tdo = controller.shift(num_bits, &tms, &tdi).unwrap();
                assert_eq!(
                    tdo.to_vec(),
                    masked(expected.clone(), num_bits),
                    "{} bits from {:?}",
                    num_bits,
                    source
                );
                let device = controller.into_inner();
                assert_eq!(device.pins.rising_edges(), num_bits);
                assert_eq!(device.parser.state(), ParserState::Idle);
            }
        }
    }

    #[test]
    fn overlapped_sends_ahead_of_reads() {
        // 49 bytes: header (16), continuation (32), final (1).
        let tms = pattern(49, 1);
        let tdi = pattern(49, 2);
        let mut controller =
            PipelineController::new(Device::new(LoopbackSource::Tdi), PipelineMode::Overlapped);
        controller.shift(49 * 8, &tms, &tdi).unwrap();
        assert_eq!(
            controller.transport().ops,
            vec![
                Op::Write(5),
                Op::Write(37),
                Op::Write(64),
                Op::Read(16),
                Op::Write(2),
                Op::Read(32),
                Op::Read(1),
                Op::Write(5),
            ]
        );
    }

    #[test]
    fn sequential_reads_after_each_write() {
        let tms = pattern(49, 1);
        let tdi = pattern(49, 2);
        let mut controller =
            PipelineController::new(Device::new(LoopbackSource::Tdi), PipelineMode::Sequential);
        controller.shift(49 * 8, &tms, &tdi).unwrap();
        assert_eq!(
            controller.transport().ops,
            vec![
                Op::Write(5),
                Op::Write(37),
                Op::Read(16),
                Op::Write(64),
                Op::Read(32),
                Op::Write(2),
                Op::Read(1),
                Op::Write(5),
            ]
        );
    }

    #[test]
    fn overlapped_and_sequential_agree() {
        for num_bits in [1, 128, 129, 385, 2000] {
            let len = bytes_for_bits(num_bits);
            let (tms, tdi) = (pattern(len, 9), pattern(len, 77));
            let results: Vec<_> = [PipelineMode::Overlapped, PipelineMode::Sequential]
                .into_iter()
                .map(|mode| {
                    PipelineController::new(Device::new(LoopbackSource::Tms), mode)
                        .shift(num_bits, &tms, &tdi)
                        .unwrap()
                })
                .collect();
            assert_eq!(results[0], results[1], "{} bits", num_bits);
        }
    }

    #[test]
    fn capture_bracket_packets() {
        let mut controller =
            PipelineController::new(Device::new(LoopbackSource::Tdi), PipelineMode::Overlapped);
        assert_eq!(CAPTURE_START.encode_write(), [0x04, 0, 1, 1, 0x00]);
        assert_eq!(CAPTURE_END.encode_write(), [0x04, 0, 1, 0, 0x00]);
        controller.shift(8, &[0x00], &[0xFF]).unwrap();
        // Capture end leaves TDI low with TMS high.
        assert_eq!(controller.transport().pins.signals(), CAPTURE_END);
    }

    #[test]
    fn transport_failure_aborts_scan() {
        let tms = pattern(64, 0);
        let tdi = pattern(64, 1);
        let mut device = Device::new(LoopbackSource::Tdi);
        // Capture start and header chunk go out, the continuation does not.
        device.fail_write_after = Some(2);
        let mut controller = PipelineController::new(device, PipelineMode::Overlapped);
        match controller.shift(64 * 8, &tms, &tdi) {
            Err(TransportError::Disconnected) => {}
            other => panic!("expected Disconnected, got {:?}", other),
        }
    }

    #[test]
    fn wrong_vector_length_is_rejected() {
        let mut controller =
            PipelineController::new(Device::new(LoopbackSource::Tdi), PipelineMode::Overlapped);
        assert!(matches!(
            controller.shift(16, &[0], &[0, 0]),
            Err(TransportError::Wire(_))
        ));
        assert!(controller.transport().ops.is_empty());
    }
}
