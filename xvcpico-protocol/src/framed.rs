//! `tokio-util` decoder for incremental reading of client commands.
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::{
    codec::Header,
    error::ReadError,
    protocol::{Message, XvcInfo},
};

/// Splits a byte stream into [`Message`]s. Commands may arrive in arbitrary fragments; a
/// `shift:` is only returned once both vectors are complete.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    buffer_size: usize,
}

impl MessageDecoder {
    pub fn new(buffer_size: usize) -> MessageDecoder {
        MessageDecoder { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        MessageDecoder::new(XvcInfo::default().buffer_size() as usize)
    }
}

impl Decoder for MessageDecoder {
    type Item = Message;
    type Error = ReadError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ReadError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let header_len = Message::header_len(&src[..2])?;
        if src.len() < header_len {
            src.reserve(header_len - src.len());
            return Ok(None);
        }

        match Message::parse_header(&src[..header_len], self.buffer_size)? {
            Header::Complete(message) => {
                src.advance(header_len);
                Ok(Some(message))
            }
            Header::Shift {
                num_bits,
                num_bytes,
            } => {
                let frame_len = header_len + 2 * num_bytes;
                if src.len() < frame_len {
                    src.reserve(frame_len - src.len());
                    return Ok(None);
                }
                let frame = src.split_to(frame_len);
                let (tms, tdi) = frame[header_len..].split_at(num_bytes);
                Ok(Some(Message::Shift {
                    num_bits,
                    tms: Box::from(tms),
                    tdi: Box::from(tdi),
                }))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn shift_bytes(num_bits: u32, tms: &[u8], tdi: &[u8]) -> Vec<u8> {
        let mut data = b"shift:".to_vec();
        data.extend_from_slice(&num_bits.to_le_bytes());
        data.extend_from_slice(tms);
        data.extend_from_slice(tdi);
        data
    }

    #[test]
    fn waits_for_complete_shift() {
        let data = shift_bytes(12, &[0x01, 0x02], &[0x03, 0x04]);
        let mut decoder = MessageDecoder::default();
        let mut buf = BytesMut::new();

        for byte in &data[..data.len() - 1] {
            buf.extend_from_slice(&[*byte]);
            assert!(decoder.decode(&mut buf).unwrap().is_none());
        }
        buf.extend_from_slice(&data[data.len() - 1..]);
        match decoder.decode(&mut buf).unwrap() {
            Some(Message::Shift { num_bits, tms, tdi }) => {
                assert_eq!(num_bits, 12);
                assert_eq!(&*tms, &[0x01, 0x02]);
                assert_eq!(&*tdi, &[0x03, 0x04]);
            }
            other => panic!("expected Shift, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_back_to_back_commands() {
        let mut buf = BytesMut::from(&b"getinfo:settck:\x0a\x00\x00\x00"[..]);
        let mut decoder = MessageDecoder::default();
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Message::GetInfo));
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Message::SetTck { period_ns: 10 })
        );
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn oversize_shift_fails_on_header() {
        let mut buf = BytesMut::from(&shift_bytes(64 * 8 + 1, &[], &[])[..]);
        let mut decoder = MessageDecoder::new(128);
        match decoder.decode(&mut buf) {
            Err(ReadError::TooManyBytes { max: 128, got: 130 }) => {}
            other => panic!("expected TooManyBytes, got {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut buf = BytesMut::from(&b"debug:"[..]);
        let mut decoder = MessageDecoder::default();
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(ReadError::InvalidCommandPrefix(_))
        ));
    }
}
