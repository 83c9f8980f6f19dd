//! PN532 frame codec.
//!
//! Normal information frame:
//! `00 00 FF LEN LCS TFI PD0..PDn DCS 00`
//!
//! - `LEN` counts the TFI byte plus the payload, `LEN + LCS` is `0x00` mod 256
//! - `TFI` is `D4` from host to controller and `D5` back
//! - `TFI + PD0 + .. + PDn + DCS` is `0x00` mod 256
//!
//! ACK frame: `00 00 FF 00 FF 00`
//!
//! Every I2C read from the controller starts with a status byte. Bit 0 is set
//! once a frame is ready; until then the rest of the read is filler.

use serde::Serialize;
use thiserror::Error;

pub const PREAMBLE: u8 = 0x00;
pub const START_CODE: [u8; 2] = [0x00, 0xFF];
pub const POSTAMBLE: u8 = 0x00;

pub const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];
pub const NACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00];

/// Status byte bit set when the controller has a response ready
pub const I2C_READY: u8 = 0x01;

/// Largest payload a normal frame carries (LEN also counts the TFI byte)
pub const MAX_PAYLOAD: usize = 254;

/// TFI of the application-level error frame `00 00 FF 01 FF 7F 81 00`
const ERROR_TFI: u8 = 0x7F;

/// Frame identifier byte, tells who sent the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    HostToController = 0xD4,
    ControllerToHost = 0xD5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Payload-bearing information frame
    Data,
    /// Handshake-only acknowledgement
    Ack,
}

/// A message unit exchanged with the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    frame_type: FrameType,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD} byte frame limit")]
    PayloadTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty response")]
    Empty,
    #[error("controller not ready (status {0:#04x})")]
    NotReady(u8),
    #[error("no start code in response")]
    MissingStartCode,
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("length checksum mismatch (len {len:#04x}, lcs {lcs:#04x})")]
    LengthChecksum { len: u8, lcs: u8 },
    #[error("data checksum mismatch")]
    DataChecksum,
    #[error("unknown frame identifier {0:#04x}")]
    UnknownTfi(u8),
    #[error("controller sent NACK")]
    Nack,
    #[error("controller reported an application error")]
    ApplicationError,
    #[error("extended frames are not supported")]
    ExtendedFrame,
}

impl Frame {
    /// Information frame carrying `payload` (command code first).
    pub fn data(payload: impl Into<Vec<u8>>) -> Result<Self, FrameError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }
        Ok(Self {
            frame_type: FrameType::Data,
            payload,
        })
    }

    pub fn ack() -> Self {
        Self {
            frame_type: FrameType::Ack,
            payload: Vec::new(),
        }
    }

    /// Short payloads known at compile time, always within `MAX_PAYLOAD`
    pub(crate) fn command(payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            frame_type: FrameType::Data,
            payload: payload.to_vec(),
        }
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn is_ack(&self) -> bool {
        self.frame_type == FrameType::Ack
    }

    pub fn is_data(&self) -> bool {
        self.frame_type == FrameType::Data
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Serialize as sent by the host.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_as(Direction::HostToController)
    }

    pub fn encode_as(&self, direction: Direction) -> Vec<u8> {
        match self.frame_type {
            FrameType::Ack => ACK_FRAME.to_vec(),
            FrameType::Data => {
                let tfi = direction as u8;
                let len = (self.payload.len() + 1) as u8;
                let sum = self
                    .payload
                    .iter()
                    .fold(tfi, |acc, byte| acc.wrapping_add(*byte));

                let mut out = Vec::with_capacity(self.payload.len() + 8);
                out.push(PREAMBLE);
                out.extend_from_slice(&START_CODE);
                out.push(len);
                out.push(len.wrapping_neg());
                out.push(tfi);
                out.extend_from_slice(&self.payload);
                out.push(sum.wrapping_neg());
                out.push(POSTAMBLE);
                out
            }
        }
    }
}

/// Decode a raw frame. Leading preamble bytes and trailing padding are
/// ignored; anything malformed between them is an error.
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let start = bytes
        .windows(2)
        .position(|w| w == START_CODE)
        .ok_or(DecodeError::MissingStartCode)?;
    let body = &bytes[start + START_CODE.len()..];

    let (len, lcs) = match body {
        [len, lcs, ..] => (*len, *lcs),
        _ => {
            return Err(DecodeError::Truncated {
                needed: start + 4,
                available: bytes.len(),
            });
        }
    };

    match (len, lcs) {
        (0x00, 0xFF) => return Ok(Frame::ack()),
        (0xFF, 0x00) => return Err(DecodeError::Nack),
        (0xFF, 0xFF) => return Err(DecodeError::ExtendedFrame),
        _ => {}
    }
    if len == 0 || len.wrapping_add(lcs) != 0 {
        return Err(DecodeError::LengthChecksum { len, lcs });
    }

    let len = usize::from(len);
    // TFI + payload + DCS
    let frame = body.get(2..2 + len + 1).ok_or(DecodeError::Truncated {
        needed: start + 4 + len + 1,
        available: bytes.len(),
    })?;
    let (tfi_and_payload, dcs) = frame.split_at(len);
    let sum = tfi_and_payload
        .iter()
        .fold(dcs[0], |acc, byte| acc.wrapping_add(*byte));
    if sum != 0 {
        return Err(DecodeError::DataChecksum);
    }

    match tfi_and_payload[0] {
        ERROR_TFI if len == 1 => Err(DecodeError::ApplicationError),
        tfi if tfi == Direction::HostToController as u8
            || tfi == Direction::ControllerToHost as u8 =>
        {
            Ok(Frame {
                frame_type: FrameType::Data,
                payload: tfi_and_payload[1..].to_vec(),
            })
        }
        other => Err(DecodeError::UnknownTfi(other)),
    }
}

/// Decode one I2C read: status byte followed by a frame.
pub fn decode_response(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let (&status, rest) = bytes.split_first().ok_or(DecodeError::Empty)?;
    if status & I2C_READY == 0 {
        return Err(DecodeError::NotReady(status));
    }
    decode(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_encodes_to_fixed_bytes() {
        assert_eq!(Frame::ack().encode(), ACK_FRAME);
        assert_eq!(decode(&ACK_FRAME).unwrap(), Frame::ack());
    }

    #[test]
    fn sam_configuration_matches_datasheet_bytes() {
        let frame = Frame::data([0x14, 0x01, 0x01, 0x00]).unwrap();
        assert_eq!(
            frame.encode(),
            [0x00, 0x00, 0xFF, 0x05, 0xFB, 0xD4, 0x14, 0x01, 0x01, 0x00, 0x16, 0x00]
        );
    }

    #[test]
    fn data_frames_survive_the_codec() {
        for payload in [vec![0x02], vec![0x4A, 0x01, 0x00], vec![0xAB; MAX_PAYLOAD]] {
            let frame = Frame::data(payload).unwrap();
            assert_eq!(decode(&frame.encode()).unwrap(), frame);
            assert_eq!(
                decode(&frame.encode_as(Direction::ControllerToHost)).unwrap(),
                frame
            );
        }
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert_eq!(
            Frame::data(vec![0; MAX_PAYLOAD + 1]),
            Err(FrameError::PayloadTooLong(MAX_PAYLOAD + 1))
        );
    }

    #[test]
    fn tolerates_preamble_and_padding() {
        let mut bytes = vec![0x00, 0x00];
        bytes.extend(Frame::data([0x15]).unwrap().encode_as(Direction::ControllerToHost));
        bytes.extend([0x00; 32]);
        assert_eq!(decode(&bytes).unwrap().payload(), &[0x15]);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let bytes = Frame::data([0x4B, 0x01, 0x01]).unwrap().encode();
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }), "{err:?}");
    }

    #[test]
    fn checksum_errors_are_detected() {
        let mut bytes = Frame::data([0x03, 0x32, 0x01]).unwrap().encode();
        bytes[7] ^= 0xFF;
        assert_eq!(decode(&bytes), Err(DecodeError::DataChecksum));

        let mut bytes = Frame::data([0x03]).unwrap().encode();
        bytes[4] = 0x00;
        assert!(matches!(decode(&bytes), Err(DecodeError::LengthChecksum { .. })));
    }

    #[test]
    fn special_frames() {
        assert_eq!(decode(&NACK_FRAME), Err(DecodeError::Nack));
        assert_eq!(
            decode(&[0x00, 0x00, 0xFF, 0x01, 0xFF, 0x7F, 0x81, 0x00]),
            Err(DecodeError::ApplicationError)
        );
        assert_eq!(
            decode(&[0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x01, 0x00]),
            Err(DecodeError::ExtendedFrame)
        );
        assert_eq!(decode(&[0x00; 16]), Err(DecodeError::MissingStartCode));
    }

    #[test]
    fn unknown_tfi_is_rejected() {
        // LEN 2, TFI 0xAA, data 0x01, DCS 0x55
        let bytes = [0x00, 0x00, 0xFF, 0x02, 0xFE, 0xAA, 0x01, 0x55, 0x00];
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownTfi(0xAA)));
    }

    #[test]
    fn status_byte_gates_the_response() {
        let mut read = vec![0x00; 16];
        assert_eq!(decode_response(&read), Err(DecodeError::NotReady(0x00)));

        read[0] = I2C_READY;
        read[1..7].copy_from_slice(&ACK_FRAME);
        assert_eq!(decode_response(&read).unwrap(), Frame::ack());
        assert_eq!(decode_response(&[]), Err(DecodeError::Empty));
    }
}
