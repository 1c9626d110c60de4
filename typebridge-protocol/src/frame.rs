//! Outbound framing, bridge to client
//!
//! Frame format:
//! - `0x01` + 1 byte: byte the typewriter sent outside any command
//! - `0x02` + 4 bytes: keyboard snapshot, most significant byte first
//! - `0x80 | len` + `len` bytes: response to a command
//!
//! The tags `0x01` and `0x02` sit below `0x80`, so they never collide with a
//! response header.

use heapless::Vec;

use crate::command::{KeyboardSnapshot, Response, RESPONSE_CAPACITY};

/// Tag of an unsolicited device byte frame
pub const TAG_DEVICE_BYTE: u8 = 0x01;

/// Tag of a keyboard snapshot frame
pub const TAG_KEYBOARD: u8 = 0x02;

/// High bit marking a response header; the low seven bits are the length
pub const RESPONSE_FLAG: u8 = 0x80;

/// Largest encoded frame (a full response)
pub const MAX_FRAME_SIZE: usize = 1 + RESPONSE_CAPACITY;

/// Errors from frame encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Leading byte is neither a known tag nor a response header
    UnknownTag(u8),
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// One frame on the bridge-to-client stream
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeFrame {
    /// Byte the typewriter sent on its own
    DeviceByte(u8),
    /// Keyboard matrix scan result
    Keyboard(KeyboardSnapshot),
    /// Answer to a command
    Response(Response),
}

impl BridgeFrame {
    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        match self {
            BridgeFrame::DeviceByte(_) => 2,
            BridgeFrame::Keyboard(_) => 5,
            BridgeFrame::Response(response) => 1 + response.len(),
        }
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        if buffer.len() < len {
            return Err(FrameError::BufferTooSmall);
        }

        match self {
            BridgeFrame::DeviceByte(byte) => {
                buffer[0] = TAG_DEVICE_BYTE;
                buffer[1] = *byte;
            }
            BridgeFrame::Keyboard(snapshot) => {
                buffer[0] = TAG_KEYBOARD;
                buffer[1..5].copy_from_slice(&snapshot.to_be_bytes());
            }
            BridgeFrame::Response(response) => {
                // Length fits in seven bits, Response caps it at 127
                buffer[0] = RESPONSE_FLAG | response.len() as u8;
                buffer[1..len].copy_from_slice(response.as_slice());
            }
        }

        Ok(len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        // MAX_FRAME_SIZE holds every frame
        let len = self.encode(&mut buffer).unwrap_or(0);
        let mut vec = Vec::new();
        let _ = vec.extend_from_slice(&buffer[..len]);
        vec
    }
}

/// State machine decoding the bridge-to-client stream
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    buffer: Vec<u8, RESPONSE_CAPACITY>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for a tag or response header
    WaitingForTag,
    /// Got `0x01`, waiting for the device byte
    DeviceByte,
    /// Got `0x02`, collecting four snapshot bytes
    Keyboard,
    /// Got a response header, collecting this many payload bytes
    Response(usize),
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::WaitingForTag,
            buffer: Vec::new(),
        }
    }

    /// Reset the decoder state
    pub fn reset(&mut self) {
        self.state = DecodeState::WaitingForTag;
        self.buffer.clear();
    }

    /// Whether the decoder is between frames
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::WaitingForTag
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(frame))` when a frame is complete, `Ok(None)` when
    /// more bytes are needed. An unknown leading byte is reported and
    /// dropped; decoding resumes with the next byte.
    pub fn feed(&mut self, byte: u8) -> Result<Option<BridgeFrame>, FrameError> {
        match self.state {
            DecodeState::WaitingForTag => match byte {
                TAG_DEVICE_BYTE => {
                    self.state = DecodeState::DeviceByte;
                    Ok(None)
                }
                TAG_KEYBOARD => {
                    self.buffer.clear();
                    self.state = DecodeState::Keyboard;
                    Ok(None)
                }
                header if header & RESPONSE_FLAG != 0 => {
                    let len = (header & !RESPONSE_FLAG) as usize;
                    self.buffer.clear();
                    if len == 0 {
                        return Ok(Some(BridgeFrame::Response(Response::new())));
                    }
                    self.state = DecodeState::Response(len);
                    Ok(None)
                }
                other => Err(FrameError::UnknownTag(other)),
            },
            DecodeState::DeviceByte => {
                self.reset();
                Ok(Some(BridgeFrame::DeviceByte(byte)))
            }
            DecodeState::Keyboard => {
                let _ = self.buffer.push(byte);
                if self.buffer.len() < 4 {
                    return Ok(None);
                }
                let bytes = [self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3]];
                self.reset();
                Ok(Some(BridgeFrame::Keyboard(KeyboardSnapshot::from_be_bytes(
                    bytes,
                ))))
            }
            DecodeState::Response(len) => {
                // len <= 127 by construction, so the push cannot fail
                let _ = self.buffer.push(byte);
                if self.buffer.len() < len {
                    return Ok(None);
                }
                let response = Response::from_slice(&self.buffer).unwrap_or_default();
                self.reset();
                Ok(Some(BridgeFrame::Response(response)))
            }
        }
    }

    /// Feed multiple bytes to the decoder
    ///
    /// Returns the first complete frame and the number of bytes consumed.
    /// Bytes after a complete frame are not consumed.
    pub fn feed_bytes(
        &mut self,
        bytes: &[u8],
    ) -> (usize, Result<Option<BridgeFrame>, FrameError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.feed(byte) {
                Ok(None) => continue,
                result => return (i + 1, result),
            }
        }
        (bytes.len(), Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: &BridgeFrame) -> Vec<u8, MAX_FRAME_SIZE> {
        frame.encode_to_vec()
    }

    #[test]
    fn test_encode_device_byte() {
        let encoded = encode(&BridgeFrame::DeviceByte(0x42));
        assert_eq!(&encoded[..], &[0x01, 0x42]);
    }

    #[test]
    fn test_encode_keyboard_msb_first() {
        let snapshot = KeyboardSnapshot::from_lines(&[3, 17]);
        let encoded = encode(&BridgeFrame::Keyboard(snapshot));
        assert_eq!(&encoded[..], &[0x02, 0x00, 0x02, 0x00, 0x08]);
    }

    #[test]
    fn test_encode_empty_response() {
        let encoded = encode(&BridgeFrame::Response(Response::new()));
        assert_eq!(&encoded[..], &[0x80]);
    }

    #[test]
    fn test_encode_multi_byte_response() {
        let response = Response::from_slice(&[0xA4, 0x10, 0x20]).unwrap();
        let encoded = encode(&BridgeFrame::Response(response));
        assert_eq!(&encoded[..], &[0x83, 0xA4, 0x10, 0x20]);
    }

    #[test]
    fn test_encode_full_response() {
        let response = Response::from_slice(&[0x55; RESPONSE_CAPACITY]).unwrap();
        let encoded = encode(&BridgeFrame::Response(response));
        assert_eq!(encoded.len(), MAX_FRAME_SIZE);
        assert_eq!(encoded[0], 0xFF);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buffer = [0u8; 4];
        let frame = BridgeFrame::Keyboard(KeyboardSnapshot(1));
        assert_eq!(frame.encode(&mut buffer), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_decode_stream() {
        let stream = [0x01, 0x42, 0x81, 0x05, 0x02, 0x00, 0x02, 0x00, 0x08, 0x80];
        let mut decoder = FrameDecoder::new();
        let mut frames: Vec<BridgeFrame, 4> = Vec::new();
        for &byte in &stream {
            if let Some(frame) = decoder.feed(byte).unwrap() {
                frames.push(frame).unwrap();
            }
        }

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0], BridgeFrame::DeviceByte(0x42));
        assert_eq!(
            frames[1],
            BridgeFrame::Response(Response::from_slice(&[0x05]).unwrap())
        );
        assert_eq!(
            frames[2],
            BridgeFrame::Keyboard(KeyboardSnapshot::from_lines(&[3, 17]))
        );
        assert_eq!(frames[3], BridgeFrame::Response(Response::new()));
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_decode_tag_bytes_inside_payload() {
        // 0x01 and 0x02 inside a payload are data, not tags
        let mut decoder = FrameDecoder::new();
        let (used, result) = decoder.feed_bytes(&[0x82, 0x01, 0x02, 0x01, 0x07]);
        assert_eq!(used, 3);
        assert_eq!(
            result,
            Ok(Some(BridgeFrame::Response(
                Response::from_slice(&[0x01, 0x02]).unwrap()
            )))
        );
    }

    #[test]
    fn test_decode_unknown_tag_resyncs() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(0x00), Err(FrameError::UnknownTag(0x00)));
        assert_eq!(decoder.feed(0x7F), Err(FrameError::UnknownTag(0x7F)));
        assert!(decoder.is_idle());
        assert_eq!(decoder.feed(0x01), Ok(None));
        assert_eq!(decoder.feed(0x03), Ok(Some(BridgeFrame::DeviceByte(0x03))));
    }

    #[test]
    fn test_decoder_reset_drops_partial_frame() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(0x02), Ok(None));
        assert_eq!(decoder.feed(0xAA), Ok(None));
        decoder.reset();
        assert_eq!(decoder.feed(0x01), Ok(None));
        assert_eq!(decoder.feed(0x09), Ok(Some(BridgeFrame::DeviceByte(0x09))));
    }
}
