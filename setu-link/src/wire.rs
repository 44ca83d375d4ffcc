//! Wire format: length-prefixed JSON envelopes
//!
//! Both links (TCP and serial) carry the same framing:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────┐
//! │ Length (4 bytes) │ JSON envelope (UTF-8)                    │
//! │ Big-endian u32   │ {"seq": 12, "type": "...", "data": ...}  │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Envelope
//!
//! | field  | type      | notes                                       |
//! |--------|-----------|---------------------------------------------|
//! | `seq`  | u64, opt. | set on every outbound frame                 |
//! | `type` | string    | message kind, see [`crate::messages`]       |
//! | `data` | any JSON  | kind-specific payload, `null` when absent   |
//!
//! The peer acknowledges each outbound frame with
//! `{"type": "ack", "data": {"seq": N}}`.
//!
//! ## Error Handling
//!
//! - **Oversized frame** (> 4 MiB): connection closed
//! - **Malformed JSON / unknown type**: frame logged and discarded, connection remains open

use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Length prefix size
pub const HEADER_SIZE: usize = 4;

/// Largest accepted payload
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// One framed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            seq: None,
            kind: kind.into(),
            data,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Acknowledgement for an outbound frame
    pub fn ack(seq: u64) -> Self {
        Self::new("ack", json!({ "seq": seq }))
    }

    /// Serialize and frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(self)?;
        encode_frame(&payload)
    }

    /// Parse one frame payload
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Prefix `payload` with its big-endian length
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(LinkError::Protocol(format!(
            "Message too large: {} bytes",
            payload.len()
        )));
    }
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Incremental frame splitter for a byte stream.
///
/// Links deliver arbitrary slices; bytes are buffered until a whole frame is
/// present.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Next complete payload, `Ok(None)` when more bytes are needed.
    ///
    /// An oversized length is unrecoverable for the stream.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }
        let mut len_buf = [0u8; HEADER_SIZE];
        len_buf.copy_from_slice(&self.buffer[..HEADER_SIZE]);
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(LinkError::Protocol(format!("Message too large: {} bytes", len)));
        }
        if self.buffer.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        let payload = self.buffer[HEADER_SIZE..HEADER_SIZE + len].to_vec();
        self.buffer.drain(..HEADER_SIZE + len);
        Ok(Some(payload))
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_split_across_reads() {
        let frame = Envelope::new("version", json!("20240101"))
            .with_seq(3)
            .encode()
            .unwrap();
        let mut decoder = FrameDecoder::new();

        decoder.push(&frame[..2]);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.push(&frame[2..7]);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.push(&frame[7..]);

        let payload = decoder.next_frame().unwrap().unwrap();
        let envelope = Envelope::decode(&payload).unwrap();
        assert_eq!(envelope.seq, Some(3));
        assert_eq!(envelope.kind, "version");
        assert_eq!(envelope.data, json!("20240101"));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut bytes = Envelope::ack(1).encode().unwrap();
        bytes.extend(Envelope::ack(2).encode().unwrap());
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);

        let first = Envelope::decode(&decoder.next_frame().unwrap().unwrap()).unwrap();
        let second = Envelope::decode(&decoder.next_frame().unwrap().unwrap()).unwrap();
        assert_eq!(first.data["seq"], 1);
        assert_eq!(second.data["seq"], 2);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        assert!(matches!(decoder.next_frame(), Err(LinkError::Protocol(_))));
    }

    #[test]
    fn test_missing_data_and_seq() {
        let envelope = Envelope::decode(br#"{"type":"req_name"}"#).unwrap();
        assert_eq!(envelope.seq, None);
        assert_eq!(envelope.data, Value::Null);

        let text = serde_json::to_string(&Envelope::new("req_name", Value::Null)).unwrap();
        assert!(!text.contains("seq"));
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(Envelope::decode(b"{not json").is_err());
        assert!(Envelope::decode(br#"{"data": 1}"#).is_err());
    }
}
