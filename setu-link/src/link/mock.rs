//! Mock link and connector for testing
//!
//! [`MockLink`] plays the robot side of a connection: tests inject inbound
//! envelopes and inspect what the client sent. With auto-ack enabled every
//! sequenced frame is acknowledged immediately.

use super::{Connector, Link};
use crate::error::{LinkError, Result};
use crate::wire::{Envelope, FrameDecoder};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Simulated poll timeout for an empty read buffer
const MOCK_READ_POLL: Duration = Duration::from_millis(2);

/// Mock connection; clones share state
#[derive(Clone)]
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
}

struct MockLinkInner {
    read_buffer: VecDeque<u8>,
    decoder: FrameDecoder,
    sent: Vec<Envelope>,
    auto_ack: bool,
    broken: bool,
    closed: bool,
}

impl MockLink {
    /// Peer that acknowledges every frame
    pub fn new() -> Self {
        MockLink {
            inner: Arc::new(Mutex::new(MockLinkInner {
                read_buffer: VecDeque::new(),
                decoder: FrameDecoder::new(),
                sent: Vec::new(),
                auto_ack: true,
                broken: false,
                closed: false,
            })),
        }
    }

    /// Peer that never acknowledges
    pub fn silent() -> Self {
        let link = Self::new();
        link.set_auto_ack(false);
        link
    }

    pub fn set_auto_ack(&self, enabled: bool) {
        self.inner.lock().auto_ack = enabled;
    }

    /// Inject an inbound envelope
    pub fn inject(&self, kind: &str, data: Value) {
        if let Ok(frame) = Envelope::new(kind, data).encode() {
            self.inject_raw(&frame);
        }
    }

    /// Inject raw bytes, framed or not
    pub fn inject_raw(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Make the connection fail as a reset socket would
    pub fn break_link(&self) {
        self.inner.lock().broken = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// All envelopes the client wrote
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner.lock().sent.clone()
    }

    /// Envelopes of one kind the client wrote
    pub fn sent_of(&self, kind: &str) -> Vec<Envelope> {
        self.inner
            .lock()
            .sent
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    fn failure(inner: &MockLinkInner) -> Option<LinkError> {
        if inner.broken {
            Some(LinkError::Io(ErrorKind::ConnectionReset.into()))
        } else if inner.closed {
            Some(LinkError::Io(ErrorKind::NotConnected.into()))
        } else {
            None
        }
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Link for MockLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        {
            let mut inner = self.inner.lock();
            if let Some(e) = Self::failure(&inner) {
                return Err(e);
            }
            let available = inner.read_buffer.len().min(buffer.len());
            if available > 0 {
                for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
                    *slot = byte;
                }
                return Ok(available);
            }
        }
        thread::sleep(MOCK_READ_POLL);
        Ok(0)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(e) = Self::failure(&inner) {
            return Err(e);
        }
        inner.decoder.push(data);
        while let Some(payload) = inner.decoder.next_frame()? {
            let envelope = Envelope::decode(&payload)?;
            if inner.auto_ack
                && let Some(seq) = envelope.seq
            {
                let ack = Envelope::ack(seq).encode()?;
                inner.read_buffer.extend(ack);
            }
            inner.sent.push(envelope);
        }
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Link>> {
        Ok(Box::new(self.clone()))
    }

    fn shutdown(&self) {
        self.inner.lock().closed = true;
    }

    fn peer(&self) -> String {
        "mock".to_string()
    }
}

/// Hands out scripted connection outcomes in order.
///
/// When the script is exhausted every attempt is refused.
#[derive(Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<MockConnectorInner>>,
}

#[derive(Default)]
struct MockConnectorInner {
    outcomes: VecDeque<Option<MockLink>>,
    attempts: Vec<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next attempt succeeds with `link`
    pub fn push_link(&self, link: MockLink) {
        self.inner.lock().outcomes.push_back(Some(link));
    }

    /// Next attempt is refused
    pub fn push_failure(&self) {
        self.inner.lock().outcomes.push_back(None);
    }

    /// Addresses tried so far
    pub fn attempts(&self) -> Vec<String> {
        self.inner.lock().attempts.clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, address: &str, _timeout: Duration) -> Result<Box<dyn Link>> {
        let mut inner = self.inner.lock();
        inner.attempts.push(address.to_string());
        match inner.outcomes.pop_front() {
            Some(Some(link)) => Ok(Box::new(link)),
            _ => Err(LinkError::Io(ErrorKind::ConnectionRefused.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auto_ack_and_capture() {
        let link = MockLink::new();
        let mut handle = link.try_clone().unwrap();
        let frame = Envelope::new("summon", json!("lobby")).with_seq(7).encode().unwrap();
        handle.write_all(&frame).unwrap();

        assert_eq!(link.sent_of("summon").len(), 1);
        let mut buf = [0u8; 128];
        let n = handle.read(&mut buf).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&buf[..n]);
        let ack = Envelope::decode(&decoder.next_frame().unwrap().unwrap()).unwrap();
        assert_eq!(ack.kind, "ack");
        assert_eq!(ack.data["seq"], 7);
    }

    #[test]
    fn test_break_and_shutdown() {
        let link = MockLink::silent();
        let mut handle = link.try_clone().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).unwrap(), 0);

        handle.shutdown();
        assert!(link.is_closed());
        assert!(handle.read(&mut buf).is_err());

        let other = MockLink::new();
        other.break_link();
        assert!(other.try_clone().unwrap().write_all(b"x").is_err());
    }

    #[test]
    fn test_connector_script() {
        let connector = MockConnector::new();
        connector.push_failure();
        connector.push_link(MockLink::new());

        assert!(connector.connect("a", Duration::ZERO).is_err());
        assert!(connector.connect("b", Duration::ZERO).is_ok());
        assert!(connector.connect("c", Duration::ZERO).is_err());
        assert_eq!(connector.attempts(), vec!["a", "b", "c"]);
    }
}
