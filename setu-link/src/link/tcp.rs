//! TCP link

use super::{Connector, Link, READ_POLL};
use crate::error::{LinkError, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub struct TcpLink {
    stream: TcpStream,
    peer: String,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Result<Self> {
        stream.set_read_timeout(Some(READ_POLL))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self { stream, peer })
    }
}

impl Link for TcpLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.stream.read(buffer) {
            // A zero-length read on a socket is the peer closing
            Ok(0) => Err(LinkError::Io(ErrorKind::UnexpectedEof.into())),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Link>> {
        Ok(Box::new(TcpLink {
            stream: self.stream.try_clone()?,
            peer: self.peer.clone(),
        }))
    }

    fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn peer(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}

/// Connects to `host:port` for each host candidate
pub struct TcpConnector {
    port: u16,
}

impl TcpConnector {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    fn resolve(&self, host: &str) -> Result<SocketAddr> {
        (host, self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| LinkError::Protocol(format!("No address for {}", host)))
    }
}

impl Connector for TcpConnector {
    fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Link>> {
        let addr = self.resolve(address)?;
        log::debug!("Connecting to {}", addr);
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            if e.kind() == ErrorKind::TimedOut {
                LinkError::Timeout(timeout)
            } else {
                LinkError::Io(e)
            }
        })?;
        Ok(Box::new(TcpLink::new(stream)?))
    }
}
