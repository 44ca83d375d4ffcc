//! Serial link (radio serial bridge)
//!
//! Carries the same framed JSON as the TCP link. A serial port has no
//! shutdown of its own, so clones share a `closed` flag.

use super::{Connector, Link, READ_POLL};
use crate::error::{LinkError, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
    closed: Arc<AtomicBool>,
}

impl SerialLink {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/rfcomm0")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(Self {
            port,
            path: path.to_string(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(LinkError::Io(ErrorKind::NotConnected.into()));
        }
        Ok(())
    }
}

impl Link for SerialLink {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        self.check_open()?;
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Link>> {
        Ok(Box::new(SerialLink {
            port: self.port.try_clone()?,
            path: self.path.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn peer(&self) -> String {
        format!("serial://{}", self.path)
    }
}

/// Opens the port named by the address candidate
pub struct SerialConnector {
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(baud_rate: u32) -> Self {
        Self { baud_rate }
    }
}

impl Connector for SerialConnector {
    fn connect(&self, address: &str, _timeout: Duration) -> Result<Box<dyn Link>> {
        Ok(Box::new(SerialLink::open(address, self.baud_rate)?))
    }
}
