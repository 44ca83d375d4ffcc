//! Link layer: byte pipes to the robot
//!
//! A [`Link`] is one open connection; a [`Connector`] opens links to an
//! address. The client never sees sockets or ports directly, so TCP, the
//! serial bridge and the test mock are interchangeable.
//!
//! `read` returns `Ok(0)` when nothing arrived within the link's poll
//! timeout, so reader loops can check their shutdown flags. A closed or
//! failed connection is always an `Err`.

use crate::error::Result;
use std::time::Duration;

pub mod mock;
mod serial;
mod tcp;

pub use serial::{SerialConnector, SerialLink};
pub use tcp::{TcpConnector, TcpLink};

/// Poll timeout applied to link reads
pub const READ_POLL: Duration = Duration::from_millis(100);

/// One open connection
pub trait Link: Send {
    /// Read available bytes, `Ok(0)` on poll timeout
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write a whole frame
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Second handle to the same connection, for a dedicated reader thread
    fn try_clone(&self) -> Result<Box<dyn Link>>;

    /// Close the connection; pending and future reads fail
    fn shutdown(&self);

    /// Human-readable peer description for logs
    fn peer(&self) -> String;
}

/// Opens links to an address candidate
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str, timeout: Duration) -> Result<Box<dyn Link>>;
}
