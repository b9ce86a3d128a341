//! Serial channel plumbing
//!
//! The engine only needs a byte stream it can read and write. A
//! [`Connector`] knows how to open a fresh one, which lets the engine
//! reconnect and lets tests substitute a scripted controller.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Opens byte channels to the controller
pub trait Connector {
    type Channel: Read + Write;

    fn open(&mut self) -> io::Result<Self::Channel>;

    /// Human readable endpoint for log messages
    fn describe(&self) -> String {
        "controller".to_string()
    }
}

impl<F, C> Connector for F
where
    F: FnMut() -> io::Result<C>,
    C: Read + Write,
{
    type Channel = C;

    fn open(&mut self) -> io::Result<C> {
        self()
    }
}

/// Connector for a serial device such as `/dev/ttyUSB0`
#[derive(Debug, Clone)]
pub struct SerialConnector {
    pub path: String,
    pub baud_rate: u32,
    /// How long a single read blocks before reporting a timeout
    pub read_timeout: Duration,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout: Duration::from_millis(500),
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl Connector for SerialConnector {
    type Channel = Box<dyn serialport::SerialPort>;

    fn open(&mut self) -> io::Result<Self::Channel> {
        log::debug!("Opening {} at {} baud", self.path, self.baud_rate);
        let port = serialport::new(self.path.as_str(), self.baud_rate)
            .timeout(self.read_timeout)
            .open()?;
        Ok(port)
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.path, self.baud_rate)
    }
}

/// Shared flag used to ask a running send cycle to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
