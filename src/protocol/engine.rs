//! Protocol Engine
//!
//! Owns the controller channel and the outbound queue, and streams
//! statements with strict acknowledgment flow control: a statement is only
//! written once the previous one has been answered with `ok`.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::parser::{Statement, WireFormat};
use crate::protocol::response::{Response, ResponseParser};
use crate::protocol::transport::{CancelToken, Connector};

/// Soft reset, aborts motion and clears the controller's buffers
pub const HALT: u8 = 0x18;
/// Feed hold, pauses motion in place
pub const FEED_HOLD: u8 = b'!';

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Disconnected,
    Connecting,
    Ready,
    Sending,
    Halting,
    Faulted,
}

/// Channel level failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to open {endpoint}")]
    Open {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("serial I/O failed")]
    Io(#[from] io::Error),

    #[error("controller did not answer the handshake after {attempts} attempts")]
    Handshake { attempts: u32 },

    #[error("connection cancelled")]
    Cancelled,

    #[error("not connected to the controller")]
    NotConnected,

    #[error("engine is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },

    #[error("reading the controller response failed {attempts} times in a row")]
    ReadFailed {
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

/// The controller rejected a statement; the rest of the queue was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("controller error {payload:?} on statement {index} ({statement})")]
    ControllerError {
        payload: String,
        statement: Statement,
        index: usize,
    },

    #[error("controller alarm {payload:?} on statement {index} ({statement})")]
    ControllerAlarm {
        payload: String,
        statement: Statement,
        index: usize,
    },
}

/// How a send cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Completed { sent: usize },
    Faulted(Fault),
    Cancelled { sent: usize },
}

/// Receives send cycle events; every hook defaults to doing nothing
pub trait SendObserver {
    /// Statement `index` was acknowledged
    fn on_progress(&mut self, _index: usize) {}

    /// The whole queue was acknowledged
    fn on_complete(&mut self) {}

    fn on_error(&mut self, _payload: &str, _statement: &Statement) {}

    fn on_alarm(&mut self, _payload: &str, _statement: &Statement) {}
}

impl SendObserver for () {}

/// Retry policy for the connection handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakePolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub retry_delay: Duration,
    /// How long a silent controller is given to greet, and to answer a halt
    pub banner_timeout: Duration,
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            retry_delay: Duration::from_secs(1),
            banner_timeout: Duration::from_secs(5),
        }
    }
}

/// Engine tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub wire: WireFormat,
    pub handshake: HandshakePolicy,
    /// Consecutive failed reads tolerated while waiting for a response
    pub read_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            wire: WireFormat::default(),
            handshake: HandshakePolicy::default(),
            read_retries: 3,
        }
    }
}

/// Streams statements to a controller over a channel opened by `C`
pub struct Engine<C: Connector> {
    connector: C,
    channel: Option<C::Channel>,
    settings: EngineSettings,
    state: EngineState,
    queue: VecDeque<Statement>,
    responses: ResponseParser,
    cancel: CancelToken,
}

impl<C: Connector> Engine<C> {
    pub fn new(connector: C, settings: EngineSettings) -> Self {
        Self {
            connector,
            channel: None,
            settings,
            state: EngineState::Disconnected,
            queue: VecDeque::new(),
            responses: ResponseParser::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Share an existing cancel token instead of the engine's own
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Token that stops a running send cycle before its next statement
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Open a fresh channel and wait for the controller banner
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        self.channel = None;
        self.state = EngineState::Connecting;
        let policy = self.settings.handshake;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let mut channel = match self.connector.open() {
                Ok(channel) => channel,
                Err(source) => {
                    self.state = EngineState::Disconnected;
                    return Err(ProtocolError::Open {
                        endpoint: self.connector.describe(),
                        source,
                    });
                }
            };

            match await_banner(&mut channel, policy.banner_timeout, &self.cancel) {
                Ok(Greeting::Banner) => {
                    log::info!("Connected to {}", self.connector.describe());
                    self.channel = Some(channel);
                    self.responses.reset();
                    self.state = EngineState::Ready;
                    return Ok(());
                }
                Ok(Greeting::Unexpected) => {
                    log::warn!("Unexpected handshake from controller (attempt {})", attempts)
                }
                Ok(Greeting::Silent) => log::warn!(
                    "No banner within {:?} (attempt {})",
                    policy.banner_timeout,
                    attempts
                ),
                Ok(Greeting::Cancelled) => {}
                Err(e) => log::warn!("Handshake read failed (attempt {}): {}", attempts, e),
            }
            drop(channel);

            if self.cancel.is_cancelled() {
                log::info!("Connection cancelled after {} attempts", attempts);
                self.state = EngineState::Disconnected;
                return Err(ProtocolError::Cancelled);
            }
            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                self.state = EngineState::Disconnected;
                return Err(ProtocolError::Handshake { attempts });
            }
            thread::sleep(policy.retry_delay);
        }
    }

    /// Append statements to the queue without transmitting anything
    pub fn enqueue(&mut self, statements: impl IntoIterator<Item = Statement>) {
        self.queue.extend(statements);
    }

    /// Send every queued statement, one at a time
    pub fn send_queue(
        &mut self,
        observer: &mut dyn SendObserver,
    ) -> Result<SendOutcome, ProtocolError> {
        if self.channel.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        if self.state != EngineState::Ready {
            return Err(ProtocolError::InvalidState {
                expected: EngineState::Ready,
                actual: self.state,
            });
        }

        self.state = EngineState::Sending;
        log::debug!("Sending {} statements", self.queue.len());
        let mut index = 0;

        while let Some(statement) = self.queue.pop_front() {
            if self.cancel.is_cancelled() {
                self.queue.push_front(statement);
                self.state = EngineState::Ready;
                return Ok(SendOutcome::Cancelled { sent: index });
            }

            let line = statement.render(&self.settings.wire);
            log::trace!("> {}", line);
            let mut bytes = line.into_bytes();
            bytes.push(b'\n');
            self.write(&bytes)?;

            loop {
                match self.read_response(Wait::Cancellable)? {
                    None => {
                        // the reply to this line is still due; only halt() may resume
                        log::warn!("Cancelled while statement {} awaits acknowledgment", index);
                        self.state = EngineState::Halting;
                        return Ok(SendOutcome::Cancelled { sent: index });
                    }
                    Some(Response::Info(line)) => log::warn!("Controller: {}", line),
                    Some(Response::Ack) => {
                        observer.on_progress(index);
                        index += 1;
                        break;
                    }
                    Some(Response::Error(payload)) => {
                        self.fault(index);
                        observer.on_error(&payload, &statement);
                        return Ok(SendOutcome::Faulted(Fault::ControllerError {
                            payload,
                            statement,
                            index,
                        }));
                    }
                    Some(Response::Alarm(payload)) => {
                        self.fault(index);
                        observer.on_alarm(&payload, &statement);
                        return Ok(SendOutcome::Faulted(Fault::ControllerAlarm {
                            payload,
                            statement,
                            index,
                        }));
                    }
                }
            }
        }

        self.state = EngineState::Ready;
        log::info!("Queue done, {} statements acknowledged", index);
        observer.on_complete();
        Ok(SendOutcome::Completed { sent: index })
    }

    /// Soft-reset the controller and drop whatever is still queued
    ///
    /// Also re-arms the cancel token, so the engine can send again.
    pub fn halt(&mut self) -> Result<(), ProtocolError> {
        if self.channel.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        self.state = EngineState::Halting;
        self.queue.clear();
        self.responses.reset();
        self.write(&[HALT, b'\n'])?;

        let timeout = self.settings.handshake.banner_timeout;
        match self.read_response(Wait::Until(Instant::now() + timeout))? {
            Some(response) => log::info!("Controller halted ({:?})", response),
            None => log::warn!("No reply to halt within {:?}", timeout),
        }
        self.cancel.clear();
        self.state = EngineState::Ready;
        Ok(())
    }

    /// Pause motion without touching the queue
    pub fn hold(&mut self) -> Result<(), ProtocolError> {
        if self.channel.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        self.write(&[FEED_HOLD, b'\n'])?;
        log::info!("Feed hold requested");
        Ok(())
    }

    fn fault(&mut self, index: usize) {
        log::warn!(
            "Statement {} rejected, dropping {} queued statements",
            index,
            self.queue.len()
        );
        self.queue.clear();
        self.state = EngineState::Faulted;
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;
        let written = channel.write_all(bytes).and_then(|()| channel.flush());
        if let Err(e) = written {
            self.state = EngineState::Faulted;
            return Err(e.into());
        }
        Ok(())
    }

    /// Block until a complete response line arrives
    ///
    /// Returns `None` when the wait ends while the controller is silent.
    fn read_response(&mut self, wait: Wait) -> Result<Option<Response>, ProtocolError> {
        let mut failures = 0;
        let mut byte = [0u8; 1];

        loop {
            let channel = self.channel.as_mut().ok_or(ProtocolError::NotConnected)?;
            let error = match channel.read(&mut byte) {
                Ok(0) => io::Error::from(ErrorKind::UnexpectedEof),
                Ok(_) => {
                    failures = 0;
                    if let Some(response) = self.responses.feed(byte[0]) {
                        return Ok(Some(response));
                    }
                    continue;
                }
                Err(e) if is_timeout(&e) => {
                    let expired = match wait {
                        Wait::Cancellable => self.cancel.is_cancelled(),
                        Wait::Until(deadline) => Instant::now() >= deadline,
                    };
                    if expired {
                        return Ok(None);
                    }
                    continue;
                }
                Err(e) => e,
            };

            failures += 1;
            log::warn!("Read from controller failed ({}): {}", failures, error);
            if failures > self.settings.read_retries {
                self.state = EngineState::Faulted;
                return Err(ProtocolError::ReadFailed {
                    attempts: failures,
                    source: error,
                });
            }
        }
    }
}

/// How long a response wait may last
#[derive(Debug, Clone, Copy)]
enum Wait {
    /// Until the cancel token trips
    Cancellable,
    Until(Instant),
}

/// The serial read timed out; the controller may just be busy
fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Greeting {
    Banner,
    Unexpected,
    Silent,
    Cancelled,
}

/// The controller greets with `\r\n` followed by its banner line
///
/// Read timeouts are expected while the board boots after the port opens;
/// only wrong leading bytes or a silent `timeout` fail the attempt.
fn await_banner(
    channel: &mut impl Read,
    timeout: Duration,
    cancel: &CancelToken,
) -> io::Result<Greeting> {
    let deadline = Instant::now() + timeout;
    let mut head = Vec::with_capacity(2);
    let mut byte = [0u8; 1];

    loop {
        match channel.read(&mut byte) {
            Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
            Ok(_) if head.len() < 2 => {
                head.push(byte[0]);
                if head.len() == 2 && head.as_slice() != b"\r\n" {
                    return Ok(Greeting::Unexpected);
                }
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    return Ok(Greeting::Banner);
                }
            }
            Err(e) if is_timeout(&e) => {
                if cancel.is_cancelled() {
                    return Ok(Greeting::Cancelled);
                }
                if Instant::now() >= deadline {
                    return Ok(Greeting::Silent);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
