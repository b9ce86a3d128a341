//! Controller Protocol
//!
//! Grbl's line-based acknowledgment protocol over a serial byte stream.

pub mod engine;
pub mod response;
pub mod transport;

pub use engine::{
    Engine, EngineSettings, EngineState, Fault, HandshakePolicy, ProtocolError, SendObserver,
    SendOutcome,
};
pub use response::{Response, ResponseParser};
pub use transport::{CancelToken, Connector, SerialConnector};
