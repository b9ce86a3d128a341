//! G-code streamer
//!
//! Parses G-code programs, optimizes them for Grbl and streams them to the
//! controller over a serial link with acknowledgment flow control.
//!
//! This library provides:
//! - A character-level G-code parser
//! - Machine-readiness analysis
//! - An ordered optimizer pipeline
//! - The controller protocol engine
//! - Configuration management

pub mod analysis;
pub mod cli;
pub mod config;
pub mod optimizer;
pub mod parser;
pub mod protocol;

// Re-exports for clean public API
pub use analysis::Report;
pub use config::Config;
pub use optimizer::{Pass, Pipeline};
pub use parser::{parse, Statement};
pub use protocol::{Engine, SendObserver, SendOutcome};
