//! Statement Optimizer
//!
//! Rewrite passes that make a parsed program smaller and safe to stream to
//! a Grbl controller. Passes are composed through a [`Pipeline`], which
//! checks ordering constraints between them up front.

pub mod filters;
pub mod moves;
pub mod patchers;
pub mod pipeline;

use thiserror::Error;

pub use pipeline::{Pass, Pipeline};

/// A pass precondition was violated; always a pipeline configuration bug
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("{pass} requires {requires} to run before it")]
    PassOrder { pass: Pass, requires: Pass },

    #[error("{pass} cannot run after {after}")]
    PassAfter { pass: Pass, after: Pass },

    #[error("statement {index} mixes a feed rate with other codes; run feedrate-patcher first")]
    FeedrateNotIsolated { index: usize },
}
