//! Program Analysis
//!
//! Machine-readiness diagnostics separated from parsing and sending.

pub mod engine;

pub use engine::{
    detect_feedrates, detect_units, detect_workarea, limit_feedrate, AnalysisError, Report,
    Units, Workarea,
};
