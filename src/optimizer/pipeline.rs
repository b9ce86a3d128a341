//! Optimizer pipeline
//!
//! A pipeline is an ordered list of passes validated once at construction.
//! Each pass consumes the statement list and returns a new one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::optimizer::{filters, moves, patchers, SequencingError};
use crate::parser::Statement;

/// A single rewrite pass over the statement stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    /// Drop every comment
    CommentRemover,
    /// Drop `%` file markers
    FileMarkRemover,
    /// Drop motion codes re-issued while still in effect
    CodeSaver,
    /// Drop G and M codes Grbl does not understand
    GrblCleaner,
    /// Put every feed rate on its own line
    FeedratePatcher,
    /// Start a new line at every M code
    MPatcher,
    /// Drop axis words that do not move the tool
    EmptyMoveRemover,
    /// Merge collinear linear moves; needs isolated feed rates
    LinearMoveSaver,
    /// Drop statements left without entries
    EmptyStatementRemover,
}

impl Pass {
    pub fn apply(self, statements: Vec<Statement>) -> Result<Vec<Statement>, SequencingError> {
        let statements = match self {
            Pass::CommentRemover => filters::remove_comments(statements),
            Pass::FileMarkRemover => filters::remove_file_marks(statements),
            Pass::CodeSaver => filters::save_codes(statements),
            Pass::GrblCleaner => filters::clean_for_grbl(statements),
            Pass::FeedratePatcher => patchers::isolate_feedrates(statements),
            Pass::MPatcher => patchers::split_mcodes(statements),
            Pass::EmptyMoveRemover => moves::remove_empty_moves(statements),
            Pass::LinearMoveSaver => moves::save_linear_moves(statements)?,
            Pass::EmptyStatementRemover => filters::remove_empty_statements(statements),
        };
        Ok(statements)
    }

    /// Passes that must appear earlier in the pipeline
    fn requires(self) -> &'static [Pass] {
        match self {
            Pass::LinearMoveSaver => &[Pass::FeedratePatcher],
            _ => &[],
        }
    }

    /// Passes that must not appear later in the pipeline
    fn forbids_after(self) -> &'static [Pass] {
        match self {
            Pass::LinearMoveSaver => &[Pass::FeedratePatcher],
            _ => &[],
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pass::CommentRemover => "comment-remover",
            Pass::FileMarkRemover => "file-mark-remover",
            Pass::CodeSaver => "code-saver",
            Pass::GrblCleaner => "grbl-cleaner",
            Pass::FeedratePatcher => "feedrate-patcher",
            Pass::MPatcher => "m-patcher",
            Pass::EmptyMoveRemover => "empty-move-remover",
            Pass::LinearMoveSaver => "linear-move-saver",
            Pass::EmptyStatementRemover => "empty-statement-remover",
        };
        f.write_str(name)
    }
}

/// Ordered, validated sequence of passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<Pass>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::canonical()
    }
}

impl Pipeline {
    /// Build a pipeline, rejecting orders that break pass preconditions
    pub fn new(passes: Vec<Pass>) -> Result<Self, SequencingError> {
        for (position, pass) in passes.iter().enumerate() {
            let (before, after) = passes.split_at(position);
            for &required in pass.requires() {
                if !before.contains(&required) {
                    return Err(SequencingError::PassOrder {
                        pass: *pass,
                        requires: required,
                    });
                }
            }
            for &forbidden in pass.forbids_after() {
                if after[1..].contains(&forbidden) {
                    return Err(SequencingError::PassAfter {
                        pass: forbidden,
                        after: *pass,
                    });
                }
            }
        }
        Ok(Self { passes })
    }

    /// The recommended order with every pass enabled
    pub fn canonical() -> Self {
        Self {
            passes: vec![
                Pass::CommentRemover,
                Pass::FileMarkRemover,
                Pass::CodeSaver,
                Pass::GrblCleaner,
                Pass::FeedratePatcher,
                Pass::MPatcher,
                Pass::EmptyMoveRemover,
                Pass::LinearMoveSaver,
                Pass::EmptyStatementRemover,
            ],
        }
    }

    /// A pipeline that leaves statements untouched
    pub fn empty() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Run every pass in order, feeding each one the previous output
    pub fn run(&self, statements: Vec<Statement>) -> Result<Vec<Statement>, SequencingError> {
        self.passes.iter().try_fold(statements, |statements, pass| {
            let before = statements.len();
            let statements = pass.apply(statements)?;
            log::debug!("{}: {} -> {} statements", pass, before, statements.len());
            Ok(statements)
        })
    }
}
