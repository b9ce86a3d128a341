//! Re-chunking passes
//!
//! These passes split statements so that codes Grbl handles badly when
//! combined end up on their own lines.

use crate::parser::{Entry, Statement, Value};

fn is_address(entry: &Entry, address: char) -> bool {
    entry.as_code().is_some_and(|code| code.address == address)
}

/// Move every feed rate onto its own statement, skipping repeated values
///
/// The isolated `F` statement is emitted right before the remainder of the
/// statement it came from.
pub fn isolate_feedrates(statements: Vec<Statement>) -> Vec<Statement> {
    let mut patched = Vec::with_capacity(statements.len());
    let mut last: Option<Value> = None;

    for statement in statements {
        let mut rest = Statement::new();
        for entry in statement.entries {
            match entry {
                Entry::Code(code) if code.address == 'F' => {
                    if last.is_some_and(|value| value.approx_eq(code.value.as_f64())) {
                        continue;
                    }
                    last = Some(code.value);
                    patched.push(Statement::from_codes([code]));
                }
                other => rest.push(other),
            }
        }
        if !rest.is_empty() {
            patched.push(rest);
        }
    }

    patched
}

/// Start a new statement at every M code
///
/// Entries following an M code on the same line stay with it, so
/// `M3 S1000` keeps its spindle speed.
pub fn split_mcodes(statements: Vec<Statement>) -> Vec<Statement> {
    let mut patched = Vec::with_capacity(statements.len());

    for statement in statements {
        let mut current = Statement::new();
        for entry in statement.entries {
            if is_address(&entry, 'M') && !current.is_empty() {
                patched.push(std::mem::take(&mut current));
            }
            current.push(entry);
        }
        if !current.is_empty() {
            patched.push(current);
        }
    }

    patched
}

/// Index of the first statement where an `F` code shares the line
pub fn unisolated_feedrate(statements: &[Statement]) -> Option<usize> {
    statements.iter().position(|statement| {
        statement.len() > 1 && statement.entries.iter().any(|e| is_address(e, 'F'))
    })
}
