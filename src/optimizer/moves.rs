//! Motion passes
//!
//! Passes that reason about tool positions: dropping axis words that do
//! not move anything and merging runs of collinear linear moves.

use std::collections::HashMap;

use crate::optimizer::patchers::unisolated_feedrate;
use crate::optimizer::SequencingError;
use crate::parser::{Code, Entry, Statement, Value};

const POSITION_AXES: [char; 6] = ['X', 'Y', 'Z', 'A', 'B', 'C'];
const LINEAR_AXES: [char; 3] = ['X', 'Y', 'Z'];
const EPSILON: f64 = 1e-9;

fn motion_mode(code: &Code) -> Option<u8> {
    (0..=3u8).find(|&mode| code.is('G', f64::from(mode)))
}

/// Drop axis words repeating the last value sent during a `G0`/`G1` run
///
/// Any other G or M code ends the run and forgets every tracked position.
/// Relative positioning suspends suppression, since a repeated value
/// is a real move there.
pub fn remove_empty_moves(mut statements: Vec<Statement>) -> Vec<Statement> {
    let mut active = false;
    let mut absolute = true;
    let mut sent: HashMap<char, Value> = HashMap::new();

    for statement in statements.iter_mut() {
        statement.entries.retain(|entry| {
            let Some(code) = entry.as_code() else {
                return true;
            };
            match code.address {
                'G' | 'M' => {
                    if code.is('G', 90.0) {
                        absolute = true;
                    } else if code.is('G', 91.0) {
                        absolute = false;
                    }
                    if code.value.approx_eq(0.0) || code.value.approx_eq(1.0) {
                        active |= code.address == 'G';
                    } else {
                        active = false;
                        sent.clear();
                    }
                    true
                }
                axis if POSITION_AXES.contains(&axis) && active && absolute => {
                    let repeated = sent
                        .get(&axis)
                        .is_some_and(|last| last.approx_eq(code.value.as_f64()));
                    sent.insert(axis, code.value);
                    !repeated
                }
                _ => true,
            }
        });
    }

    statements
}

/// Tool state followed while scanning for collinear moves
#[derive(Debug)]
struct MoveTracker {
    motion: Option<u8>,
    absolute: bool,
    position: [Option<f64>; 3],
    direction: Option<[f64; 3]>,
    /// Index in the output of the previous move statement and its motion mode
    previous: Option<(usize, u8)>,
}

impl Default for MoveTracker {
    fn default() -> Self {
        Self {
            motion: None,
            absolute: true,
            position: [None; 3],
            direction: None,
            previous: None,
        }
    }
}

impl MoveTracker {
    /// Follow modal state through a statement that is not a plain move
    fn reset(&mut self, statement: &Statement) {
        for code in statement.codes() {
            if let Some(mode) = motion_mode(code) {
                self.motion = Some(mode);
            } else if code.is('G', 90.0) {
                self.absolute = true;
            } else if code.is('G', 91.0) {
                self.absolute = false;
            }
        }
        self.position = [None; 3];
        self.direction = None;
        self.previous = None;
    }
}

/// A linear move made only of an optional `G0`/`G1` and XYZ words
struct LinearMove {
    motion: u8,
    explicit_motion: Option<Code>,
    target: [Option<f64>; 3],
}

fn as_linear_move(statement: &Statement, tracker: &MoveTracker) -> Option<LinearMove> {
    if !tracker.absolute {
        return None;
    }

    let mut explicit_motion = None;
    let mut target = [None; 3];
    for entry in &statement.entries {
        let code = entry.as_code()?;
        if let Some(axis) = LINEAR_AXES.iter().position(|&a| a == code.address) {
            target[axis] = Some(code.value.as_f64());
        } else if explicit_motion.is_none() && matches!(motion_mode(code), Some(0 | 1)) {
            explicit_motion = Some(*code);
        } else {
            return None;
        }
    }

    if target.iter().all(Option::is_none) {
        return None;
    }
    let motion = match explicit_motion {
        Some(code) => motion_mode(&code)?,
        None => tracker.motion?,
    };
    if motion > 1 {
        return None;
    }

    Some(LinearMove {
        motion,
        explicit_motion,
        target,
    })
}

/// Displacement from the current position, or `None` if it is unknown
fn displacement(position: &[Option<f64>; 3], target: &[Option<f64>; 3]) -> Option<[f64; 3]> {
    let mut delta = [0.0; 3];
    for axis in 0..3 {
        if let Some(to) = target[axis] {
            delta[axis] = to - position[axis]?;
        }
    }
    Some(delta)
}

fn same_direction(a: &[f64; 3], b: &[f64; 3]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < EPSILON)
}

/// Merge consecutive collinear `G0`/`G1` moves into the furthest one
///
/// Feed rates must already be isolated on their own statements, otherwise
/// a merge could drop a feed change.
pub fn save_linear_moves(statements: Vec<Statement>) -> Result<Vec<Statement>, SequencingError> {
    if let Some(index) = unisolated_feedrate(&statements) {
        return Err(SequencingError::FeedrateNotIsolated { index });
    }

    let mut tracker = MoveTracker::default();
    let mut saved: Vec<Statement> = Vec::with_capacity(statements.len());

    for mut statement in statements {
        let Some(linear) = as_linear_move(&statement, &tracker) else {
            tracker.reset(&statement);
            saved.push(statement);
            continue;
        };

        let mode_change = tracker.motion != Some(linear.motion);
        tracker.motion = Some(linear.motion);

        let delta = displacement(&tracker.position, &linear.target);
        for (axis, to) in linear.target.iter().enumerate() {
            if to.is_some() {
                tracker.position[axis] = *to;
            }
        }

        let Some(delta) = delta else {
            tracker.direction = None;
            saved.push(statement);
            tracker.previous = Some((saved.len() - 1, linear.motion));
            continue;
        };

        let length = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        if length < EPSILON {
            if mode_change {
                tracker.direction = None;
                saved.push(statement);
                tracker.previous = Some((saved.len() - 1, linear.motion));
            }
            continue;
        }

        let unit = delta.map(|d| d / length);
        match (tracker.previous, tracker.direction) {
            (Some((index, motion)), Some(direction))
                if motion == linear.motion && same_direction(&direction, &unit) =>
            {
                if linear.explicit_motion.is_none() {
                    let kept = saved[index]
                        .codes()
                        .find(|code| motion_mode(code).is_some())
                        .copied();
                    if let Some(code) = kept {
                        statement.entries.insert(0, Entry::Code(code));
                    }
                }
                log::trace!("Merging {} into {}", saved[index], statement);
                saved[index] = statement;
            }
            _ => {
                tracker.direction = Some(unit);
                saved.push(statement);
                tracker.previous = Some((saved.len() - 1, linear.motion));
            }
        }
    }

    Ok(saved)
}
