//! Analysis Engine
//!
//! Read-only machine-readiness checks over parsed statements: unit mode,
//! bounding workarea and feed rates. The only mutating operation is the
//! feed-rate limiter.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::parser::{Code, Statement, Value};

/// Axes that contribute to the workarea bounds
const POSITION_AXES: [char; 6] = ['X', 'Y', 'Z', 'A', 'B', 'C'];

/// Reasons a diagnostic could not be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum AnalysisError {
    #[error("unit mode changes after the first move")]
    AmbiguousUnits,
    #[error("relative positioning is not supported for workarea detection")]
    RelativeMotionUnsupported,
}

/// Unit mode declared by the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
    Undetermined,
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Undetermined => "undetermined",
        };
        f.write_str(name)
    }
}

/// Per-axis `(min, max)` bounds
pub type Workarea = BTreeMap<char, (f64, f64)>;

fn codes(statements: &[Statement]) -> impl Iterator<Item = &Code> {
    statements.iter().flat_map(Statement::codes)
}

/// Detect the unit mode, which must be declared before the first move
pub fn detect_units(statements: &[Statement]) -> Result<Units, AnalysisError> {
    let mut units = Units::Undetermined;
    let mut moved = false;

    for code in codes(statements) {
        if code.is_move_axis() {
            moved = true;
        } else if code.is('G', 20.0) || code.is('G', 21.0) {
            if moved {
                return Err(AnalysisError::AmbiguousUnits);
            }
            units = if code.is('G', 21.0) {
                Units::Metric
            } else {
                Units::Imperial
            };
        }
    }

    Ok(units)
}

/// Compute the bounding box of all absolute positions, seeded at the origin
pub fn detect_workarea(statements: &[Statement]) -> Result<Workarea, AnalysisError> {
    let mut bounds: BTreeMap<char, (f64, f64)> = BTreeMap::new();
    let mut relative = false;
    let mut moved = false;

    for code in codes(statements) {
        if code.is_move_axis() {
            if relative {
                return Err(AnalysisError::RelativeMotionUnsupported);
            }
            moved = true;
            if POSITION_AXES.contains(&code.address) {
                let value = code.value.as_f64();
                let (min, max) = bounds.entry(code.address).or_insert((0.0, 0.0));
                *min = min.min(value);
                *max = max.max(value);
            }
        } else if code.is('G', 90.0) {
            relative = false;
        } else if code.is('G', 91.0) {
            relative = true;
        } else if (code.is('G', 20.0) || code.is('G', 21.0)) && moved {
            return Err(AnalysisError::AmbiguousUnits);
        }
    }

    bounds.retain(|_, (min, max)| max > min);
    Ok(bounds)
}

/// Distinct feed rates in ascending order
pub fn detect_feedrates(statements: &[Statement]) -> Vec<f64> {
    let mut rates: Vec<f64> = codes(statements)
        .filter(|code| code.address == 'F')
        .map(|code| code.value.as_f64())
        .collect();
    rates.sort_by(f64::total_cmp);
    rates.dedup();
    rates
}

/// Clamp every feed rate above `max` down to `max`, returning how many changed
pub fn limit_feedrate(statements: &mut [Statement], max: f64) -> usize {
    let mut changed = 0;
    for code in statements.iter_mut().flat_map(Statement::codes_mut) {
        if code.address == 'F' && code.value.as_f64() > max {
            code.value = if max.fract() == 0.0 {
                Value::Int(max as i64)
            } else {
                Value::Float(max)
            };
            changed += 1;
        }
    }
    if changed > 0 {
        log::warn!("Clamped {} feed rates to {}", changed, max);
    }
    changed
}

/// All diagnostics for a program; each one fails independently
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub units: Result<Units, AnalysisError>,
    pub workarea: Result<Workarea, AnalysisError>,
    pub feedrates: Vec<f64>,
}

impl Report {
    pub fn analyze(statements: &[Statement]) -> Self {
        Self {
            units: detect_units(statements),
            workarea: detect_workarea(statements),
            feedrates: detect_feedrates(statements),
        }
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.units {
            Ok(units) => writeln!(f, "units: {}", units)?,
            Err(e) => writeln!(f, "units: unavailable ({})", e)?,
        }
        match &self.workarea {
            Ok(area) if area.is_empty() => writeln!(f, "workarea: empty")?,
            Ok(area) => {
                writeln!(f, "workarea:")?;
                for (axis, (min, max)) in area {
                    writeln!(f, "  {}: {} .. {}", axis, min, max)?;
                }
            }
            Err(e) => writeln!(f, "workarea: unavailable ({})", e)?,
        }
        let rates: Vec<String> = self.feedrates.iter().map(|r| r.to_string()).collect();
        write!(f, "feedrates: [{}]", rates.join(", "))
    }
}
