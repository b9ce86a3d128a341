//! Filtering passes
//!
//! Passes that only remove entries or statements and never change the
//! shape of what remains.

use crate::parser::{Code, Entry, Statement};

/// G codes understood by Grbl
const SUPPORTED_G: [f64; 32] = [
    0.0, 1.0, 2.0, 3.0, 4.0, 10.0, 17.0, 18.0, 19.0, 20.0, 21.0, 28.0, 28.1, 30.0, 30.1, 38.2,
    43.1, 49.0, 53.0, 54.0, 55.0, 56.0, 57.0, 58.0, 59.0, 80.0, 90.0, 91.0, 92.0, 92.1, 93.0,
    94.0,
];

/// M codes understood by Grbl
const SUPPORTED_M: [f64; 8] = [0.0, 2.0, 3.0, 4.0, 5.0, 8.0, 9.0, 30.0];

fn retain_entries(
    mut statements: Vec<Statement>,
    keep: impl Fn(&Entry) -> bool,
) -> Vec<Statement> {
    for statement in statements.iter_mut() {
        statement.entries.retain(&keep);
    }
    statements
}

pub fn remove_comments(statements: Vec<Statement>) -> Vec<Statement> {
    retain_entries(statements, |entry| !matches!(entry, Entry::Comment(_)))
}

pub fn remove_file_marks(statements: Vec<Statement>) -> Vec<Statement> {
    retain_entries(statements, |entry| !matches!(entry, Entry::FileMarker))
}

pub fn remove_empty_statements(mut statements: Vec<Statement>) -> Vec<Statement> {
    statements.retain(|statement| !statement.is_empty());
    statements
}

/// Whether Grbl accepts this code
pub fn is_supported(code: &Code) -> bool {
    let value = code.value;
    match code.address {
        'G' => SUPPORTED_G.iter().any(|&g| value.approx_eq(g)),
        'M' => SUPPORTED_M.iter().any(|&m| value.approx_eq(m)),
        _ => true,
    }
}

/// Drop G and M codes Grbl does not support
pub fn clean_for_grbl(statements: Vec<Statement>) -> Vec<Statement> {
    retain_entries(statements, |entry| match entry {
        Entry::Code(code) => {
            let keep = is_supported(code);
            if !keep {
                log::debug!("Dropping unsupported code {}", code);
            }
            keep
        }
        Entry::Comment(_) | Entry::FileMarker => true,
    })
}

/// Drop a motion code (`G0`-`G3`) re-issued while it is still in effect
pub fn save_codes(mut statements: Vec<Statement>) -> Vec<Statement> {
    let mut current: Option<Code> = None;

    for statement in statements.iter_mut() {
        statement.entries.retain(|entry| {
            let code = match entry {
                Entry::Code(code) => code,
                Entry::Comment(_) | Entry::FileMarker => return true,
            };
            if code.is_move_parameter() {
                true
            } else if current.as_ref() == Some(code) {
                false
            } else {
                let motion = code.address == 'G' && (0.0..=3.0).contains(&code.value.as_f64());
                current = motion.then_some(*code);
                true
            }
        });
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lines(statements: &[Statement]) -> Vec<String> {
        statements.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_remove_comments_and_markers() {
        let statements = parse("%\nG1 (go) X1\n%").unwrap();
        let statements = remove_file_marks(remove_comments(statements));
        assert_eq!(lines(&statements), vec!["", "G1X1", ""]);
        let statements = remove_empty_statements(statements);
        assert_eq!(lines(&statements), vec!["G1X1"]);
    }

    #[test]
    fn test_clean_for_grbl() {
        let statements = parse("G28.1\nG28.2\nM3 S1000\nM104 S200\nG1 X1 T2\nG38.2 Z-5").unwrap();
        let cleaned = clean_for_grbl(statements);
        assert_eq!(
            lines(&cleaned),
            vec!["G28.1000", "", "M3S1000", "S200", "G1X1T2", "G38.2000Z-5"]
        );
    }

    #[test]
    fn test_clean_for_grbl_is_idempotent() {
        let statements = parse("G64\nG1 X1\nM6 T1\nM5").unwrap();
        let once = clean_for_grbl(statements);
        let twice = clean_for_grbl(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_remove_empty_statements_is_idempotent() {
        let statements = vec![Statement::new(), parse("G0").unwrap().remove(0)];
        let once = remove_empty_statements(statements);
        assert_eq!(remove_empty_statements(once.clone()), once);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_save_codes() {
        let statements = parse("G1 X1\nG1 X2\nG1 F100 X3\nG0 X0\nG1 X1\nM3\nG1 X2").unwrap();
        let saved = save_codes(statements);
        assert_eq!(
            lines(&saved),
            vec!["G1X1", "X2", "F100X3", "G0X0", "G1X1", "M3", "G1X2"]
        );
    }

    #[test]
    fn test_save_codes_reset_by_other_codes() {
        let statements = parse("G1 X1\nG90\nG1 X2").unwrap();
        let saved = save_codes(statements);
        assert_eq!(lines(&saved), vec!["G1X1", "G90", "G1X2"]);
    }
}
