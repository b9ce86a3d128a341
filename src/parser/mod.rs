//! GCode Parser
//!
//! Turns raw program text into statements, the intermediate
//! representation consumed by the optimizer and the protocol engine.

pub mod ast;
pub mod machine;

pub use ast::{Code, Comment, Entry, Statement, Value, WireFormat};
pub use machine::{ParseError, Parser};

/// Parse a complete program into statements
///
/// This is the main entry point for parsing. A fresh state machine is used
/// for every call.
pub fn parse(text: &str) -> Result<Vec<Statement>, ParseError> {
    Parser::new().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_program() {
        let statements = parse("G21\nG90\nG1 X10 Y20 F500\n").unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2].codes().count(), 4);
    }

    #[test]
    fn test_round_trip_codes() {
        let statement = Statement::from_codes([
            Code::int('G', 1),
            Code::float('X', 10.25),
            Code::float('Y', -3.5),
            Code::int('F', 1200),
        ]);
        let line = statement.render(&WireFormat::default());
        assert_eq!(parse(&line).unwrap(), vec![statement]);
    }

    #[test]
    fn test_round_trip_respects_precision() {
        let statement = Statement::from_codes([Code::float('Z', 0.123456)]);
        let parsed = parse(&statement.to_string()).unwrap();
        assert_eq!(parsed[0].codes().next(), Some(&Code::float('Z', 0.1235)));
    }
}
