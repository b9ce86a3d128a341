//! Statement model for parsed G-code
//!
//! Plain data types shared by the parser, the optimizer and the protocol
//! engine. Rendering to the wire lives here too, since a statement must
//! always fit on a single controller line.

use std::fmt;

/// Default number of fractional digits used when rendering float values
pub const DEFAULT_PRECISION: usize = 4;

/// Addresses that carry movement parameters rather than commands
pub const MOVE_PARAMETERS: [char; 12] = ['X', 'Y', 'Z', 'A', 'B', 'C', 'I', 'J', 'K', 'R', 'F', 'S'];

/// Addresses that imply a movement when they appear
pub const MOVE_AXES: [char; 10] = ['X', 'Y', 'Z', 'A', 'B', 'C', 'I', 'J', 'K', 'R'];

/// Numeric value of a code, integer or float
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// Numeric comparison, ignoring the representation
    pub fn approx_eq(self, other: f64) -> bool {
        (self.as_f64() - other).abs() < 1e-9
    }
}

/// A single address/value pair like `G21` or `X0.5`
#[derive(Debug, Clone, Copy)]
pub struct Code {
    pub address: char,
    pub value: Value,
    /// Fractional digits used when rendering a float value
    pub precision: usize,
}

impl Code {
    pub fn new(address: char, value: Value) -> Self {
        Self {
            address: address.to_ascii_uppercase(),
            value,
            precision: DEFAULT_PRECISION,
        }
    }

    pub fn int(address: char, value: i64) -> Self {
        Self::new(address, Value::Int(value))
    }

    pub fn float(address: char, value: f64) -> Self {
        Self::new(address, Value::Float(value))
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// True for `<address><n>` where the value equals `n` numerically
    pub fn is(&self, address: char, n: f64) -> bool {
        self.address == address && self.value.approx_eq(n)
    }

    pub fn is_move_parameter(&self) -> bool {
        MOVE_PARAMETERS.contains(&self.address)
    }

    pub fn is_move_axis(&self) -> bool {
        MOVE_AXES.contains(&self.address)
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.value == other.value
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Int(v) => write!(f, "{}{}", self.address, v),
            Value::Float(v) => write!(f, "{}{:.*}", self.address, self.precision, v),
        }
    }
}

/// Free text found between `(` and `)`
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
}

/// A single entry of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Code(Code),
    Comment(Comment),
    /// The `%` program start/end marker
    FileMarker,
}

impl Entry {
    pub fn as_code(&self) -> Option<&Code> {
        match self {
            Entry::Code(code) => Some(code),
            Entry::Comment(_) | Entry::FileMarker => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut Code> {
        match self {
            Entry::Code(code) => Some(code),
            Entry::Comment(_) | Entry::FileMarker => None,
        }
    }

    /// The token this entry occupies on the wire
    pub fn token(&self) -> String {
        match self {
            Entry::Code(code) => code.to_string(),
            Entry::Comment(comment) => format!("({})", comment.text),
            Entry::FileMarker => "%".to_string(),
        }
    }
}

impl From<Code> for Entry {
    fn from(code: Code) -> Self {
        Entry::Code(code)
    }
}

/// One logical line of G-code; the unit of acknowledgment on the wire
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub entries: Vec<Entry>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_codes(codes: impl IntoIterator<Item = Code>) -> Self {
        Self {
            entries: codes.into_iter().map(Entry::Code).collect(),
        }
    }

    pub fn push(&mut self, entry: impl Into<Entry>) {
        self.entries.push(entry.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn codes(&self) -> impl Iterator<Item = &Code> {
        self.entries.iter().filter_map(Entry::as_code)
    }

    pub fn codes_mut(&mut self) -> impl Iterator<Item = &mut Code> {
        self.entries.iter_mut().filter_map(Entry::as_code_mut)
    }

    /// Render the statement as a single wire line (without the newline)
    pub fn render(&self, format: &WireFormat) -> String {
        let mut tokens: Vec<String> = self.entries.iter().map(Entry::token).collect();
        let fits = |tokens: &[String]| {
            tokens.iter().map(String::len).sum::<usize>() + 1 <= format.max_line_length
        };

        if fits(&tokens) {
            return tokens.concat();
        }

        let mut width = tokens.iter().map(String::len).max().unwrap_or(0);
        while !fits(&tokens) && width > format.min_token_width {
            width -= 1;
            for token in tokens.iter_mut() {
                if token.len() > width {
                    // tokens are ASCII except for comment text
                    let mut cut = width;
                    while !token.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    token.truncate(cut);
                }
            }
        }

        let line = tokens.concat();
        log::warn!(
            "Statement truncated to {} characters to fit the controller line buffer",
            line.len()
        );
        line
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            f.write_str(&entry.token())?;
        }
        Ok(())
    }
}

/// Controls how statements are rendered to wire lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    /// Longest line accepted by the controller, newline included
    pub max_line_length: usize,
    /// Truncation never cuts a token below this width
    pub min_token_width: usize,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            max_line_length: 80,
            min_token_width: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(Code::int('G', 21).to_string(), "G21");
        assert_eq!(Code::float('X', 0.5).to_string(), "X0.5000");
        assert_eq!(Code::float('Y', -1.25).with_precision(2).to_string(), "Y-1.25");
    }

    #[test]
    fn test_code_equality_ignores_precision() {
        let a = Code::float('X', 1.5);
        let b = Code::float('X', 1.5).with_precision(1);
        assert_eq!(a, b);
        assert_ne!(Code::int('G', 1), Code::float('G', 1.0));
        assert!(Code::float('G', 28.1).is('G', 28.1));
    }

    #[test]
    fn test_render_concatenates_tokens() {
        let mut statement = Statement::from_codes([Code::int('G', 1), Code::int('X', 10)]);
        statement.push(Entry::Comment(Comment {
            text: "edge".to_string(),
        }));
        assert_eq!(statement.render(&WireFormat::default()), "G1X10(edge)");
    }

    #[test]
    fn test_render_truncates_equal_tokens_equally() {
        let statement = Statement::from_codes([
            Code::float('X', 1.0),
            Code::float('Y', 2.0),
            Code::float('Z', 3.0),
        ]);
        // "X1.0000" is 7 characters, 21 in total
        let format = WireFormat {
            max_line_length: 16,
            min_token_width: 2,
        };
        let line = statement.render(&format);
        assert!(line.len() < format.max_line_length);
        assert_eq!(line, "X1.00Y2.00Z3.00");
    }

    #[test]
    fn test_render_shortens_longest_tokens_first() {
        let statement = Statement::from_codes([Code::int('G', 1), Code::float('X', 12.5)]);
        let format = WireFormat {
            max_line_length: 8,
            min_token_width: 2,
        };
        assert_eq!(statement.render(&format), "G1X12.5");
    }

    #[test]
    fn test_render_stops_at_minimum_width() {
        let statement = Statement::from_codes([Code::int('X', 100), Code::int('Y', 200)]);
        let format = WireFormat {
            max_line_length: 3,
            min_token_width: 2,
        };
        assert_eq!(statement.render(&format), "X1Y2");
    }
}
