//! Character-level parser state machine
//!
//! Consumes raw program text one character at a time and produces
//! statements. The machine has three states: reading an address letter,
//! reading the numeric argument that follows it, and reading a comment.

use thiserror::Error;

use crate::parser::ast::{Code, Comment, Entry, Statement, Value};

/// Errors raised while parsing program text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected symbol {symbol:?} on line {line}")]
    UnexpectedSymbol { symbol: char, line: usize },

    #[error("invalid number {text:?} after address '{address}' on line {line}")]
    InvalidNumber {
        address: char,
        text: String,
        line: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Address,
    Argument,
    Comment,
}

/// Parser state machine; all state is reset at the start of each parse
#[derive(Debug)]
pub struct Parser {
    state: State,
    statements: Vec<Statement>,
    current: Statement,
    address: char,
    buffer: String,
    line: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Address,
            statements: Vec::new(),
            current: Statement::new(),
            address: ' ',
            buffer: String::new(),
            line: 1,
        }
    }

    /// Parse a complete program into statements
    pub fn parse(&mut self, text: &str) -> Result<Vec<Statement>, ParseError> {
        *self = Self::new();

        for ch in text.chars() {
            self.feed(ch)?;
        }
        self.finish()?;

        log::debug!(
            "Parsed {} statements from {} lines",
            self.statements.len(),
            self.line
        );
        Ok(std::mem::take(&mut self.statements))
    }

    fn feed(&mut self, ch: char) -> Result<(), ParseError> {
        match self.state {
            State::Address => self.on_address(ch),
            State::Argument => {
                if ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+') {
                    self.buffer.push(ch);
                    Ok(())
                } else {
                    self.finish_code()?;
                    // the terminator belongs to the next token
                    self.on_address(ch)
                }
            }
            State::Comment => {
                if ch == ')' {
                    self.finish_comment();
                } else {
                    if ch == '\n' {
                        self.line += 1;
                    }
                    self.buffer.push(ch);
                }
                Ok(())
            }
        }
    }

    fn on_address(&mut self, ch: char) -> Result<(), ParseError> {
        match ch {
            '%' => self.current.push(Entry::FileMarker),
            '(' => {
                self.buffer.clear();
                self.state = State::Comment;
            }
            '\r' => self.close_statement(),
            '\n' => {
                self.close_statement();
                self.line += 1;
            }
            ' ' | '\t' => {}
            c if c.is_ascii_alphabetic() => {
                self.address = c.to_ascii_uppercase();
                self.buffer.clear();
                self.state = State::Argument;
            }
            symbol => {
                return Err(ParseError::UnexpectedSymbol {
                    symbol,
                    line: self.line,
                });
            }
        }
        Ok(())
    }

    /// End of input behaves like a trailing newline
    fn finish(&mut self) -> Result<(), ParseError> {
        match self.state {
            State::Address => {}
            State::Argument => self.finish_code()?,
            State::Comment => self.finish_comment(),
        }
        self.close_statement();
        Ok(())
    }

    fn finish_code(&mut self) -> Result<(), ParseError> {
        let value = parse_number(&self.buffer).ok_or_else(|| ParseError::InvalidNumber {
            address: self.address,
            text: self.buffer.clone(),
            line: self.line,
        })?;
        self.current.push(Code::new(self.address, value));
        self.buffer.clear();
        self.state = State::Address;
        Ok(())
    }

    fn finish_comment(&mut self) {
        self.current.push(Entry::Comment(Comment {
            text: std::mem::take(&mut self.buffer),
        }));
        self.state = State::Address;
    }

    fn close_statement(&mut self) {
        let statement = std::mem::take(&mut self.current);
        if !statement.is_empty() {
            self.statements.push(statement);
        }
    }
}

/// Integer when there is no decimal point, float otherwise
fn parse_number(text: &str) -> Option<Value> {
    if text.contains('.') {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        text.parse::<i64>().ok().map(Value::Int)
    }
}
