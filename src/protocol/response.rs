//! Controller response decoding
//!
//! Grbl answers every line with `ok`, `error:<code>` or `ALARM:<code>`,
//! interleaved with informational chatter such as the startup banner or
//! `[MSG:...]` feedback. Bytes are fed one at a time.

/// A classified response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The controller accepted the line
    Ack,
    /// The controller rejected the line
    Error(String),
    /// The controller entered an alarm state
    Alarm(String),
    /// Anything else
    Info(String),
}

/// Byte-driven line accumulator
#[derive(Debug, Default)]
pub struct ResponseParser {
    buffer: Vec<u8>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning the response once a line is complete
    pub fn feed(&mut self, byte: u8) -> Option<Response> {
        match byte {
            b'\r' => None,
            b'\n' => {
                let line = std::mem::take(&mut self.buffer);
                Some(classify(&line))
            }
            other => {
                self.buffer.push(other);
                None
            }
        }
    }

    /// Discard any partially received line
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

fn payload(rest: &[u8]) -> String {
    let text = String::from_utf8_lossy(rest);
    let text = text.trim();
    text.strip_prefix(':').unwrap_or(text).trim().to_string()
}

fn classify(line: &[u8]) -> Response {
    if line == b"ok" {
        Response::Ack
    } else if let Some(rest) = line.strip_prefix(b"error") {
        Response::Error(payload(rest))
    } else if let Some(rest) = line.strip_prefix(b"ALARM") {
        Response::Alarm(payload(rest))
    } else {
        Response::Info(String::from_utf8_lossy(line).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ResponseParser, bytes: &[u8]) -> Vec<Response> {
        bytes.iter().filter_map(|&b| parser.feed(b)).collect()
    }

    #[test]
    fn test_ok() {
        let mut parser = ResponseParser::new();
        assert_eq!(parser.feed(b'o'), None);
        assert_eq!(parser.feed(b'k'), None);
        assert_eq!(parser.feed(b'\r'), None);
        assert_eq!(parser.feed(b'\n'), Some(Response::Ack));
    }

    #[test]
    fn test_ok_must_match_exactly() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            feed_all(&mut parser, b"okay\r\n"),
            vec![Response::Info("okay".to_string())]
        );
    }

    #[test]
    fn test_error_and_alarm_payloads() {
        let mut parser = ResponseParser::new();
        let responses = feed_all(&mut parser, b"error:20\r\nALARM:9\r\nerror: Bad number format\r\n");
        assert_eq!(
            responses,
            vec![
                Response::Error("20".to_string()),
                Response::Alarm("9".to_string()),
                Response::Error("Bad number format".to_string()),
            ]
        );
    }

    #[test]
    fn test_info_lines() {
        let mut parser = ResponseParser::new();
        let responses = feed_all(&mut parser, b"\r\nGrbl 1.1h ['$' for help]\r\n[MSG:Pgm End]\r\nok\r\n");
        assert_eq!(
            responses,
            vec![
                Response::Info(String::new()),
                Response::Info("Grbl 1.1h ['$' for help]".to_string()),
                Response::Info("[MSG:Pgm End]".to_string()),
                Response::Ack,
            ]
        );
    }

    #[test]
    fn test_buffer_resets_between_lines() {
        let mut parser = ResponseParser::new();
        feed_all(&mut parser, b"garb");
        parser.reset();
        assert_eq!(feed_all(&mut parser, b"ok\n"), vec![Response::Ack]);
    }
}
