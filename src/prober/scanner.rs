//! Incremental HTTP response scanner.
//!
//! The scanner looks at one byte at a time and keeps all of its progress in
//! two small state variables, so a response can be fed in chunks of any size
//! and still produce the same header boundary and content length as if it had
//! arrived in one piece.

const CONTENT_LENGTH: &[u8] = b"content-length";

/// Progress towards a blank line that ends the header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    /// Beginning of the response, nothing seen yet.
    Start,
    /// Inside a header line.
    Text,
    Lf,
    Cr,
    CrLf,
    CrLfCr,
}

impl Line {
    fn at_line_start(self) -> bool {
        !matches!(self, Line::Text)
    }
}

/// Progress matching `Content-Length: <digits>` at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Idle,
    /// Number of name characters matched so far.
    Name(usize),
    Colon,
    Space,
    Digits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Headers { line: Line, token: Token },
    Body,
}

/// What the scanner knows after the latest [`ResponseScanner::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerOutcome {
    pub headers_done: bool,
    pub content_length: Option<u64>,
    /// Only ever true when a content length was announced.
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct ResponseScanner {
    state: State,
    content_length: Option<u64>,
    body_bytes: u64,
}

impl Default for ResponseScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseScanner {
    pub fn new() -> Self {
        Self {
            state: State::Headers {
                line: Line::Start,
                token: Token::Idle,
            },
            content_length: None,
            body_bytes: 0,
        }
    }

    /// Consume one chunk of the response stream.
    ///
    /// Once the announced body length has been reached, any further bytes
    /// (in this chunk or later ones) are ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> ScannerOutcome {
        let mut rest = chunk;
        while let State::Headers { line, token } = self.state {
            let Some((&byte, tail)) = rest.split_first() else {
                break;
            };
            rest = tail;
            self.state = self.step(line, token, byte);
        }

        if self.state == State::Body {
            let take = match self.remaining() {
                Some(remaining) => remaining.min(rest.len() as u64),
                None => rest.len() as u64,
            };
            self.body_bytes += take;
        }

        self.outcome()
    }

    pub fn outcome(&self) -> ScannerOutcome {
        ScannerOutcome {
            headers_done: self.headers_done(),
            content_length: self.content_length,
            complete: self.is_complete(),
        }
    }

    pub fn headers_done(&self) -> bool {
        self.state == State::Body
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Body bytes seen so far, never more than the announced length.
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    pub fn is_complete(&self) -> bool {
        self.headers_done() && self.remaining() == Some(0)
    }

    fn remaining(&self) -> Option<u64> {
        self.content_length
            .map(|len| len.saturating_sub(self.body_bytes))
    }

    fn step(&mut self, line: Line, token: Token, byte: u8) -> State {
        let line = match (line, byte) {
            (Line::Lf | Line::CrLf | Line::CrLfCr, b'\n') => return State::Body,
            (Line::Cr | Line::CrLfCr, b'\r') => return State::Body,
            (Line::Cr, b'\n') => Line::CrLf,
            (Line::CrLf, b'\r') => Line::CrLfCr,
            (_, b'\n') => Line::Lf,
            (_, b'\r') => Line::Cr,
            (line, _) => {
                let token = if line.at_line_start() {
                    self.begin_line(byte)
                } else {
                    self.advance(token, byte)
                };
                return State::Headers {
                    line: Line::Text,
                    token,
                };
            }
        };
        State::Headers {
            line,
            token: Token::Idle,
        }
    }

    fn begin_line(&mut self, byte: u8) -> Token {
        self.advance(Token::Name(0), byte)
    }

    fn advance(&mut self, token: Token, byte: u8) -> Token {
        match token {
            Token::Idle => Token::Idle,
            Token::Name(matched) if matched < CONTENT_LENGTH.len() => {
                if byte.eq_ignore_ascii_case(&CONTENT_LENGTH[matched]) {
                    Token::Name(matched + 1)
                } else {
                    Token::Idle
                }
            }
            Token::Name(_) if byte == b':' => Token::Colon,
            Token::Name(_) => Token::Idle,
            Token::Colon | Token::Space if byte == b' ' || byte == b'\t' => Token::Space,
            Token::Colon | Token::Space if byte.is_ascii_digit() => {
                self.content_length = Some(u64::from(byte - b'0'));
                Token::Digits
            }
            Token::Digits if byte.is_ascii_digit() => {
                // Saturates instead of wrapping; an absurd length then simply
                // never completes and the probe falls back to peer close.
                let value = self
                    .content_length
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(u64::from(byte - b'0'));
                self.content_length = Some(value);
                Token::Digits
            }
            Token::Colon | Token::Space | Token::Digits => Token::Idle,
        }
    }
}
