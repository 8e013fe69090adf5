use std::fmt::Display;

use crate::http::response::StatusCode;

/// The part of a message being read when an error was noticed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    StartLine,
    Headers,
    Body,
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::StartLine => "start line",
            Self::Headers => "headers",
            Self::Body => "body",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    LineBytes,
    HeaderCount,
}

impl Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::LineBytes => "line length",
            Self::HeaderCount => "header count",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    // Syntax
    MalformedRequestLine,
    InvalidTarget,
    InvalidVersion,

    // Limits
    TooLarge {
        what: LimitKind,
        limit: usize,
        actual: usize,
    },

    // Flow / I/O
    IncompleteMessage, // stream ended before the blank line
    Timeout,
    Io(std::io::ErrorKind),
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRequestLine => f.write_str("malformed request line"),
            Self::InvalidTarget => f.write_str("invalid request target"),
            Self::InvalidVersion => f.write_str("invalid version"),
            Self::TooLarge {
                what,
                limit,
                actual,
            } => write!(
                f,
                "{} limit exceeded (limit: {}, actual: {})",
                what, limit, actual
            ),
            Self::IncompleteMessage => f.write_str("incomplete message"),
            Self::Timeout => f.write_str("timed out"),
            Self::Io(err) => Display::fmt(&err, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpParseError {
    pub kind: ParseErrorKind,
    pub location: Location,
    /// One-based index of the line being read, counted from the start of the stream.
    pub line: Option<usize>,
}

impl Display for HttpParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http parse error: {} while parsing {}", self.kind, self.location)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpParseError {}

impl HttpParseError {
    pub fn new(kind: ParseErrorKind, location: Location) -> Self {
        Self {
            kind,
            location,
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Whether the peer went away (or stalled) rather than sending something malformed.
    ///
    /// A stream that ends before the request line is a disconnect; one that ends inside the
    /// header block is a malformed request.
    pub fn is_disconnect(&self) -> bool {
        match self.kind {
            ParseErrorKind::Io(_) | ParseErrorKind::Timeout => true,
            ParseErrorKind::IncompleteMessage => self.location == Location::StartLine,
            _ => false,
        }
    }

    /// The status owed to a peer that sent something malformed, `None` once it went away
    pub fn status_code(&self) -> Option<StatusCode> {
        if self.is_disconnect() {
            return None;
        }
        Some(StatusCode::BAD_REQUEST)
    }
}
