use std::time::Duration;

use bytes::{Bytes, BytesMut};
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

mod error;
mod line;
pub use error::*;
pub use line::*;

pub type HttpParseResult<T> = Result<T, HttpParseError>;

/// A buffered reader handing out one LF-terminated line at a time
///
/// Lines are returned with their terminator (`\r\n` or `\n`) intact so they can be relayed
/// byte for byte. A line longer than the configured maximum is rejected instead of being split.
pub struct LineReader<READER> {
    inner: READER,
    buf: BytesMut,
    max_line: usize,
    timeout: Option<Duration>,
    lines: usize,
    eof: bool,
}

impl<READER> LineReader<READER>
where
    READER: AsyncRead + Unpin,
{
    const BUF_SIZE: usize = 8192;

    pub fn new(reader: READER, max_line: usize) -> Self {
        Self {
            inner: reader,
            buf: BytesMut::with_capacity(Self::BUF_SIZE),
            max_line,
            timeout: None,
            lines: 0,
            eof: false,
        }
    }

    /// Bounds every read from the underlying stream
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The number of lines handed out so far
    pub fn lines_read(&self) -> usize {
        self.lines
    }

    /// Reads the next line, blocking until one is complete or the stream ends
    ///
    /// Returns `Ok(None)` on a clean end of stream. Bytes left over at the end of the stream
    /// without a trailing newline are returned once as a final, unterminated line.
    pub async fn read_line(&mut self, location: Location) -> HttpParseResult<Option<Bytes>> {
        let mut scanned = 0;
        loop {
            if let Some(nl) = memchr(b'\n', &self.buf[scanned..]) {
                let len = scanned + nl + 1;
                if len > self.max_line {
                    return Err(self.too_long(location, len));
                }
                self.lines += 1;
                return Ok(Some(self.buf.split_to(len).freeze()));
            }

            scanned = self.buf.len();
            if scanned > self.max_line {
                // Too long whether or not a terminator follows
                return Err(self.too_long(location, scanned));
            }

            if self.eof {
                if scanned == 0 {
                    return Ok(None);
                }
                self.lines += 1;
                return Ok(Some(self.buf.split().freeze()));
            }

            self.fill(location).await?;
        }
    }

    async fn fill(&mut self, location: Location) -> HttpParseResult<()> {
        let line = self.lines + 1;
        let timeout = self.timeout;
        self.buf.reserve(Self::BUF_SIZE);
        let read = self.inner.read_buf(&mut self.buf);
        let result = match timeout {
            Some(dur) => match tokio::time::timeout(dur, read).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(HttpParseError::new(ParseErrorKind::Timeout, location).at_line(line));
                }
            },
            None => read.await,
        };

        let n = result.map_err(|err| {
            HttpParseError::new(ParseErrorKind::Io(err.kind()), location).at_line(line)
        })?;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }

    fn too_long(&self, location: Location, actual: usize) -> HttpParseError {
        HttpParseError::new(
            ParseErrorKind::TooLarge {
                what: LimitKind::LineBytes,
                limit: self.max_line,
                actual,
            },
            location,
        )
        .at_line(self.lines + 1)
    }
}
