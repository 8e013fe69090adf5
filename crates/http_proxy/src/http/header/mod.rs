use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use memchr::memchr;
use smallvec::SmallVec;
use tokio::io::AsyncRead;
use unicase::Ascii;

use crate::http::{
    parser::{HttpParseError, HttpParseResult, LimitKind, LineReader, Location, ParseErrorKind},
    uri::ParsedTarget,
};

/// How a client header line is treated when the request is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Host,
    UserAgent,
    Connection,
    ProxyConnection,
    Other,
}

impl HeaderKind {
    const MAP: &'static [(&'static str, HeaderKind)] = &[
        ("Host", Self::Host),
        ("User-Agent", Self::UserAgent),
        ("Connection", Self::Connection),
        ("Proxy-Connection", Self::ProxyConnection),
    ];

    /// Classifies a raw header line by the name before its first colon
    pub fn classify(line: &[u8]) -> Self {
        let Some(colon) = memchr(b':', line) else {
            return Self::Other;
        };
        let Ok(name) = std::str::from_utf8(&line[..colon]) else {
            return Self::Other;
        };

        let name = Ascii::new(name);
        Self::MAP
            .iter()
            .find(|(ident, _)| Ascii::new(*ident) == name)
            .map_or(Self::Other, |(_, kind)| *kind)
    }
}

/// Whether a line ends the header block
pub fn is_blank_line(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

/// The client's header block, sorted into what is kept and what the proxy replaces
///
/// Only the first `Host` line is kept. `User-Agent`, `Connection` and `Proxy-Connection` are
/// always dropped in favour of the proxy's own values. Every other line is kept verbatim, in
/// the order it arrived.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    host: Option<Bytes>,
    passthrough: SmallVec<[Bytes; 16]>,
    discarded: usize,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads header lines up to and including the blank line that ends the block
    ///
    /// `peer` only labels the debug log of each line.
    pub async fn read_from<R, P>(
        reader: &mut LineReader<R>,
        max_lines: usize,
        peer: P,
    ) -> HttpParseResult<Self>
    where
        R: AsyncRead + Unpin,
        P: fmt::Display,
    {
        let incomplete = |line: usize| {
            HttpParseError::new(ParseErrorKind::IncompleteMessage, Location::Headers).at_line(line)
        };

        let mut set = Self::new();
        let mut count = 0;
        loop {
            let line = match reader.read_line(Location::Headers).await? {
                Some(line) => line,
                None => return Err(incomplete(reader.lines_read() + 1)),
            };
            if is_blank_line(&line) {
                return Ok(set);
            }
            if !line.ends_with(b"\n") {
                // Only the last bytes before end of stream come back unterminated
                return Err(incomplete(reader.lines_read()));
            }

            count += 1;
            if count > max_lines {
                return Err(HttpParseError::new(
                    ParseErrorKind::TooLarge {
                        what: LimitKind::HeaderCount,
                        limit: max_lines,
                        actual: count,
                    },
                    Location::Headers,
                )
                .at_line(reader.lines_read()));
            }

            log::debug!("{}: > {}", peer, String::from_utf8_lossy(line.trim_ascii_end()));
            set.push(line);
        }
    }

    /// Sorts a single header line into the set
    pub fn push(&mut self, line: Bytes) -> HeaderKind {
        let kind = HeaderKind::classify(&line);
        match kind {
            HeaderKind::Host if self.host.is_none() => self.host = Some(line),
            HeaderKind::Other => self.passthrough.push(line),
            _ => self.discarded += 1,
        }
        kind
    }

    /// The client's `Host` line, if one was sent
    pub fn host(&self) -> Option<&[u8]> {
        self.host.as_deref()
    }

    pub fn passthrough(&self) -> impl Iterator<Item = &[u8]> {
        self.passthrough.iter().map(|line| line.as_ref())
    }

    /// The number of client lines replaced by the proxy's own
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Serializes the request sent to the origin
    ///
    /// ```text
    /// GET {path} HTTP/1.0
    /// Host: ...
    /// User-Agent: {user_agent}
    /// Connection: close
    /// Proxy-Connection: close
    /// {passthrough headers}
    ///
    /// ```
    pub fn to_request(&self, target: &ParsedTarget, user_agent: &str) -> Bytes {
        let len = self.passthrough.iter().map(Bytes::len).sum::<usize>() + 256;
        let mut buf = BytesMut::with_capacity(len);

        buf.put_slice(b"GET ");
        buf.put_slice(target.path.as_bytes());
        buf.put_slice(b" HTTP/1.0\r\n");

        match &self.host {
            Some(host) => buf.put_slice(host),
            None => {
                buf.put_slice(b"Host: ");
                buf.put_slice(target.host.as_bytes());
                buf.put_slice(b"\r\n");
            }
        }
        buf.put_slice(b"User-Agent: ");
        buf.put_slice(user_agent.as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(b"Connection: close\r\n");
        buf.put_slice(b"Proxy-Connection: close\r\n");

        for line in &self.passthrough {
            buf.put_slice(line);
        }
        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "carbon-test/1.0";

    fn target() -> ParsedTarget {
        "http://example.com:8080/a/b".parse().unwrap()
    }

    fn set_from(lines: &[&'static [u8]]) -> HeaderSet {
        let mut set = HeaderSet::new();
        for &line in lines {
            set.push(Bytes::from_static(line));
        }
        set
    }

    #[test]
    fn classify_header_lines() {
        let cases: &[(&[u8], HeaderKind)] = &[
            (b"Host: example.com\r\n", HeaderKind::Host),
            (b"host:example.com\r\n", HeaderKind::Host),
            (b"HOST: a\r\n", HeaderKind::Host),
            (b"user-agent: curl/8.0\r\n", HeaderKind::UserAgent),
            (b"Connection: keep-alive\r\n", HeaderKind::Connection),
            (b"PROXY-CONNECTION: keep-alive\r\n", HeaderKind::ProxyConnection),
            (b"Hostname: nope\r\n", HeaderKind::Other),
            (b"X-Host: nope\r\n", HeaderKind::Other),
            (b"Accept: */*\r\n", HeaderKind::Other),
            (b"no colon here\r\n", HeaderKind::Other),
            (b" folded: continuation\r\n", HeaderKind::Other),
            (b"\xff\xfe: binary\r\n", HeaderKind::Other),
        ];

        for (line, expected) in cases {
            assert_eq!(
                HeaderKind::classify(line),
                *expected,
                "{}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn synthesizes_host_when_missing() {
        let set = set_from(&[b"Accept: */*\r\n"]);
        let request = set.to_request(&target(), UA);
        assert_eq!(
            &request[..],
            b"GET /a/b HTTP/1.0\r\n\
              Host: example.com\r\n\
              User-Agent: carbon-test/1.0\r\n\
              Connection: close\r\n\
              Proxy-Connection: close\r\n\
              Accept: */*\r\n\
              \r\n"
        );
    }

    #[test]
    fn replaces_client_values_and_keeps_order() {
        let set = set_from(&[
            b"User-Agent: curl/8.0\r\n",
            b"Cookie: a=1\r\n",
            b"host: client.example:8080\r\n",
            b"Connection: keep-alive\r\n",
            b"Accept-Language: en\r\n",
            b"Proxy-Connection: keep-alive\r\n",
            b"Host: second.example\r\n",
            b"X-Trace: 42\r\n",
        ]);
        assert_eq!(set.host(), Some(&b"host: client.example:8080\r\n"[..]));
        assert_eq!(set.discarded(), 4);
        assert_eq!(
            set.passthrough().collect::<Vec<_>>(),
            vec![
                &b"Cookie: a=1\r\n"[..],
                &b"Accept-Language: en\r\n"[..],
                &b"X-Trace: 42\r\n"[..],
            ]
        );

        let request = set.to_request(&target(), UA);
        assert_eq!(
            &request[..],
            b"GET /a/b HTTP/1.0\r\n\
              host: client.example:8080\r\n\
              User-Agent: carbon-test/1.0\r\n\
              Connection: close\r\n\
              Proxy-Connection: close\r\n\
              Cookie: a=1\r\n\
              Accept-Language: en\r\n\
              X-Trace: 42\r\n\
              \r\n"
        );
    }

    #[test]
    fn injected_slots_appear_exactly_once() {
        let set = set_from(&[
            b"Connection: upgrade\r\n",
            b"connection: keep-alive\r\n",
            b"User-Agent: a\r\n",
            b"USER-AGENT: b\r\n",
            b"Proxy-Connection: keep-alive\r\n",
        ]);
        let request = set.to_request(&target(), UA);
        let lines: Vec<&[u8]> = request.split_inclusive(|b| *b == b'\n').collect();

        let count = |kind: HeaderKind| {
            lines
                .iter()
                .filter(|line| HeaderKind::classify(line) == kind)
                .count()
        };
        assert_eq!(count(HeaderKind::Host), 1);
        assert_eq!(count(HeaderKind::UserAgent), 1);
        assert_eq!(count(HeaderKind::Connection), 1);
        assert_eq!(count(HeaderKind::ProxyConnection), 1);
        assert!(lines.contains(&&b"Connection: close\r\n"[..]));
        assert!(lines.contains(&&b"Proxy-Connection: close\r\n"[..]));
        assert!(lines.contains(&&b"User-Agent: carbon-test/1.0\r\n"[..]));
    }

    #[tokio::test]
    async fn read_from_stops_at_blank_line() {
        let data = &b"Host: a\r\nAccept: */*\r\n\r\nleftover\r\n"[..];
        let mut reader = LineReader::new(data, 8192);

        let set = HeaderSet::read_from(&mut reader, 100, "-").await.unwrap();
        assert_eq!(set.host(), Some(&b"Host: a\r\n"[..]));
        assert_eq!(set.passthrough().count(), 1);
        // The line after the header block is left unread
        assert_eq!(
            reader.read_line(Location::Body).await.unwrap(),
            Some(Bytes::from_static(b"leftover\r\n"))
        );
    }

    #[tokio::test]
    async fn read_from_rejects_unterminated_blocks() {
        let cases: &[&[u8]] = &[b"", b"Host: a\r\n", b"Host: a\r\nAccept: */*"];

        for data in cases {
            let mut reader = LineReader::new(*data, 8192);
            let err = HeaderSet::read_from(&mut reader, 100, "-").await.unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::IncompleteMessage);
            assert_eq!(err.location, Location::Headers);
            assert!(!err.is_disconnect());
        }
    }

    #[tokio::test]
    async fn read_from_limits_header_count() {
        let data = &b"A: 1\r\nB: 2\r\nC: 3\r\n\r\n"[..];
        let mut reader = LineReader::new(data, 8192);

        let err = HeaderSet::read_from(&mut reader, 2, "-").await.unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::TooLarge {
                what: LimitKind::HeaderCount,
                limit: 2,
                actual: 3,
            }
        );
    }
}
