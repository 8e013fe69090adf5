use std::ops::Range;

use bytes::Bytes;
use memchr::memchr2;

use crate::http::{
    HttpVersion,
    method::Method,
    parser::{HttpParseError, HttpParseResult, Location, ParseErrorKind},
};

/// Splits a line into words separated by runs of spaces or tabs
struct Words<'a> {
    line: &'a [u8],
    cursor: usize,
}

impl<'a> Words<'a> {
    fn new(line: &'a [u8]) -> Self {
        Self { line, cursor: 0 }
    }
}

impl Iterator for Words<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.line.len() && matches!(self.line[self.cursor], b' ' | b'\t') {
            self.cursor += 1;
        }
        if self.cursor >= self.line.len() {
            return None;
        }

        let start = self.cursor;
        let end = match memchr2(b' ', b'\t', &self.line[start..]) {
            Some(sp) => start + sp,
            None => self.line.len(),
        };
        self.cursor = end;
        Some(start..end)
    }
}

/// A parsed request line
/// ABNF: request-line = method SP request-target SP HTTP-version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: HttpVersion,
}

impl RequestLine {
    /// Parses a raw request line, with or without its line terminator
    pub fn parse(line: &Bytes) -> HttpParseResult<Self> {
        #[inline]
        fn make_err(kind: ParseErrorKind) -> HttpParseError {
            HttpParseError::new(kind, Location::StartLine).at_line(1)
        }

        let trimmed = line.trim_ascii_end();
        let mut words = Words::new(trimmed);

        let method = words
            .next()
            .ok_or_else(|| make_err(ParseErrorKind::MalformedRequestLine))?;
        let target = words
            .next()
            .ok_or_else(|| make_err(ParseErrorKind::MalformedRequestLine))?;
        let version = words
            .next()
            .ok_or_else(|| make_err(ParseErrorKind::MalformedRequestLine))?;
        if words.next().is_some() {
            return Err(make_err(ParseErrorKind::MalformedRequestLine));
        }

        // The target is copied into the origin's request line, so no CR or other control bytes
        let target = &trimmed[target];
        if target.iter().any(u8::is_ascii_control) {
            return Err(make_err(ParseErrorKind::InvalidTarget));
        }
        let target = std::str::from_utf8(target)
            .map_err(|_| make_err(ParseErrorKind::InvalidTarget))?
            .to_string();
        let version = std::str::from_utf8(&trimmed[version])
            .ok()
            .and_then(|v| v.parse::<HttpVersion>().ok())
            .ok_or_else(|| make_err(ParseErrorKind::InvalidVersion))?;

        Ok(Self {
            method: Method::from(line.slice_ref(&trimmed[method])),
            target,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_skip_runs_of_whitespace() {
        let line = b"  GET \t http://a/  HTTP/1.0 ";
        let words: Vec<_> = Words::new(line).map(|r| &line[r]).collect();
        assert_eq!(words, vec![&b"GET"[..], &b"http://a/"[..], &b"HTTP/1.0"[..]]);
    }

    #[test]
    fn parse_request_line() {
        let cases: &[(&'static [u8], Result<RequestLine, ParseErrorKind>)] = &[
            (
                b"GET http://example.com/ HTTP/1.1\r\n",
                Ok(RequestLine {
                    method: Method::GET,
                    target: "http://example.com/".to_string(),
                    version: HttpVersion::HTTP_1_1,
                }),
            ),
            (
                b"get http://example.com:8080/a HTTP/1.0\n",
                Ok(RequestLine {
                    method: Method::GET,
                    target: "http://example.com:8080/a".to_string(),
                    version: HttpVersion::HTTP_1_0,
                }),
            ),
            (
                b"POST http://example.com/form HTTP/1.0\r\n",
                Ok(RequestLine {
                    method: Method::POST,
                    target: "http://example.com/form".to_string(),
                    version: HttpVersion::HTTP_1_0,
                }),
            ),
            (b"\r\n", Err(ParseErrorKind::MalformedRequestLine)),
            (b"GET /\r\n", Err(ParseErrorKind::MalformedRequestLine)),
            (
                b"GET / HTTP/1.0 trailing\r\n",
                Err(ParseErrorKind::MalformedRequestLine),
            ),
            (b"GET / HTTQ/1.0\r\n", Err(ParseErrorKind::InvalidVersion)),
            (b"GET /\xff HTTP/1.0\r\n", Err(ParseErrorKind::InvalidTarget)),
            (
                b"GET http://h/a\rX-Evil:1 HTTP/1.0\r\n",
                Err(ParseErrorKind::InvalidTarget),
            ),
            (b"GET http://h/\x00 HTTP/1.0\r\n", Err(ParseErrorKind::InvalidTarget)),
            (b"GET http://h/\x7f HTTP/1.0\r\n", Err(ParseErrorKind::InvalidTarget)),
        ];

        for (data, expected) in cases {
            let line = Bytes::from_static(*data);
            match (RequestLine::parse(&line), expected) {
                (Ok(parsed), Ok(expected)) => assert_eq!(&parsed, expected),
                (Err(err), Err(kind)) => {
                    assert_eq!(&err.kind, kind);
                    assert_eq!(err.location, Location::StartLine);
                }
                (parsed, expected) => panic!("{:?}: got {:?}, expected {:?}", line, parsed, expected),
            }
        }
    }
}
