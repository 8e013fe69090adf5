use bytes::{BufMut, Bytes, BytesMut};

use crate::http::response::StatusCode;

/// An HTML error response sent to the client in place of an origin response
///
/// ```text
/// HTTP/1.0 {code} {reason}
/// Content-type: text/html
/// Content-length: {len}
///
/// <html><title>Proxy Error</title>...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    status: StatusCode,
    long_message: String,
    cause: String,
}

impl ErrorPage {
    pub fn new(status: StatusCode, long_message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            status,
            long_message: long_message.into(),
            cause: cause.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn body(&self) -> String {
        let reason = self.status.canonical_reason().unwrap_or("Unknown reason");
        format!(
            "<html><title>Proxy Error</title><body bgcolor=\"ffffff\">\r\n\
             {}: {}\r\n\
             <p>{}: {}\r\n\
             <hr><em>The Carbon Web proxy</em>\r\n",
            self.status,
            reason,
            escape_html(&self.long_message),
            escape_html(&self.cause),
        )
    }

    pub fn to_bytes(&self) -> Bytes {
        let reason = self.status.canonical_reason().unwrap_or("Unknown reason");
        let body = self.body();
        let head = format!(
            "HTTP/1.0 {} {}\r\nContent-type: text/html\r\nContent-length: {}\r\n\r\n",
            self.status,
            reason,
            body.len()
        );

        let mut buf = BytesMut::with_capacity(head.len() + body.len());
        buf.put_slice(head.as_bytes());
        buf.put_slice(body.as_bytes());
        buf.freeze()
    }
}

/// The cause usually echoes part of the client's request back
fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            ch => escaped.push(ch),
        }
    }
    escaped
}
