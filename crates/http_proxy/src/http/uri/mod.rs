use std::{fmt, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedUriError {
    #[error("missing host")]
    MissingHost,
    #[error("unterminated IPv6 literal")]
    UnterminatedIpLiteral,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

pub type UriPort = u16;

pub const DEFAULT_PORT: UriPort = 80;
pub const DEFAULT_PATH: &str = "/";

/// The origin a request is forwarded to, split out of an absolute-form request target
///
/// `http://example.com:8080/a/b` becomes `("example.com", 8080, "/a/b")`. The scheme is not
/// checked, and a target without `//` is taken to start at the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    /// The host as written in the URI, brackets included for IPv6 literals
    pub host: String,
    pub port: UriPort,
    /// Always starts with a slash
    pub path: String,
}

impl ParsedTarget {
    /// The host in the form a socket connect expects
    pub fn connect_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }
}

impl FromStr for ParsedTarget {
    type Err = MalformedUriError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        // Only the first slashes in the target can be the scheme separator
        let rest = match uri.find('/') {
            Some(ix) if uri[ix..].starts_with("//") => &uri[ix + 2..],
            _ => uri,
        };

        // Everything up to the first slash names the origin
        let (authority, path) = match rest.find('/') {
            Some(ix) => rest.split_at(ix),
            None => (rest, ""),
        };

        let (host, port) = if authority.starts_with('[') {
            let close = authority
                .find(']')
                .ok_or(MalformedUriError::UnterminatedIpLiteral)?;
            let (host, tail) = authority.split_at(close + 1);
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(MalformedUriError::InvalidPort(tail.to_string())),
            };
            (host, port)
        } else {
            match authority.split_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (authority, DEFAULT_PORT),
            }
        };

        if host.is_empty() || host == "[]" {
            return Err(MalformedUriError::MissingHost);
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: if path.is_empty() {
                DEFAULT_PATH.to_string()
            } else {
                path.to_string()
            },
        })
    }
}

impl fmt::Display for ParsedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.host, self.port, self.path)
    }
}

fn parse_port(s: &str) -> Result<UriPort, MalformedUriError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedUriError::InvalidPort(s.to_string()));
    }
    match s.parse::<UriPort>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(MalformedUriError::InvalidPort(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(host: &str, port: UriPort, path: &str) -> ParsedTarget {
        ParsedTarget {
            host: host.to_string(),
            port,
            path: path.to_string(),
        }
    }

    #[test]
    fn parse_valid_targets() {
        let cases = &[
            (
                "http://example.com:8080/a/b",
                target("example.com", 8080, "/a/b"),
            ),
            (
                "http://example.com/index.html",
                target("example.com", 80, "/index.html"),
            ),
            ("http://host", target("host", 80, "/")),
            ("http://host:8000", target("host", 8000, "/")),
            ("http://host/", target("host", 80, "/")),
            (
                "http://host/cgi-bin/adder?15000&213",
                target("host", 80, "/cgi-bin/adder?15000&213"),
            ),
            // A colon after the first slash belongs to the path
            ("http://host/a:b", target("host", 80, "/a:b")),
            // No scheme separator, the whole string is the authority
            ("example.com:81/x", target("example.com", 81, "/x")),
            ("example.com", target("example.com", 80, "/")),
            ("example.com/a//b", target("example.com", 80, "/a//b")),
            ("http://[::1]:8080/v6", target("[::1]", 8080, "/v6")),
            ("http://[::1]/", target("[::1]", 80, "/")),
        ];

        for (uri, expected) in cases {
            assert_eq!(&uri.parse::<ParsedTarget>().unwrap(), expected, "{uri}");
        }
    }

    #[test]
    fn parse_invalid_targets() {
        let cases = &[
            ("http://", MalformedUriError::MissingHost),
            ("http:///path", MalformedUriError::MissingHost),
            ("http://:8080/", MalformedUriError::MissingHost),
            ("http://[]:80/", MalformedUriError::MissingHost),
            ("http://host:/", MalformedUriError::InvalidPort(String::new())),
            (
                "http://host:http/",
                MalformedUriError::InvalidPort("http".to_string()),
            ),
            (
                "http://host:80abc/",
                MalformedUriError::InvalidPort("80abc".to_string()),
            ),
            (
                "http://host:65536/",
                MalformedUriError::InvalidPort("65536".to_string()),
            ),
            (
                "http://host:0/",
                MalformedUriError::InvalidPort("0".to_string()),
            ),
            (
                "http://host:-1/",
                MalformedUriError::InvalidPort("-1".to_string()),
            ),
            (
                "http://host:1:2/",
                MalformedUriError::InvalidPort("1:2".to_string()),
            ),
            ("http://[::1/", MalformedUriError::UnterminatedIpLiteral),
            (
                "http://[::1]x/",
                MalformedUriError::InvalidPort("x".to_string()),
            ),
        ];

        for (uri, expected) in cases {
            assert_eq!(&uri.parse::<ParsedTarget>().unwrap_err(), expected, "{uri}");
        }
    }

    #[test]
    fn connect_host_strips_brackets() {
        assert_eq!(target("[::1]", 80, "/").connect_host(), "::1");
        assert_eq!(target("example.com", 80, "/").connect_host(), "example.com");
    }

    #[test]
    fn display() {
        assert_eq!(
            target("example.com", 8080, "/a").to_string(),
            "example.com:8080/a"
        );
    }
}
