use std::fmt::{Debug, Display};

use bytes::Bytes;

/// An HTTP Method
///
/// Standard methods are recognised regardless of case, anything else is kept verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct Method(Repr);

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Bytes> for Method {
    fn from(value: Bytes) -> Self {
        match Builtin::from_token(&value) {
            Some(builtin) => Method(Repr::Builtin(builtin)),
            None => Method(Repr::Custom(value)),
        }
    }
}

impl Method {
    pub const GET: Self = Self(Repr::Builtin(Builtin::GET));
    pub const POST: Self = Self(Repr::Builtin(Builtin::POST));

    /// The only method the proxy forwards
    pub fn is_get(&self) -> bool {
        matches!(self.0, Repr::Builtin(Builtin::GET))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    Builtin(Builtin),
    Custom(Bytes),
}

impl Display for Repr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(builtin) => Display::fmt(builtin, f),
            Self::Custom(custom) => f.write_str(&String::from_utf8_lossy(custom)),
        }
    }
}

// The builtin variant should fit in the niche of `Bytes`
static_assertions::assert_eq_size!(Repr, Bytes);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,
    CONNECT,
    TRACE,
}

impl Builtin {
    const MAP: &'static [(&'static [u8], Builtin)] = &[
        (b"GET", Self::GET),
        (b"HEAD", Self::HEAD),
        (b"POST", Self::POST),
        (b"PUT", Self::PUT),
        (b"DELETE", Self::DELETE),
        (b"PATCH", Self::PATCH),
        (b"OPTIONS", Self::OPTIONS),
        (b"CONNECT", Self::CONNECT),
        (b"TRACE", Self::TRACE),
    ];

    fn from_token(token: &[u8]) -> Option<Self> {
        Self::MAP
            .iter()
            .find(|(name, _)| token.eq_ignore_ascii_case(name))
            .map(|(_, builtin)| *builtin)
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GET => "GET",
            Self::HEAD => "HEAD",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::DELETE => "DELETE",
            Self::PATCH => "PATCH",
            Self::OPTIONS => "OPTIONS",
            Self::CONNECT => "CONNECT",
            Self::TRACE => "TRACE",
        })
    }
}
