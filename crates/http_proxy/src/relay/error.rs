use crate::http::{
    method::Method,
    parser::HttpParseError,
    response::{ErrorPage, StatusCode},
    uri::MalformedUriError,
};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("bad client request: {0}")]
    Client(#[source] HttpParseError),
    #[error("method {0} is not implemented")]
    NotImplemented(Method),
    #[error("malformed request URI {uri:?}: {source}")]
    Uri {
        uri: String,
        #[source]
        source: MalformedUriError,
    },
    #[error("origin {origin} is unreachable: {source}")]
    OriginUnreachable {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to forward the request to {origin}: {source}")]
    ForwardFailed {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    #[error("origin {origin} closed the connection without responding")]
    EmptyResponse { origin: String },
    #[error("bad origin response: {0}")]
    Origin(#[source] HttpParseError),
    #[error(transparent)]
    Transport(#[from] std::io::Error),
}

impl RelayError {
    /// The page owed to the client, if it can still be told anything
    ///
    /// This only applies while no origin bytes have been relayed yet.
    pub fn error_response(&self) -> Option<ErrorPage> {
        Some(match self {
            Self::Client(err) => ErrorPage::new(
                err.status_code()?,
                "Proxy could not parse the request",
                err.kind.to_string(),
            ),
            Self::NotImplemented(method) => ErrorPage::new(
                StatusCode::NOT_IMPLEMENTED,
                "Proxy does not implement this method",
                method.to_string(),
            ),
            Self::Uri { uri, .. } => ErrorPage::new(
                StatusCode::BAD_REQUEST,
                "Proxy could not parse the request URI",
                uri.clone(),
            ),
            Self::OriginUnreachable { origin, .. } => ErrorPage::new(
                StatusCode::BAD_GATEWAY,
                "Proxy could not connect to the origin server",
                origin.clone(),
            ),
            Self::ForwardFailed { origin, .. } | Self::EmptyResponse { origin } => ErrorPage::new(
                StatusCode::BAD_GATEWAY,
                "Origin server did not respond",
                origin.clone(),
            ),
            Self::Origin(err) => ErrorPage::new(
                StatusCode::BAD_GATEWAY,
                "Proxy could not read the origin response",
                err.kind.to_string(),
            ),
            Self::Transport(_) => return None,
        })
    }

    /// Whether the client simply went away, which is not worth a warning
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Client(err) => err.is_disconnect(),
            Self::Transport(_) => true,
            _ => false,
        }
    }
}
