//! Relays a single proxied request from a client connection to its origin and back

use std::{fmt, io, net::SocketAddr, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{
    config::ProxyConfig,
    http::{
        header::HeaderSet,
        parser::{HttpParseError, LineReader, Location, ParseErrorKind, RequestLine},
        uri::ParsedTarget,
    },
};

pub mod connector;
mod error;
pub use connector::{OriginConnector, TcpConnector};
pub use error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    ReadRequestLine,
    ValidateMethod,
    ParseUri,
    ReconcileHeaders,
    ConnectOrigin,
    ForwardRequest,
    RelayResponseHeaders,
    RelayResponseBody,
    Closed,
}

impl RelayState {
    fn next(self) -> Self {
        match self {
            Self::ReadRequestLine => Self::ValidateMethod,
            Self::ValidateMethod => Self::ParseUri,
            Self::ParseUri => Self::ReconcileHeaders,
            Self::ReconcileHeaders => Self::ConnectOrigin,
            Self::ConnectOrigin => Self::ForwardRequest,
            Self::ForwardRequest => Self::RelayResponseHeaders,
            Self::RelayResponseHeaders => Self::RelayResponseBody,
            Self::RelayResponseBody | Self::Closed => Self::Closed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// What a finished relay forwarded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub target: Option<ParsedTarget>,
    /// Response lines written to the client
    pub lines: usize,
    /// Response bytes written to the client
    pub bytes: u64,
}

struct Peer(Option<SocketAddr>);

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => fmt::Display::fmt(&addr, f),
            None => f.write_str("-"),
        }
    }
}

/// Drives one client connection from its request line to the end of the origin's response
pub struct Relay<'a, K> {
    config: &'a ProxyConfig,
    connector: &'a K,
    peer: Peer,
    state: RelayState,
    summary: RelaySummary,
}

impl<'a, K> Relay<'a, K>
where
    K: OriginConnector,
{
    pub fn new(config: &'a ProxyConfig, connector: &'a K) -> Self {
        Self {
            config,
            connector,
            peer: Peer(None),
            state: RelayState::ReadRequestLine,
            summary: RelaySummary::default(),
        }
    }

    pub fn with_peer(mut self, addr: SocketAddr) -> Self {
        self.peer = Peer(Some(addr));
        self
    }

    /// Serves the connection and closes it, whatever the outcome
    ///
    /// Client-side failures that happen before any of the origin's response was relayed are
    /// answered with an error page.
    pub async fn run<S>(mut self, client: S) -> Result<RelaySummary, RelayError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(client);
        let mut reader =
            LineReader::new(reader, self.config.max_line_bytes).with_timeout(self.config.io_timeout);

        let result = self.exchange(&mut reader, &mut writer).await;
        if let Err(err) = &result {
            if self.summary.bytes == 0 {
                if let Some(page) = err.error_response() {
                    log::debug!("{}: responding with {}", self.peer, page.status());
                    if let Err(write_err) =
                        write_all(&mut writer, &page.to_bytes(), self.config.io_timeout).await
                    {
                        log::debug!("{}: failed to send error page: {}", self.peer, write_err);
                    }
                }
            }
        }

        self.state = RelayState::Closed;
        log::trace!("{}: -> {:?}", self.peer, self.state);
        if let Err(err) = writer.shutdown().await {
            log::trace!("{}: shutdown: {}", self.peer, err);
        }
        result.map(|()| self.summary)
    }

    fn advance(&mut self) {
        self.state = self.state.next();
        log::trace!("{}: -> {:?}", self.peer, self.state);
    }

    async fn exchange<R, W>(&mut self, reader: &mut LineReader<R>, client: &mut W) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let line = reader
            .read_line(Location::StartLine)
            .await
            .map_err(RelayError::Client)?
            .ok_or_else(|| {
                RelayError::Client(HttpParseError::new(
                    ParseErrorKind::IncompleteMessage,
                    Location::StartLine,
                ))
            })?;
        log::debug!("{}: {}", self.peer, String::from_utf8_lossy(line.trim_ascii_end()));
        let request = RequestLine::parse(&line).map_err(RelayError::Client)?;

        self.advance();
        if !request.method.is_get() {
            return Err(RelayError::NotImplemented(request.method));
        }

        self.advance();
        let target: ParsedTarget = request.target.parse().map_err(|source| RelayError::Uri {
            uri: request.target.clone(),
            source,
        })?;
        let origin = format!("{}:{}", target.host, target.port);

        self.advance();
        let headers = HeaderSet::read_from(reader, self.config.max_header_lines, &self.peer)
            .await
            .map_err(RelayError::Client)?;
        let outbound = headers.to_request(&target, &self.config.user_agent);
        log::debug!(
            "{}: forwarding to {} ({} client headers replaced)",
            self.peer,
            origin,
            headers.discarded()
        );

        self.advance();
        let stream = self
            .connector
            .connect(target.connect_host(), target.port)
            .await
            .map_err(|source| RelayError::OriginUnreachable {
                origin: origin.clone(),
                source,
            })?;
        self.summary.target = Some(target);
        let (origin_reader, mut origin_writer) = tokio::io::split(stream);

        self.advance();
        write_all(&mut origin_writer, &outbound, self.config.io_timeout)
            .await
            .map_err(|source| RelayError::ForwardFailed {
                origin: origin.clone(),
                source,
            })?;

        self.advance();
        let mut origin_reader = LineReader::new(origin_reader, self.config.max_line_bytes)
            .with_timeout(self.config.io_timeout);
        loop {
            let Some(line) = origin_reader
                .read_line(Location::Headers)
                .await
                .map_err(RelayError::Origin)?
            else {
                if self.summary.lines == 0 {
                    return Err(RelayError::EmptyResponse { origin });
                }
                // Origin hung up inside its header block, nothing left to relay
                return Ok(());
            };
            self.forward(client, &line).await?;
            log::debug!("{}: < {}", self.peer, String::from_utf8_lossy(line.trim_ascii_end()));
            if &line[..] == b"\r\n" {
                break;
            }
        }

        self.advance();
        while let Some(line) = origin_reader
            .read_line(Location::Body)
            .await
            .map_err(RelayError::Origin)?
        {
            self.forward(client, &line).await?;
        }

        Ok(())
    }

    /// Writes one origin line straight through to the client
    async fn forward<W>(&mut self, client: &mut W, line: &[u8]) -> Result<(), RelayError>
    where
        W: AsyncWrite + Unpin,
    {
        write_all(client, line, self.config.io_timeout).await?;
        self.summary.lines += 1;
        self.summary.bytes += line.len() as u64;
        Ok(())
    }
}

async fn write_all<W>(writer: &mut W, buf: &[u8], timeout: Duration) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match tokio::time::timeout(timeout, writer.write_all(buf)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}
