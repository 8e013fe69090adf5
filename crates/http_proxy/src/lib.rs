//! A concurrent HTTP/1.0 forwarding proxy
//!
//! Every accepted connection carries exactly one `GET` request with an absolute-form target.
//! The request is rewritten for the origin, sent over a fresh connection, and the origin's
//! response is streamed back line by line until the origin closes.

pub mod config;
pub mod http;
pub mod relay;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use config::ProxyConfig;
use relay::{OriginConnector, Relay, TcpConnector};
use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    sync::{OwnedSemaphorePermit, Semaphore},
};

#[derive(Debug, thiserror::Error)]
pub enum HttpProxyError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub struct HttpProxy<K = TcpConnector> {
    listener: TcpListener,
    inner: Arc<HttpProxyInternal<K>>,
}

impl HttpProxy<TcpConnector> {
    /// Binds the listening socket, the only step that can fail for good
    pub async fn bind<A: Into<SocketAddr>>(addr: A, config: ProxyConfig) -> Result<Self, HttpProxyError> {
        let connector = TcpConnector::new(config.connect_timeout);
        Self::bind_with_connector(addr, config, connector).await
    }
}

impl<K> HttpProxy<K>
where
    K: OriginConnector,
{
    pub async fn bind_with_connector<A: Into<SocketAddr>>(
        addr: A,
        config: ProxyConfig,
        connector: K,
    ) -> Result<Self, HttpProxyError> {
        let addr = addr.into();
        let sock = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };

        sock.set_reuseaddr(true)?;
        sock.bind(addr)?;
        let listener = sock.listen(1024)?;

        Ok(Self {
            listener,
            inner: Arc::new(HttpProxyInternal { config, connector }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HttpProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, handing each one to its own task
    pub async fn serve(self) -> Result<(), HttpProxyError> {
        let Self { listener, inner } = self;
        let permits = inner.config.max_connections.clamp(1, Semaphore::MAX_PERMITS);
        let limiter = Arc::new(Semaphore::new(permits));

        loop {
            let Ok(permit) = limiter.clone().acquire_owned().await else {
                return Ok(());
            };
            let (stream, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    // Usually out of file descriptors, give in-flight relays a moment to finish
                    log::warn!("failed to accept connection: {}", err);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            log::info!("accepted connection from {}", addr);
            tokio::spawn(HttpProxyInternal::handle_connection(
                inner.clone(),
                stream,
                addr,
                permit,
            ));
        }
    }
}

pub(crate) struct HttpProxyInternal<K> {
    config: ProxyConfig,
    connector: K,
}

impl<K> HttpProxyInternal<K>
where
    K: OriginConnector,
{
    async fn handle_connection(
        sel: Arc<Self>,
        stream: TcpStream,
        addr: SocketAddr,
        _permit: OwnedSemaphorePermit,
    ) {
        if let Err(err) = stream.set_nodelay(true) {
            log::debug!("{}: failed to set TCP_NODELAY: {}", addr, err);
        }

        let relay = Relay::new(&sel.config, &sel.connector).with_peer(addr);
        match relay.run(stream).await {
            Ok(summary) => {
                let target = summary
                    .target
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                log::info!(
                    "{}: GET {} relayed {} lines ({} bytes)",
                    addr,
                    target,
                    summary.lines,
                    summary.bytes
                );
            }
            Err(err) if err.is_disconnect() => log::debug!("{}: {}", addr, err),
            Err(err) => log::warn!("{}: {}", addr, err),
        }
    }
}
