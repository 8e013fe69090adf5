//! Shared helpers for exercising the proxy over in-memory and loopback sockets

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf},
    net::{TcpListener, TcpStream},
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::sleep,
};

/// A reader fed by a channel, for simulating a peer that sends its bytes in pieces
pub struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl ChannelReader {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
        }
    }

    /// Sends `data` in chunks of `chunk` bytes, sleeping `delay` before each one
    pub fn drip(data: impl Into<Vec<u8>>, chunk: usize, delay: Duration) -> Self {
        let data = data.into();
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for piece in data.chunks(chunk.max(1)) {
                sleep(delay).await;
                if tx.send(piece.to_vec()).await.is_err() {
                    return;
                }
            }
        });
        Self::new(rx)
    }
}

impl AsyncRead for ChannelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pending.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => self.pending = chunk,
                // Sender gone, end of stream
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }

        let n = self.pending.len().min(buf.remaining());
        buf.put_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Poll::Ready(Ok(()))
    }
}

type Responder = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

/// A loopback origin server that reads one request head per connection, answers it and closes
pub struct MockOrigin {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    requests: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl MockOrigin {
    /// Answers every request with the same bytes
    pub async fn start(response: impl Into<Vec<u8>>) -> io::Result<Self> {
        let response = response.into();
        Self::start_with(move |_| response.clone()).await
    }

    /// Answers each request with whatever `respond` builds from its head
    pub async fn start_with<F>(respond: F) -> io::Result<Self>
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let respond: Arc<Responder> = Arc::new(respond);

        let task = {
            let accepted = accepted.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(answer(stream, respond.clone(), tx.clone()));
                }
            })
        };

        Ok(Self {
            addr,
            accepted,
            requests: Mutex::new(rx),
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// How many connections the origin has accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// The next request head the origin received, in arrival order
    pub async fn next_request(&self) -> Option<Vec<u8>> {
        self.requests.lock().await.recv().await
    }
}

impl Drop for MockOrigin {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(mut stream: TcpStream, respond: Arc<Responder>, requests: mpsc::UnboundedSender<Vec<u8>>) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let response = respond(&head);
    let _ = requests.send(head);
    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
}

/// Sends raw bytes to `addr`, half-closes, and returns everything received until the peer closes
pub async fn request_raw(addr: SocketAddr, request: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    stream.shutdown().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}

/// A loopback address nothing is listening on
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind a loopback port");
    listener.local_addr().expect("listener has no local address")
}
