//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! `accept` only takes the TCP stream off the listener. The WebSocket
//! handshake runs in [`PendingWebSocket::upgrade`], on whatever task the
//! caller picks.
//!
//! Each upgraded stream is split into its sink and stream halves, each
//! behind its own lock. A connection task can then sit in `recv` for as
//! long as it likes while other sessions push broadcasts through `send`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Pending, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = PendingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP stream");
        Ok(PendingWebSocket { stream, addr })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::BindFailed)
    }
}

/// A TCP stream that has not sent its WebSocket upgrade request yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingWebSocket {
    /// The remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Pending for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let ws = tokio_tungstenite::accept_async(self.stream).await.map_err(|e| {
            TransportError::HandshakeFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let next = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let id = ConnectionId::new(next);
        tracing::debug!(%id, addr = %self.addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends `data` as a text frame when it is UTF-8 (JSON always is),
    /// otherwise as a binary frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match String::from_utf8(data.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(e) => Message::Binary(e.into_bytes().into()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
