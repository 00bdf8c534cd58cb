//! WebSocket binding of `Connection` on top of `tokio-tungstenite`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async, connect_async};
use tracing::debug;

use crate::errors::TransportError;

use super::connection::{Connection, Dialer};

// -----------------------------------------------------------------------------
// ----- WsConnection ----------------------------------------------------------

pub struct WsConnection<S> {
    peer: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    source: Mutex<SplitStream<WebSocketStream<S>>>,
    closed: AtomicBool,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(stream: WebSocketStream<S>, peer: impl Into<String>) -> Self {
        let (sink, source) = stream.split();

        Self {
            peer: peer.into(),
            sink: Mutex::new(sink),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- WsConnection: Connection ----------------------------------------------

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        self.sink.lock().await.send(Message::Binary(data)).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Bytes, TransportError> {
        let mut source = self.source.lock().await;

        loop {
            match source.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Text(text))) => return Ok(Bytes::copy_from_slice(text.as_bytes())),
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remote_identity(&self) -> &str {
        &self.peer
    }
}

// -----------------------------------------------------------------------------
// ----- Server Handshake ------------------------------------------------------

/// Upgrade an accepted TCP stream. Requests whose path does not match
/// `pattern` are answered with 404 and never become a connection.
pub async fn accept(
    stream: TcpStream,
    peer: SocketAddr,
    pattern: &str,
) -> Result<WsConnection<TcpStream>, TransportError> {
    let check_route = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        if route_matches(pattern, path) {
            return Ok(response);
        }

        debug!(%peer, path, pattern, "rejecting upgrade: no route");
        let mut rejection = ErrorResponse::new(Some(format!("no route for {path}")));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let ws = accept_hdr_async(stream, check_route).await?;
    Ok(WsConnection::new(ws, peer.to_string()))
}

/// Path matching as in a plain HTTP mux: a pattern ending in `/` is a prefix,
/// anything else must match exactly.
pub fn route_matches(pattern: &str, path: &str) -> bool {
    if pattern.ends_with('/') {
        path.starts_with(pattern)
    } else {
        path == pattern
    }
}

// -----------------------------------------------------------------------------
// ----- WsDialer --------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn Connection>, TransportError> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Arc::new(WsConnection::new(ws, url)))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_pattern_is_a_prefix() {
        assert!(route_matches("/", "/"));
        assert!(route_matches("/", "/anything/at/all"));
        assert!(route_matches("/ws/", "/ws/chat"));
        assert!(!route_matches("/ws/", "/ws"));
    }

    #[test]
    fn plain_pattern_matches_exactly() {
        assert!(route_matches("/ws", "/ws"));
        assert!(!route_matches("/ws", "/ws/"));
        assert!(!route_matches("/ws", "/other"));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
