use thiserror::Error;
use tokio_tungstenite::tungstenite;

// -----------------------------------------------------------------------------
// ----- TransportError --------------------------------------------------------

/// Failures reported by a `Connection`. Each one ends the session that sees it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("no endpoint listening at {url}")]
    Unreachable { url: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

// -----------------------------------------------------------------------------
// ----- SessionError ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session closed; message dropped")]
    Closed,

    #[error("message of {len} bytes exceeds the {max} byte buffer length")]
    Oversized { len: usize, max: usize },
}

// -----------------------------------------------------------------------------
// ----- ClientError -----------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("already connected")]
    AlreadyConnected,

    #[error("client was closed; create a new client to reconnect")]
    Closed,

    #[error("dial {url} failed: {source}")]
    Dial {
        url: String,
        source: TransportError,
    },
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
