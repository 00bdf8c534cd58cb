//! In-process `Connection` pair. Each side's `send` lands in the other side's
//! `receive`; closing either side ends both.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::select;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::errors::TransportError;

use super::connection::{Connection, Dialer};

// -----------------------------------------------------------------------------
// ----- MemoryConnection ------------------------------------------------------

#[derive(Debug)]
pub struct MemoryConnection {
    identity: String,
    outgoing: mpsc::UnboundedSender<Bytes>,
    incoming: AsyncMutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: CancellationToken,
    peer_closed: CancellationToken,
}

/// Two connected endpoints. `a` reports `peer_of_a` as its remote identity and
/// vice versa.
pub fn pair(peer_of_a: &str, peer_of_b: &str) -> (MemoryConnection, MemoryConnection) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    let a_closed = CancellationToken::new();
    let b_closed = CancellationToken::new();

    let a = MemoryConnection {
        identity: peer_of_a.to_string(),
        outgoing: a_tx,
        incoming: AsyncMutex::new(a_rx),
        closed: a_closed.clone(),
        peer_closed: b_closed.clone(),
    };

    let b = MemoryConnection {
        identity: peer_of_b.to_string(),
        outgoing: b_tx,
        incoming: AsyncMutex::new(b_rx),
        closed: b_closed,
        peer_closed: a_closed,
    };

    (a, b)
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryConnection: Connection ------------------------------------------

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if self.closed.is_cancelled() || self.peer_closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        self.outgoing.send(data).map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Bytes, TransportError> {
        let mut incoming = self.incoming.lock().await;

        select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            msg = incoming.recv() => msg.ok_or(TransportError::Closed),
            _ = self.peer_closed.cancelled() => Err(TransportError::Closed),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.cancel();
        Ok(())
    }

    fn remote_identity(&self) -> &str {
        &self.identity
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryDialer ----------------------------------------------------------

/// Hands out one prepared connection, then refuses.
#[derive(Debug)]
pub struct MemoryDialer {
    pending: Mutex<Option<MemoryConnection>>,
}

impl MemoryDialer {
    pub fn new(conn: MemoryConnection) -> Self {
        Self {
            pending: Mutex::new(Some(conn)),
        }
    }

    pub fn refusing() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn Connection>, TransportError> {
        let Some(conn) = self.pending.lock().take() else {
            return Err(TransportError::Unreachable {
                url: url.to_string(),
            });
        };

        Ok(Arc::new(conn))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
