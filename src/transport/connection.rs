use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::errors::TransportError;

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// A full-duplex channel that already delivers whole messages.
///
/// `send` and `receive` are called concurrently from different tasks.
/// `receive` must be cancel safe: pumps race it against the session's close
/// signal and drop the future when the signal wins.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn send(&self, data: Bytes) -> Result<(), TransportError>;

    async fn receive(&self) -> Result<Bytes, TransportError>;

    /// Idempotent.
    async fn close(&self) -> Result<(), TransportError>;

    fn remote_identity(&self) -> &str;
}

// -----------------------------------------------------------------------------
// ----- Dialer ----------------------------------------------------------------

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<Arc<dyn Connection>, TransportError>;
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
