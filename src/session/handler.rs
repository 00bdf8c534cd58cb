use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use super::session::Session;

// -----------------------------------------------------------------------------
// ----- MessageHandler --------------------------------------------------------

/// User code driven by a session's dispatch loop.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Called once per inbound message, in arrival order. The next message is
    /// not dispatched until this returns.
    async fn on_message(&self, session: &Arc<Session>, data: Bytes);

    /// Called once when the session closes, after it left the registry.
    fn on_close(&self, _session: &Session) {}
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
