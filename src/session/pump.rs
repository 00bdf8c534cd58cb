//! Read and write pumps shared by server sessions and the client endpoint.
//!
//! Each pump loops until something ends it and then returns why. The owner
//! runs its close transition on every return, so a pump has exactly one exit.

use bytes::Bytes;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::TransportError;
use crate::transport::Connection;

// -----------------------------------------------------------------------------
// ----- PumpExit --------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum PumpExit {
    /// The close signal fired.
    Signalled,
    Receive(TransportError),
    Send(TransportError),
    /// The other end of a queue went away.
    QueueAbandoned,
}

// -----------------------------------------------------------------------------
// ----- Pumps -----------------------------------------------------------------

/// Connection -> inbound queue. Messages longer than `max_len` are dropped
/// and the pump keeps going.
pub(crate) async fn read_pump(
    conn: &dyn Connection,
    inbound: mpsc::Sender<Bytes>,
    closed: &CancellationToken,
    max_len: usize,
) -> PumpExit {
    loop {
        let data = select! {
            biased;
            _ = closed.cancelled() => return PumpExit::Signalled,
            received = conn.receive() => match received {
                Ok(data) => data,
                Err(e) => return PumpExit::Receive(e),
            },
        };

        if data.len() > max_len {
            warn!(
                peer = conn.remote_identity(),
                len = data.len(),
                max = max_len,
                "inbound message exceeds buffer length; dropped"
            );
            continue;
        }

        select! {
            biased;
            _ = closed.cancelled() => return PumpExit::Signalled,
            queued = inbound.send(data) => {
                if queued.is_err() {
                    return PumpExit::QueueAbandoned;
                }
            }
        }
    }
}

/// Outbound queue -> connection. A send stuck on a slow peer is abandoned
/// when the close signal fires.
pub(crate) async fn write_pump(
    conn: &dyn Connection,
    mut outbound: mpsc::Receiver<Bytes>,
    closed: &CancellationToken,
) -> PumpExit {
    loop {
        let data = select! {
            biased;
            _ = closed.cancelled() => return PumpExit::Signalled,
            next = outbound.recv() => match next {
                Some(data) => data,
                None => return PumpExit::QueueAbandoned,
            },
        };

        select! {
            biased;
            _ = closed.cancelled() => return PumpExit::Signalled,
            sent = conn.send(data) => {
                if let Err(e) = sent {
                    return PumpExit::Send(e);
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
