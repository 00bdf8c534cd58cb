use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::select;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{ByteBuffer, CodecOptions};
use crate::errors::SessionError;
use crate::transport::Connection;

use super::handler::MessageHandler;
use super::pump::{self, PumpExit};
use super::state::SessionState;

// -----------------------------------------------------------------------------
// ----- Types -----------------------------------------------------------------

/// Runs once, on the task that wins the close transition.
pub type TeardownHook = Box<dyn Fn(&Session) + Send + Sync>;

type Context = Box<dyn Any + Send + Sync>;

#[derive(Copy, Clone, Debug)]
pub struct SessionOptions {
    /// Queue depth in each direction, and the largest message accepted.
    pub buffer_len: usize,
    pub codec: CodecOptions,
}

// -----------------------------------------------------------------------------
// ----- Session ---------------------------------------------------------------

pub struct Session {
    remote_address: String,
    conn: Arc<dyn Connection>,

    outbound: mpsc::Sender<Bytes>,
    inbound: AsyncMutex<mpsc::Receiver<Bytes>>,

    closed: CancellationToken,
    state: Mutex<SessionState>,
    teardown: Option<TeardownHook>,

    options: SessionOptions,
    context: Mutex<Option<Context>>,
}

// -----------------------------------------------------------------------------
// ----- Session: Static -------------------------------------------------------

impl Session {
    /// Wrap `conn` and start its read and write pumps. Must be called from
    /// inside a tokio runtime.
    pub fn spawn(
        conn: Arc<dyn Connection>,
        options: SessionOptions,
        teardown: Option<TeardownHook>,
    ) -> Arc<Session> {
        let depth = options.buffer_len.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(depth);
        let (inbound_tx, inbound_rx) = mpsc::channel(depth);

        let session = Arc::new(Session {
            remote_address: conn.remote_identity().to_string(),
            conn,
            outbound: outbound_tx,
            inbound: AsyncMutex::new(inbound_rx),
            closed: CancellationToken::new(),
            state: Mutex::new(SessionState::Open),
            teardown,
            options,
            context: Mutex::new(None),
        });

        let reader = Arc::clone(&session);
        tokio::spawn(async move {
            let exit = pump::read_pump(
                &*reader.conn,
                inbound_tx,
                &reader.closed,
                reader.options.buffer_len,
            )
            .await;
            reader.pump_exited("read", exit);
        });

        let writer = Arc::clone(&session);
        tokio::spawn(async move {
            let exit = pump::write_pump(&*writer.conn, outbound_rx, &writer.closed).await;
            writer.pump_exited("write", exit);

            if let Err(e) = writer.conn.close().await {
                debug!(peer = %writer.remote_address, "connection close failed: {e}");
            }
        });

        session
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Public -------------------------------------------------------

impl Session {
    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// A fresh buffer using this session's codec options.
    pub fn buffer(&self) -> ByteBuffer {
        ByteBuffer::with_options(self.options.codec)
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// True from the moment a close transition starts.
    pub fn is_closed(&self) -> bool {
        !self.state().is_open()
    }

    /// Queue `data` for the write pump, waiting while the queue is full. If the
    /// session closes first the message is dropped.
    pub async fn send(&self, data: Bytes) -> Result<(), SessionError> {
        let max = self.options.buffer_len;
        if data.len() > max {
            warn!(
                peer = %self.remote_address,
                len = data.len(),
                max,
                "outbound message exceeds buffer length; dropped"
            );
            return Err(SessionError::Oversized {
                len: data.len(),
                max,
            });
        }

        select! {
            biased;
            _ = self.closed.cancelled() => {
                self.close();
                Err(SessionError::Closed)
            }
            queued = self.outbound.send(data) => queued.map_err(|_| {
                self.close();
                SessionError::Closed
            }),
        }
    }

    /// Next inbound message, or `None` once the session has closed.
    pub async fn next_message(&self) -> Option<Bytes> {
        let mut inbound = self.inbound.lock().await;

        select! {
            biased;
            _ = self.closed.cancelled() => None,
            next = inbound.recv() => next,
        }
    }

    /// Feed inbound messages to `handler` one at a time until the session
    /// closes.
    pub async fn dispatch<H>(self: &Arc<Self>, handler: &H)
    where
        H: MessageHandler + ?Sized,
    {
        while let Some(data) = self.next_message().await {
            handler.on_message(self, data).await;
        }

        self.close();
    }

    /// Start the close transition. Returns false when another caller already
    /// did; the close signal and teardown hook run only for the first caller.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_open() {
                return false;
            }
            *state = SessionState::Closing;
        }

        self.closed.cancel();

        if let Some(teardown) = &self.teardown {
            teardown(self);
        }

        *self.state.lock() = SessionState::Closed;
        true
    }

    /// Resolves once the close signal has fired.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    pub fn set_context<T: Any + Send + Sync>(&self, value: T) {
        *self.context.lock() = Some(Box::new(value));
    }

    /// Run `f` against the attached context if it is a `T`.
    pub fn with_context<T, R>(&self, f: impl FnOnce(Option<&mut T>) -> R) -> R
    where
        T: Any + Send + Sync,
    {
        let mut context = self.context.lock();
        f(context.as_mut().and_then(|c| c.downcast_mut::<T>()))
    }
}

// -----------------------------------------------------------------------------
// ----- Session: Private ------------------------------------------------------

impl Session {
    fn pump_exited(&self, pump: &'static str, exit: PumpExit) {
        match &exit {
            PumpExit::Signalled => {}
            PumpExit::Receive(e) | PumpExit::Send(e) => {
                debug!(peer = %self.remote_address, pump, "pump stopped: {e}");
            }
            PumpExit::QueueAbandoned => {
                debug!(peer = %self.remote_address, pump, "pump stopped: queue abandoned");
            }
        }

        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("remote_address", &self.remote_address)
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::errors::TransportError;
    use crate::transport::memory::{self, MemoryConnection};

    const WAIT: Duration = Duration::from_secs(2);

    fn options(buffer_len: usize) -> SessionOptions {
        SessionOptions {
            buffer_len,
            codec: CodecOptions::default(),
        }
    }

    fn open(buffer_len: usize, teardown: Option<TeardownHook>) -> (Arc<Session>, MemoryConnection) {
        let (server_side, client_side) = memory::pair("client:1", "server");
        let session = Session::spawn(Arc::new(server_side), options(buffer_len), teardown);
        (session, client_side)
    }

    /// Collects messages and hands them to the test over a channel.
    struct Recorder {
        seen: mpsc::UnboundedSender<Bytes>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn on_message(&self, _session: &Arc<Session>, data: Bytes) {
            let _ = self.seen.send(data);
        }
    }

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn on_message(&self, session: &Arc<Session>, data: Bytes) {
            let mut inbound = ByteBuffer::wrap_with(data.to_vec(), session.options().codec);
            let text = inbound.read_string();

            let mut reply = session.buffer();
            reply.write_string(&format!("echo:{text}")).unwrap();
            let _ = session.send(reply.into_bytes()).await;
        }
    }

    #[tokio::test]
    async fn dispatch_preserves_arrival_order() {
        let (session, client) = open(16, None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let dispatcher = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.dispatch(&Recorder { seen: tx }).await })
        };

        for m in ["m1", "m2", "m3"] {
            client.send(Bytes::from(m)).await.unwrap();
        }

        for want in ["m1", "m2", "m3"] {
            let got = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(got, want);
        }

        session.close();
        timeout(WAIT, dispatcher).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn replies_reach_the_peer() {
        let (session, client) = open(64, None);
        let dispatcher = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.dispatch(&Echo).await })
        };

        let mut request = ByteBuffer::new();
        request.write_string("hello server!").unwrap();
        client.send(request.into_bytes()).await.unwrap();

        let reply = timeout(WAIT, client.receive()).await.unwrap().unwrap();
        assert_eq!(ByteBuffer::wrap(reply.to_vec()).read_string(), "echo:hello server!");

        session.close();
        timeout(WAIT, dispatcher).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn concurrent_close_runs_teardown_once() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hook: TeardownHook = {
            let teardowns = Arc::clone(&teardowns);
            Box::new(move |_| {
                teardowns.fetch_add(1, Ordering::SeqCst);
            })
        };
        let (session, _client) = open(8, Some(hook));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.close() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn peer_disconnect_closes_session() {
        let (session, client) = open(8, None);
        client.close().await.unwrap();

        timeout(WAIT, session.closed()).await.unwrap();
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn close_shuts_the_connection() {
        let (session, client) = open(8, None);
        session.close();

        let res = timeout(WAIT, client.receive()).await.unwrap();
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn oversized_inbound_is_dropped_and_session_survives() {
        let (session, client) = open(8, None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let dispatcher = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.dispatch(&Recorder { seen: tx }).await })
        };

        client.send(Bytes::from(vec![1u8; 9])).await.unwrap();
        client.send(Bytes::from_static(b"ok")).await.unwrap();

        let got = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(got, "ok");
        assert!(!session.is_closed());

        session.close();
        timeout(WAIT, dispatcher).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn oversized_outbound_is_rejected() {
        let (session, _client) = open(4, None);
        let err = session.send(Bytes::from_static(b"12345")).await.unwrap_err();
        assert_eq!(err, SessionError::Oversized { len: 5, max: 4 });
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn send_after_close_is_dropped() {
        let (session, _client) = open(4, None);
        session.close();

        let err = session.send(Bytes::from_static(b"late")).await.unwrap_err();
        assert_eq!(err, SessionError::Closed);
    }

    /// Accepts writes and never finishes them.
    struct Stalled;

    #[async_trait]
    impl Connection for Stalled {
        async fn send(&self, _data: Bytes) -> Result<(), TransportError> {
            std::future::pending().await
        }

        async fn receive(&self) -> Result<Bytes, TransportError> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn remote_identity(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn blocked_send_is_released_by_close() {
        let session = Session::spawn(Arc::new(Stalled), options(1), None);

        // one message stuck in the pump, one queued, the third must wait
        let sender = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let mut results = Vec::new();
                for m in ["a", "b", "c"] {
                    results.push(session.send(Bytes::from(m)).await);
                }
                results
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sender.is_finished());

        session.close();
        let results = timeout(WAIT, sender).await.unwrap().unwrap();
        assert_eq!(results.last(), Some(&Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn context_round_trip() {
        let (session, _client) = open(4, None);
        assert!(session.with_context::<u32, _>(|c| c.is_none()));

        session.set_context(41u32);
        session.with_context::<u32, _>(|c| *c.unwrap() += 1);

        assert_eq!(session.with_context::<u32, _>(|c| c.copied()), Some(42));
        assert!(session.with_context::<String, _>(|c| c.is_none()));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
