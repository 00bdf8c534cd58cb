use bytes::Bytes;
use parking_lot::Mutex;
use std::mem;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

use crate::codec::{ByteBuffer, CodecOptions};
use crate::errors::ClientError;
use crate::session::{Session, SessionOptions, TeardownHook};
use crate::transport::{Dialer, WsDialer};

// -----------------------------------------------------------------------------
// ----- ClientConfig ----------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub buffer_len: usize,
    pub codec: CodecOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            path: "/".to_string(),
            buffer_len: 1024,
            codec: CodecOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn url(&self) -> String {
        let path = self.path.trim_start_matches('/');
        format!("ws://{}:{}/{}", self.host, self.port, path)
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            buffer_len: self.buffer_len,
            codec: self.codec,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ClientPhase -----------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClientPhase {
    Idle,
    Connecting,
    Connected,
    /// Terminal. Reconnecting takes a new `Client`.
    Closed,
}

enum Phase {
    Idle,
    Connecting,
    Connected(Arc<Session>),
    Closed,
}

type CloseCallback = Box<dyn FnOnce() + Send>;

// -----------------------------------------------------------------------------
// ----- Client ----------------------------------------------------------------

/// One outgoing connection. The pumps, queues and close transition are the
/// same ones a server session runs.
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    phase: Mutex<Phase>,
    codec: Mutex<CodecOptions>,
    on_close: Mutex<Option<CloseCallback>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// ----- Client: Static --------------------------------------------------------

impl Client {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Idle),
                codec: Mutex::new(CodecOptions::default()),
                on_close: Mutex::new(None),
            }),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Client: Public --------------------------------------------------------

impl Client {
    /// Dial `config.url()` over WebSocket.
    pub async fn connect(&self, config: &ClientConfig) -> Result<(), ClientError> {
        self.connect_with(config, &WsDialer).await
    }

    pub async fn connect_with<D>(&self, config: &ClientConfig, dialer: &D) -> Result<(), ClientError>
    where
        D: Dialer + ?Sized,
    {
        {
            let mut phase = self.inner.phase.lock();
            match *phase {
                Phase::Idle => *phase = Phase::Connecting,
                Phase::Connecting | Phase::Connected(_) => return Err(ClientError::AlreadyConnected),
                Phase::Closed => return Err(ClientError::Closed),
            }
        }

        let url = config.url();
        let conn = match dialer.dial(&url).await {
            Ok(conn) => conn,
            Err(source) => {
                let mut phase = self.inner.phase.lock();
                if matches!(*phase, Phase::Connecting) {
                    *phase = Phase::Idle;
                }
                return Err(ClientError::Dial { url, source });
            }
        };

        *self.inner.codec.lock() = config.codec;
        let session = Session::spawn(conn, config.session_options(), Some(self.teardown_hook()));

        {
            let mut phase = self.inner.phase.lock();
            if matches!(*phase, Phase::Connecting) {
                *phase = Phase::Connected(Arc::clone(&session));
                info!(%url, "client connected");
                return Ok(());
            }
        }

        // closed while dialing
        session.close();
        Err(ClientError::Closed)
    }

    /// Queue `data` for the server. Does nothing unless connected.
    pub async fn send(&self, data: Bytes) {
        let Some(session) = self.session() else {
            debug!("client not connected; message dropped");
            return;
        };

        // failures are already logged by the session
        let _ = session.send(data).await;
    }

    /// Hand every inbound message to `on_message`, in arrival order, until the
    /// connection closes.
    pub async fn receive<F>(&self, mut on_message: F)
    where
        F: FnMut(Bytes),
    {
        let Some(session) = self.session() else {
            return;
        };

        while let Some(data) = session.next_message().await {
            on_message(data);
        }

        session.close();
    }

    /// Replace the close callback. It runs at most once.
    pub fn on_close(&self, callback: impl FnOnce() + Send + 'static) {
        *self.inner.on_close.lock() = Some(Box::new(callback));
    }

    /// Close the connection. The close callback only runs if the client was
    /// connected.
    pub fn close(&self) {
        let previous = mem::replace(&mut *self.inner.phase.lock(), Phase::Closed);

        if let Phase::Connected(session) = previous {
            session.close();
            self.inner.finish();
        }
    }

    pub fn phase(&self) -> ClientPhase {
        match *self.inner.phase.lock() {
            Phase::Idle => ClientPhase::Idle,
            Phase::Connecting => ClientPhase::Connecting,
            Phase::Connected(_) => ClientPhase::Connected,
            Phase::Closed => ClientPhase::Closed,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == ClientPhase::Connected
    }

    /// A fresh buffer using the codec options of the last connect.
    pub fn buffer(&self) -> ByteBuffer {
        ByteBuffer::with_options(*self.inner.codec.lock())
    }
}

// -----------------------------------------------------------------------------
// ----- Client: Private -------------------------------------------------------

impl Client {
    fn session(&self) -> Option<Arc<Session>> {
        match &*self.inner.phase.lock() {
            Phase::Connected(session) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    fn teardown_hook(&self) -> TeardownHook {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);

        Box::new(move |session: &Session| {
            info!(peer = %session.remote_address(), "client disconnected");
            let Some(inner) = inner.upgrade() else {
                return;
            };

            // close() and the dialing path handle their own phase change
            let previous = mem::replace(&mut *inner.phase.lock(), Phase::Closed);
            if matches!(previous, Phase::Connected(_)) {
                drop(previous);
                inner.finish();
            }
        })
    }
}

impl Inner {
    fn finish(&self) {
        let callback = self.on_close.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::transport::Connection;
    use crate::transport::memory::{self, MemoryConnection, MemoryDialer};

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> ClientConfig {
        ClientConfig {
            buffer_len: 64,
            ..ClientConfig::default()
        }
    }

    async fn connected() -> (Client, MemoryConnection) {
        let (client_side, server_side) = memory::pair("server", "client:1");
        let client = Client::new();
        client
            .connect_with(&config(), &MemoryDialer::new(client_side))
            .await
            .unwrap();
        (client, server_side)
    }

    #[test]
    fn url_joins_host_port_and_path() {
        let mut config = config();
        assert_eq!(config.url(), "ws://127.0.0.1:8080/");

        config.path = "chat".to_string();
        assert_eq!(config.url(), "ws://127.0.0.1:8080/chat");

        config.path = "/chat".to_string();
        assert_eq!(config.url(), "ws://127.0.0.1:8080/chat");
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (client, _server) = connected().await;
        let (spare, _) = memory::pair("server", "client:2");

        let err = client
            .connect_with(&config(), &MemoryDialer::new(spare))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::AlreadyConnected));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn dial_failure_leaves_client_idle() {
        let client = Client::new();
        let err = client
            .connect_with(&config(), &MemoryDialer::refusing())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Dial { .. }));
        assert_eq!(client.phase(), ClientPhase::Idle);

        let (client_side, _server) = memory::pair("server", "client:1");
        client
            .connect_with(&config(), &MemoryDialer::new(client_side))
            .await
            .unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn closed_client_cannot_reconnect() {
        let (client, _server) = connected().await;
        client.close();

        let (spare, _) = memory::pair("server", "client:2");
        let err = client
            .connect_with(&config(), &MemoryDialer::new(spare))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn close_callback_runs_once() {
        let (client, server) = connected().await;
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            client.on_close(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        client.close();
        client.close();
        server.close().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.phase(), ClientPhase::Closed);
    }

    #[tokio::test]
    async fn close_before_connect_skips_callback() {
        let client = Client::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            client.on_close(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        client.close();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.phase(), ClientPhase::Closed);
    }

    #[tokio::test]
    async fn server_disconnect_closes_client() {
        let (client, server) = connected().await;
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            client.on_close(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        server.close().await.unwrap();
        timeout(WAIT, client.receive(|_| {})).await.unwrap();

        timeout(WAIT, async {
            while client.phase() != ClientPhase::Closed {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn receive_preserves_arrival_order() {
        let (client, server) = connected().await;
        for m in ["m1", "m2", "m3"] {
            server.send(Bytes::from(m)).await.unwrap();
        }

        let mut seen = Vec::new();
        timeout(
            WAIT,
            client.receive(|data| {
                seen.push(data);
                if seen.len() == 3 {
                    client.close();
                }
            }),
        )
        .await
        .unwrap();

        assert_eq!(seen, ["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn send_reaches_the_server() {
        let (client, server) = connected().await;

        let mut request = client.buffer();
        request.write_string("hello").unwrap();
        client.send(request.into_bytes()).await;

        let got = timeout(WAIT, server.receive()).await.unwrap().unwrap();
        assert_eq!(ByteBuffer::wrap(got.to_vec()).read_string(), "hello");
    }

    #[tokio::test]
    async fn send_before_connect_is_a_no_op() {
        let client = Client::new();
        client.send(Bytes::from_static(b"nobody")).await;
        assert_eq!(client.phase(), ClientPhase::Idle);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
