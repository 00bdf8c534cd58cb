use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::codec::CodecOptions;
use crate::session::{MessageHandler, Session, SessionOptions, TeardownHook};
use crate::transport::{Connection, websocket};

use super::registry::Registry;

// -----------------------------------------------------------------------------
// ----- ServerConfig ----------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Route the WebSocket upgrade is served on. A trailing `/` makes it a
    /// prefix.
    pub pattern: String,
    pub buffer_len: usize,
    pub codec: CodecOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            pattern: "/".to_string(),
            buffer_len: 1024,
            codec: CodecOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            buffer_len: self.buffer_len,
            codec: self.codec,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// -----------------------------------------------------------------------------
// ----- Server ----------------------------------------------------------------

/// Accepts connections, keeps the registry, and feeds every session's
/// messages to one shared handler. Cloning is cheap; clones share state.
pub struct Server<H> {
    config: Arc<ServerConfig>,
    handler: Arc<H>,
    registry: Arc<Registry>,
    stop: CancellationToken,
}

impl<H> Clone for Server<H> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            handler: Arc::clone(&self.handler),
            registry: Arc::clone(&self.registry),
            stop: self.stop.clone(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Server: Static --------------------------------------------------------

impl<H: MessageHandler> Server<H> {
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self::with_registry(config, handler, Arc::new(Registry::new()))
    }

    /// Use a registry the handler already holds, e.g. to broadcast from it.
    pub fn with_registry(config: ServerConfig, handler: H, registry: Arc<Registry>) -> Self {
        Self {
            config: Arc::new(config),
            handler: Arc::new(handler),
            registry,
            stop: CancellationToken::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Server: Public --------------------------------------------------------

impl<H: MessageHandler> Server<H> {
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run one already upgraded connection until its session closes.
    pub async fn accept(&self, conn: Arc<dyn Connection>) {
        let session = Session::spawn(
            conn,
            self.config.session_options(),
            Some(self.teardown_hook()),
        );

        info!(peer = %session.remote_address(), "session connect");
        self.registry.insert(Arc::clone(&session));

        // the pumps may already have closed the session, and its teardown ran
        // before the entry existed
        if session.is_closed() {
            self.registry.remove(&session);
        }

        // stop() only closes what was registered when it ran
        if self.stop.is_cancelled() {
            session.close();
        }

        session.dispatch(&*self.handler).await;
    }

    /// Accept loop over `listener` until `stop` is called.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        let local = listener.local_addr()?;
        info!(%local, pattern = %self.config.pattern, "wscrab listening");

        loop {
            select! {
                _ = self.stop.cancelled() => {
                    info!(%local, "wscrab shutting down");
                    break;
                }

                accept_res = listener.accept() => {
                    let (stream, peer) = match accept_res {
                        Ok(v) => v,
                        Err(e) => { error!("accept error: {e}"); continue; }
                    };

                    let _ = stream.set_nodelay(true);

                    let server = self.clone();
                    tokio::spawn(async move {
                        match websocket::accept(stream, peer, &server.config.pattern).await {
                            Ok(conn) => server.accept(Arc::new(conn)).await,
                            Err(e) => debug!(%peer, "upgrade failed: {e}"),
                        }
                    });
                }
            }
        }

        Ok(())
    }

    /// Bind the configured host and port, then `serve`.
    pub async fn listen(&self) -> io::Result<()> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        self.serve(listener).await
    }

    pub async fn broadcast(&self, data: Bytes) -> usize {
        self.registry.broadcast(data).await
    }

    /// Force one client off. Unknown keys are ignored.
    pub fn shutdown_client(&self, key: &str) {
        self.registry.shutdown(key);
    }

    /// End the accept loop and close every live session.
    pub fn stop(&self) {
        self.stop.cancel();

        for session in self.registry.snapshot() {
            session.close();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Server: Private -------------------------------------------------------

impl<H: MessageHandler> Server<H> {
    fn teardown_hook(&self) -> TeardownHook {
        let registry = Arc::clone(&self.registry);
        let handler = Arc::clone(&self.handler);

        Box::new(move |session: &Session| {
            registry.remove(session);
            handler.on_close(session);
            info!(peer = %session.remote_address(), "session break");
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
