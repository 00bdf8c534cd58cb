#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use wscrab::{ByteBuffer, Client, ClientConfig, MessageHandler, Server, ServerConfig, Session};

pub const WAIT: Duration = Duration::from_secs(5);

// -----------------------------------------------------------------------------
// ----- Handlers --------------------------------------------------------------

/// Decodes one string per message and answers `echo:<text>`.
pub struct Echo;

#[async_trait]
impl MessageHandler for Echo {
    async fn on_message(&self, session: &Arc<Session>, data: Bytes) {
        let mut inbound = ByteBuffer::wrap_with(data.to_vec(), session.options().codec);
        let text = inbound.read_string();

        let mut reply = session.buffer();
        if reply.write_string(&format!("echo:{text}")).is_ok() {
            let _ = session.send(reply.into_bytes()).await;
        }
    }
}

/// Sends every message straight back.
pub struct Mirror;

#[async_trait]
impl MessageHandler for Mirror {
    async fn on_message(&self, session: &Arc<Session>, data: Bytes) {
        let _ = session.send(data).await;
    }
}

/// Accepts everything and answers nothing.
pub struct Silent;

#[async_trait]
impl MessageHandler for Silent {
    async fn on_message(&self, _session: &Arc<Session>, _data: Bytes) {}
}

// -----------------------------------------------------------------------------
// ----- In-process server -----------------------------------------------------

pub async fn start_server<H: MessageHandler>(pattern: &str, handler: H) -> (Server<H>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        pattern: pattern.to_string(),
        buffer_len: 4096,
        ..ServerConfig::default()
    };

    let server = Server::new(config, handler);
    {
        let server = server.clone();
        tokio::spawn(async move { server.serve(listener).await });
    }

    (server, addr)
}

pub fn client_config(addr: SocketAddr, path: &str) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        path: path.to_string(),
        buffer_len: 4096,
        ..ClientConfig::default()
    }
}

/// A connected client whose inbound messages land on the returned channel.
pub async fn connect(config: &ClientConfig) -> (Arc<Client>, mpsc::UnboundedReceiver<Bytes>) {
    let client = Arc::new(Client::new());
    client.connect(config).await.expect("client connect");

    let (tx, rx) = mpsc::unbounded_channel();
    {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .receive(|data| {
                    let _ = tx.send(data);
                })
                .await
        });
    }

    (client, rx)
}

pub async fn next(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Bytes {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("client channel closed")
}

pub fn encode(text: &str) -> Bytes {
    let mut buf = ByteBuffer::new();
    buf.write_string(text).unwrap();
    buf.into_bytes()
}

pub fn decode(data: &Bytes) -> String {
    ByteBuffer::wrap(data.to_vec()).read_string()
}

pub async fn wait_until(check: impl Fn() -> bool) {
    timeout(WAIT, async {
        while !check() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// -----------------------------------------------------------------------------
// ----- Binary ----------------------------------------------------------------

pub fn reserve_port(host: &str) -> u16 {
    let addr = format!("{host}:0");
    let listener = StdTcpListener::bind(&addr).expect("bind ephemeral port");
    listener.local_addr().unwrap().port()
}

pub fn spawn_wscrab(host: &str, port: u16) -> std::process::Child {
    let exe = env!("CARGO_BIN_EXE_wscrab");

    Command::new(exe)
        .env("WSCRAB_HOST", host)
        .env("WSCRAB_PORT", port.to_string())
        .env_remove("WSCRAB_CONFIG_FILE")
        .spawn()
        .expect("spawn wscrab")
}

pub async fn wait_for_listen(host: &str, port: u16) {
    let addr = format!("{host}:{port}");
    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("wscrab did not start listening on {addr}");
}
