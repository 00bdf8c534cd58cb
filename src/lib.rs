pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use codec::{ByteBuffer, ByteOrder, CodecOptions};
pub use config::Config;
pub use server::{Registry, Server, ServerConfig};
pub use session::{MessageHandler, Session};
