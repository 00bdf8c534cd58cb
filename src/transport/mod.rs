// transport/mod.rs
//! The message-framed duplex channel a session runs on, plus the two bindings
//! shipped with the crate: WebSocket for real peers and an in-memory pair for
//! tests.

pub mod connection;
pub mod memory;
pub mod websocket;

pub use connection::{Connection, Dialer};
pub use websocket::{WsConnection, WsDialer, route_matches};
