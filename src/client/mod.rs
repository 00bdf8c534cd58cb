//! Outgoing connection endpoint.

pub mod client;

pub use client::{Client, ClientConfig, ClientPhase};
