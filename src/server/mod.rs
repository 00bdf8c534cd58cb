//! Server side: the session registry and the accept loop that feeds it.

pub mod registry;
pub mod server;

pub use registry::Registry;
pub use server::{Server, ServerConfig};
