// session/mod.rs
//! One accepted connection: read/write pumps, bounded queues, and the
//! once-only close transition.

pub mod handler;
pub(crate) mod pump;
pub mod session;
pub mod state;

pub use handler::MessageHandler;
pub use session::{Session, SessionOptions, TeardownHook};
pub use state::SessionState;
