use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::session::Session;

// -----------------------------------------------------------------------------
// ----- Registry --------------------------------------------------------------

/// Live sessions keyed by remote address.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: DashMap<String, Arc<Session>>,
}

// -----------------------------------------------------------------------------
// ----- Registry: Public ------------------------------------------------------

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` under its remote address, replacing any stale entry.
    pub fn insert(&self, session: Arc<Session>) {
        let key = session.remote_address().to_string();
        if let Some(previous) = self.sessions.insert(key, session) {
            debug!(peer = %previous.remote_address(), "registry entry replaced");
        }
    }

    /// Remove the entry for `session`, but only if it is still this session.
    /// Returns whether something was removed.
    pub fn remove(&self, session: &Session) -> bool {
        self.sessions
            .remove_if(session.remote_address(), |_, stored| {
                std::ptr::eq(Arc::as_ptr(stored), session)
            })
            .is_some()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Copy of the current entries. No map lock is held once this returns.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Queue `data` to every open session. Returns how many accepted it.
    pub async fn broadcast(&self, data: Bytes) -> usize {
        if data.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for session in self.snapshot() {
            if session.is_closed() {
                continue;
            }

            match session.send(data.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(peer = %session.remote_address(), "broadcast skipped: {e}"),
            }
        }

        delivered
    }

    /// Close the session registered under `key`, if any.
    pub fn shutdown(&self, key: &str) {
        // the map ref must be gone before close, teardown removes from the map
        let Some(session) = self.get(key) else {
            return;
        };

        if !session.is_closed() {
            session.close();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
