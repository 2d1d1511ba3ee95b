use std::collections::HashMap;

use crate::entities::{AccountId, SessionHandle};

/// Live sessions keyed by account.
///
/// Filled only by successful authentication and emptied only by explicit
/// disconnect. Lives for one process run; nothing here is persisted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<AccountId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the session for `id`
    pub fn register(&mut self, id: AccountId, handle: SessionHandle) {
        self.sessions.insert(id, handle);
    }

    /// Drop the session for `id`, returning it if one was registered
    pub fn unregister(&mut self, id: &AccountId) -> Option<SessionHandle> {
        self.sessions.remove(id)
    }

    pub fn is_connected(&self, id: &AccountId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of every live session, sorted by account id
    pub fn all(&self) -> Vec<(AccountId, SessionHandle)> {
        let mut all: Vec<_> = self
            .sessions
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
