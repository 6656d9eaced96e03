use std::sync::Arc;

use ramble_core::{now_millis, Id, Session};
use ramble_store::Store;

use crate::error::Result;

/// Tracks the single currently-active conversation session. Starting a
/// new session ends whatever was active — unlike the
/// per-channel session map this is generalized from, there is exactly
/// one conversation at a time.
pub struct SessionManager {
    store: Arc<Store>,
}

impl SessionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn initialize(&self) -> Result<Session> {
        match self.store.get_active_session()? {
            Some(session) => Ok(session),
            None => self.start_session(),
        }
    }

    pub fn start_session(&self) -> Result<Session> {
        if let Some(active) = self.store.get_active_session()? {
            self.store.end_session(&active.id, now_millis(), None)?;
        }
        let session = Session {
            id: Id::new(),
            started_at: now_millis(),
            ended_at: None,
            unit_count: 0,
            summary: None,
            mood_trajectory: None,
        };
        self.store.create_session(&session)?;
        Ok(session)
    }

    pub fn end_session(&self, summary: Option<String>) -> Result<()> {
        if let Some(active) = self.store.get_active_session()? {
            self.store.end_session(&active.id, now_millis(), summary)?;
        }
        Ok(())
    }

    pub fn get_active_session(&self) -> Result<Option<Session>> {
        Ok(self.store.get_active_session()?)
    }

    pub fn increment_unit_count(&self, session_id: &Id) -> Result<()> {
        self.store.increment_session_unit_count(session_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_a_session_ends_the_previous_one() {
        let manager = SessionManager::new(Arc::new(Store::in_memory("default").unwrap()));
        let first = manager.start_session().unwrap();
        let second = manager.start_session().unwrap();
        assert_ne!(first.id, second.id);

        let active = manager.get_active_session().unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[test]
    fn initialize_reuses_an_existing_active_session() {
        let manager = SessionManager::new(Arc::new(Store::in_memory("default").unwrap()));
        let started = manager.start_session().unwrap();
        let initialized = manager.initialize().unwrap();
        assert_eq!(started.id, initialized.id);
    }
}
