//! In-memory session store.
//!
//! Sessions live in a `HashMap` behind an `RwLock`; each session is
//! additionally wrapped in its own `tokio::sync::Mutex`, so mutation is
//! serialized per session while lookups stay cheap. One answer per session
//! is in flight at a time — question N+1 cannot be generated before the
//! call for question N finishes.
//!
//! Nothing is persisted: sessions are gone when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::session::QuizSession;

/// A session handle with its own mutation lock.
pub type SharedSession = Arc<tokio::sync::Mutex<QuizSession>>;

/// Concurrency-safe map from session id to session.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, returning its id.
    pub fn put(&self, session: QuizSession) -> Uuid {
        let id = session.session_id;
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.inner.write().unwrap().insert(id, shared);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.inner.read().unwrap().get(id).cloned()
    }

    pub fn delete(&self, id: &Uuid) -> bool {
        self.inner.write().unwrap().remove(id).is_some()
    }

    /// Number of live sessions, for the health endpoint.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;
    use crate::session::QuizSession;

    fn sample_session() -> QuizSession {
        QuizSession::new(
            "Karem",
            3,
            3,
            Question {
                text: "Q?".to_string(),
                options: vec![],
                correct_answers: vec!["si".to_string()],
                hints: vec![],
                success_message: String::new(),
                category: "general".to_string(),
                difficulty: Default::default(),
                data_source: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SessionStore::new();
        let id = store.put(sample_session());

        let shared = store.get(&id).expect("session should exist");
        let session = shared.lock().await;
        assert_eq!(session.session_id, id);
        assert_eq!(session.user_name, "Karem");
    }

    #[test]
    fn test_get_unknown_id() {
        let store = SessionStore::new();
        assert!(store.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_delete() {
        let store = SessionStore::new();
        let id = store.put(sample_session());
        assert_eq!(store.len(), 1);

        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_through_handle_is_visible() {
        let store = SessionStore::new();
        let id = store.put(sample_session());

        {
            let shared = store.get(&id).unwrap();
            let mut session = shared.lock().await;
            session.process_answer("si").unwrap();
        }

        let shared = store.get(&id).unwrap();
        let session = shared.lock().await;
        assert_eq!(session.correct_count, 1);
    }
}
