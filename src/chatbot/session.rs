//! In-memory per-user sessions.
//!
//! Each user gets a [`SessionHandle`] with two locks: a short field lock for
//! reading and writing language and stage, and an async turn gate held for a
//! whole turn so that one user's turns never interleave.
//!
//! Sessions nobody has touched for a while are dropped by
//! [`SessionStore::evict_idle`]; the user simply starts over with a language prompt.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;

use crate::chatbot::language::LanguageCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingLanguage,
    Active,
}

/// Everything remembered about a user. No personal data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSession {
    pub language: LanguageCode,
    pub stage: Stage,
}

impl UserSession {
    pub fn new(language: LanguageCode) -> Self {
        Self {
            language,
            stage: Stage::AwaitingLanguage,
        }
    }
}

#[derive(Debug)]
pub struct SessionHandle {
    state: Mutex<UserSession>,
    turn: AsyncMutex<()>,
    last_seen: Mutex<Instant>,
}

impl SessionHandle {
    fn new(language: LanguageCode) -> Self {
        Self {
            state: Mutex::new(UserSession::new(language)),
            turn: AsyncMutex::new(()),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }

    fn lock_state(&self) -> MutexGuard<'_, UserSession> {
        // Fields are plain Copy values, a poisoned guard still holds a valid session.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> UserSession {
        *self.lock_state()
    }

    pub fn update(&self, f: impl FnOnce(&mut UserSession)) {
        f(&mut *self.lock_state());
    }

    /// Wait for this user's previous turn to finish.
    pub async fn begin_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

#[derive(Debug)]
pub struct SessionStore {
    default_language: LanguageCode,
    sessions: RwLock<HashMap<SessionKey, Arc<SessionHandle>>>,
}

impl SessionStore {
    pub fn new(default_language: LanguageCode) -> Self {
        Self {
            default_language,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Existing session for `key`, or a fresh one awaiting a language choice.
    pub fn get_or_create(&self, key: SessionKey) -> Arc<SessionHandle> {
        {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(handle) = sessions.get(&key) {
                handle.touch();
                return Arc::clone(handle);
            }
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let handle = sessions
            .entry(key)
            .or_insert_with(|| Arc::new(SessionHandle::new(self.default_language)));
        handle.touch();
        Arc::clone(handle)
    }

    pub fn get(&self, key: SessionKey) -> Option<UserSession> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(&key).map(|h| h.snapshot())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions not fetched for at least `max_idle`. A session whose
    /// handle is still held by a running turn is kept. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, handle| Arc::strong_count(handle) > 1 || handle.idle_for() < max_idle);
        before - sessions.len()
    }
}
