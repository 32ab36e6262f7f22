use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ExplorerError;
use crate::session::SessionState;

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub state: SessionState,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_access: now,
            state: SessionState::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.last_access > timeout
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of live sessions. Each session sits behind its own mutex so
/// interactions within a session run one at a time.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    timeout: chrono::Duration,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        info!("Created session {}", id);
        (id, handle)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, ExplorerError> {
        let id = parse_id(session_id)?;
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ExplorerError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn remove(&self, session_id: &str) -> Result<(), ExplorerError> {
        let id = parse_id(session_id)?;
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!("Removed session {}", id);
                Ok(())
            }
            None => Err(ExplorerError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drops sessions idle for longer than the timeout. Sessions busy with
    /// an interaction are left for the next sweep.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(session) if session.is_expired(now, self.timeout) => {
                debug!("Session {} expired (last access {})", id, session.last_access);
                false
            }
            _ => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Expired {} idle sessions, {} remain", removed, sessions.len());
        }
        removed
    }
}

fn parse_id(session_id: &str) -> Result<Uuid, ExplorerError> {
    Uuid::parse_str(session_id).map_err(|_| ExplorerError::SessionNotFound {
        session_id: session_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let (a, _) = manager.create().await;
        let (b, _) = manager.create().await;
        assert_ne!(a, b);
        assert_eq!(manager.len().await, 2);

        manager.remove(&a.to_string()).await.unwrap();
        assert!(manager.get(&a.to_string()).await.is_err());
        assert!(manager.get(&b.to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let manager = SessionManager::new(Duration::from_secs(60));
        assert!(matches!(
            manager.get("not-a-uuid").await,
            Err(ExplorerError::SessionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let manager = SessionManager::new(Duration::from_secs(60));
        let (stale, handle) = manager.create().await;
        let (fresh, _) = manager.create().await;
        handle.lock().await.last_access = Utc::now() - chrono::Duration::minutes(5);

        assert_eq!(manager.purge_expired().await, 1);
        assert!(manager.get(&stale.to_string()).await.is_err());
        assert!(manager.get(&fresh.to_string()).await.is_ok());
    }
}
