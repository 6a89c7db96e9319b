use crate::nav::NavState;
use crate::scraper::{MovieDetails, Provider, QualityLink, SearchHit};
use moka::future::Cache;
use std::{future::Future, time::Duration};

/// Per-chat navigation state. Replaced wholesale by every new search.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub chat_id: i64,
    pub state: NavState,
    pub query: String,
    /// Message that carries the menu; callbacks from any other message are stale.
    pub menu_id: Option<i32>,
    pub last_hits: Vec<SearchHit>,
    /// Providers whose search failed, shown as a note under the results.
    pub failed: Vec<Provider>,
    pub selected_movie: Option<MovieDetails>,
    /// Deduplicated and ranked links of `selected_movie`.
    pub qualities: Vec<QualityLink>,
    pub selected_quality: Option<QualityLink>,
}

impl Session {
    pub fn new(chat_id: i64, query: impl Into<String>) -> Self {
        Self { chat_id, query: query.into(), ..Default::default() }
    }
}

/// Backing store for sessions, keyed by chat id.
///
/// Updates of one chat arrive in order, so a get/put pair inside a single
/// handler needs no extra locking.
pub trait SessionStore: Send + Sync {
    fn get(&self, chat_id: i64) -> impl Future<Output = Option<Session>> + Send;
    fn put(&self, chat_id: i64, session: Session) -> impl Future<Output = ()> + Send;
    fn clear(&self, chat_id: i64) -> impl Future<Output = ()> + Send;
}

/// Process-local store. Sessions of idle chats are evicted after `idle`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Cache<i64, Session>,
}

impl MemoryStore {
    pub fn new(idle: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(idle)
            .build();
        Self { inner }
    }
}

impl SessionStore for MemoryStore {
    async fn get(&self, chat_id: i64) -> Option<Session> {
        self.inner.get(&chat_id).await
    }

    async fn put(&self, chat_id: i64, session: Session) {
        self.inner.insert(chat_id, session).await;
    }

    async fn clear(&self, chat_id: i64) {
        self.inner.invalidate(&chat_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_overwrites_and_clear_forgets() {
        let store = MemoryStore::new(Duration::from_secs(60));
        assert!(store.get(1).await.is_none());

        store.put(1, Session::new(1, "first")).await;
        store.put(1, Session::new(1, "second")).await;
        assert_eq!(store.get(1).await.map(|s| s.query), Some("second".to_string()));

        store.clear(1).await;
        assert!(store.get(1).await.is_none());
    }

    #[tokio::test]
    async fn chats_do_not_share_sessions() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.put(1, Session::new(1, "a")).await;
        store.put(2, Session::new(2, "b")).await;
        store.clear(1).await;
        assert_eq!(store.get(2).await.map(|s| s.chat_id), Some(2));
    }
}
