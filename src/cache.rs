//! Keyed query cache.
//!
//! Each key owns a slot that is filled at most once; concurrent readers of an
//! empty slot share one fetch. Invalidation detaches the slot so the next read
//! fetches again, and every change is announced on a broadcast channel.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, OnceCell};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUser,
    RecentPosts,
    InfinitePosts,
    PostById(String),
    UserPosts(String),
    SearchPosts(String),
    Users(Option<usize>),
    UserById(String),
    SavedPosts,
}

impl QueryKey {
    pub fn is_post_listing(&self) -> bool {
        matches!(
            self,
            QueryKey::RecentPosts
                | QueryKey::InfinitePosts
                | QueryKey::UserPosts(_)
                | QueryKey::SearchPosts(_)
        )
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::CurrentUser => write!(f, "getCurrentUser"),
            QueryKey::RecentPosts => write!(f, "getRecentPosts"),
            QueryKey::InfinitePosts => write!(f, "getInfinitePosts"),
            QueryKey::PostById(id) => write!(f, "getPostById/{}", id),
            QueryKey::UserPosts(id) => write!(f, "getUserPosts/{}", id),
            QueryKey::SearchPosts(term) => write!(f, "searchPosts/{}", term),
            QueryKey::Users(Some(limit)) => write!(f, "getUsers/{}", limit),
            QueryKey::Users(None) => write!(f, "getUsers"),
            QueryKey::UserById(id) => write!(f, "getUserById/{}", id),
            QueryKey::SavedPosts => write!(f, "getSavedPosts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// New data was written for the key, by a fetch or a patch.
    Updated(QueryKey),
    /// The key's data is stale; observers should re-read.
    Invalidated(QueryKey),
    Cleared,
}

impl CacheEvent {
    pub fn concerns(&self, key: &QueryKey) -> bool {
        match self {
            CacheEvent::Updated(k) | CacheEvent::Invalidated(k) => k == key,
            CacheEvent::Cleared => true,
        }
    }
}

type Value = Arc<dyn Any + Send + Sync>;
type Slot = Arc<OnceCell<Value>>;

const EVENT_CAPACITY: usize = 256;

struct Inner {
    entries: Mutex<HashMap<QueryKey, Slot>>,
    events: broadcast::Sender<CacheEvent>,
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot(&self, key: &QueryKey) -> Slot {
        self.entries()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Cached value for `key`, or the result of `fetcher`.
    ///
    /// Concurrent callers for an empty key wait on a single fetch. A failed
    /// fetch leaves the key empty so the next caller retries.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> AppResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let slot = self.slot(&key);
        let mut fetched = false;
        let (fetched_flag, key_ref) = (&mut fetched, &key);
        let value = slot
            .get_or_try_init(move || async move {
                *fetched_flag = true;
                tracing::debug!("Fetching {}", key_ref);
                fetcher().await.map(|value| Arc::new(value) as Value)
            })
            .await?
            .clone();
        if fetched {
            self.emit(CacheEvent::Updated(key.clone()));
        }
        downcast(&key, value)
    }

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let slot = self.entries().get(key).cloned()?;
        let value = slot.get()?.clone();
        value.downcast::<T>().ok()
    }

    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let slot = Arc::new(OnceCell::new_with(Some(Arc::new(value) as Value)));
        self.entries().insert(key.clone(), slot);
        self.emit(CacheEvent::Updated(key));
    }

    /// Patch cached data in place. Returns false when nothing of type `T` is
    /// cached under `key`.
    pub fn update_query_data<T, F>(&self, key: &QueryKey, patch: F) -> bool
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let Some(current) = self.get_query_data::<T>(key) else {
            return false;
        };
        let mut next = (*current).clone();
        patch(&mut next);
        self.set_query_data(key.clone(), next);
        true
    }

    pub fn is_cached(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Mark `key` stale. A fetch still in flight completes for its callers
    /// but no longer populates the cache.
    pub fn invalidate(&self, key: &QueryKey) {
        let removed = self.entries().remove(key).is_some();
        tracing::debug!("Invalidated {} (cached: {})", key, removed);
        self.emit(CacheEvent::Invalidated(key.clone()));
    }

    pub fn invalidate_matching<P>(&self, predicate: P)
    where
        P: Fn(&QueryKey) -> bool,
    {
        let keys: Vec<QueryKey> = {
            let mut entries = self.entries();
            let keys: Vec<QueryKey> = entries.keys().filter(|k| predicate(k)).cloned().collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };
        for key in keys {
            self.emit(CacheEvent::Invalidated(key));
        }
    }

    pub fn clear(&self) {
        self.entries().clear();
        self.emit(CacheEvent::Cleared);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: Value) -> AppResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| {
        AppError::Internal(format!(
            "cached value for {} is not a {}",
            key,
            std::any::type_name::<T>()
        ))
    })
}
