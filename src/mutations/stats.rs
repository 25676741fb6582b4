//! Like and save controls of one post card.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::{LikeState, Outcome, SaveAction, SaveState};
use crate::cache::{CacheEvent, QueryKey};
use crate::error::AppResult;
use crate::models::{LikedBy, Post};
use crate::scope::ScopeToken;
use crate::state::AppState;

#[derive(Clone)]
pub struct PostStats {
    app: AppState,
    like: Arc<Mutex<LikeState>>,
    save: Arc<AsyncMutex<SaveState>>,
    /// Completion signal of the most recently issued like call.
    last_like: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    token: ScopeToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PostStats {
    pub fn new(app: &AppState, post: &Post, user_id: &str, token: ScopeToken) -> Self {
        Self {
            app: app.clone(),
            like: Arc::new(Mutex::new(LikeState::new(post, user_id))),
            save: Arc::new(AsyncMutex::new(SaveState::new(&post.id))),
            last_like: Arc::new(Mutex::new(None)),
            token,
        }
    }

    pub fn likes(&self) -> LikedBy {
        lock(&self.like).likes().clone()
    }

    pub fn is_liked(&self) -> bool {
        lock(&self.like).is_liked()
    }

    pub fn like_count(&self) -> usize {
        lock(&self.like).count()
    }

    pub async fn is_saved(&self) -> bool {
        self.save.lock().await.is_saved()
    }

    /// Flip the like locally right away and send the new set to the backend.
    ///
    /// Calls go out in toggle order, each after the previous one finished, so
    /// the last toggle is the last write. The handle yields the outcome, or
    /// `None` if the view went away before the answer arrived.
    pub fn toggle_like(&self) -> JoinHandle<Option<Outcome>> {
        let mutation = lock(&self.like).toggle();
        let (done_tx, done_rx) = oneshot::channel();
        let previous = lock(&self.last_like).replace(done_rx);

        let app = self.app.clone();
        let like = self.like.clone();
        let token = self.token.clone();
        let policy = app.rollback_policy();
        tokio::spawn(async move {
            if let Some(previous) = previous {
                // Err only means the previous task is gone; go ahead either way.
                let _ = previous.await;
            }
            let result = app.like_post(&mutation.post_id, &mutation.likes).await;
            let _ = done_tx.send(());

            if token.is_cancelled() {
                tracing::debug!("Dropping like result for closed view of {}", mutation.post_id);
                return None;
            }
            Some(lock(&like).reconcile(&mutation, &result, policy))
        })
    }

    pub async fn toggle_save(&self) -> AppResult<SaveAction> {
        let user_id = lock(&self.like).user_id.clone();
        self.save.lock().await.toggle(&self.app, &user_id).await
    }

    /// Re-derive the saved flag from the cached current user.
    pub async fn refresh_saved(&self) -> AppResult<()> {
        let current = self.app.current_user().await?;
        if let Some(current) = &*current {
            self.save.lock().await.sync_from(current);
        }
        Ok(())
    }

    /// Keep the saved flag in step with the current-user query until the
    /// view closes.
    pub fn watch_current_user(&self) -> JoinHandle<()> {
        let stats = self.clone();
        let mut events = self.app.cache.subscribe();
        tokio::spawn(async move {
            if let Err(e) = stats.refresh_saved().await {
                tracing::error!("Failed to load saved state: {}", e);
            }
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = stats.token.cancelled() => return,
                };
                match event {
                    Ok(event) if event.concerns(&QueryKey::CurrentUser) => {
                        if matches!(event, CacheEvent::Cleared) {
                            continue;
                        }
                        if let Err(e) = stats.refresh_saved().await {
                            tracing::error!("Failed to refresh saved state: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Cache watcher lagged by {} events", skipped);
                        if let Err(e) = stats.refresh_saved().await {
                            tracing::error!("Failed to refresh saved state: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        })
    }
}
