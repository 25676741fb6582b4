//! Cached reads and cache-invalidating writes, on top of the gateway.

use std::sync::Arc;

use crate::cache::QueryKey;
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, LikedBy, NewPost, Post, PostEdit, ProfileEdit, SavedPostRecord, UserProfile,
};
use crate::state::AppState;

impl AppState {
    /// Signed-in user with their saves; `None` when signed out.
    pub async fn current_user(&self) -> AppResult<Arc<Option<CurrentUser>>> {
        self.cache
            .fetch(QueryKey::CurrentUser, || self.gateway.try_get_current_user())
            .await
    }

    pub async fn recent_posts(&self) -> AppResult<Arc<Vec<Post>>> {
        let limit = self.config.feed.recent_limit;
        self.cache
            .fetch(QueryKey::RecentPosts, || self.gateway.get_recent_posts(limit))
            .await
    }

    pub async fn post_by_id(&self, post_id: &str) -> AppResult<Arc<Post>> {
        self.cache
            .fetch(QueryKey::PostById(post_id.to_string()), || {
                self.gateway.get_post_by_id(post_id)
            })
            .await
    }

    pub async fn user_posts(&self, user_id: &str) -> AppResult<Arc<Vec<Post>>> {
        self.cache
            .fetch(QueryKey::UserPosts(user_id.to_string()), || {
                self.gateway.get_user_posts(user_id)
            })
            .await
    }

    pub async fn search_posts(&self, term: &str) -> AppResult<Arc<Vec<Post>>> {
        self.cache
            .fetch(QueryKey::SearchPosts(term.to_string()), || {
                self.gateway.search_posts(term)
            })
            .await
    }

    pub async fn users(&self, limit: Option<usize>) -> AppResult<Arc<Vec<UserProfile>>> {
        self.cache
            .fetch(QueryKey::Users(limit), || self.gateway.get_users(limit))
            .await
    }

    pub async fn user_by_id(&self, user_id: &str) -> AppResult<Arc<UserProfile>> {
        self.cache
            .fetch(QueryKey::UserById(user_id.to_string()), || {
                self.gateway.get_user_by_id(user_id)
            })
            .await
    }

    /// Posts the current user saved, newest save last. Saves whose post no
    /// longer exists are skipped.
    pub async fn saved_posts(&self) -> AppResult<Arc<Vec<Post>>> {
        let current = self.current_user().await?;
        let Some(current) = &*current else {
            return Err(AppError::Unauthorized);
        };
        let saves = current.saves.clone();
        self.cache
            .fetch(QueryKey::SavedPosts, || async move {
                let mut posts = Vec::with_capacity(saves.len());
                for record in &saves {
                    match self.gateway.get_post_by_id(&record.post).await {
                        Ok(post) => posts.push(post),
                        Err(e) if e.is_not_found() => {
                            tracing::debug!("Skipping save {} of deleted post {}", record.id, record.post);
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(posts)
            })
            .await
    }

    pub async fn create_post(&self, post: &NewPost) -> AppResult<Post> {
        let created = self.gateway.create_post(post).await?;
        self.cache.invalidate(&QueryKey::RecentPosts);
        self.cache.invalidate(&QueryKey::InfinitePosts);
        Ok(created)
    }

    pub async fn update_post(&self, edit: &PostEdit) -> AppResult<Post> {
        let updated = self.gateway.update_post(edit).await?;
        self.cache.invalidate(&QueryKey::PostById(updated.id.clone()));
        Ok(updated)
    }

    pub async fn delete_post(&self, post_id: &str, image_id: &str) -> AppResult<()> {
        self.gateway.delete_post(post_id, image_id).await?;
        self.cache.invalidate(&QueryKey::RecentPosts);
        Ok(())
    }

    pub async fn like_post(&self, post_id: &str, likes: &LikedBy) -> AppResult<Post> {
        let post = self.gateway.like_post(post_id, likes).await?;
        self.cache.invalidate(&QueryKey::PostById(post.id.clone()));
        self.cache.invalidate(&QueryKey::RecentPosts);
        self.cache.invalidate(&QueryKey::CurrentUser);
        Ok(post)
    }

    pub async fn save_post(&self, user_id: &str, post_id: &str) -> AppResult<SavedPostRecord> {
        let record = self.gateway.save_post(user_id, post_id).await?;
        self.invalidate_saves();
        Ok(record)
    }

    pub async fn delete_saved_post(&self, saved_record_id: &str) -> AppResult<()> {
        self.gateway.delete_saved_post(saved_record_id).await?;
        self.invalidate_saves();
        Ok(())
    }

    pub async fn update_user(&self, edit: &ProfileEdit) -> AppResult<UserProfile> {
        let profile = self.gateway.update_user(edit).await?;
        self.cache.invalidate(&QueryKey::CurrentUser);
        self.cache.invalidate(&QueryKey::UserById(profile.id.clone()));
        Ok(profile)
    }

    fn invalidate_saves(&self) {
        self.cache.invalidate(&QueryKey::RecentPosts);
        self.cache.invalidate(&QueryKey::CurrentUser);
        self.cache.invalidate(&QueryKey::SavedPosts);
    }
}
