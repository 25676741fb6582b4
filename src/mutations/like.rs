use super::{Outcome, RollbackPolicy};
use crate::error::AppResult;
use crate::models::{LikedBy, Post};

/// Local like state of one post as seen by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub post_id: String,
    pub user_id: String,
    likes: LikedBy,
    version: u64,
}

/// A like change applied locally and waiting for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeMutation {
    pub post_id: String,
    /// Set to write.
    pub likes: LikedBy,
    /// Set before the toggle.
    pub previous: LikedBy,
    pub version: u64,
}

impl LikeState {
    pub fn new(post: &Post, user_id: &str) -> Self {
        Self {
            post_id: post.id.clone(),
            user_id: user_id.to_string(),
            likes: post.likes.clone(),
            version: 0,
        }
    }

    pub fn likes(&self) -> &LikedBy {
        &self.likes
    }

    pub fn is_liked(&self) -> bool {
        self.likes.contains(&self.user_id)
    }

    pub fn count(&self) -> usize {
        self.likes.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Flip the user's like locally.
    pub fn toggle(&mut self) -> LikeMutation {
        let previous = self.likes.clone();
        self.likes.toggle(&self.user_id);
        self.version += 1;
        LikeMutation {
            post_id: self.post_id.clone(),
            likes: self.likes.clone(),
            previous,
            version: self.version,
        }
    }

    /// Apply the backend's answer to `mutation`.
    ///
    /// Only the most recent mutation may overwrite local state; answers to
    /// older ones are confirmed or left as they are.
    pub fn reconcile(
        &mut self,
        mutation: &LikeMutation,
        result: &AppResult<Post>,
        policy: RollbackPolicy,
    ) -> Outcome {
        let latest = mutation.version == self.version;
        match result {
            Ok(post) => {
                if latest {
                    self.likes = post.likes.clone();
                }
                Outcome::Confirmed
            }
            Err(e) if latest && policy == RollbackPolicy::Rollback => {
                tracing::warn!(
                    "Like on post {} failed, restoring previous state: {}",
                    mutation.post_id,
                    e
                );
                self.likes = mutation.previous.clone();
                Outcome::RolledBack
            }
            Err(e) => {
                tracing::warn!(
                    "Like on post {} failed, local state left as is: {}",
                    mutation.post_id,
                    e
                );
                Outcome::LeftStale
            }
        }
    }

    /// Adopt the like set of a freshly fetched copy of the post.
    pub fn sync_from(&mut self, post: &Post) {
        self.likes = post.likes.clone();
    }
}
