use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::FileUpload;

pub use crate::backend::{Account, Session};

/// Profile document, one per account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "$id")]
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub bio: String,
}

/// User ids that liked a post. Keeps first-like order and never holds duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LikedBy(Vec<String>);

impl LikedBy {
    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|id| id == user_id)
    }

    /// Returns false if the user was already present.
    pub fn insert(&mut self, user_id: &str) -> bool {
        if self.contains(user_id) {
            return false;
        }
        self.0.push(user_id.to_string());
        true
    }

    /// Returns false if the user was not present.
    pub fn remove(&mut self, user_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|id| id != user_id);
        self.0.len() != before
    }

    /// Flip membership. Returns whether the user likes the post afterwards.
    pub fn toggle(&mut self, user_id: &str) -> bool {
        if self.remove(user_id) {
            false
        } else {
            self.insert(user_id)
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for LikedBy {
    fn from(ids: Vec<String>) -> Self {
        let mut liked = LikedBy::default();
        for id in &ids {
            liked.insert(id);
        }
        liked
    }
}

impl From<LikedBy> for Vec<String> {
    fn from(liked: LikedBy) -> Self {
        liked.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "$id")]
    pub id: String,
    pub creator: String,
    pub caption: String,
    pub image_url: String,
    pub image_id: String,
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub likes: LikedBy,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Join record between a user and a post; its existence means "saved".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPostRecord {
    #[serde(rename = "$id")]
    pub id: String,
    pub user: String,
    pub post: String,
}

/// Signed-in user's profile together with their saved-post records.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub profile: UserProfile,
    pub saves: Vec<SavedPostRecord>,
}

impl CurrentUser {
    pub fn saved_record_for(&self, post_id: &str) -> Option<&SavedPostRecord> {
        self.saves.iter().find(|record| record.post == post_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Attributes of a profile document about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub creator: String,
    pub caption: String,
    pub file: FileUpload,
    pub location: String,
    /// Comma separated, as typed
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostEdit {
    pub post_id: String,
    pub caption: String,
    /// Replacement image, if any
    pub file: Option<FileUpload>,
    pub image_url: String,
    pub image_id: String,
    pub location: String,
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEdit {
    pub user_id: String,
    pub name: String,
    pub bio: String,
    pub image_url: String,
}
