use serde_json::json;

use super::{attributes, Gateway};
use crate::backend::Query;
use crate::error::AppResult;
use crate::models::{ProfileEdit, UserProfile};

impl Gateway {
    pub async fn get_user_by_id(&self, user_id: &str) -> AppResult<UserProfile> {
        let document = self
            .backend
            .get_document(&self.collections.users, user_id)
            .await?;
        Ok(document.into_model()?)
    }

    /// Users, newest first. Without a limit the backend's default page applies.
    pub async fn get_users(&self, limit: Option<usize>) -> AppResult<Vec<UserProfile>> {
        let mut queries = vec![Query::order_desc("$createdAt")];
        if let Some(limit) = limit {
            queries.push(Query::limit(limit));
        }
        Ok(self
            .backend
            .list_documents(&self.collections.users, &queries)
            .await?
            .into_models()?)
    }

    pub async fn update_user(&self, edit: &ProfileEdit) -> AppResult<UserProfile> {
        let data = attributes(&json!({
            "name": edit.name,
            "bio": edit.bio,
            "image_url": edit.image_url,
        }))?;
        let document = self
            .backend
            .update_document(&self.collections.users, &edit.user_id, data)
            .await?;
        tracing::info!("Updated profile {}", edit.user_id);
        Ok(document.into_model()?)
    }
}
