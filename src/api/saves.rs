use serde_json::json;

use super::{attributes, Gateway};
use crate::backend::query::MAX_LIMIT;
use crate::backend::{unique_id, Query};
use crate::error::AppResult;
use crate::models::SavedPostRecord;

impl Gateway {
    pub async fn save_post(&self, user_id: &str, post_id: &str) -> AppResult<SavedPostRecord> {
        let data = attributes(&json!({ "user": user_id, "post": post_id }))?;
        let document = self
            .backend
            .create_document(&self.collections.saves, &unique_id(), data)
            .await?;
        tracing::debug!("User {} saved post {}", user_id, post_id);
        Ok(document.into_model()?)
    }

    pub async fn delete_saved_post(&self, saved_record_id: &str) -> AppResult<()> {
        self.backend
            .delete_document(&self.collections.saves, saved_record_id)
            .await?;
        tracing::debug!("Deleted saved record {}", saved_record_id);
        Ok(())
    }

    /// Every saved record of one user, oldest first.
    pub async fn list_saved_records(&self, user_id: &str) -> AppResult<Vec<SavedPostRecord>> {
        Ok(self
            .backend
            .list_documents(
                &self.collections.saves,
                &[Query::equal("user", user_id), Query::limit(MAX_LIMIT)],
            )
            .await?
            .into_models()?)
    }
}
