use crate::error::AppResult;
use crate::models::{CurrentUser, SavedPostRecord};
use crate::state::AppState;

/// Whether one post is saved by the current user, projected from their
/// saved records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveState {
    pub post_id: String,
    saved_record_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAction {
    Saved(SavedPostRecord),
    Unsaved,
}

impl SaveState {
    pub fn new(post_id: &str) -> Self {
        Self {
            post_id: post_id.to_string(),
            saved_record_id: None,
        }
    }

    pub fn from_current_user(post_id: &str, current: &CurrentUser) -> Self {
        let mut state = Self::new(post_id);
        state.sync_from(current);
        state
    }

    pub fn is_saved(&self) -> bool {
        self.saved_record_id.is_some()
    }

    pub fn saved_record_id(&self) -> Option<&str> {
        self.saved_record_id.as_deref()
    }

    pub fn sync_from(&mut self, current: &CurrentUser) {
        self.saved_record_id = current
            .saved_record_for(&self.post_id)
            .map(|record| record.id.clone());
    }

    /// Save or unsave with exactly one backend write. On failure the error is
    /// logged and returned and the state is left unchanged.
    pub async fn toggle(&mut self, app: &AppState, user_id: &str) -> AppResult<SaveAction> {
        let result = match self.saved_record_id.clone() {
            Some(record_id) => app
                .delete_saved_post(&record_id)
                .await
                .map(|()| SaveAction::Unsaved),
            None => app
                .save_post(user_id, &self.post_id)
                .await
                .map(SaveAction::Saved),
        };

        match &result {
            Ok(SaveAction::Saved(record)) => self.saved_record_id = Some(record.id.clone()),
            Ok(SaveAction::Unsaved) => self.saved_record_id = None,
            Err(e) => tracing::error!("Failed to toggle save of post {}: {}", self.post_id, e),
        }
        result
    }
}
