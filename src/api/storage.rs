use url::Url;

use super::Gateway;
use crate::backend::{unique_id, FileUpload, StoredFile};
use crate::error::AppResult;

impl Gateway {
    pub async fn upload_file(&self, file: FileUpload) -> AppResult<StoredFile> {
        let stored = self
            .backend
            .create_file(&self.collections.bucket, &unique_id(), file)
            .await?;
        tracing::debug!("Uploaded file {} ({} bytes)", stored.id, stored.size);
        Ok(stored)
    }

    pub fn get_file_view(&self, file_id: &str) -> AppResult<Url> {
        Ok(self
            .backend
            .file_view_url(&self.collections.bucket, file_id)?)
    }

    pub async fn delete_file(&self, file_id: &str) -> AppResult<()> {
        self.backend
            .delete_file(&self.collections.bucket, file_id)
            .await?;
        Ok(())
    }

    /// Best-effort cleanup of a file whose owning document was never written.
    pub(crate) async fn discard_file(&self, file_id: &str) {
        if let Err(e) = self.delete_file(file_id).await {
            tracing::warn!("Failed to clean up file {}: {}", file_id, e);
        }
    }
}
