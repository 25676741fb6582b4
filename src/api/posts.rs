use serde_json::json;

use super::{attributes, Gateway};
use crate::backend::{unique_id, Query};
use crate::error::AppResult;
use crate::models::{LikedBy, NewPost, Post, PostEdit};

/// Split a comma separated tag string, trimming entries and dropping empty ones.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

impl Gateway {
    /// Upload the image, then write the post document. The uploaded file is
    /// removed again if the document cannot be written.
    pub async fn create_post(&self, post: &NewPost) -> AppResult<Post> {
        let uploaded = self.upload_file(post.file.clone()).await?;

        let image_url = match self.get_file_view(&uploaded.id) {
            Ok(url) => url,
            Err(e) => {
                self.discard_file(&uploaded.id).await;
                return Err(e);
            }
        };

        let data = attributes(&json!({
            "creator": post.creator,
            "caption": post.caption,
            "image_url": image_url.as_str(),
            "image_id": uploaded.id,
            "location": post.location,
            "tags": parse_tags(&post.tags),
            "likes": [],
        }))?;

        let created = self
            .backend
            .create_document(&self.collections.posts, &unique_id(), data)
            .await
            .and_then(|document| document.into_model::<Post>());
        match created {
            Ok(post) => {
                tracing::info!("Created post {}", post.id);
                Ok(post)
            }
            Err(e) => {
                self.discard_file(&uploaded.id).await;
                Err(e.into())
            }
        }
    }

    pub async fn get_post_by_id(&self, post_id: &str) -> AppResult<Post> {
        let document = self
            .backend
            .get_document(&self.collections.posts, post_id)
            .await?;
        Ok(document.into_model()?)
    }

    /// Update content, optionally replacing the image. A replacement upload is
    /// removed if the update fails; the old image is removed once it succeeds.
    pub async fn update_post(&self, edit: &PostEdit) -> AppResult<Post> {
        let mut image_url = edit.image_url.clone();
        let mut image_id = edit.image_id.clone();
        let mut replacement = None;

        if let Some(file) = &edit.file {
            let uploaded = self.upload_file(file.clone()).await?;
            let url = match self.get_file_view(&uploaded.id) {
                Ok(url) => url,
                Err(e) => {
                    self.discard_file(&uploaded.id).await;
                    return Err(e);
                }
            };
            image_url = url.to_string();
            image_id = uploaded.id.clone();
            replacement = Some(uploaded.id);
        }

        let data = attributes(&json!({
            "caption": edit.caption,
            "image_url": image_url,
            "image_id": image_id,
            "location": edit.location,
            "tags": parse_tags(&edit.tags),
        }))?;

        let updated = self
            .backend
            .update_document(&self.collections.posts, &edit.post_id, data)
            .await
            .and_then(|document| document.into_model::<Post>());
        let post = match updated {
            Ok(post) => post,
            Err(e) => {
                if let Some(new_id) = &replacement {
                    self.discard_file(new_id).await;
                }
                return Err(e.into());
            }
        };

        if replacement.is_some() && !edit.image_id.is_empty() {
            self.discard_file(&edit.image_id).await;
        }
        tracing::info!("Updated post {}", post.id);
        Ok(post)
    }

    /// Delete the post document, then its image.
    ///
    /// Saved records pointing at the post are left behind; listings skip them.
    pub async fn delete_post(&self, post_id: &str, image_id: &str) -> AppResult<()> {
        self.backend
            .delete_document(&self.collections.posts, post_id)
            .await?;
        self.delete_file(image_id).await?;
        tracing::info!("Deleted post {}", post_id);
        Ok(())
    }

    pub async fn get_recent_posts(&self, limit: usize) -> AppResult<Vec<Post>> {
        Ok(self
            .backend
            .list_documents(
                &self.collections.posts,
                &[Query::order_desc("$createdAt"), Query::limit(limit)],
            )
            .await?
            .into_models()?)
    }

    pub async fn get_user_posts(&self, user_id: &str) -> AppResult<Vec<Post>> {
        Ok(self
            .backend
            .list_documents(
                &self.collections.posts,
                &[Query::equal("creator", user_id), Query::order_desc("$createdAt")],
            )
            .await?
            .into_models()?)
    }

    /// One feed page, most recently updated first, starting after `cursor`.
    pub async fn get_infinite_posts(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> AppResult<Vec<Post>> {
        let mut queries = vec![Query::order_desc("$updatedAt"), Query::limit(page_size)];
        if let Some(cursor) = cursor {
            queries.push(Query::cursor_after(cursor));
        }
        tracing::debug!("Fetching feed page after {:?}", cursor);
        Ok(self
            .backend
            .list_documents(&self.collections.posts, &queries)
            .await?
            .into_models()?)
    }

    pub async fn search_posts(&self, term: &str) -> AppResult<Vec<Post>> {
        Ok(self
            .backend
            .list_documents(&self.collections.posts, &[Query::search("caption", term)])
            .await?
            .into_models()?)
    }

    /// Replace the post's like set.
    pub async fn like_post(&self, post_id: &str, likes: &LikedBy) -> AppResult<Post> {
        let data = attributes(&json!({ "likes": likes }))?;
        let document = self
            .backend
            .update_document(&self.collections.posts, post_id, data)
            .await?;
        Ok(document.into_model()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::backend::{Backend, FileUpload};

    fn new_post(creator: &str, caption: &str) -> NewPost {
        NewPost {
            creator: creator.to_string(),
            caption: caption.to_string(),
            file: FileUpload::new("photo.jpg", vec![7u8; 16]),
            location: "Oslo".to_string(),
            tags: " travel, ,nordic ".to_string(),
        }
    }

    fn stored_files(harness: &Harness) -> usize {
        std::fs::read_dir(harness.config.uploads_path().join("media"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[test]
    fn tags_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(parse_tags(" travel, ,nordic "), vec!["travel", "nordic"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[tokio::test]
    async fn create_post_stores_image_and_document() {
        let harness = Harness::new();
        let (backend, gateway) = harness.signed_in_client().await;

        let post = gateway.create_post(&new_post("u1", "Fjord at dawn")).await.unwrap();
        assert_eq!(post.creator, "u1");
        assert_eq!(post.tags, vec!["travel", "nordic"]);
        assert!(post.likes.is_empty());
        assert!(post.image_url.contains(&post.image_id));
        assert_eq!(
            backend.store().read_file("media", &post.image_id).await.unwrap().len(),
            16
        );

        assert_eq!(gateway.get_post_by_id(&post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn update_post_replaces_image_and_removes_old_file() {
        let harness = Harness::new();
        let (backend, gateway) = harness.signed_in_client().await;
        let post = gateway.create_post(&new_post("u1", "Fjord at dawn")).await.unwrap();

        let updated = gateway
            .update_post(&PostEdit {
                post_id: post.id.clone(),
                caption: "Fjord at dusk".to_string(),
                file: Some(FileUpload::new("dusk.png", vec![9u8; 4])),
                image_url: post.image_url.clone(),
                image_id: post.image_id.clone(),
                location: "Bergen".to_string(),
                tags: "dusk".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(updated.caption, "Fjord at dusk");
        assert_eq!(updated.tags, vec!["dusk"]);
        assert_ne!(updated.image_id, post.image_id);
        assert!(backend
            .store()
            .read_file("media", &post.image_id)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(backend.store().read_file("media", &updated.image_id).await.is_ok());
    }

    #[tokio::test]
    async fn failed_update_removes_replacement_upload() {
        let harness = Harness::new();
        let (_backend, gateway) = harness.signed_in_client().await;

        let err = gateway
            .update_post(&PostEdit {
                post_id: "missing".to_string(),
                caption: "Nothing here".to_string(),
                file: Some(FileUpload::new("new.png", vec![1u8])),
                image_url: String::new(),
                image_id: String::new(),
                location: "Nowhere".to_string(),
                tags: String::new(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(stored_files(&harness), 0);
    }

    #[tokio::test]
    async fn delete_post_removes_document_then_file() {
        let harness = Harness::new();
        let (backend, gateway) = harness.signed_in_client().await;
        let post = gateway.create_post(&new_post("u1", "Fjord at dawn")).await.unwrap();

        gateway.delete_post(&post.id, &post.image_id).await.unwrap();
        assert!(gateway.get_post_by_id(&post.id).await.unwrap_err().is_not_found());
        assert!(backend.store().read_file("media", &post.image_id).await.is_err());
    }

    #[tokio::test]
    async fn listings_filter_and_order() {
        let harness = Harness::new();
        let (backend, gateway) = harness.signed_in_client().await;
        let first = gateway.create_post(&new_post("u1", "Morning coffee")).await.unwrap();
        let second = gateway.create_post(&new_post("u2", "Evening tea")).await.unwrap();
        let third = gateway.create_post(&new_post("u1", "Coffee again")).await.unwrap();

        let recent: Vec<String> = gateway
            .get_recent_posts(2)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(recent, vec![third.id.clone(), second.id.clone()]);

        let mine: Vec<String> = gateway
            .get_user_posts("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(mine, vec![third.id.clone(), first.id.clone()]);

        let found = gateway.search_posts("coffee").await.unwrap();
        assert_eq!(found.len(), 2);

        assert_eq!(backend.list_documents("posts", &[]).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn like_post_replaces_like_set() {
        let harness = Harness::new();
        let (_backend, gateway) = harness.signed_in_client().await;
        let post = gateway.create_post(&new_post("u1", "Fjord at dawn")).await.unwrap();

        let likes = LikedBy::from(vec!["u2".to_string(), "u3".to_string()]);
        let liked = gateway.like_post(&post.id, &likes).await.unwrap();
        assert_eq!(liked.likes, likes);

        let cleared = gateway.like_post(&post.id, &LikedBy::default()).await.unwrap();
        assert!(cleared.likes.is_empty());
    }
}
