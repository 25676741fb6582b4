//! Cursor-paginated feed of posts, most recently updated first.
//!
//! Pages are kept in fetch order and never de-duplicated: a post updated
//! between two fetches can show up on both pages, and one updated behind the
//! cursor can be skipped. Owners reset the feed when they see
//! `CacheEvent::Invalidated(QueryKey::InfinitePosts)`.

use crate::api::Gateway;
use crate::error::AppResult;
use crate::models::Post;
use crate::scope::ScopeToken;

pub struct InfiniteFeed {
    gateway: Gateway,
    page_size: usize,
    pages: Vec<Vec<Post>>,
    exhausted: bool,
}

impl InfiniteFeed {
    pub fn new(gateway: Gateway, page_size: usize) -> Self {
        Self {
            gateway,
            page_size,
            pages: Vec::new(),
            exhausted: false,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn pages(&self) -> &[Vec<Post>] {
        &self.pages
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.pages.iter().flatten()
    }

    /// False once a fetch came back empty.
    pub fn has_next_page(&self) -> bool {
        !self.exhausted
    }

    /// Id of the last post of the last page; `None` before the first fetch.
    pub fn next_cursor(&self) -> Option<&str> {
        self.pages
            .last()
            .and_then(|page| page.last())
            .map(|post| post.id.as_str())
    }

    /// Fetch and append the next page. Returns the number of posts it held;
    /// once the feed is exhausted no request is made and 0 is returned.
    pub async fn fetch_next_page(&mut self) -> AppResult<usize> {
        if self.exhausted {
            return Ok(0);
        }
        let page = self.request_page().await?;
        Ok(self.append(page))
    }

    /// Like [`InfiniteFeed::fetch_next_page`], but a page that arrives after
    /// `token`'s scope closed is dropped and `None` is returned.
    pub async fn fetch_next_page_in(&mut self, token: &ScopeToken) -> AppResult<Option<usize>> {
        if self.exhausted {
            return Ok(Some(0));
        }
        let cursor = self.next_cursor().map(str::to_string);
        let fetched = token
            .run(
                self.gateway
                    .get_infinite_posts(cursor.as_deref(), self.page_size),
            )
            .await;
        match fetched {
            Some(page) => Ok(Some(self.append(page?))),
            None => {
                tracing::debug!("Feed page arrived after its view closed; dropped");
                Ok(None)
            }
        }
    }

    pub fn reset(&mut self) {
        self.pages.clear();
        self.exhausted = false;
    }

    async fn request_page(&self) -> AppResult<Vec<Post>> {
        self.gateway
            .get_infinite_posts(self.next_cursor(), self.page_size)
            .await
    }

    fn append(&mut self, page: Vec<Post>) -> usize {
        let len = page.len();
        if page.is_empty() {
            self.exhausted = true;
        } else {
            self.pages.push(page);
        }
        tracing::debug!("Feed now holds {} page(s)", self.pages.len());
        len
    }
}
