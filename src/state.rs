use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::api::Gateway;
use crate::auth::{AuthFlow, Navigation, Route, RouteGuard, SessionContext};
use crate::backend::Backend;
use crate::cache::QueryCache;
use crate::config::Config;
use crate::feed::InfiniteFeed;
use crate::mutations::RollbackPolicy;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a client front end holds: configuration, the gateway, the
/// query cache and the session. Clones share the same cache and session.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gateway: Gateway,
    pub cache: QueryCache,
    pub session: SessionContext,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let gateway = Gateway::new(backend, config.collections.clone());
        Self {
            config,
            gateway,
            cache: QueryCache::new(),
            session: SessionContext::new(),
        }
    }

    pub async fn check_auth_user(&self) -> bool {
        self.session.check_auth_user(&self.gateway).await
    }

    pub fn guard(&self) -> RouteGuard<'_> {
        RouteGuard::new(&self.session, &self.gateway)
    }

    /// Resolve a path and run the guard for it.
    pub async fn navigate(&self, path: &str) -> Navigation {
        match Route::from_path(path) {
            Some(route) => self.guard().on_navigate(&route).await,
            None => Navigation::NotFound,
        }
    }

    pub fn auth(&self) -> AuthFlow<'_> {
        AuthFlow::new(self)
    }

    pub fn feed(&self) -> InfiniteFeed {
        InfiniteFeed::new(self.gateway.clone(), self.config.feed.page_size)
    }

    pub fn rollback_policy(&self) -> RollbackPolicy {
        RollbackPolicy::from(&self.config.mutations)
    }
}
