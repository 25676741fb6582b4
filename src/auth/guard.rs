use std::fmt;

use super::context::SessionContext;
use crate::api::Gateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Explore,
    Saved,
    AllUsers,
    CreatePost,
    UpdatePost(String),
    PostDetails(String),
    /// Profile page; `tab` is whatever follows the id, e.g. `liked-posts`.
    Profile { id: String, tab: Option<String> },
    UpdateProfile(String),
    SignIn,
    SignUp,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match segments.as_slice() {
            [] => Route::Home,
            ["explore"] => Route::Explore,
            ["saved"] => Route::Saved,
            ["all-users"] => Route::AllUsers,
            ["create-post"] => Route::CreatePost,
            ["update-post", id] => Route::UpdatePost(id.to_string()),
            ["posts", id] => Route::PostDetails(id.to_string()),
            ["profile", id, rest @ ..] => Route::Profile {
                id: id.to_string(),
                tab: (!rest.is_empty()).then(|| rest.join("/")),
            },
            ["update-profile", id] => Route::UpdateProfile(id.to_string()),
            ["sign-in"] => Route::SignIn,
            ["sign-up"] => Route::SignUp,
            _ => return None,
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Explore => "/explore".to_string(),
            Route::Saved => "/saved".to_string(),
            Route::AllUsers => "/all-users".to_string(),
            Route::CreatePost => "/create-post".to_string(),
            Route::UpdatePost(id) => format!("/update-post/{}", id),
            Route::PostDetails(id) => format!("/posts/{}", id),
            Route::Profile { id, tab: None } => format!("/profile/{}", id),
            Route::Profile { id, tab: Some(tab) } => format!("/profile/{}/{}", id, tab),
            Route::UpdateProfile(id) => format!("/update-profile/{}", id),
            Route::SignIn => "/sign-in".to_string(),
            Route::SignUp => "/sign-up".to_string(),
        }
    }

    /// Routes reachable without a session. Checking them would redirect to
    /// sign-in from sign-in.
    pub fn is_auth_exempt(&self) -> bool {
        matches!(self, Route::SignIn | Route::SignUp)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Exempt route, shown without a session check.
    Exempt,
    Proceed,
    Redirect(Route),
    NotFound,
}

pub struct RouteGuard<'a> {
    session: &'a SessionContext,
    gateway: &'a Gateway,
}

impl<'a> RouteGuard<'a> {
    pub fn new(session: &'a SessionContext, gateway: &'a Gateway) -> Self {
        Self { session, gateway }
    }

    /// Re-verify the session before showing `route`.
    pub async fn on_navigate(&self, route: &Route) -> Navigation {
        if route.is_auth_exempt() {
            return Navigation::Exempt;
        }
        if self.session.check_auth_user(self.gateway).await {
            Navigation::Proceed
        } else {
            tracing::info!("Redirecting {} to sign-in", route);
            Navigation::Redirect(Route::SignIn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::Harness;
    use crate::auth::context::AuthStatus;

    #[test]
    fn parses_every_route() {
        let cases = [
            ("/", Route::Home),
            ("/explore", Route::Explore),
            ("/saved", Route::Saved),
            ("/all-users", Route::AllUsers),
            ("/create-post", Route::CreatePost),
            ("/update-post/p1", Route::UpdatePost("p1".into())),
            ("/posts/p1", Route::PostDetails("p1".into())),
            (
                "/profile/u1",
                Route::Profile {
                    id: "u1".into(),
                    tab: None,
                },
            ),
            (
                "/profile/u1/liked-posts",
                Route::Profile {
                    id: "u1".into(),
                    tab: Some("liked-posts".into()),
                },
            ),
            ("/update-profile/u1", Route::UpdateProfile("u1".into())),
            ("/sign-in", Route::SignIn),
            ("/sign-up?next=/saved", Route::SignUp),
        ];
        for (path, route) in cases {
            assert_eq!(Route::from_path(path), Some(route.clone()), "{}", path);
            if !path.contains('?') {
                assert_eq!(route.path(), path);
            }
        }
    }

    #[test]
    fn unknown_paths_do_not_parse() {
        assert_eq!(Route::from_path("/posts"), None);
        assert_eq!(Route::from_path("/settings"), None);
        assert_eq!(Route::from_path("/posts/p1/extra"), None);
    }

    #[tokio::test]
    async fn exempt_routes_skip_the_check() {
        let harness = Harness::new();
        let (_backend, gateway) = harness.client();
        let session = SessionContext::new();
        let guard = RouteGuard::new(&session, &gateway);

        assert_eq!(guard.on_navigate(&Route::SignIn).await, Navigation::Exempt);
        assert_eq!(guard.on_navigate(&Route::SignUp).await, Navigation::Exempt);
        assert_eq!(session.snapshot().status, AuthStatus::Unknown);
    }

    #[tokio::test]
    async fn guarded_route_without_session_redirects() {
        let harness = Harness::new();
        let (_backend, gateway) = harness.client();
        let session = SessionContext::new();
        let guard = RouteGuard::new(&session, &gateway);

        assert_eq!(
            guard.on_navigate(&Route::Saved).await,
            Navigation::Redirect(Route::SignIn)
        );
        assert_eq!(session.snapshot().status, AuthStatus::Unauthenticated);
    }
}
