pub mod context;
pub mod flow;
pub mod guard;
pub mod validation;

pub use context::{AuthStatus, SessionContext, SessionState, SessionUser};
pub use flow::{AuthFailure, AuthFlow, Notice, SignedIn};
pub use guard::{Navigation, Route, RouteGuard};
