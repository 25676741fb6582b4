//! Optimistic mutations and how their results are reconciled with local state.

pub mod like;
pub mod save;
pub mod stats;

pub use like::{LikeMutation, LikeState};
pub use save::{SaveAction, SaveState};
pub use stats::PostStats;

use crate::config::MutationConfig;

/// How a pending optimistic change ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The backend accepted the change.
    Confirmed,
    /// The backend rejected it and the previous local state was restored.
    RolledBack,
    /// The backend rejected it and local state was kept, either by policy or
    /// because a newer change had already been applied.
    LeftStale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackPolicy {
    Rollback,
    Keep,
}

impl From<&MutationConfig> for RollbackPolicy {
    fn from(config: &MutationConfig) -> Self {
        if config.rollback_on_failure {
            RollbackPolicy::Rollback
        } else {
            RollbackPolicy::Keep
        }
    }
}
