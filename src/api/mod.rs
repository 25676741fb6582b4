//! API gateway: one async function per domain operation, each a thin wrapper
//! over [`Backend`] calls.

pub mod auth;
pub mod posts;
pub mod saves;
pub mod storage;
pub mod users;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::Backend;
use crate::config::CollectionConfig;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn Backend>,
    collections: CollectionConfig,
}

impl Gateway {
    pub fn new(backend: Arc<dyn Backend>, collections: CollectionConfig) -> Self {
        Self {
            backend,
            collections,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn collections(&self) -> &CollectionConfig {
        &self.collections
    }
}

/// Serialize a value into a document attribute map.
fn attributes<T: Serialize>(value: &T) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "expected an attribute object, got {}",
            other
        ))),
    }
}
