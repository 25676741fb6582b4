// Library exports for Napbook
// The CLI binary and the integration tests both build on these modules

pub mod api;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod mutations;
pub mod queries;
pub mod scope;
pub mod state;
