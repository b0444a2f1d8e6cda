// Library root: re-exports all modules so integration tests and the batch
// runner can access the crate's public API.

pub mod analytics;
pub mod config;
pub mod db;
pub mod defense;
pub mod ev;
pub mod feed;
pub mod health;
pub mod identity;
pub mod model;
pub mod reconcile;
