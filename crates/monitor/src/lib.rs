//! Pipeline-health monitor: watcher loops, metrics registry, quality
//! evaluation service, and the HTTP surface that exposes them.

pub mod alerting;
pub mod config;
pub mod error;
pub mod exposition;
pub mod quality_service;
pub mod registry;
pub mod reports;
pub mod router;
pub mod routes;
pub mod scheduler;
pub mod sources;
pub mod state;
pub mod watchers;
