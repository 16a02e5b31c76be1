//! Portal controller - syncs KongFile resources into the Kong Admin API
//!
//! Each KongFile describes one developer portal file. The controller caches
//! what it has seen and pushes every accepted file to Kong's `/files` endpoint,
//! removing it again once the KongFile is deleted.
//!
//! # Modules
//!
//! - [`crd`] - KongFile custom resource and the closed resource model
//! - [`backend`] - Kong Admin API client
//! - [`store`] - Local cache of accepted objects
//! - [`proxy`] - Cache-then-push resolver in front of the Admin API
//! - [`controller`] - Reconciliation of KongFiles
//! - [`admission`] - Validating admission webhook
//! - [`health`] - Liveness and readiness probes
//! - [`config`] - Command-line flags
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod admission;
pub mod backend;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod health;
pub mod proxy;
pub mod retry;
pub mod store;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Grace period for in-flight requests when the servers shut down
pub const SHUTDOWN_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(10);
