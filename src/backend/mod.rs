//! Kong Admin API client
//!
//! The portal stores files under `/files/{path}`. Creating and updating a file
//! are the same idempotent `PUT` by path, so a push can be repeated safely
//! whenever reconciliation runs again.

mod client;
mod root;

pub use client::{AdminClient, AdminClientConfig, ADMIN_TOKEN_HEADER};
pub use root::{DbMode, RootInfo};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A file as stored by the Admin API
///
/// `checksum`, `id` and `created_at` are assigned by Kong; `path` and
/// `contents` are owned by the controller.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Content checksum computed by Kong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Kong-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Creation time, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Portal path, e.g. `content/guides/welcome`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Rendered file contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

impl FileRecord {
    /// Record carrying only the fields the controller owns
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            contents: Some(contents.into()),
            ..Default::default()
        }
    }

    /// Path with surrounding whitespace removed, empty when unset
    pub fn path_str(&self) -> &str {
        self.path.as_deref().map(str::trim).unwrap_or_default()
    }
}

/// Operations against the Kong Admin API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Fetch the root information document (`GET /`)
    async fn root(&self) -> Result<serde_json::Value>;

    /// Create a file (`PUT /files/{path}`)
    async fn create_file(&self, file: &FileRecord) -> Result<FileRecord>;

    /// Fetch a file, `None` when Kong does not have it
    async fn get_file(&self, file: &FileRecord) -> Result<Option<FileRecord>>;

    /// Update a file; same request as [`AdminApi::create_file`]
    async fn update_file(&self, file: &FileRecord) -> Result<FileRecord>;

    /// Delete a file, returning the record that was passed in
    async fn delete_file(&self, file: &FileRecord) -> Result<FileRecord>;
}
