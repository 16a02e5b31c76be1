//! KongFile Custom Resource Definition
//!
//! A KongFile declares a single file that should exist in the Kong developer
//! portal: a content page, an API specification or a static asset.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::FileKind;

/// Desired state of a portal file
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "developer.konghq.com",
    version = "v1",
    kind = "KongFile",
    plural = "kongfiles",
    shortname = "kf",
    namespaced,
    status = "KongFileStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Kind","type":"string","jsonPath":".spec.kind"}"#,
    printcolumn = r#"{"name":"Path","type":"string","jsonPath":".spec.path"}"#,
    printcolumn = r#"{"name":"Validated","type":"boolean","jsonPath":".status.validated"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KongFileSpec {
    /// Page layout, required for CONTENT files
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub layout: String,

    /// Directory of the file below its kind's prefix
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Page title, required for CONTENT files
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// File name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Raw file content
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    /// What the file holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FileKind>,
}

impl KongFileSpec {
    /// Returns true if this file is a portal page with front matter
    pub fn is_content(&self) -> bool {
        self.kind == Some(FileKind::Content)
    }
}

/// Observed state of a KongFile
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KongFileStatus {
    /// Set once the file has been pushed to the Admin API
    #[serde(default)]
    pub validated: bool,
}

impl KongFileStatus {
    /// Status recording a successful push to the Admin API
    pub fn validated() -> Self {
        Self { validated: true }
    }
}

impl KongFile {
    /// Returns true once the file has been pushed to the Admin API
    pub fn is_validated(&self) -> bool {
        self.status.as_ref().map(|s| s.validated).unwrap_or(false)
    }

    /// Returns true if the object carries a deletion marker that has elapsed at `now`
    pub fn is_being_deleted(&self, now: DateTime<Utc>) -> bool {
        self.metadata
            .deletion_timestamp
            .as_ref()
            .map(|ts| now > ts.0)
            .unwrap_or(false)
    }

    /// Value of the controller-class annotation, empty when absent
    pub fn controller_class(&self) -> &str {
        self.annotations()
            .get(super::CONTROLLER_CLASS_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
