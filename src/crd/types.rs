//! Shared types for portal CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a KongFile holds, which also decides where it lands in the portal
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    /// A portal page, rendered with a front-matter header
    Content,
    /// An API specification
    Specification,
    /// A static asset (image, stylesheet, ...)
    Asset,
}

impl FileKind {
    /// Directory prefix under which files of this kind are stored in the portal
    pub fn path_prefix(&self) -> &'static str {
        match self {
            FileKind::Content => "content",
            FileKind::Specification => "specs",
            FileKind::Asset => "base/assets",
        }
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTENT" => Ok(FileKind::Content),
            "SPECIFICATION" => Ok(FileKind::Specification),
            "ASSET" => Ok(FileKind::Asset),
            other => Err(format!(
                "unknown file kind '{}', expected one of CONTENT, SPECIFICATION, ASSET",
                other
            )),
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Content => write!(f, "CONTENT"),
            FileKind::Specification => write!(f, "SPECIFICATION"),
            FileKind::Asset => write!(f, "ASSET"),
        }
    }
}
