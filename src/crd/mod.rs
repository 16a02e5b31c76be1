//! Custom Resource Definitions for the portal controller
//!
//! This module contains the KongFile CRD, the controller-class annotation
//! helpers, and the closed set of resource kinds the controller manages.

mod file;
mod resource;
mod types;

pub use file::{KongFile, KongFileSpec, KongFileStatus};
pub use resource::{ObjectKey, Resource, ResourceKind};
pub use types::FileKind;

/// Prefix shared by all annotations this controller reads
pub const ANNOTATION_PREFIX: &str = "developer.konghq.com";

/// Annotation naming the controller class responsible for an object
pub const CONTROLLER_CLASS_KEY: &str = "developer.konghq.com/controller.class";

/// Class used when none is configured
pub const DEFAULT_CONTROLLER_CLASS: &str = "kong";

/// How strictly an object's class annotation must match the configured class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassMatching {
    /// Class is not considered at all
    Ignore,
    /// Exact match desired, but an empty annotation is accepted
    ExactOrEmpty,
    /// Annotation must equal the configured class
    Exact,
}

/// Check an annotation value against the configured controller class
pub fn matches_controller_class(annotation: &str, class: &str, matching: ClassMatching) -> bool {
    match matching {
        ClassMatching::Ignore => true,
        ClassMatching::ExactOrEmpty => annotation.is_empty() || annotation == class,
        ClassMatching::Exact => annotation == class,
    }
}
