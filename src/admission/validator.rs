//! Admission rules for KongFiles

use async_trait::async_trait;
use kube::ResourceExt;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::crd::{KongFile, Resource};
use crate::Result;

/// Reason given when metadata.name is empty
pub const NAME_EMPTY: &str = "name must not be empty";
/// Reason given when spec.name is empty
pub const SPEC_NAME_EMPTY: &str = "spec name must not be empty";
/// Reason given when spec.path is empty
pub const SPEC_PATH_EMPTY: &str = "spec path must not be empty";
/// Reason given when a content page has no title
pub const SPEC_TITLE_EMPTY: &str = "spec title must not be empty";
/// Reason given when a content page has no layout
pub const SPEC_LAYOUT_EMPTY: &str = "spec layout must not be empty";

/// Outcome of validating one object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Whether the object may be admitted
    pub allowed: bool,
    /// Why it was denied, empty when allowed
    pub reason: String,
}

impl Decision {
    /// Admit the object
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    /// Reject the object
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Check a KongFile; the first failing rule decides
pub fn validate_file(file: &KongFile) -> Decision {
    if file.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return Decision::deny(NAME_EMPTY);
    }
    if file.spec.name.is_empty() {
        return Decision::deny(SPEC_NAME_EMPTY);
    }
    if file.spec.path.is_empty() {
        return Decision::deny(SPEC_PATH_EMPTY);
    }
    if file.spec.is_content() {
        if file.spec.title.is_empty() {
            return Decision::deny(SPEC_TITLE_EMPTY);
        }
        if file.spec.layout.is_empty() {
            return Decision::deny(SPEC_LAYOUT_EMPTY);
        }
    }
    Decision::allow()
}

/// Validates objects presented for admission
///
/// An `Err` means validation could not be carried out; a denial is an
/// `Ok` decision with `allowed == false`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Validator: Send + Sync {
    /// Decide whether `resource` may be admitted
    async fn validate(&self, resource: &Resource) -> Result<Decision>;
}

/// Validator applying the static KongFile rules
#[derive(Clone, Debug, Default)]
pub struct FileValidator;

#[async_trait]
impl Validator for FileValidator {
    async fn validate(&self, resource: &Resource) -> Result<Decision> {
        match resource {
            Resource::File(file) => {
                debug!(
                    namespace = %file.namespace().unwrap_or_default(),
                    name = %file.name_any(),
                    "validating KongFile"
                );
                Ok(validate_file(file))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FileKind, KongFileSpec};

    fn valid_content() -> KongFile {
        KongFile::new(
            "a",
            KongFileSpec {
                name: "a".to_string(),
                path: "p".to_string(),
                kind: Some(FileKind::Content),
                title: "T".to_string(),
                layout: "L".to_string(),
                content: "hi".to_string(),
            },
        )
    }

    #[test]
    fn test_valid_content_is_allowed() {
        assert_eq!(validate_file(&valid_content()), Decision::allow());
    }

    #[test]
    fn test_each_rule_denies() {
        let mut file = valid_content();
        file.metadata.name = None;
        assert_eq!(validate_file(&file).reason, NAME_EMPTY);

        let mut file = valid_content();
        file.spec.name.clear();
        assert_eq!(validate_file(&file).reason, SPEC_NAME_EMPTY);

        let mut file = valid_content();
        file.spec.path.clear();
        assert_eq!(validate_file(&file).reason, SPEC_PATH_EMPTY);

        let mut file = valid_content();
        file.spec.title.clear();
        assert_eq!(validate_file(&file).reason, SPEC_TITLE_EMPTY);

        let mut file = valid_content();
        file.spec.layout.clear();
        assert_eq!(validate_file(&file).reason, SPEC_LAYOUT_EMPTY);
    }

    /// Story: earlier rules win over later ones
    #[test]
    fn story_rule_order_is_deterministic() {
        let mut file = valid_content();
        file.spec.path.clear();
        file.spec.title.clear();
        file.spec.layout.clear();
        assert_eq!(validate_file(&file), Decision::deny(SPEC_PATH_EMPTY));

        file.spec.name.clear();
        assert_eq!(validate_file(&file), Decision::deny(SPEC_NAME_EMPTY));

        let mut file = valid_content();
        file.spec.title.clear();
        file.spec.layout.clear();
        assert_eq!(validate_file(&file), Decision::deny(SPEC_TITLE_EMPTY));
    }

    /// Story: only content pages need a title and layout
    #[test]
    fn story_assets_and_specs_skip_front_matter_rules() {
        for kind in [Some(FileKind::Asset), Some(FileKind::Specification), None] {
            let mut file = valid_content();
            file.spec.kind = kind;
            file.spec.title.clear();
            file.spec.layout.clear();
            assert!(validate_file(&file).allowed, "{:?} should be allowed", kind);
        }
    }

    #[tokio::test]
    async fn test_file_validator_wraps_rules() {
        let mut file = valid_content();
        file.spec.path.clear();

        let decision = FileValidator.validate(&Resource::File(file)).await.unwrap();
        assert_eq!(decision, Decision::deny(SPEC_PATH_EMPTY));
    }
}
