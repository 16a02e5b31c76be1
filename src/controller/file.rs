//! KongFile controller implementation
//!
//! Reconciliation is level-triggered: every pass re-reads the object and
//! infers what to do from what it sees.
//!
//! - gone from the API server: drop it from Kong if we still have it cached
//! - marked for deletion: drop it from Kong if Kong still has it
//! - annotated for another controller class: leave it alone
//! - not yet validated: push it to Kong, then record `status.validated`
//!
//! Deletion handling comes before the class filter, so a file that was pushed
//! and later re-annotated is still cleaned up when it is removed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{
    matches_controller_class, ClassMatching, KongFile, KongFileStatus, ObjectKey, Resource,
};
use crate::proxy::Proxy;
use crate::Error;

/// Field manager used for status patches
const FIELD_MANAGER: &str = "portal-controller";

/// Delay before a requested follow-up pass
pub const REQUEUE_DELAY: Duration = Duration::from_secs(1);

/// Delay before retrying after a transient failure
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay before retrying after an error that needs an object or config change
pub const PERMANENT_ERROR_DELAY: Duration = Duration::from_secs(300);

/// Access to KongFiles in the API server
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FileApi: Send + Sync {
    /// Fetch a KongFile, `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<KongFile>, Error>;

    /// Merge-patch the status of a KongFile
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KongFileStatus,
    ) -> Result<(), Error>;
}

/// [`FileApi`] backed by a kube client
pub struct FileApiImpl {
    client: Client,
}

impl FileApiImpl {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileApi for FileApiImpl {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<KongFile>, Error> {
        let api: Api<KongFile> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KongFileStatus,
    ) -> Result<(), Error> {
        let api: Api<KongFile> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Shared state for KongFile reconciliation
pub struct Context {
    /// Proxy to the Kong Admin API
    pub proxy: Arc<dyn Proxy>,
    /// KongFile access in the API server
    pub files: Arc<dyn FileApi>,
    /// Controller class this instance is responsible for
    pub controller_class: String,
}

impl Context {
    /// Create a context talking to the API server through `client`
    pub fn new(client: Client, proxy: Arc<dyn Proxy>, controller_class: impl Into<String>) -> Self {
        Self {
            proxy,
            files: Arc::new(FileApiImpl::new(client)),
            controller_class: controller_class.into(),
        }
    }

    /// Create a context with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        proxy: Arc<dyn Proxy>,
        files: Arc<dyn FileApi>,
        controller_class: &str,
    ) -> Self {
        Self {
            proxy,
            files,
            controller_class: controller_class.to_string(),
        }
    }
}

/// Result of a single reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing left to do until the object changes
    Done,
    /// Run another pass to confirm the object is gone
    Requeue,
}

impl From<Outcome> for Action {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Action::await_change(),
            Outcome::Requeue => Action::requeue(REQUEUE_DELAY),
        }
    }
}

/// Controller entry point
pub async fn reconcile(file: Arc<KongFile>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = file.namespace().unwrap_or_default();
    let outcome = reconcile_file(&namespace, &file.name_any(), &ctx).await?;
    Ok(outcome.into())
}

/// Run one reconciliation pass for the KongFile `namespace/name`
#[instrument(skip(ctx), fields(namespace = %namespace, name = %name))]
pub async fn reconcile_file(namespace: &str, name: &str, ctx: &Context) -> Result<Outcome, Error> {
    debug!("reconciling file");

    let Some(file) = ctx.files.get(namespace, name).await? else {
        return ensure_proxy_delete_object(ctx.proxy.as_ref(), &ObjectKey::file(namespace, name))
            .await;
    };

    if file.is_being_deleted(Utc::now()) {
        info!("file is being deleted, removing it from kong");
        let resource = Resource::File(file);
        if ctx.proxy.object_exists(&resource).await? {
            ctx.proxy.delete_object(&resource).await?;
            return Ok(Outcome::Requeue);
        }
        return Ok(Outcome::Done);
    }

    if !matches_controller_class(
        file.controller_class(),
        &ctx.controller_class,
        ClassMatching::ExactOrEmpty,
    ) {
        debug!(
            class = %file.controller_class(),
            "file belongs to another controller class, skipping"
        );
        return Ok(Outcome::Done);
    }

    if file.is_validated() {
        return Ok(Outcome::Done);
    }

    info!("file not yet pushed, updating kong");
    let resource = Resource::File(file);
    if let Err(e) = ctx.proxy.update_object(&resource).await {
        warn!(error = %e, "failed to push file to kong");
        return Err(e);
    }

    ctx.files
        .patch_status(namespace, name, &KongFileStatus::validated())
        .await?;
    info!("file validated");

    Ok(Outcome::Done)
}

/// Remove an object that no longer exists in the API server from Kong
///
/// Requeues while the object is still cached, so the next pass can confirm it
/// is gone.
pub async fn ensure_proxy_delete_object(proxy: &dyn Proxy, key: &ObjectKey) -> Result<Outcome, Error> {
    let Some(cached) = proxy.object_exists_in_cache(key) else {
        return Ok(Outcome::Done);
    };

    if let Err(e) = proxy.delete_object(&cached).await {
        error!(error = %e, key = %key, "file failed to be deleted from kong");
        return Err(e);
    }

    info!(key = %key, "file is deleted, its configuration will be removed");
    Ok(Outcome::Requeue)
}

/// Requeue policy for failed passes
pub fn error_policy(file: Arc<KongFile>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        namespace = %file.namespace().unwrap_or_default(),
        name = %file.name_any(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(RETRY_DELAY)
    } else {
        Action::requeue(PERMANENT_ERROR_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{FileKind, KongFileSpec, CONTROLLER_CLASS_KEY};
    use crate::proxy::MockProxy;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use mockall::predicate::{always, eq};

    fn sample_file(validated: bool) -> KongFile {
        let mut file = KongFile::new(
            "a",
            KongFileSpec {
                name: "a".to_string(),
                path: "p".to_string(),
                kind: Some(FileKind::Content),
                title: "T".to_string(),
                layout: "L".to_string(),
                content: "hi".to_string(),
            },
        );
        file.metadata.namespace = Some("portal".to_string());
        if validated {
            file.status = Some(KongFileStatus::validated());
        }
        file
    }

    fn with_class(mut file: KongFile, class: &str) -> KongFile {
        file.annotations_mut()
            .insert(CONTROLLER_CLASS_KEY.to_string(), class.to_string());
        file
    }

    fn deleting(mut file: KongFile) -> KongFile {
        file.metadata.deletion_timestamp =
            Some(Time(Utc::now() - chrono::Duration::seconds(1)));
        file
    }

    fn files_returning(file: Option<KongFile>) -> MockFileApi {
        let mut files = MockFileApi::new();
        files
            .expect_get()
            .with(eq("portal"), eq("a"))
            .returning(move |_, _| Ok(file.clone()));
        files
    }

    fn context(proxy: MockProxy, files: MockFileApi) -> Context {
        Context::for_testing(Arc::new(proxy), Arc::new(files), "kong")
    }

    // ==========================================================================
    // Story Tests: Pushing new files
    // ==========================================================================

    /// Story: a new file is pushed to Kong and marked validated
    #[tokio::test]
    async fn story_new_file_is_pushed_and_validated() {
        let mut proxy = MockProxy::new();
        proxy
            .expect_update_object()
            .withf(|r| r.key() == ObjectKey::file("portal", "a"))
            .times(1)
            .returning(|_| Ok(()));

        let mut files = files_returning(Some(sample_file(false)));
        files
            .expect_patch_status()
            .with(eq("portal"), eq("a"), eq(KongFileStatus::validated()))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcome = reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Done);
    }

    /// Story: a validated file is converged and left alone
    #[tokio::test]
    async fn story_validated_file_is_converged() {
        let proxy = MockProxy::new();
        let files = files_returning(Some(sample_file(true)));

        let outcome = reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Done);
    }

    /// Story: a backend failure is surfaced and the status is not touched
    #[tokio::test]
    async fn story_backend_failure_is_surfaced() {
        let mut proxy = MockProxy::new();
        proxy
            .expect_update_object()
            .returning(|_| Err(Error::backend("PUT /files/content/p/a", "connection refused")));

        let files = files_returning(Some(sample_file(false)));

        let err = reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    /// Story: Kong accepted the push but the status write failed; the next pass re-pushes
    #[tokio::test]
    async fn story_status_write_failure_is_retryable() {
        let mut proxy = MockProxy::new();
        proxy.expect_update_object().times(1).returning(|_| Ok(()));

        let mut files = files_returning(Some(sample_file(false)));
        files.expect_patch_status().returning(|_, _, _| {
            Err(Error::Kube(kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "the object has been modified".to_string(),
                reason: "Conflict".to_string(),
                code: 409,
            })))
        });

        let err = reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    // ==========================================================================
    // Story Tests: Controller class
    // ==========================================================================

    /// Story: files annotated for another class are skipped entirely
    #[tokio::test]
    async fn story_foreign_class_is_skipped() {
        let proxy = MockProxy::new();
        let files = files_returning(Some(with_class(sample_file(false), "other")));

        let outcome = reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Done);
    }

    #[tokio::test]
    async fn test_matching_class_is_pushed() {
        let mut proxy = MockProxy::new();
        proxy.expect_update_object().times(1).returning(|_| Ok(()));

        let mut files = files_returning(Some(with_class(sample_file(false), "kong")));
        files.expect_patch_status().times(1).returning(|_, _, _| Ok(()));

        reconcile_file("portal", "a", &context(proxy, files))
            .await
            .unwrap();
    }

    // ==========================================================================
    // Story Tests: Deletion
    // ==========================================================================

    /// Story: a file deleted while cached is removed, then confirmed gone on the next pass
    #[tokio::test]
    async fn story_deleted_file_requeues_until_uncached() {
        let cached = Resource::File(sample_file(true));
        let mut proxy = MockProxy::new();
        let mut seq = mockall::Sequence::new();
        proxy
            .expect_object_exists_in_cache()
            .with(eq(ObjectKey::file("portal", "a")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Some(cached.clone()));
        proxy
            .expect_delete_object()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        proxy
            .expect_object_exists_in_cache()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| None);

        let ctx = context(proxy, files_returning(None));

        assert_eq!(
            reconcile_file("portal", "a", &ctx).await.unwrap(),
            Outcome::Requeue
        );
        assert_eq!(
            reconcile_file("portal", "a", &ctx).await.unwrap(),
            Outcome::Done
        );
    }

    #[tokio::test]
    async fn test_deleted_file_delete_failure_is_surfaced() {
        let cached = Resource::File(sample_file(true));
        let mut proxy = MockProxy::new();
        proxy
            .expect_object_exists_in_cache()
            .returning(move |_| Some(cached.clone()));
        proxy
            .expect_delete_object()
            .returning(|_| Err(Error::Timeout("DELETE /files/content/p/a".to_string())));

        let err = reconcile_file("portal", "a", &context(proxy, files_returning(None)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    /// Story: a file marked for deletion is removed from Kong even if it belongs to another class
    #[tokio::test]
    async fn story_marked_for_deletion_ignores_class() {
        let mut proxy = MockProxy::new();
        proxy
            .expect_object_exists()
            .with(always())
            .times(1)
            .returning(|_| Ok(true));
        proxy.expect_delete_object().times(1).returning(|_| Ok(()));

        let file = deleting(with_class(sample_file(true), "other"));
        let outcome = reconcile_file("portal", "a", &context(proxy, files_returning(Some(file))))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Requeue);
    }

    #[tokio::test]
    async fn test_marked_for_deletion_already_gone() {
        let mut proxy = MockProxy::new();
        proxy.expect_object_exists().returning(|_| Ok(false));

        let file = deleting(sample_file(true));
        let outcome = reconcile_file("portal", "a", &context(proxy, files_returning(Some(file))))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Done);
    }

    #[tokio::test]
    async fn test_api_server_error_is_surfaced() {
        let proxy = MockProxy::new();
        let mut files = MockFileApi::new();
        files
            .expect_get()
            .returning(|_, _| Err(Error::internal("watch cache unavailable")));

        assert!(reconcile_file("portal", "a", &context(proxy, files))
            .await
            .is_err());
    }

    // ==========================================================================
    // Error policy
    // ==========================================================================

    #[test]
    fn test_error_policy_requeues_by_retryability() {
        let ctx = Arc::new(context(MockProxy::new(), MockFileApi::new()));
        let file = Arc::new(sample_file(false));

        let transient = error_policy(file.clone(), &Error::backend("PUT", "x"), ctx.clone());
        assert_eq!(transient, Action::requeue(RETRY_DELAY));

        let permanent = error_policy(file, &Error::invalid_argument("empty path"), ctx);
        assert_eq!(permanent, Action::requeue(PERMANENT_ERROR_DELAY));
    }

    #[test]
    fn test_outcome_into_action() {
        assert_eq!(Action::from(Outcome::Requeue), Action::requeue(REQUEUE_DELAY));
        assert_eq!(Action::from(Outcome::Done), Action::await_change());
    }
}
