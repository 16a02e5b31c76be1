//! Controllers for portal CRDs
//!
//! The KongFile controller pushes files into the Kong developer portal and
//! removes them again once their KongFile is deleted.

mod deletion;
mod file;

pub use deletion::{drive_deletion, run_deletion_watch, DeletionTracker, MAX_DELETE_PASSES};
pub use file::{
    ensure_proxy_delete_object, error_policy, reconcile, reconcile_file, Context, FileApi,
    FileApiImpl, Outcome, PERMANENT_ERROR_DELAY, REQUEUE_DELAY, RETRY_DELAY,
};
