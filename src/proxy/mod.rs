//! Proxy between the Kubernetes view of portal files and the Kong Admin API
//!
//! Callers hand over whole objects; the proxy keeps the local cache in step and
//! translates each object into the matching Admin API call.

pub mod mapping;
mod resolver;

pub use mapping::{build_file_record, build_record};
pub use resolver::CachedProxyResolver;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::crd::{ObjectKey, Resource};
use crate::Result;

/// Operations the reconciler needs from the proxy
///
/// Implementations must be safe to call concurrently.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Proxy: Send + Sync {
    /// Cache the object and push it to the Admin API
    async fn update_object(&self, resource: &Resource) -> Result<()>;

    /// Drop the object from the cache and delete it from the Admin API
    async fn delete_object(&self, resource: &Resource) -> Result<()>;

    /// Ask the Admin API whether it still has the object
    async fn object_exists(&self, resource: &Resource) -> Result<bool>;

    /// Cached version of the object, without asking the Admin API
    fn object_exists_in_cache(&self, key: &ObjectKey) -> Option<Resource>;

    /// Keys of every cached object
    fn cached_keys(&self) -> Vec<ObjectKey>;

    /// Returns true once the proxy can serve traffic
    fn is_ready(&self) -> bool;
}
