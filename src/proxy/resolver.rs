//! Cache-backed [`Proxy`] implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use super::{build_record, Proxy};
use crate::backend::{AdminApi, DbMode, RootInfo};
use crate::crd::{ObjectKey, Resource};
use crate::store::CacheStore;
use crate::{Error, Result};

/// Proxy that records every object in a [`CacheStore`] before calling Kong
///
/// The cache write is never rolled back when the Admin API call fails; the
/// reconciler retries the whole operation instead.
pub struct CachedProxyResolver {
    admin: Arc<dyn AdminApi>,
    store: Arc<CacheStore>,
    root: RootInfo,
    /// Set after the first successful push; separate from the cache lock
    config_applied: RwLock<bool>,
}

impl CachedProxyResolver {
    /// Discover the Admin API and build a resolver
    ///
    /// The root query is bounded by `timeout` and not retried here; callers
    /// decide whether to try again.
    pub async fn initialize(
        admin: Arc<dyn AdminApi>,
        store: Arc<CacheStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let root = tokio::time::timeout(timeout, admin.root())
            .await
            .map_err(|_| Error::Timeout("GET /".to_string()))??;
        let root = RootInfo::from_value(&root)?;

        info!(
            version = %root.version,
            db_mode = ?root.db_mode,
            "Connected to Kong Admin API"
        );

        Ok(Self {
            admin,
            store,
            root,
            config_applied: RwLock::new(false),
        })
    }

    /// Persistence mode reported by Kong
    pub fn db_mode(&self) -> DbMode {
        self.root.db_mode
    }

    /// Kong version reported by the Admin API
    pub fn version(&self) -> &semver::Version {
        &self.root.version
    }

    /// Returns true when several controller replicas would share one database
    pub fn needs_leader_election(&self) -> bool {
        self.root.db_mode == DbMode::Durable
    }

    /// The cache this resolver writes to
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    fn mark_config_applied(&self) {
        if *self.config_applied.read() {
            return;
        }
        let mut applied = self.config_applied.write();
        if !*applied {
            *applied = true;
            debug!("First configuration applied to Kong");
        }
    }
}

#[async_trait]
impl Proxy for CachedProxyResolver {
    #[instrument(skip(self, resource), fields(key = %resource.key()))]
    async fn update_object(&self, resource: &Resource) -> Result<()> {
        self.store.update(resource.clone());
        self.admin.update_file(&build_record(resource)).await?;
        self.mark_config_applied();
        Ok(())
    }

    #[instrument(skip(self, resource), fields(key = %resource.key()))]
    async fn delete_object(&self, resource: &Resource) -> Result<()> {
        self.store.delete(resource);
        self.admin.delete_file(&build_record(resource)).await?;
        Ok(())
    }

    async fn object_exists(&self, resource: &Resource) -> Result<bool> {
        let found = self.admin.get_file(&build_record(resource)).await?;
        Ok(found.is_some())
    }

    fn object_exists_in_cache(&self, key: &ObjectKey) -> Option<Resource> {
        self.store.get(key)
    }

    fn cached_keys(&self) -> Vec<ObjectKey> {
        self.store.keys()
    }

    fn is_ready(&self) -> bool {
        match self.root.db_mode {
            DbMode::InMemory => *self.config_applied.read(),
            DbMode::Durable => true,
        }
    }
}
