//! Follow-up for KongFiles that vanished from the API server
//!
//! The controller runtime only reconciles objects it can still see, so a
//! deleted KongFile would otherwise stay in Kong. This watch picks up delete
//! events and drives [`reconcile_file`] for the key until it reports done.
//!
//! A re-list after a watch desync carries no delete events for objects removed
//! in the gap. Cached keys missing from a completed re-list are treated as
//! deleted.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Api, ResourceExt};
use tracing::{debug, info, warn};

use super::file::{reconcile_file, Context, Outcome, REQUEUE_DELAY, RETRY_DELAY};
use crate::crd::{KongFile, ObjectKey, ResourceKind};
use crate::proxy::Proxy;

/// Passes spent on one deleted file before giving up on it
pub const MAX_DELETE_PASSES: u32 = 10;

/// Turns watch events into the keys whose deletion must be driven
#[derive(Debug, Default)]
pub struct DeletionTracker {
    /// Namespace of the watched API, `None` when cluster-wide
    namespace: Option<String>,
    /// Keys seen since the current re-list started
    listed: HashSet<ObjectKey>,
}

impl DeletionTracker {
    /// Track a watch over `namespace`, or over all namespaces when `None`
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            listed: HashSet::new(),
        }
    }

    /// Keys to delete after `event`
    pub fn observe(&mut self, event: Event<KongFile>, proxy: &dyn Proxy) -> Vec<ObjectKey> {
        match event {
            Event::Delete(file) => vec![file_key(&file)],
            Event::Apply(_) => Vec::new(),
            Event::Init => {
                self.listed.clear();
                Vec::new()
            }
            Event::InitApply(file) => {
                self.listed.insert(file_key(&file));
                Vec::new()
            }
            Event::InitDone => {
                let listed = std::mem::take(&mut self.listed);
                let stale: Vec<ObjectKey> = proxy
                    .cached_keys()
                    .into_iter()
                    .filter(|key| key.kind == ResourceKind::File)
                    .filter(|key| self.in_scope(key))
                    .filter(|key| !listed.contains(key))
                    .collect();
                debug!(listed = listed.len(), stale = stale.len(), "KongFile re-list complete");
                stale
            }
        }
    }

    fn in_scope(&self, key: &ObjectKey) -> bool {
        self.namespace
            .as_deref()
            .map_or(true, |namespace| key.namespace == namespace)
    }
}

fn file_key(file: &KongFile) -> ObjectKey {
    ObjectKey::file(file.namespace().unwrap_or_default(), file.name_any())
}

/// Watch `api` for deletions until the stream ends
///
/// `namespace` must match the scope `api` was built with.
pub async fn run_deletion_watch(api: Api<KongFile>, namespace: Option<String>, ctx: Arc<Context>) {
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    let mut stream = std::pin::pin!(stream);
    let mut tracker = DeletionTracker::new(namespace);

    info!("KongFile deletion watch started");

    while let Some(event) = stream.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "KongFile watch error, backing off");
                continue;
            }
        };

        for key in tracker.observe(event, ctx.proxy.as_ref()) {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                drive_deletion(&key.namespace, &key.name, &ctx).await;
            });
        }
    }

    info!("KongFile deletion watch stopped");
}

/// Reconcile a deleted file until a pass reports [`Outcome::Done`]
///
/// Failed passes (for example an unreachable API server) are retried. The
/// cache entry is dropped before Kong is called, so a pass whose Admin API
/// delete fails is followed by one that finds nothing cached and finishes.
pub async fn drive_deletion(namespace: &str, name: &str, ctx: &Context) -> bool {
    for attempt in 1..=MAX_DELETE_PASSES {
        match reconcile_file(namespace, name, ctx).await {
            Ok(Outcome::Done) => return true,
            Ok(Outcome::Requeue) => tokio::time::sleep(REQUEUE_DELAY).await,
            Err(e) => {
                warn!(%namespace, %name, attempt, error = %e, "deletion pass failed");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }

    warn!(%namespace, %name, "giving up on deleted file after {} passes", MAX_DELETE_PASSES);
    false
}
