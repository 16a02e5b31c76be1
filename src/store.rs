//! Local cache of objects the controller has pushed (or tried to push)
//!
//! An entry means "we tried", not "Kong has it": the Admin API stays the source
//! of truth for existence. The whole key space sits behind one lock; lookups
//! share it and mutations take it exclusively.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crd::{matches_controller_class, ClassMatching, KongFile, ObjectKey, Resource};

/// Last-seen version of every object the controller has acted on
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<ObjectKey, Resource>>,
}

impl CacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by key
    pub fn get(&self, key: &ObjectKey) -> Option<Resource> {
        self.entries.read().get(key).cloned()
    }

    /// Insert an entry, replacing any previous version
    pub fn add(&self, resource: Resource) {
        self.entries.write().insert(resource.key(), resource);
    }

    /// Same as [`CacheStore::add`]; present for symmetry with the watch events
    pub fn update(&self, resource: Resource) {
        self.add(resource);
    }

    /// Remove the entry for `resource`, returning what was cached
    pub fn delete(&self, resource: &Resource) -> Option<Resource> {
        self.entries.write().remove(&resource.key())
    }

    /// Keys of all cached entries
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached KongFiles belonging to `class`
    pub fn list_files(&self, class: &str, matching: ClassMatching) -> Vec<KongFile> {
        self.entries
            .read()
            .values()
            .filter_map(Resource::as_file)
            .filter(|file| matches_controller_class(file.controller_class(), class, matching))
            .cloned()
            .collect()
    }
}
