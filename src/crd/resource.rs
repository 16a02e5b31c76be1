//! Closed set of resource kinds the controller manages
//!
//! Every operation on cached or proxied objects is a total match over
//! [`Resource`]. The only place an unknown kind can show up is at the edge,
//! when decoding an object whose type was declared by an external caller.

use kube::api::DynamicObject;
use kube::core::GroupVersionResource;
use kube::ResourceExt;

use super::KongFile;
use crate::Error;

/// Kinds of resources the controller knows how to sync
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// developer.konghq.com/v1 KongFile
    File,
}

impl ResourceKind {
    /// Group/version/resource triple this kind is served under
    pub fn gvr(&self) -> GroupVersionResource {
        match self {
            ResourceKind::File => {
                GroupVersionResource::gvr("developer.konghq.com", "v1", "kongfiles")
            }
        }
    }

    /// Resolve a declared group/version/resource, if it is one we manage
    pub fn from_gvr(gvr: &GroupVersionResource) -> Option<Self> {
        let file = ResourceKind::File.gvr();
        if gvr.group == file.group && gvr.version == file.version && gvr.resource == file.resource {
            Some(ResourceKind::File)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::File => write!(f, "KongFile"),
        }
    }
}

/// Cache key for a managed object
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Kind of the object
    pub kind: ResourceKind,
    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Key for a KongFile
    pub fn file(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::File,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A managed object of any supported kind
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    /// A portal file
    File(KongFile),
}

impl Resource {
    /// Kind of this resource
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::File(_) => ResourceKind::File,
        }
    }

    /// Cache key of this resource
    pub fn key(&self) -> ObjectKey {
        match self {
            Resource::File(file) => {
                ObjectKey::file(file.namespace().unwrap_or_default(), file.name_any())
            }
        }
    }

    /// Borrow the inner KongFile
    pub fn as_file(&self) -> Option<&KongFile> {
        match self {
            Resource::File(file) => Some(file),
        }
    }

    /// Decode an object whose type was declared by an external caller
    ///
    /// Fails with `UnsupportedKind` when `gvr` is not a managed resource, and
    /// with `Serialization` when the object does not fit the declared schema.
    pub fn decode(gvr: &GroupVersionResource, object: &DynamicObject) -> Result<Self, Error> {
        let kind = ResourceKind::from_gvr(gvr).ok_or_else(|| {
            Error::unsupported_kind(format!("{}/{} {}", gvr.group, gvr.version, gvr.resource))
        })?;

        let value = serde_json::to_value(object)?;
        match kind {
            ResourceKind::File => Ok(Resource::File(serde_json::from_value(value)?)),
        }
    }
}

impl From<KongFile> for Resource {
    fn from(file: KongFile) -> Self {
        Resource::File(file)
    }
}
