//! Resource set: the lookup surface the robot builder hands to services.

use dashmap::DashMap;

use super::{ResourceHandle, ResourceName};

/// Read-only view of the resources a running system exposes.
pub trait ResourceSet: Send + Sync {
    fn resource_by_name(&self, name: &ResourceName) -> Option<ResourceHandle>;

    /// All registered names, in no particular order.
    fn resource_names(&self) -> Vec<ResourceName>;
}

/// In-process resource set backed by a concurrent map.
#[derive(Default)]
pub struct LocalResources {
    resources: DashMap<ResourceName, ResourceHandle>,
}

impl LocalResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a resource. Returns the previous handle if any.
    pub fn insert(&self, name: ResourceName, handle: ResourceHandle) -> Option<ResourceHandle> {
        self.resources.insert(name, handle)
    }

    pub fn remove(&self, name: &ResourceName) -> Option<ResourceHandle> {
        self.resources.remove(name).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceSet for LocalResources {
    fn resource_by_name(&self, name: &ResourceName) -> Option<ResourceHandle> {
        self.resources.get(name).map(|entry| entry.value().clone())
    }

    fn resource_names(&self) -> Vec<ResourceName> {
        self.resources.iter().map(|entry| entry.key().clone()).collect()
    }
}
