//! Resource identity and capability plumbing.
//!
//! A resource is any named, typed capability instance (camera, sensor,
//! vision service). Each capability category is a `Subtype`; each instance
//! is addressed by a `ResourceName`. Capability traits are tied to their
//! subtype through the `Api` trait, implemented on the trait object type.

pub mod accessor;
pub mod set;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use accessor::{find_first_name, first_of, names_by_subtype, resolve};
pub use set::{LocalResources, ResourceSet};

/// Namespace of the resources shipped with the framework.
pub const NAMESPACE_RDK: &str = "rdk";

/// Whether a subtype is hardware-facing or a software service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Component,
    Service,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component => write!(f, "component"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// A category of resources sharing one capability interface and one RPC binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subtype {
    pub namespace: String,
    pub resource_type: ResourceType,
    pub name: String,
}

impl Subtype {
    pub fn new(namespace: &str, resource_type: ResourceType, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            resource_type,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.resource_type, self.name)
    }
}

/// Universal lookup key: a subtype plus an instance name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName {
    pub subtype: Subtype,
    pub name: String,
}

impl ResourceName {
    pub fn new(subtype: Subtype, name: impl Into<String>) -> Self {
        Self { subtype, name: name.into() }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subtype, self.name)
    }
}

/// Release hook every resource exposes. The default does nothing.
#[async_trait]
pub trait Closer: Send + Sync {
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Binds a capability trait object (e.g. `dyn Camera`) to its subtype.
pub trait Api: Closer + 'static {
    fn subtype() -> Subtype;
}

/// Build the typed name of an instance of capability `C`.
pub fn named<C: ?Sized + Api>(name: &str) -> ResourceName {
    ResourceName::new(C::subtype(), name)
}

/// Type-erased resource as held by a resource set.
///
/// The payload is an `Arc<C>` for whatever capability the constructor
/// produced; `kind` names the concrete implementation for diagnostics.
#[derive(Clone)]
pub struct ResourceHandle {
    kind: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ResourceHandle {
    pub fn new<C: ?Sized + Api>(kind: impl Into<String>, resource: Arc<C>) -> Self {
        Self {
            kind: kind.into(),
            inner: Arc::new(resource),
        }
    }

    /// Concrete kind of the wrapped resource.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Assert the resource satisfies capability `C`.
    pub fn downcast<C: ?Sized + Api>(&self) -> Option<Arc<C>> {
        self.inner.downcast_ref::<Arc<C>>().cloned()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle").field("kind", &self.kind).finish()
    }
}
