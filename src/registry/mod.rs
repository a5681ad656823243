//! Subtype registry: binds each capability category to its RPC adapters
//! and its reconfigurable-wrapper constructor.
//!
//! The catalog is filled through `SubtypeRegistryBuilder` at process start
//! and then frozen into an immutable `SubtypeRegistry` shared by `Arc`, so
//! lookups need no locking.

pub mod rpc;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ResourceError, Result};
use crate::reconfigure::ReconfigurableResource;
use crate::resource::{ResourceHandle, Subtype};

pub use rpc::{ClientConn, RpcHandler, RpcMux, ServiceDescriptor, SubtypeService, WireError};

/// Builds a server-side adapter over the local instances of a subtype.
pub type RpcServerCtor = fn(Arc<SubtypeService>) -> Arc<dyn RpcHandler>;

/// Builds a client-side proxy for the named remote instance.
pub type RpcClientCtor = fn(Arc<dyn ClientConn>, &str) -> ResourceHandle;

/// Wraps a raw instance into its reconfigurable shim.
pub type ReconfigurableCtor = fn(&ResourceHandle) -> Result<Arc<dyn ReconfigurableResource>>;

/// Everything the framework needs to serve, proxy and hot-swap one subtype.
#[derive(Clone)]
pub struct SubtypeBinding {
    pub descriptor: &'static ServiceDescriptor,
    pub rpc_server: RpcServerCtor,
    pub rpc_client: RpcClientCtor,
    pub reconfigurable: ReconfigurableCtor,
}

/// Startup-time collector of subtype bindings.
#[derive(Default)]
pub struct SubtypeRegistryBuilder {
    bindings: HashMap<Subtype, SubtypeBinding>,
    duplicates: Vec<Subtype>,
}

impl SubtypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding.
    ///
    /// A second registration of the same subtype is a programming error and
    /// is fatal: it returns `Conflict` here, and the builder remembers it so
    /// that `build` refuses to produce a catalog even if the caller ignored
    /// this result.
    pub fn register(&mut self, subtype: Subtype, binding: SubtypeBinding) -> Result<&mut Self> {
        if self.bindings.contains_key(&subtype) {
            tracing::error!(subtype = %subtype, "subtype registered twice");
            let err = ResourceError::conflict("subtype", subtype.to_string());
            self.duplicates.push(subtype);
            return Err(err);
        }
        tracing::debug!(subtype = %subtype, service = binding.descriptor.service, "registered subtype");
        self.bindings.insert(subtype, binding);
        Ok(self)
    }

    /// Freeze the catalog. Fails with `Conflict` if any subtype was
    /// registered more than once.
    pub fn build(self) -> Result<SubtypeRegistry> {
        if let Some(subtype) = self.duplicates.first() {
            return Err(ResourceError::conflict("subtype", subtype.to_string()));
        }
        Ok(SubtypeRegistry {
            bindings: self.bindings,
        })
    }
}

/// Immutable subtype catalog.
pub struct SubtypeRegistry {
    bindings: HashMap<Subtype, SubtypeBinding>,
}

impl SubtypeRegistry {
    pub fn builder() -> SubtypeRegistryBuilder {
        SubtypeRegistryBuilder::new()
    }

    pub fn lookup(&self, subtype: &Subtype) -> Option<&SubtypeBinding> {
        self.bindings.get(subtype)
    }

    /// Registered subtypes, sorted.
    pub fn subtypes(&self) -> Vec<&Subtype> {
        let mut subtypes: Vec<_> = self.bindings.keys().collect();
        subtypes.sort();
        subtypes
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Wrap `resource` with the shim registered for `subtype`.
    pub fn wrap_reconfigurable(
        &self,
        subtype: &Subtype,
        resource: &ResourceHandle,
    ) -> Result<Arc<dyn ReconfigurableResource>> {
        let binding = self
            .lookup(subtype)
            .ok_or_else(|| ResourceError::not_found("subtype", subtype.to_string()))?;
        (binding.reconfigurable)(resource)
    }

    /// Build the RPC server adapter for every registered subtype that has
    /// local instances and register it with `mux`.
    pub fn serve(&self, services: &HashMap<Subtype, Arc<SubtypeService>>, mux: &RpcMux) -> Result<()> {
        for (subtype, service) in services {
            let binding = self
                .lookup(subtype)
                .ok_or_else(|| ResourceError::not_found("subtype", subtype.to_string()))?;
            mux.register((binding.rpc_server)(service.clone()))?;
        }
        Ok(())
    }

    /// Build a client proxy for the named remote instance of `subtype`.
    pub fn client(
        &self,
        subtype: &Subtype,
        conn: Arc<dyn ClientConn>,
        name: &str,
    ) -> Result<ResourceHandle> {
        let binding = self
            .lookup(subtype)
            .ok_or_else(|| ResourceError::not_found("subtype", subtype.to_string()))?;
        Ok((binding.rpc_client)(conn, name))
    }
}
