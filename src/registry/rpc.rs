//! RPC bridge seams: server-side handlers, client connections, and the
//! per-subtype multiplexer handlers dispatch into.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::resource::{ResourceHandle, Subtype};

/// Static description of an RPC service: its name and method names.
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub service: &'static str,
    pub methods: &'static [&'static str],
}

impl ServiceDescriptor {
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(&method)
    }
}

/// A `ResourceError` as carried in an RPC reply.
///
/// The category survives the trip, so a client sees the same
/// `is_not_found()` answer as a local caller would. Errors without a wire
/// category (`Remote`, `Protocol`) arrive as `Remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum WireError {
    NotFound { kind: String, name: String },
    UnimplementedInterface { expected: String, actual: String },
    TypeMismatch { expected: String, actual: String },
    Conflict { kind: String, name: String },
    Upstream { message: String },
    Validation { message: String },
    Closed { message: String },
    NoCaptureToStore,
    Remote { message: String },
}

impl From<&ResourceError> for WireError {
    fn from(err: &ResourceError) -> Self {
        match err {
            ResourceError::NotFound { kind, name } => Self::NotFound {
                kind: kind.to_string(),
                name: name.clone(),
            },
            ResourceError::UnimplementedInterface { expected, actual } => Self::UnimplementedInterface {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            ResourceError::TypeMismatch { expected, actual } => Self::TypeMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            ResourceError::Conflict { kind, name } => Self::Conflict {
                kind: kind.to_string(),
                name: name.clone(),
            },
            ResourceError::Upstream(message) => Self::Upstream { message: message.clone() },
            ResourceError::Validation(message) => Self::Validation { message: message.clone() },
            ResourceError::Closed(message) => Self::Closed { message: message.clone() },
            ResourceError::NoCaptureToStore => Self::NoCaptureToStore,
            ResourceError::Remote(message) => Self::Remote { message: message.clone() },
            ResourceError::Protocol(e) => Self::Remote { message: e.to_string() },
        }
    }
}

impl From<WireError> for ResourceError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::NotFound { kind, name } => ResourceError::not_found(kind, name),
            WireError::UnimplementedInterface { expected, actual } => {
                ResourceError::UnimplementedInterface { expected, actual }
            }
            WireError::TypeMismatch { expected, actual } => ResourceError::TypeMismatch { expected, actual },
            WireError::Conflict { kind, name } => ResourceError::conflict(kind, name),
            WireError::Upstream { message } => ResourceError::Upstream(message),
            WireError::Validation { message } => ResourceError::Validation(message),
            WireError::Closed { message } => ResourceError::Closed(message),
            WireError::NoCaptureToStore => ResourceError::NoCaptureToStore,
            WireError::Remote { message } => ResourceError::Remote(message),
        }
    }
}

/// Server-side adapter: decodes a request, dispatches it, encodes the reply.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    fn descriptor(&self) -> &'static ServiceDescriptor;

    async fn handle(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Client-side connection to a serving process.
#[async_trait]
pub trait ClientConn: Send + Sync {
    async fn invoke(&self, service: &str, payload: Vec<u8>) -> Result<Vec<u8>>;
}

/// Local multiplexer: the instances of one subtype served by this process.
pub struct SubtypeService {
    subtype: Subtype,
    resources: RwLock<HashMap<String, ResourceHandle>>,
}

impl SubtypeService {
    pub fn new(subtype: Subtype) -> Self {
        Self {
            subtype,
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn subtype(&self) -> &Subtype {
        &self.subtype
    }

    pub fn resource(&self, name: &str) -> Option<ResourceHandle> {
        self.resources.read().get(name).cloned()
    }

    pub fn add(&self, name: &str, resource: ResourceHandle) -> Option<ResourceHandle> {
        self.resources.write().insert(name.to_string(), resource)
    }

    /// Swap in a complete new set of instances.
    pub fn replace_all(&self, resources: HashMap<String, ResourceHandle>) {
        *self.resources.write() = resources;
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Routes payloads to registered handlers by service name.
///
/// Also usable as an in-process `ClientConn`.
#[derive(Default)]
pub struct RpcMux {
    handlers: RwLock<HashMap<&'static str, Arc<dyn RpcHandler>>>,
}

impl RpcMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler (fails if its service is already served).
    pub fn register(&self, handler: Arc<dyn RpcHandler>) -> Result<()> {
        let service = handler.descriptor().service;
        let mut handlers = self.handlers.write();
        if handlers.contains_key(service) {
            return Err(ResourceError::conflict("rpc service", service));
        }
        handlers.insert(service, handler);
        Ok(())
    }

    pub fn services(&self) -> Vec<&'static str> {
        let mut services: Vec<_> = self.handlers.read().keys().copied().collect();
        services.sort_unstable();
        services
    }
}

#[async_trait]
impl ClientConn for RpcMux {
    async fn invoke(&self, service: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        let handler = self
            .handlers
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| ResourceError::not_found("rpc service", service))?;
        handler.handle(&payload).await
    }
}
