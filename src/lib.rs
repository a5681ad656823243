//! robokit core
//!
//! Resource registry and hot-reconfiguration core of a robot middleware
//! framework. Capabilities (cameras, sensors, vision services) are
//! registered under typed resource names, looked up uniformly whether
//! local or remote, and swapped at runtime without disturbing in-flight
//! calls.
//!
//! # Layout
//!
//! - [`resource`]: subtypes, resource names, handles and lookup.
//! - [`registry`]: the subtype catalog and RPC bridge seams.
//! - [`reconfigure`]: the hot-swap shim.
//! - [`components`]: camera and sensor capabilities.
//! - [`vision`]: the vision service and its model registry.

pub mod components;
pub mod config;
pub mod error;
pub mod reconfigure;
pub mod registry;
pub mod resource;
pub mod telemetry;
pub mod vision;

pub use error::{ResourceError, Result};
pub use reconfigure::{Reconfigurable, ReconfigurableResource};
pub use registry::{SubtypeBinding, SubtypeRegistry, SubtypeRegistryBuilder};
pub use resource::{
    Api, Closer, LocalResources, ResourceHandle, ResourceName, ResourceSet, ResourceType, Subtype,
};

/// Subtype catalog with every subtype this crate serves.
pub fn default_subtypes() -> Result<SubtypeRegistry> {
    let mut builder = SubtypeRegistry::builder();
    vision::register_subtype(&mut builder)?;
    builder.build()
}
