//! Name-based lookup with capability assertion.

use std::sync::Arc;

use super::{named, Api, ResourceName, ResourceSet, Subtype};
use crate::error::{ResourceError, Result};

/// Resolve `name` in `resources` as capability `C`.
///
/// Fails with `NotFound` when nothing is registered under the name and
/// with `UnimplementedInterface` when the resource exists but does not
/// implement `C`.
pub fn resolve<C: ?Sized + Api>(resources: &dyn ResourceSet, name: &str) -> Result<Arc<C>> {
    let resource_name = named::<C>(name);
    let handle = resources
        .resource_by_name(&resource_name)
        .ok_or_else(|| ResourceError::not_found("resource", resource_name.to_string()))?;

    handle
        .downcast::<C>()
        .ok_or_else(|| ResourceError::UnimplementedInterface {
            expected: C::subtype().to_string(),
            actual: handle.kind().to_string(),
        })
}

/// Instance names registered under `subtype`.
pub fn names_by_subtype(resources: &dyn ResourceSet, subtype: &Subtype) -> Vec<String> {
    resources
        .resource_names()
        .into_iter()
        .filter(|name| &name.subtype == subtype)
        .map(|ResourceName { name, .. }| name)
        .collect()
}

/// Name of one instance of `subtype`.
///
/// Meant for systems with exactly one instance; with several registered,
/// which one is returned is unspecified.
pub fn find_first_name(resources: &dyn ResourceSet, subtype: &Subtype) -> Option<String> {
    names_by_subtype(resources, subtype).into_iter().next()
}

/// Resolve the instance `find_first_name` selects.
pub fn first_of<C: ?Sized + Api>(resources: &dyn ResourceSet) -> Result<Arc<C>> {
    let subtype = C::subtype();
    let name = find_first_name(resources, &subtype)
        .ok_or_else(|| ResourceError::not_found("resource", subtype.to_string()))?;
    resolve::<C>(resources, &name)
}
