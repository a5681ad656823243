//! Sensor capability and its readings capture.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ResourceError, Result};
use crate::resource::{
    self, Api, Closer, ResourceHandle, ResourceName, ResourceSet, ResourceType, Subtype,
};

pub const SUBTYPE_NAME: &str = "sensor";

pub fn subtype() -> Subtype {
    Subtype::new(resource::NAMESPACE_RDK, ResourceType::Component, SUBTYPE_NAME)
}

pub fn named(name: &str) -> ResourceName {
    ResourceName::new(subtype(), name)
}

pub fn from_resources(resources: &dyn ResourceSet, name: &str) -> Result<Arc<dyn Sensor>> {
    resource::resolve::<dyn Sensor>(resources, name)
}

pub type Readings = BTreeMap<String, Value>;

#[async_trait]
pub trait Sensor: Closer {
    async fn readings(&self) -> Result<Readings>;
}

impl Api for dyn Sensor {
    fn subtype() -> Subtype {
        subtype()
    }
}

/// Capture methods a sensor collector can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Readings,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Readings => write!(f, "Readings"),
        }
    }
}

fn assert_sensor(resource: &ResourceHandle) -> Result<Arc<dyn Sensor>> {
    resource
        .downcast::<dyn Sensor>()
        .ok_or_else(|| ResourceError::UnimplementedInterface {
            expected: subtype().to_string(),
            actual: resource.kind().to_string(),
        })
}

/// Take one readings sample from `resource` for data capture.
///
/// `NoCaptureToStore` is passed through so filtering sensors can skip a
/// sample; every other failure is tagged with the component and method.
pub async fn capture_readings(resource: &ResourceHandle, component: &str) -> Result<Readings> {
    let sensor = assert_sensor(resource)?;
    match sensor.readings().await {
        Ok(readings) => Ok(readings),
        Err(ResourceError::NoCaptureToStore) => Err(ResourceError::NoCaptureToStore),
        Err(e) => Err(ResourceError::Upstream(format!(
            "failed to read {} from {}: {}",
            Method::Readings,
            component,
            e
        ))),
    }
}
