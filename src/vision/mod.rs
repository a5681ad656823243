//! Vision service: detection, classification and segmentation over named
//! models, fed by cameras looked up in the robot's resource set.

pub mod builtin;
pub mod factory;
pub mod model;
pub mod registry;
pub mod rpc;

mod reconfigurable;
mod service;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::components::camera::Image;
use crate::error::Result;
use crate::reconfigure::{self, ReconfigurableResource};
use crate::registry::{
    ClientConn, RpcHandler, SubtypeBinding, SubtypeRegistryBuilder, SubtypeService,
};
use crate::resource::{
    self, Api, Closer, ResourceHandle, ResourceName, ResourceSet, ResourceType, Subtype,
};

pub use factory::{ModelFactories, ModelFactory, ModelLookup};
pub use model::{
    BoundingBox, Classification, Classifications, Classifier, Detection, Detector, ModelConfig,
    ModelKind, Object, Segmenter, VisionModel,
};
pub use registry::ModelRegistry;
pub use rpc::{VisionClient, VisionServer, VISION_SERVICE_DESCRIPTOR};
pub use service::{Vision, VisionAttributes};

pub const SUBTYPE_NAME: &str = "vision";

/// Suffix of the segmenter created alongside every detector.
pub const SEGMENTER_SUFFIX: &str = "_segmenter";

pub fn subtype() -> Subtype {
    Subtype::new(resource::NAMESPACE_RDK, ResourceType::Service, SUBTYPE_NAME)
}

/// Typed resource name of the named vision service.
pub fn named(name: &str) -> ResourceName {
    ResourceName::new(subtype(), name)
}

/// Look up a vision service in the given resource set.
pub fn from_resources(resources: &dyn ResourceSet, name: &str) -> Result<Arc<dyn VisionService>> {
    resource::resolve::<dyn VisionService>(resources, name)
}

/// Name of a vision service in the set, if any. Unspecified among several.
pub fn find_first_name(resources: &dyn ResourceSet) -> Option<String> {
    resource::find_first_name(resources, &subtype())
}

pub fn first_from_resources(resources: &dyn ResourceSet) -> Result<Arc<dyn VisionService>> {
    resource::first_of::<dyn VisionService>(resources)
}

/// Computer-vision operations over the service's registered models.
#[async_trait]
pub trait VisionService: Closer {
    /// Parameter schema for a model type, for validating configs up front.
    async fn model_parameter_schema(&self, model_type: &str) -> Result<Value>;

    async fn detector_names(&self) -> Result<Vec<String>>;
    async fn add_detector(&self, config: ModelConfig) -> Result<()>;
    async fn remove_detector(&self, name: &str) -> Result<()>;
    async fn detections_from_camera(&self, camera: &str, detector: &str) -> Result<Vec<Detection>>;
    async fn detections(&self, image: &Image, detector: &str) -> Result<Vec<Detection>>;

    async fn classifier_names(&self) -> Result<Vec<String>>;
    async fn add_classifier(&self, config: ModelConfig) -> Result<()>;
    async fn remove_classifier(&self, name: &str) -> Result<()>;
    async fn classifications_from_camera(
        &self,
        camera: &str,
        classifier: &str,
        n: usize,
    ) -> Result<Classifications>;
    async fn classifications(&self, image: &Image, classifier: &str, n: usize) -> Result<Classifications>;

    async fn segmenter_names(&self) -> Result<Vec<String>>;
    async fn add_segmenter(&self, config: ModelConfig) -> Result<()>;
    async fn remove_segmenter(&self, name: &str) -> Result<()>;
    async fn object_point_clouds(&self, camera: &str, segmenter: &str) -> Result<Vec<Object>>;
}

impl Api for dyn VisionService {
    fn subtype() -> Subtype {
        subtype()
    }
}

fn rpc_server(service: Arc<SubtypeService>) -> Arc<dyn RpcHandler> {
    Arc::new(VisionServer::new(service))
}

fn rpc_client(conn: Arc<dyn ClientConn>, name: &str) -> ResourceHandle {
    let client: Arc<dyn VisionService> = Arc::new(VisionClient::new(conn, name));
    ResourceHandle::new::<dyn VisionService>(rpc::CLIENT_KIND, client)
}

fn wrap_with_reconfigurable(resource: &ResourceHandle) -> Result<Arc<dyn ReconfigurableResource>> {
    Ok(Arc::new(reconfigure::wrap::<dyn VisionService>(resource)?))
}

/// Add the vision subtype's binding to the startup catalog.
pub fn register_subtype(builder: &mut SubtypeRegistryBuilder) -> Result<()> {
    builder.register(
        subtype(),
        SubtypeBinding {
            descriptor: &VISION_SERVICE_DESCRIPTOR,
            rpc_server,
            rpc_client,
            reconfigurable: wrap_with_reconfigurable,
        },
    )?;
    Ok(())
}
