//! JSON request/response bridge for the vision service.
//!
//! `VisionServer` answers requests for the instances held by a
//! `SubtypeService`; `VisionClient` is the matching proxy that satisfies
//! `VisionService` over any `ClientConn`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use serde_json::Value;

use super::model::{Classifications, Detection, ModelConfig, Object};
use super::VisionService;
use crate::components::camera::Image;
use crate::error::{ResourceError, Result};
use crate::registry::{ClientConn, RpcHandler, ServiceDescriptor, SubtypeService, WireError};
use crate::resource::Closer;

/// Kind name recorded on handles wrapping a client proxy.
pub const CLIENT_KIND: &str = "vision_client";

pub static VISION_SERVICE_DESCRIPTOR: ServiceDescriptor = ServiceDescriptor {
    service: "rdk.service.vision.v1.VisionService",
    methods: &[
        "ModelParameterSchema",
        "DetectorNames",
        "AddDetector",
        "RemoveDetector",
        "DetectionsFromCamera",
        "Detections",
        "ClassifierNames",
        "AddClassifier",
        "RemoveClassifier",
        "ClassificationsFromCamera",
        "Classifications",
        "SegmenterNames",
        "AddSegmenter",
        "RemoveSegmenter",
        "ObjectPointClouds",
    ],
};

/// One call on a named vision service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum VisionRequest {
    ModelParameterSchema { name: String, model_type: String },
    DetectorNames { name: String },
    AddDetector { name: String, config: ModelConfig },
    RemoveDetector { name: String, model: String },
    DetectionsFromCamera { name: String, camera: String, detector: String },
    Detections { name: String, image: Image, detector: String },
    ClassifierNames { name: String },
    AddClassifier { name: String, config: ModelConfig },
    RemoveClassifier { name: String, model: String },
    ClassificationsFromCamera { name: String, camera: String, classifier: String, n: usize },
    Classifications { name: String, image: Image, classifier: String, n: usize },
    SegmenterNames { name: String },
    AddSegmenter { name: String, config: ModelConfig },
    RemoveSegmenter { name: String, model: String },
    ObjectPointClouds { name: String, camera: String, segmenter: String },
}

impl VisionRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::ModelParameterSchema { .. } => "ModelParameterSchema",
            Self::DetectorNames { .. } => "DetectorNames",
            Self::AddDetector { .. } => "AddDetector",
            Self::RemoveDetector { .. } => "RemoveDetector",
            Self::DetectionsFromCamera { .. } => "DetectionsFromCamera",
            Self::Detections { .. } => "Detections",
            Self::ClassifierNames { .. } => "ClassifierNames",
            Self::AddClassifier { .. } => "AddClassifier",
            Self::RemoveClassifier { .. } => "RemoveClassifier",
            Self::ClassificationsFromCamera { .. } => "ClassificationsFromCamera",
            Self::Classifications { .. } => "Classifications",
            Self::SegmenterNames { .. } => "SegmenterNames",
            Self::AddSegmenter { .. } => "AddSegmenter",
            Self::RemoveSegmenter { .. } => "RemoveSegmenter",
            Self::ObjectPointClouds { .. } => "ObjectPointClouds",
        }
    }

    /// Name of the service instance the call targets.
    pub fn instance(&self) -> &str {
        match self {
            Self::ModelParameterSchema { name, .. }
            | Self::DetectorNames { name }
            | Self::AddDetector { name, .. }
            | Self::RemoveDetector { name, .. }
            | Self::DetectionsFromCamera { name, .. }
            | Self::Detections { name, .. }
            | Self::ClassifierNames { name }
            | Self::AddClassifier { name, .. }
            | Self::RemoveClassifier { name, .. }
            | Self::ClassificationsFromCamera { name, .. }
            | Self::Classifications { name, .. }
            | Self::SegmenterNames { name }
            | Self::AddSegmenter { name, .. }
            | Self::RemoveSegmenter { name, .. }
            | Self::ObjectPointClouds { name, .. } => name,
        }
    }
}

/// Decode one request envelope.
///
/// Malformed JSON is a `Protocol` error. Well-formed JSON whose content is
/// invalid (unknown method, missing field, an image whose size disagrees
/// with its pixels) is a `Validation` error.
pub fn decode_request(payload: &[u8]) -> Result<VisionRequest> {
    serde_json::from_slice(payload).map_err(|e| match e.classify() {
        Category::Data => ResourceError::Validation(format!("invalid vision request: {}", e)),
        _ => ResourceError::Protocol(e),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum VisionResponse {
    Schema(Value),
    Names(Vec<String>),
    Empty,
    Detections(Vec<Detection>),
    Classifications(Classifications),
    Objects(Vec<Object>),
    Error(WireError),
}

/// Server-side adapter over the locally served vision instances.
pub struct VisionServer {
    service: Arc<SubtypeService>,
}

impl VisionServer {
    pub fn new(service: Arc<SubtypeService>) -> Self {
        Self { service }
    }

    fn instance(&self, name: &str) -> Result<Arc<dyn VisionService>> {
        let handle = self
            .service
            .resource(name)
            .ok_or_else(|| ResourceError::not_found("vision service", name))?;
        handle
            .downcast::<dyn VisionService>()
            .ok_or_else(|| ResourceError::UnimplementedInterface {
                expected: super::subtype().to_string(),
                actual: handle.kind().to_string(),
            })
    }

    async fn dispatch(&self, request: VisionRequest) -> Result<VisionResponse> {
        let svc = self.instance(request.instance())?;
        let response = match request {
            VisionRequest::ModelParameterSchema { model_type, .. } => {
                VisionResponse::Schema(svc.model_parameter_schema(&model_type).await?)
            }
            VisionRequest::DetectorNames { .. } => VisionResponse::Names(svc.detector_names().await?),
            VisionRequest::AddDetector { config, .. } => {
                svc.add_detector(config).await?;
                VisionResponse::Empty
            }
            VisionRequest::RemoveDetector { model, .. } => {
                svc.remove_detector(&model).await?;
                VisionResponse::Empty
            }
            VisionRequest::DetectionsFromCamera { camera, detector, .. } => {
                VisionResponse::Detections(svc.detections_from_camera(&camera, &detector).await?)
            }
            VisionRequest::Detections { image, detector, .. } => {
                VisionResponse::Detections(svc.detections(&image, &detector).await?)
            }
            VisionRequest::ClassifierNames { .. } => VisionResponse::Names(svc.classifier_names().await?),
            VisionRequest::AddClassifier { config, .. } => {
                svc.add_classifier(config).await?;
                VisionResponse::Empty
            }
            VisionRequest::RemoveClassifier { model, .. } => {
                svc.remove_classifier(&model).await?;
                VisionResponse::Empty
            }
            VisionRequest::ClassificationsFromCamera { camera, classifier, n, .. } => {
                VisionResponse::Classifications(
                    svc.classifications_from_camera(&camera, &classifier, n).await?,
                )
            }
            VisionRequest::Classifications { image, classifier, n, .. } => {
                VisionResponse::Classifications(svc.classifications(&image, &classifier, n).await?)
            }
            VisionRequest::SegmenterNames { .. } => VisionResponse::Names(svc.segmenter_names().await?),
            VisionRequest::AddSegmenter { config, .. } => {
                svc.add_segmenter(config).await?;
                VisionResponse::Empty
            }
            VisionRequest::RemoveSegmenter { model, .. } => {
                svc.remove_segmenter(&model).await?;
                VisionResponse::Empty
            }
            VisionRequest::ObjectPointClouds { camera, segmenter, .. } => {
                VisionResponse::Objects(svc.object_point_clouds(&camera, &segmenter).await?)
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl RpcHandler for VisionServer {
    fn descriptor(&self) -> &'static ServiceDescriptor {
        &VISION_SERVICE_DESCRIPTOR
    }

    async fn handle(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let request = decode_request(payload)?;
        let method = request.method();
        let instance = request.instance().to_string();

        let response = match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(method, instance = %instance, error = %e, "vision request failed");
                VisionResponse::Error(WireError::from(&e))
            }
        };
        Ok(serde_json::to_vec(&response)?)
    }
}

/// Proxy for a vision service served by another process.
pub struct VisionClient {
    conn: Arc<dyn ClientConn>,
    name: String,
}

impl VisionClient {
    pub fn new(conn: Arc<dyn ClientConn>, name: &str) -> Self {
        Self {
            conn,
            name: name.to_string(),
        }
    }

    async fn call(&self, request: VisionRequest) -> Result<VisionResponse> {
        let payload = serde_json::to_vec(&request)?;
        let reply = self
            .conn
            .invoke(VISION_SERVICE_DESCRIPTOR.service, payload)
            .await?;
        match serde_json::from_slice::<VisionResponse>(&reply)? {
            VisionResponse::Error(err) => Err(err.into()),
            response => Ok(response),
        }
    }

    async fn call_names(&self, request: VisionRequest) -> Result<Vec<String>> {
        let method = request.method();
        match self.call(request).await? {
            VisionResponse::Names(names) => Ok(names),
            other => Err(unexpected(method, &other)),
        }
    }

    async fn call_empty(&self, request: VisionRequest) -> Result<()> {
        let method = request.method();
        match self.call(request).await? {
            VisionResponse::Empty => Ok(()),
            other => Err(unexpected(method, &other)),
        }
    }

    async fn call_detections(&self, request: VisionRequest) -> Result<Vec<Detection>> {
        let method = request.method();
        match self.call(request).await? {
            VisionResponse::Detections(detections) => Ok(detections),
            other => Err(unexpected(method, &other)),
        }
    }

    async fn call_classifications(&self, request: VisionRequest) -> Result<Classifications> {
        let method = request.method();
        match self.call(request).await? {
            VisionResponse::Classifications(classifications) => Ok(classifications),
            other => Err(unexpected(method, &other)),
        }
    }
}

fn unexpected(method: &str, response: &VisionResponse) -> ResourceError {
    ResourceError::Remote(format!("unexpected response to {}: {:?}", method, response))
}

/// Closing a proxy has no remote effect.
impl Closer for VisionClient {}

#[async_trait]
impl VisionService for VisionClient {
    async fn model_parameter_schema(&self, model_type: &str) -> Result<Value> {
        let request = VisionRequest::ModelParameterSchema {
            name: self.name.clone(),
            model_type: model_type.to_string(),
        };
        match self.call(request).await? {
            VisionResponse::Schema(schema) => Ok(schema),
            other => Err(unexpected("ModelParameterSchema", &other)),
        }
    }

    async fn detector_names(&self) -> Result<Vec<String>> {
        self.call_names(VisionRequest::DetectorNames { name: self.name.clone() })
            .await
    }

    async fn add_detector(&self, config: ModelConfig) -> Result<()> {
        self.call_empty(VisionRequest::AddDetector {
            name: self.name.clone(),
            config,
        })
        .await
    }

    async fn remove_detector(&self, name: &str) -> Result<()> {
        self.call_empty(VisionRequest::RemoveDetector {
            name: self.name.clone(),
            model: name.to_string(),
        })
        .await
    }

    async fn detections_from_camera(&self, camera: &str, detector: &str) -> Result<Vec<Detection>> {
        self.call_detections(VisionRequest::DetectionsFromCamera {
            name: self.name.clone(),
            camera: camera.to_string(),
            detector: detector.to_string(),
        })
        .await
    }

    async fn detections(&self, image: &Image, detector: &str) -> Result<Vec<Detection>> {
        self.call_detections(VisionRequest::Detections {
            name: self.name.clone(),
            image: image.clone(),
            detector: detector.to_string(),
        })
        .await
    }

    async fn classifier_names(&self) -> Result<Vec<String>> {
        self.call_names(VisionRequest::ClassifierNames { name: self.name.clone() })
            .await
    }

    async fn add_classifier(&self, config: ModelConfig) -> Result<()> {
        self.call_empty(VisionRequest::AddClassifier {
            name: self.name.clone(),
            config,
        })
        .await
    }

    async fn remove_classifier(&self, name: &str) -> Result<()> {
        self.call_empty(VisionRequest::RemoveClassifier {
            name: self.name.clone(),
            model: name.to_string(),
        })
        .await
    }

    async fn classifications_from_camera(
        &self,
        camera: &str,
        classifier: &str,
        n: usize,
    ) -> Result<Classifications> {
        self.call_classifications(VisionRequest::ClassificationsFromCamera {
            name: self.name.clone(),
            camera: camera.to_string(),
            classifier: classifier.to_string(),
            n,
        })
        .await
    }

    async fn classifications(&self, image: &Image, classifier: &str, n: usize) -> Result<Classifications> {
        self.call_classifications(VisionRequest::Classifications {
            name: self.name.clone(),
            image: image.clone(),
            classifier: classifier.to_string(),
            n,
        })
        .await
    }

    async fn segmenter_names(&self) -> Result<Vec<String>> {
        self.call_names(VisionRequest::SegmenterNames { name: self.name.clone() })
            .await
    }

    async fn add_segmenter(&self, config: ModelConfig) -> Result<()> {
        self.call_empty(VisionRequest::AddSegmenter {
            name: self.name.clone(),
            config,
        })
        .await
    }

    async fn remove_segmenter(&self, name: &str) -> Result<()> {
        self.call_empty(VisionRequest::RemoveSegmenter {
            name: self.name.clone(),
            model: name.to_string(),
        })
        .await
    }

    async fn object_point_clouds(&self, camera: &str, segmenter: &str) -> Result<Vec<Object>> {
        let request = VisionRequest::ObjectPointClouds {
            name: self.name.clone(),
            camera: camera.to_string(),
            segmenter: segmenter.to_string(),
        };
        match self.call(request).await? {
            VisionResponse::Objects(objects) => Ok(objects),
            other => Err(unexpected("ObjectPointClouds", &other)),
        }
    }
}
