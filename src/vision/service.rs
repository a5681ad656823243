//! The vision service: resolves cameras and models, runs the model, and
//! hands back its output.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::builtin::companion_segmenter;
use super::factory::ModelFactories;
use super::model::{Classifications, Detection, ModelConfig, ModelKind, Object};
use super::registry::ModelRegistry;
use super::{VisionService, SEGMENTER_SUFFIX};
use crate::components::camera::{self, Image};
use crate::error::Result;
use crate::resource::{Closer, ResourceSet};
use crate::telemetry::{traced, OperationSpan};

/// Configuration attributes of a vision service instance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VisionAttributes {
    /// Models registered, in order, when the service is built.
    #[serde(default)]
    pub register_models: Vec<ModelConfig>,
}

/// Local vision service backed by its own model registry.
pub struct Vision {
    resources: Arc<dyn ResourceSet>,
    models: ModelRegistry,
    factories: Arc<ModelFactories>,
}

impl Vision {
    /// Build the service and register the configured models.
    ///
    /// Any registration failure aborts construction.
    pub async fn new(
        resources: Arc<dyn ResourceSet>,
        attributes: &VisionAttributes,
        factories: Arc<ModelFactories>,
    ) -> Result<Self> {
        let models = ModelRegistry::new();
        models.register_all(&attributes.register_models, &factories).await?;
        Ok(Self {
            resources,
            models,
            factories,
        })
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    async fn add(&self, config: &ModelConfig, kind: ModelKind) -> Result<()> {
        self.models.register(config, &self.factories, Some(kind)).await?;
        Ok(())
    }
}

#[async_trait]
impl VisionService for Vision {
    async fn model_parameter_schema(&self, model_type: &str) -> Result<Value> {
        self.factories.parameter_schema(model_type)
    }

    async fn detector_names(&self) -> Result<Vec<String>> {
        Ok(self.models.names_of(ModelKind::Detector).await)
    }

    async fn add_detector(&self, config: ModelConfig) -> Result<()> {
        traced(OperationSpan::new("service::vision::add_detector"), async {
            self.add(&config, ModelKind::Detector).await?;

            let segmenter_name = format!("{}{}", config.name, SEGMENTER_SUFFIX);
            let companion = companion_segmenter(&config.name, segmenter_name.clone());
            if let Err(e) = self.add(&companion, ModelKind::Segmenter).await {
                tracing::warn!(
                    detector = %config.name,
                    segmenter = %segmenter_name,
                    error = %e,
                    "companion segmenter not created; detector stays registered"
                );
                return Err(e);
            }
            self.models.link(&config.name, &segmenter_name).await;
            Ok(())
        })
        .await
    }

    async fn remove_detector(&self, name: &str) -> Result<()> {
        traced(
            OperationSpan::new("service::vision::remove_detector"),
            self.models.remove(name, Some(ModelKind::Detector)),
        )
        .await
    }

    async fn detections_from_camera(&self, camera: &str, detector: &str) -> Result<Vec<Detection>> {
        traced(OperationSpan::new("service::vision::detections_from_camera"), async {
            let cam = camera::from_resources(self.resources.as_ref(), camera)?;
            let detector = self.models.lookup(detector).await?.into_detector()?;
            let frame = cam.read_frame().await?;
            detector.detect(frame.image()).await
        })
        .await
    }

    async fn detections(&self, image: &Image, detector: &str) -> Result<Vec<Detection>> {
        traced(OperationSpan::new("service::vision::detections"), async {
            let detector = self.models.lookup(detector).await?.into_detector()?;
            detector.detect(image).await
        })
        .await
    }

    async fn classifier_names(&self) -> Result<Vec<String>> {
        Ok(self.models.names_of(ModelKind::Classifier).await)
    }

    async fn add_classifier(&self, config: ModelConfig) -> Result<()> {
        traced(
            OperationSpan::new("service::vision::add_classifier"),
            self.add(&config, ModelKind::Classifier),
        )
        .await
    }

    async fn remove_classifier(&self, name: &str) -> Result<()> {
        traced(
            OperationSpan::new("service::vision::remove_classifier"),
            self.models.remove(name, Some(ModelKind::Classifier)),
        )
        .await
    }

    async fn classifications_from_camera(
        &self,
        camera: &str,
        classifier: &str,
        n: usize,
    ) -> Result<Classifications> {
        traced(OperationSpan::new("service::vision::classifications_from_camera"), async {
            let cam = camera::from_resources(self.resources.as_ref(), camera)?;
            let classifier = self.models.lookup(classifier).await?.into_classifier()?;
            let frame = cam.read_frame().await?;
            Ok(classifier.classify(frame.image()).await?.top_n(n))
        })
        .await
    }

    async fn classifications(&self, image: &Image, classifier: &str, n: usize) -> Result<Classifications> {
        traced(OperationSpan::new("service::vision::classifications"), async {
            let classifier = self.models.lookup(classifier).await?.into_classifier()?;
            Ok(classifier.classify(image).await?.top_n(n))
        })
        .await
    }

    async fn segmenter_names(&self) -> Result<Vec<String>> {
        Ok(self.models.names_of(ModelKind::Segmenter).await)
    }

    async fn add_segmenter(&self, config: ModelConfig) -> Result<()> {
        traced(
            OperationSpan::new("service::vision::add_segmenter"),
            self.add(&config, ModelKind::Segmenter),
        )
        .await
    }

    async fn remove_segmenter(&self, name: &str) -> Result<()> {
        traced(
            OperationSpan::new("service::vision::remove_segmenter"),
            self.models.remove(name, Some(ModelKind::Segmenter)),
        )
        .await
    }

    async fn object_point_clouds(&self, camera: &str, segmenter: &str) -> Result<Vec<Object>> {
        traced(OperationSpan::new("service::vision::object_point_clouds"), async {
            let cam = camera::from_resources(self.resources.as_ref(), camera)?;
            let segmenter = self.models.lookup(segmenter).await?.into_segmenter()?;
            segmenter.segment(cam).await
        })
        .await
    }
}

/// Removes every model in name order. The first failure stops the sweep
/// and the models after it stay registered.
#[async_trait]
impl Closer for Vision {
    async fn close(&self) -> Result<()> {
        traced(OperationSpan::new("service::vision::close"), async {
            for name in self.models.names().await {
                // Already swept away as a dependent of an earlier model.
                if !self.models.contains(&name).await {
                    continue;
                }
                self.models.remove(&name, None).await?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::camera::Camera;
    use crate::components::testing::SolidCamera;
    use crate::error::ResourceError;
    use crate::resource::{LocalResources, ResourceHandle};
    use crate::vision::builtin::COLOR_DETECTOR;

    fn red_square_camera() -> Arc<dyn Camera> {
        let mut image = Image::filled(4, 4, [0, 0, 0]).unwrap();
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            image.set(x, y, [255, 0, 0]);
        }
        Arc::new(SolidCamera::from_image(image))
    }

    async fn service(models: Vec<ModelConfig>) -> Result<Vision> {
        let resources = LocalResources::new();
        resources.insert(
            camera::named("cam"),
            ResourceHandle::new::<dyn Camera>("solid_camera", red_square_camera()),
        );
        let attributes = VisionAttributes {
            register_models: models,
        };
        Vision::new(Arc::new(resources), &attributes, Arc::new(ModelFactories::with_builtins()?)).await
    }

    fn red_detector(name: &str) -> ModelConfig {
        ModelConfig::new(name, COLOR_DETECTOR).with_parameter("detect_color", "#ff0000")
    }

    #[tokio::test]
    async fn test_builtin_detector_from_camera() {
        let vision = service(vec![red_detector("red")]).await.unwrap();
        let detections = vision.detections_from_camera("cam", "red").await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bounding_box.area(), 4);
    }

    #[tokio::test]
    async fn test_add_detector_creates_working_companion() {
        let vision = service(vec![]).await.unwrap();
        vision.add_detector(red_detector("red")).await.unwrap();

        assert_eq!(vision.segmenter_names().await.unwrap(), vec!["red_segmenter"]);
        let objects = vision.object_point_clouds("cam", "red_segmenter").await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].center(), Some([1.5, 1.5, 1.0]));
    }

    #[tokio::test]
    async fn test_construction_fails_on_unknown_type() {
        let result = service(vec![ModelConfig::new("m", "mystery")]).await;
        assert!(matches!(result, Err(ResourceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_add_with_wrong_kind_is_rejected() {
        let vision = service(vec![]).await.unwrap();
        let err = vision.add_classifier(red_detector("red")).await.unwrap_err();
        assert!(matches!(err, ResourceError::TypeMismatch { .. }));
        assert!(vision.models().is_empty().await);
    }
}
