//! `VisionService` delegation through the reconfigurable shim.
//!
//! Every call holds the shim's read guard until the inner call returns.

use async_trait::async_trait;
use serde_json::Value;

use super::model::{Classifications, Detection, ModelConfig, Object};
use super::VisionService;
use crate::components::camera::Image;
use crate::error::Result;
use crate::reconfigure::Reconfigurable;

#[async_trait]
impl VisionService for Reconfigurable<dyn VisionService> {
    async fn model_parameter_schema(&self, model_type: &str) -> Result<Value> {
        self.actual().await?.model_parameter_schema(model_type).await
    }

    async fn detector_names(&self) -> Result<Vec<String>> {
        self.actual().await?.detector_names().await
    }

    async fn add_detector(&self, config: ModelConfig) -> Result<()> {
        self.actual().await?.add_detector(config).await
    }

    async fn remove_detector(&self, name: &str) -> Result<()> {
        self.actual().await?.remove_detector(name).await
    }

    async fn detections_from_camera(&self, camera: &str, detector: &str) -> Result<Vec<Detection>> {
        let actual = self.actual().await?;
        actual.detections_from_camera(camera, detector).await
    }

    async fn detections(&self, image: &Image, detector: &str) -> Result<Vec<Detection>> {
        self.actual().await?.detections(image, detector).await
    }

    async fn classifier_names(&self) -> Result<Vec<String>> {
        self.actual().await?.classifier_names().await
    }

    async fn add_classifier(&self, config: ModelConfig) -> Result<()> {
        self.actual().await?.add_classifier(config).await
    }

    async fn remove_classifier(&self, name: &str) -> Result<()> {
        self.actual().await?.remove_classifier(name).await
    }

    async fn classifications_from_camera(
        &self,
        camera: &str,
        classifier: &str,
        n: usize,
    ) -> Result<Classifications> {
        let actual = self.actual().await?;
        actual.classifications_from_camera(camera, classifier, n).await
    }

    async fn classifications(&self, image: &Image, classifier: &str, n: usize) -> Result<Classifications> {
        let actual = self.actual().await?;
        actual.classifications(image, classifier, n).await
    }

    async fn segmenter_names(&self) -> Result<Vec<String>> {
        self.actual().await?.segmenter_names().await
    }

    async fn add_segmenter(&self, config: ModelConfig) -> Result<()> {
        self.actual().await?.add_segmenter(config).await
    }

    async fn remove_segmenter(&self, name: &str) -> Result<()> {
        self.actual().await?.remove_segmenter(name).await
    }

    async fn object_point_clouds(&self, camera: &str, segmenter: &str) -> Result<Vec<Object>> {
        let actual = self.actual().await?;
        actual.object_point_clouds(camera, segmenter).await
    }
}
