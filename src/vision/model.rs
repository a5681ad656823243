//! Vision model kinds, their capability traits, and result types.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::components::camera::{Camera, Image, PointCloud};
use crate::error::{ResourceError, Result};

/// What a model does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Detector,
    Classifier,
    Segmenter,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detector => write!(f, "detector"),
            Self::Classifier => write!(f, "classifier"),
            Self::Segmenter => write!(f, "segmenter"),
        }
    }
}

/// User-supplied description of one model to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_type: model_type.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Decode the parameter map into a typed struct.
    pub fn parameters_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.parameters.clone())).map_err(|e| {
            ResourceError::Validation(format!(
                "invalid parameters for model {:?} of type {:?}: {}",
                self.name, self.model_type, e
            ))
        })
    }
}

/// Axis-aligned pixel box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Pixel count of the box. An inverted box (`max < min`, possible for
    /// one decoded off the wire) counts as a single row or column.
    pub fn area(&self) -> u64 {
        let w = u64::from(self.x_max).saturating_sub(u64::from(self.x_min)) + 1;
        let h = u64::from(self.y_max).saturating_sub(u64::from(self.y_min)) + 1;
        w * h
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub score: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f64,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Ranked classifier output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classifications(pub Vec<Classification>);

impl Classifications {
    /// Keep the `n` highest-confidence entries, highest first.
    ///
    /// The sort is stable: entries with equal confidence keep the order the
    /// model produced them in. NaN confidences rank below every number.
    pub fn top_n(mut self, n: usize) -> Self {
        self.0.sort_by(|a, b| match (a.confidence.is_nan(), b.confidence.is_nan()) {
            (false, false) => b.confidence.total_cmp(&a.confidence),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        });
        self.0.truncate(n);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Classification> {
        self.0.iter()
    }
}

impl From<Vec<Classification>> for Classifications {
    fn from(entries: Vec<Classification>) -> Self {
        Self(entries)
    }
}

/// A segmented object: the points belonging to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub label: Option<String>,
    pub cloud: PointCloud,
}

impl Object {
    /// Mean position of the object's points, if it has any.
    pub fn center(&self) -> Option<[f64; 3]> {
        if self.cloud.is_empty() {
            return None;
        }
        let mut sum = [0.0; 3];
        for point in &self.cloud.points {
            for (acc, v) in sum.iter_mut().zip(point.position) {
                *acc += v;
            }
        }
        let n = self.cloud.len() as f64;
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &Image) -> Result<Vec<Detection>>;

    /// Free external resources (e.g. a loaded inference engine).
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Full ranked output; the service trims it to the requested size.
    async fn classify(&self, image: &Image) -> Result<Classifications>;

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(&self, camera: Arc<dyn Camera>) -> Result<Vec<Object>>;

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// A registered model. Immutable once built.
#[derive(Clone)]
pub enum VisionModel {
    Detector(Arc<dyn Detector>),
    Classifier(Arc<dyn Classifier>),
    Segmenter(Arc<dyn Segmenter>),
}

impl VisionModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Detector(_) => ModelKind::Detector,
            Self::Classifier(_) => ModelKind::Classifier,
            Self::Segmenter(_) => ModelKind::Segmenter,
        }
    }

    pub fn into_detector(self) -> Result<Arc<dyn Detector>> {
        match self {
            Self::Detector(detector) => Ok(detector),
            other => Err(kind_mismatch(ModelKind::Detector, other.kind())),
        }
    }

    pub fn into_classifier(self) -> Result<Arc<dyn Classifier>> {
        match self {
            Self::Classifier(classifier) => Ok(classifier),
            other => Err(kind_mismatch(ModelKind::Classifier, other.kind())),
        }
    }

    pub fn into_segmenter(self) -> Result<Arc<dyn Segmenter>> {
        match self {
            Self::Segmenter(segmenter) => Ok(segmenter),
            other => Err(kind_mismatch(ModelKind::Segmenter, other.kind())),
        }
    }

    pub(crate) async fn release(&self) -> Result<()> {
        match self {
            Self::Detector(detector) => detector.release().await,
            Self::Classifier(classifier) => classifier.release().await,
            Self::Segmenter(segmenter) => segmenter.release().await,
        }
    }
}

impl fmt::Debug for VisionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VisionModel::{}", self.kind())
    }
}

pub(crate) fn kind_mismatch(expected: ModelKind, actual: ModelKind) -> ResourceError {
    ResourceError::type_mismatch(format!("{} model", expected), format!("{} model", actual))
}
