//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use robokit_core::components::camera::{self, Camera, Frame, Image, Point, PointCloud};
use robokit_core::vision::{
    BoundingBox, Classification, Classifications, Classifier, Detection, Detector, ModelConfig,
    ModelFactories, ModelFactory, ModelKind, Object, Segmenter, Vision, VisionAttributes,
    VisionModel,
};
use robokit_core::{Closer, LocalResources, ResourceError, ResourceHandle, Result};

pub const FAKE_DETECTOR: &str = "fake_detector";
pub const FAKE_CLASSIFIER: &str = "fake_classifier";
pub const FAKE_SEGMENTER: &str = "fake_segmenter";

/// Counters shared between a test and the fakes it builds.
#[derive(Clone, Default)]
pub struct Counters {
    pub frames_read: Arc<AtomicUsize>,
    pub frames_released: Arc<AtomicUsize>,
    pub models_released: Arc<AtomicUsize>,
}

impl Counters {
    pub fn frames_read(&self) -> usize {
        self.frames_read.load(Ordering::SeqCst)
    }

    pub fn frames_released(&self) -> usize {
        self.frames_released.load(Ordering::SeqCst)
    }

    pub fn models_released(&self) -> usize {
        self.models_released.load(Ordering::SeqCst)
    }
}

/// Camera whose frames report their release through a `Counters`.
pub struct FakeCamera {
    counters: Counters,
    fail_read: bool,
}

impl FakeCamera {
    pub fn new(counters: &Counters) -> Self {
        Self {
            counters: counters.clone(),
            fail_read: false,
        }
    }

    pub fn failing(counters: &Counters) -> Self {
        Self {
            counters: counters.clone(),
            fail_read: true,
        }
    }
}

impl Closer for FakeCamera {}

#[async_trait]
impl Camera for FakeCamera {
    async fn read_frame(&self) -> Result<Frame> {
        if self.fail_read {
            return Err(ResourceError::Upstream("camera unplugged".into()));
        }
        self.counters.frames_read.fetch_add(1, Ordering::SeqCst);
        let released = self.counters.frames_released.clone();
        let image = Image::filled(4, 4, [10, 20, 30])?;
        Ok(Frame::with_release(image, move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }

    async fn next_point_cloud(&self) -> Result<PointCloud> {
        let points = (0..4)
            .map(|i| Point {
                position: [i as f64, 0.0, 2.0],
                pixel: (i, 0),
            })
            .collect();
        Ok(PointCloud::new(points))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FakeParams {
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    fail: bool,
    #[serde(default)]
    fail_release: bool,
}

struct FakeModel {
    params: FakeParams,
    counters: Counters,
}

impl FakeModel {
    async fn run(&self) -> Result<()> {
        if self.params.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.params.delay_ms)).await;
        }
        if self.params.fail {
            return Err(ResourceError::Upstream("inference failed".into()));
        }
        Ok(())
    }

    fn release_now(&self) -> Result<()> {
        self.counters.models_released.fetch_add(1, Ordering::SeqCst);
        if self.params.fail_release {
            return Err(ResourceError::Upstream("engine stuck".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Detector for FakeModel {
    async fn detect(&self, _image: &Image) -> Result<Vec<Detection>> {
        self.run().await?;
        Ok(vec![Detection {
            bounding_box: BoundingBox {
                x_min: 0,
                y_min: 0,
                x_max: 1,
                y_max: 0,
            },
            score: 0.9,
            label: "thing".into(),
        }])
    }

    async fn release(&self) -> Result<()> {
        self.release_now()
    }
}

/// Ten labels in scrambled confidence order.
#[async_trait]
impl Classifier for FakeModel {
    async fn classify(&self, _image: &Image) -> Result<Classifications> {
        self.run().await?;
        let entries = (0..10)
            .map(|i| Classification::new(format!("label{}", i), ((i * 7) % 10) as f64 / 10.0))
            .collect::<Vec<_>>();
        Ok(entries.into())
    }

    async fn release(&self) -> Result<()> {
        self.release_now()
    }
}

#[async_trait]
impl Segmenter for FakeModel {
    async fn segment(&self, camera: Arc<dyn Camera>) -> Result<Vec<Object>> {
        self.run().await?;
        Ok(vec![Object {
            label: None,
            cloud: camera.next_point_cloud().await?,
        }])
    }

    async fn release(&self) -> Result<()> {
        self.release_now()
    }
}

fn fake(cfg: &ModelConfig, counters: &Counters) -> Result<Arc<FakeModel>> {
    Ok(Arc::new(FakeModel {
        params: cfg.parameters_as()?,
        counters: counters.clone(),
    }))
}

/// Built-in model types plus the fakes, all reporting to `counters`.
pub fn test_factories(counters: &Counters) -> ModelFactories {
    let mut factories = ModelFactories::with_builtins().unwrap();
    let schema = serde_json::json!({"type": "object"});

    let p = counters.clone();
    factories
        .register(
            FAKE_DETECTOR,
            ModelFactory::new(ModelKind::Detector, schema.clone(), move |cfg, _| {
                Ok(VisionModel::Detector(fake(cfg, &p)?))
            }),
        )
        .unwrap();
    let p = counters.clone();
    factories
        .register(
            FAKE_CLASSIFIER,
            ModelFactory::new(ModelKind::Classifier, schema.clone(), move |cfg, _| {
                Ok(VisionModel::Classifier(fake(cfg, &p)?))
            }),
        )
        .unwrap();
    let p = counters.clone();
    factories
        .register(
            FAKE_SEGMENTER,
            ModelFactory::new(ModelKind::Segmenter, schema, move |cfg, _| {
                Ok(VisionModel::Segmenter(fake(cfg, &p)?))
            }),
        )
        .unwrap();
    factories
}

/// Resource set holding one `FakeCamera` named "cam".
pub fn resources_with_camera(camera: FakeCamera) -> Arc<LocalResources> {
    let resources = Arc::new(LocalResources::new());
    let camera: Arc<dyn Camera> = Arc::new(camera);
    resources.insert(
        camera::named("cam"),
        ResourceHandle::new::<dyn Camera>("fake_camera", camera),
    );
    resources
}

pub async fn vision_with(counters: &Counters, camera: FakeCamera, models: Vec<ModelConfig>) -> Result<Vision> {
    let attributes = VisionAttributes {
        register_models: models,
    };
    Vision::new(
        resources_with_camera(camera),
        &attributes,
        Arc::new(test_factories(counters)),
    )
    .await
}

/// Service with no models and a working camera.
pub async fn empty_vision(counters: &Counters) -> Vision {
    vision_with(counters, FakeCamera::new(counters), Vec::new()).await.unwrap()
}
