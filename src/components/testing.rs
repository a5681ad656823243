//! Minimal in-crate fakes for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::camera::{Camera, Frame, Image, Point, PointCloud, Rgb};
use super::sensor::{Readings, Sensor};
use crate::error::{ResourceError, Result};
use crate::resource::Closer;

/// Camera producing a single-colour image and one point per pixel.
pub struct SolidCamera {
    image: Image,
}

impl SolidCamera {
    pub fn new(width: u32, height: u32, color: Rgb) -> Self {
        Self {
            image: Image::filled(width, height, color).unwrap(),
        }
    }

    pub fn from_image(image: Image) -> Self {
        Self { image }
    }
}

impl Closer for SolidCamera {}

#[async_trait]
impl Camera for SolidCamera {
    async fn read_frame(&self) -> Result<Frame> {
        Ok(Frame::new(self.image.clone()))
    }

    async fn next_point_cloud(&self) -> Result<PointCloud> {
        let mut points = Vec::new();
        for y in 0..self.image.height() {
            for x in 0..self.image.width() {
                points.push(Point {
                    position: [x as f64, y as f64, 1.0],
                    pixel: (x, y),
                });
            }
        }
        Ok(PointCloud::new(points))
    }
}

/// Sensor returning fixed readings, or a one-shot error.
#[derive(Default)]
pub struct StaticSensor {
    readings: Readings,
    failure: Mutex<Option<ResourceError>>,
}

impl StaticSensor {
    pub fn with_reading(key: &str, value: Value) -> Self {
        let mut readings = Readings::new();
        readings.insert(key.to_string(), value);
        Self {
            readings,
            failure: Mutex::new(None),
        }
    }

    pub fn failing(err: ResourceError) -> Self {
        Self {
            readings: Readings::new(),
            failure: Mutex::new(Some(err)),
        }
    }
}

impl Closer for StaticSensor {}

#[async_trait]
impl Sensor for StaticSensor {
    async fn readings(&self) -> Result<Readings> {
        if let Some(err) = self.failure.lock().take() {
            return Err(err);
        }
        Ok(self.readings.clone())
    }
}
