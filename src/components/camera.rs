//! Camera capability consumed by the vision service.
//!
//! Drivers live elsewhere; this module only defines the interface, the
//! image and point cloud types, and the `Frame` that guarantees a captured
//! image is handed back to its source.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::resource::{self, Api, Closer, ResourceName, ResourceSet, ResourceType, Subtype};

pub const SUBTYPE_NAME: &str = "camera";

pub fn subtype() -> Subtype {
    Subtype::new(resource::NAMESPACE_RDK, ResourceType::Component, SUBTYPE_NAME)
}

/// Typed resource name of the named camera.
pub fn named(name: &str) -> ResourceName {
    ResourceName::new(subtype(), name)
}

/// Look up a camera in the given resource set.
pub fn from_resources(resources: &dyn ResourceSet, name: &str) -> Result<Arc<dyn Camera>> {
    resource::resolve::<dyn Camera>(resources, name)
}

/// Name of a camera in the set, if any. Unspecified among several.
pub fn find_first_name(resources: &dyn ResourceSet) -> Option<String> {
    resource::find_first_name(resources, &subtype())
}

pub type Rgb = [u8; 3];

/// Row-major RGB image. `width * height == pixels.len()` always holds,
/// including for images decoded off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImage")]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

#[derive(Deserialize)]
struct RawImage {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl TryFrom<RawImage> for Image {
    type Error = ResourceError;

    fn try_from(raw: RawImage) -> Result<Self> {
        Image::new(raw.width, raw.height, raw.pixels)
    }
}

fn pixel_count(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| ResourceError::Validation(format!("image {}x{} is too large", width, height)))
}

impl Image {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Result<Self> {
        let expected = pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(ResourceError::Validation(format!(
                "image {}x{} needs {} pixels, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Image of a single colour.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Result<Self> {
        let count = pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![color; count],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    /// Set one pixel. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Rgb) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.pixels[idx] = color;
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// One captured image on loan from its camera.
///
/// The release callback runs exactly once, when the frame is dropped, so
/// the buffer goes back on success, on error and when the caller's future
/// is cancelled.
pub struct Frame {
    image: Image,
    release: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Frame {
    /// Frame with nothing to give back.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            release: Mutex::new(None),
        }
    }

    pub fn with_release(image: Image, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            image,
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.get_mut().take() {
            release();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.image.width)
            .field("height", &self.image.height)
            .field("has_release", &self.release.lock().is_some())
            .finish()
    }
}

/// 3-D point with the image pixel it was projected from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub position: [f64; 3],
    pub pixel: (u32, u32),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// An image and depth source.
#[async_trait]
pub trait Camera: Closer {
    /// Capture the next image.
    async fn read_frame(&self) -> Result<Frame>;

    /// Capture the next point cloud.
    async fn next_point_cloud(&self) -> Result<PointCloud>;
}

impl Api for dyn Camera {
    fn subtype() -> Subtype {
        subtype()
    }
}
