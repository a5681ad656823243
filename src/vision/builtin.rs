//! Built-in model types.
//!
//! - `color_detector`: connected regions of a target colour.
//! - `detector_segmenter`: lifts a detector's boxes into point-cloud objects.
//! - `radius_clustering`: splits a point cloud into well-separated clusters.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::factory::{ModelFactories, ModelFactory};
use super::model::{
    BoundingBox, Detection, Detector, ModelConfig, ModelKind, Object, Segmenter, VisionModel,
};
use crate::components::camera::{Camera, Image, Point, PointCloud, Rgb};
use crate::error::{ResourceError, Result};

pub const COLOR_DETECTOR: &str = "color_detector";
pub const DETECTOR_SEGMENTER: &str = "detector_segmenter";
pub const RADIUS_CLUSTERING: &str = "radius_clustering";

pub(crate) fn register(factories: &mut ModelFactories) -> Result<()> {
    let entries = [
        (
            COLOR_DETECTOR,
            ModelFactory::new(ModelKind::Detector, color_detector_schema(), |cfg, _| {
                let params: ColorDetectorParams = cfg.parameters_as()?;
                Ok(VisionModel::Detector(Arc::new(ColorDetector::new(params)?)))
            }),
        ),
        (
            DETECTOR_SEGMENTER,
            ModelFactory::new(ModelKind::Segmenter, detector_segmenter_schema(), |cfg, models| {
                let params: DetectorSegmenterParams = cfg.parameters_as()?;
                let detector = models.lookup(&params.detector_name)?.into_detector()?;
                Ok(VisionModel::Segmenter(Arc::new(DetectorSegmenter {
                    detector,
                    confidence_threshold: params.confidence_threshold,
                })))
            }),
        ),
        (
            RADIUS_CLUSTERING,
            ModelFactory::new(ModelKind::Segmenter, radius_clustering_schema(), |cfg, _| {
                let params: RadiusClusteringParams = cfg.parameters_as()?;
                Ok(VisionModel::Segmenter(Arc::new(RadiusClustering::new(params)?)))
            }),
        ),
    ];
    for (tag, factory) in entries {
        factories.register(tag, factory)?;
    }
    Ok(())
}

/// Build the companion segmenter config for a detector.
pub fn companion_segmenter(detector_name: &str, segmenter_name: String) -> ModelConfig {
    ModelConfig::new(segmenter_name, DETECTOR_SEGMENTER).with_parameter("detector_name", detector_name)
}

#[derive(Debug, Deserialize)]
struct ColorDetectorParams {
    detect_color: String,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
    #[serde(default = "default_segment_size")]
    segment_size: usize,
}

fn default_tolerance() -> f64 {
    0.05
}

fn default_segment_size() -> usize {
    1
}

fn color_detector_schema() -> serde_json::Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": COLOR_DETECTOR,
        "type": "object",
        "properties": {
            "detect_color": {"type": "string", "pattern": "^#[0-9a-fA-F]{6}$"},
            "tolerance": {"type": "number", "minimum": 0.0, "maximum": 1.0, "default": 0.05},
            "segment_size": {"type": "integer", "minimum": 1, "default": 1}
        },
        "required": ["detect_color"],
        "additionalProperties": false
    })
}

fn parse_hex_color(s: &str) -> Result<Rgb> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ResourceError::Validation(format!("invalid colour {:?}", s)));
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
    match (channel(0), channel(2), channel(4)) {
        (Ok(r), Ok(g), Ok(b)) => Ok([r, g, b]),
        _ => Err(ResourceError::Validation(format!("invalid colour {:?}", s))),
    }
}

/// Finds 4-connected regions within `tolerance` of a target colour.
pub struct ColorDetector {
    color: Rgb,
    tolerance: f64,
    segment_size: usize,
}

impl ColorDetector {
    fn new(params: ColorDetectorParams) -> Result<Self> {
        if !(0.0..=1.0).contains(&params.tolerance) {
            return Err(ResourceError::Validation(format!(
                "tolerance must be within [0, 1], got {}",
                params.tolerance
            )));
        }
        Ok(Self {
            color: parse_hex_color(&params.detect_color)?,
            tolerance: params.tolerance,
            segment_size: params.segment_size.max(1),
        })
    }

    /// Normalised RGB distance in [0, 1].
    fn distance(&self, px: Rgb) -> f64 {
        let sq: f64 = px
            .iter()
            .zip(self.color.iter())
            .map(|(a, b)| {
                let d = *a as f64 - *b as f64;
                d * d
            })
            .sum();
        sq.sqrt() / (3.0f64.sqrt() * 255.0)
    }

    fn find_regions(&self, image: &Image) -> Vec<Detection> {
        if image.is_empty() {
            return Vec::new();
        }
        let (w, h) = (image.width(), image.height());
        let mut visited = vec![false; w as usize * h as usize];
        let mut detections = Vec::new();

        for y in 0..h {
            for x in 0..w {
                let idx = y as usize * w as usize + x as usize;
                if visited[idx] || !self.matches(image, x, y) {
                    continue;
                }
                visited[idx] = true;
                let mut queue = VecDeque::from([(x, y)]);
                let mut count = 0usize;
                let mut bbox = BoundingBox { x_min: x, y_min: y, x_max: x, y_max: y };

                while let Some((cx, cy)) = queue.pop_front() {
                    count += 1;
                    bbox.x_min = bbox.x_min.min(cx);
                    bbox.y_min = bbox.y_min.min(cy);
                    bbox.x_max = bbox.x_max.max(cx);
                    bbox.y_max = bbox.y_max.max(cy);

                    let neighbours = [
                        (cx.checked_sub(1), Some(cy)),
                        (cx.checked_add(1).filter(|nx| *nx < w), Some(cy)),
                        (Some(cx), cy.checked_sub(1)),
                        (Some(cx), cy.checked_add(1).filter(|ny| *ny < h)),
                    ];
                    for (nx, ny) in neighbours {
                        if let (Some(nx), Some(ny)) = (nx, ny) {
                            let nidx = ny as usize * w as usize + nx as usize;
                            if !visited[nidx] && self.matches(image, nx, ny) {
                                visited[nidx] = true;
                                queue.push_back((nx, ny));
                            }
                        }
                    }
                }

                if count >= self.segment_size {
                    detections.push(Detection {
                        bounding_box: bbox,
                        score: count as f64 / bbox.area() as f64,
                        label: "color".to_string(),
                    });
                }
            }
        }
        detections
    }

    fn matches(&self, image: &Image, x: u32, y: u32) -> bool {
        image
            .get(x, y)
            .map(|px| self.distance(px) <= self.tolerance)
            .unwrap_or(false)
    }
}

#[async_trait]
impl Detector for ColorDetector {
    async fn detect(&self, image: &Image) -> Result<Vec<Detection>> {
        Ok(self.find_regions(image))
    }
}

#[derive(Debug, Deserialize)]
struct DetectorSegmenterParams {
    detector_name: String,
    #[serde(default)]
    confidence_threshold: f64,
}

fn detector_segmenter_schema() -> serde_json::Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": DETECTOR_SEGMENTER,
        "type": "object",
        "properties": {
            "detector_name": {"type": "string", "minLength": 1},
            "confidence_threshold": {"type": "number", "minimum": 0.0, "maximum": 1.0, "default": 0.0}
        },
        "required": ["detector_name"]
    })
}

/// Turns each detection into the object made of the cloud points projected
/// inside its box.
pub struct DetectorSegmenter {
    detector: Arc<dyn Detector>,
    confidence_threshold: f64,
}

#[async_trait]
impl Segmenter for DetectorSegmenter {
    async fn segment(&self, camera: Arc<dyn Camera>) -> Result<Vec<Object>> {
        let detections = {
            let frame = camera.read_frame().await?;
            self.detector.detect(frame.image()).await?
        };
        let cloud = camera.next_point_cloud().await?;

        let objects = detections
            .into_iter()
            .filter(|d| d.score >= self.confidence_threshold)
            .filter_map(|d| {
                let points: Vec<_> = cloud
                    .points
                    .iter()
                    .filter(|p| d.bounding_box.contains(p.pixel.0, p.pixel.1))
                    .copied()
                    .collect();
                (!points.is_empty()).then(|| Object {
                    label: Some(d.label),
                    cloud: PointCloud::new(points),
                })
            })
            .collect();
        Ok(objects)
    }
}

#[derive(Debug, Deserialize)]
struct RadiusClusteringParams {
    clustering_radius_mm: f64,
    #[serde(default = "default_segment_size")]
    min_points_in_segment: usize,
}

fn radius_clustering_schema() -> serde_json::Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": RADIUS_CLUSTERING,
        "type": "object",
        "properties": {
            "clustering_radius_mm": {"type": "number", "exclusiveMinimum": 0.0},
            "min_points_in_segment": {"type": "integer", "minimum": 1, "default": 1}
        },
        "required": ["clustering_radius_mm"],
        "additionalProperties": false
    })
}

/// Groups cloud points that are chained together by hops no longer than
/// the clustering radius. Point positions are in millimetres.
pub struct RadiusClustering {
    radius_sq: f64,
    min_points: usize,
}

impl RadiusClustering {
    fn new(params: RadiusClusteringParams) -> Result<Self> {
        let radius = params.clustering_radius_mm;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ResourceError::Validation(format!(
                "clustering_radius_mm must be a positive number, got {}",
                radius
            )));
        }
        Ok(Self {
            radius_sq: radius * radius,
            min_points: params.min_points_in_segment.max(1),
        })
    }

    fn near(&self, a: &Point, b: &Point) -> bool {
        let sq: f64 = a
            .position
            .iter()
            .zip(b.position.iter())
            .map(|(p, q)| (p - q) * (p - q))
            .sum();
        sq <= self.radius_sq
    }

    fn clusters(&self, cloud: &PointCloud) -> Vec<PointCloud> {
        let points = &cloud.points;
        let mut assigned = vec![false; points.len()];
        let mut clusters = Vec::new();

        for seed in 0..points.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut members = vec![seed];
            let mut next = 0;
            while next < members.len() {
                let current = members[next];
                next += 1;
                for (idx, taken) in assigned.iter_mut().enumerate() {
                    if !*taken && self.near(&points[current], &points[idx]) {
                        *taken = true;
                        members.push(idx);
                    }
                }
            }
            if members.len() >= self.min_points {
                members.sort_unstable();
                clusters.push(PointCloud::new(members.into_iter().map(|i| points[i]).collect()));
            }
        }
        clusters
    }
}

#[async_trait]
impl Segmenter for RadiusClustering {
    async fn segment(&self, camera: Arc<dyn Camera>) -> Result<Vec<Object>> {
        let cloud = camera.next_point_cloud().await?;
        Ok(self
            .clusters(&cloud)
            .into_iter()
            .map(|cloud| Object { label: None, cloud })
            .collect())
    }
}
