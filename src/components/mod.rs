//! Hardware-facing capabilities the services depend on.

pub mod camera;
pub mod sensor;

#[cfg(test)]
pub(crate) mod testing;

pub use camera::{Camera, Frame, Image, Point, PointCloud, Rgb};
pub use sensor::{capture_readings, Readings, Sensor};
