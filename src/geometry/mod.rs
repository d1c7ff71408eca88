//! Geometric primitives shared by the camera models.

pub mod pose;

pub use pose::Pose3;
