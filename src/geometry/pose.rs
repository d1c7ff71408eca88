//! Rigid body pose in 3D.
//!
//! A [`Pose3`] stores a rotation and a translation. For cameras it is the pose of the
//! camera in the world frame (camera-to-world), so world points are brought into the
//! camera frame with [`Pose3::transform_to`].

use crate::error::{TriangulationError, TriangulationResult};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SE(3) element: rotation as unit quaternion plus translation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose3 {
    rotation: UnitQuaternion<f64>,
    translation: Vector3<f64>,
}

impl fmt::Display for Pose3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation;
        write!(
            f,
            "Pose3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

impl Default for Pose3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose3 {
    /// Create a pose from rotation and translation.
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(UnitQuaternion::identity(), Vector3::zeros())
    }

    /// Create a pose from a rotation matrix, which must be orthonormal.
    pub fn from_rotation_matrix(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rotation = Rotation3::from_matrix_unchecked(rotation);
        Self::new(UnitQuaternion::from_rotation_matrix(&rotation), translation)
    }

    /// Create a pose from translation components and Euler angles.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            Vector3::new(x, y, z),
        )
    }

    /// Camera pose at `eye` looking at `target`, with `up` giving the image "up".
    ///
    /// Camera axes: z forward (towards the target), x to the right, y down.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `eye == target` or `up` is parallel to the viewing direction.
    pub fn look_at(
        eye: &Vector3<f64>,
        target: &Vector3<f64>,
        up: &Vector3<f64>,
    ) -> TriangulationResult<Self> {
        let forward = target - eye;
        let zc = forward.try_normalize(f64::EPSILON).ok_or_else(|| {
            TriangulationError::InvalidArgument("look_at: eye and target coincide".to_string())
        })?;
        let xc = (-up).cross(&zc).try_normalize(f64::EPSILON).ok_or_else(|| {
            TriangulationError::InvalidArgument(
                "look_at: up vector is parallel to the viewing direction".to_string(),
            )
        })?;
        let yc = zc.cross(&xc);

        Ok(Self::from_rotation_matrix(
            Matrix3::from_columns(&[xc, yc, zc]),
            *eye,
        ))
    }

    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.rotation
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        let translation = -(rotation * self.translation);
        Self::new(rotation, translation)
    }

    /// Composition `self * other`.
    pub fn compose(&self, other: &Pose3) -> Self {
        Self::new(
            self.rotation * other.rotation,
            self.rotation * other.translation + self.translation,
        )
    }

    /// Map a point from the local frame to the world frame: `R * p + t`.
    pub fn transform_from(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    /// Map a world point into the local frame: `Rᵀ * (p - t)`.
    ///
    /// # Arguments
    /// * `point` - Point in world coordinates
    /// * `jacobian_point` - Optional output for ∂(local)/∂(point), which is `Rᵀ`
    pub fn transform_to(
        &self,
        point: &Vector3<f64>,
        jacobian_point: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        if let Some(jac) = jacobian_point {
            *jac = self.rotation_matrix().transpose();
        }
        self.rotation.inverse_transform_vector(&(point - self.translation))
    }

    /// Compare rotation matrices and translations element-wise within `tol`.
    pub fn equals(&self, other: &Pose3, tol: f64) -> bool {
        let rotation_close = (self.rotation_matrix() - other.rotation_matrix()).amax() <= tol;
        let translation_close = (self.translation - other.translation).amax() <= tol;
        rotation_close && translation_close
    }
}
