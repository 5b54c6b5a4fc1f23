//! 3D transformation utilities

use crate::point::{Point3f, Vector3f};
use nalgebra::{Isometry3, Matrix4, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// A 3D affine transformation stored as a homogeneous matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3f) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Translation * rotation * scale, applied to points right to left
    pub fn from_trs(
        translation: Vector3f,
        rotation: UnitQuaternion<f32>,
        scale: Vector3f,
    ) -> Self {
        let isometry = Isometry3::from_parts(translation.into(), rotation);
        Self {
            matrix: isometry.to_homogeneous() * Matrix4::new_nonuniform_scaling(&scale),
        }
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3f) -> Point3f {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3f::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Get the inverse transformation, `None` for singular matrices
    /// (e.g. a zero scale axis)
    pub fn inverse(self) -> Option<Self> {
        self.matrix.try_inverse().map(|inv_matrix| Self {
            matrix: inv_matrix,
        })
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}
