//! Relevance spheres: user-placed volumes that bias collapse cost
//!
//! A sphere is the unit-diameter sphere at the origin, moved into world
//! space by a translation/rotation/scale transform. Vertices inside a sphere
//! get its `relevance` added to their curvature term: negative values make
//! them collapse earlier, positive values protect them.
//!
//! When several spheres contain a vertex the **last one in list order
//! wins**. This is a precedence scan, not a min/max merge, and callers rely
//! on it: reordering the list changes the result.

use crate::point::{Point3f, Vector3f};
use crate::transform::Transform3D;
use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

/// Local-space radius of the containment test
pub const SPHERE_LOCAL_RADIUS: f32 = 0.5;

/// A weighted, oriented ellipsoidal region in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceSphere {
    pub position: Vector3f,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3f,
    /// Bias, clamped to [-1, 1] when evaluated
    pub relevance: f32,
}

impl RelevanceSphere {
    pub fn new(
        position: Vector3f,
        rotation: UnitQuaternion<f32>,
        scale: Vector3f,
        relevance: f32,
    ) -> Self {
        Self {
            position,
            rotation,
            scale,
            relevance: relevance.clamp(-1.0, 1.0),
        }
    }

    /// An axis-aligned sphere of the given world-space radius
    pub fn with_radius(center: Point3f, radius: f32, relevance: f32) -> Self {
        Self::new(
            center.coords,
            UnitQuaternion::identity(),
            Vector3f::repeat(radius * 2.0),
            relevance,
        )
    }

    /// Local-to-world transform of the sphere
    pub fn transform(&self) -> Transform3D {
        Transform3D::from_trs(self.position, self.rotation, self.scale)
    }

    /// Whether a world-space point lies inside the sphere. Spheres with a
    /// degenerate (non-invertible) transform contain nothing.
    pub fn contains(&self, world: &Point3f) -> bool {
        self.transform()
            .inverse()
            .map(|inv| inv.transform_point(world).coords.norm() <= SPHERE_LOCAL_RADIUS)
            .unwrap_or(false)
    }
}

impl Default for RelevanceSphere {
    fn default() -> Self {
        Self::new(
            Vector3f::zeros(),
            UnitQuaternion::identity(),
            Vector3f::repeat(1.0),
            0.0,
        )
    }
}

/// Relevance spheres with their world-to-local transforms resolved once, so
/// per-vertex queries do not invert matrices.
#[derive(Debug, Clone, Default)]
pub struct RelevanceField {
    volumes: Vec<(Option<Transform3D>, f32)>,
}

impl RelevanceField {
    pub fn new(spheres: &[RelevanceSphere]) -> Self {
        Self {
            volumes: spheres
                .iter()
                .map(|s| (s.transform().inverse(), s.relevance.clamp(-1.0, 1.0)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Relevance of the last sphere containing `world`, or 0.0
    pub fn bias(&self, world: &Point3f) -> f32 {
        let mut bias = 0.0;
        for (inverse, relevance) in &self.volumes {
            if let Some(inverse) = inverse {
                if inverse.transform_point(world).coords.norm() <= SPHERE_LOCAL_RADIUS {
                    bias = *relevance;
                }
            }
        }
        bias
    }
}

/// Relevance of the last sphere (in list order) containing `world`, or 0.0
pub fn relevance_bias(spheres: &[RelevanceSphere], world: &Point3f) -> f32 {
    RelevanceField::new(spheres).bias(world)
}
