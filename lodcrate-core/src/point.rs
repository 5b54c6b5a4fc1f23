//! Point types and per-vertex attribute records

use bytemuck::{Pod, Zeroable};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// Texture coordinate pair
pub type Uv = [f32; 2];

/// Skinning influences of one vertex: up to four bones and their weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct BoneWeight {
    pub bones: [u32; 4],
    pub weights: [f32; 4],
}

impl BoneWeight {
    /// A vertex fully bound to a single bone
    pub fn single(bone: u32) -> Self {
        Self {
            bones: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Default for BoneWeight {
    fn default() -> Self {
        Self::single(0)
    }
}
