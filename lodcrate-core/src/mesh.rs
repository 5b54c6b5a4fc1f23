//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh as exchanged with the host application.
///
/// Triangles are stored as flat index lists, one per submesh (material
/// group). Optional per-vertex attributes are carried through
/// simplification unchanged, by vertex index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub submeshes: Vec<Vec<usize>>,
    pub normals: Option<Vec<Vector3f>>,
    pub uvs: Option<Vec<Uv>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub bone_weights: Option<Vec<BoneWeight>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            submeshes: Vec::new(),
            normals: None,
            uvs: None,
            colors: None,
            bone_weights: None,
        }
    }

    /// Create a single-submesh mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        let indices = faces.into_iter().flatten().collect();
        Self::from_submeshes(vertices, vec![indices])
    }

    /// Create a mesh from vertices and one flat index list per submesh
    pub fn from_submeshes(vertices: Vec<Point3f>, submeshes: Vec<Vec<usize>>) -> Self {
        Self {
            vertices,
            submeshes,
            ..Self::new()
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles over all submeshes
    pub fn face_count(&self) -> usize {
        self.submeshes.iter().map(|indices| indices.len() / 3).sum()
    }

    /// Get the number of submeshes
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.face_count() == 0
    }

    /// Iterate the triangles of one submesh
    pub fn submesh_faces(&self, submesh: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.submeshes
            .get(submesh)
            .map(|indices| indices.as_slice())
            .unwrap_or(&[])
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Iterate the triangles of all submeshes in order
    pub fn faces(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.submeshes.len()).flat_map(move |s| self.submesh_faces(s))
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the last submesh, creating one if needed
    pub fn add_face(&mut self, face: [usize; 3]) {
        if self.submeshes.is_empty() {
            self.submeshes.push(Vec::new());
        }
        if let Some(indices) = self.submeshes.last_mut() {
            indices.extend_from_slice(&face);
        }
    }

    /// Calculate unit face normals in submesh order
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let edge1 = v1 - v0;
                let edge2 = v2 - v0;

                edge1
                    .cross(&edge2)
                    .try_normalize(f32::MIN_POSITIVE)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set vertex texture coordinates
    pub fn set_uvs(&mut self, uvs: Vec<Uv>) {
        if uvs.len() == self.vertices.len() {
            self.uvs = Some(uvs);
        }
    }

    /// Set vertex colors
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.vertices.len() {
            self.colors = Some(colors);
        }
    }

    /// Set vertex bone weights
    pub fn set_bone_weights(&mut self, bone_weights: Vec<BoneWeight>) {
        if bone_weights.len() == self.vertices.len() {
            self.bone_weights = Some(bone_weights);
        }
    }

    /// Build a mesh holding the given vertices (with their attributes) in
    /// the given order, without any triangles.
    pub fn select_vertices(&self, selection: &[usize]) -> TriangleMesh {
        fn pick<T: Copy>(values: &Option<Vec<T>>, selection: &[usize]) -> Option<Vec<T>> {
            values
                .as_ref()
                .map(|values| selection.iter().map(|&i| values[i]).collect())
        }

        TriangleMesh {
            vertices: selection.iter().map(|&i| self.vertices[i]).collect(),
            submeshes: Vec::new(),
            normals: pick(&self.normals, selection),
            uvs: pick(&self.uvs, selection),
            colors: pick(&self.colors, selection),
            bone_weights: pick(&self.bone_weights, selection),
        }
    }

    /// Check that the buffers describe a usable triangle mesh.
    ///
    /// Rejects empty meshes, index lists whose length is not a multiple of
    /// three, out-of-range indices, non-finite positions and attribute
    /// buffers whose length differs from the vertex count.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(Error::InvalidData("Mesh has no vertices".to_string()));
        }
        if self.face_count() == 0 {
            return Err(Error::InvalidData("Mesh has no triangles".to_string()));
        }

        let vertex_count = self.vertices.len();
        for (submesh, indices) in self.submeshes.iter().enumerate() {
            if indices.len() % 3 != 0 {
                return Err(Error::InvalidData(format!(
                    "Submesh {} has {} indices, which is not a multiple of 3",
                    submesh,
                    indices.len()
                )));
            }
            if let Some(&index) = indices.iter().find(|&&i| i >= vertex_count) {
                return Err(Error::InvalidData(format!(
                    "Submesh {} references vertex {} but the mesh has {} vertices",
                    submesh, index, vertex_count
                )));
            }
        }

        if let Some(index) = self
            .vertices
            .iter()
            .position(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(Error::InvalidData(format!(
                "Vertex {} has a non-finite position",
                index
            )));
        }

        let attribute_lengths = [
            ("normals", self.normals.as_ref().map(Vec::len)),
            ("uvs", self.uvs.as_ref().map(Vec::len)),
            ("colors", self.colors.as_ref().map(Vec::len)),
            ("bone weights", self.bone_weights.as_ref().map(Vec::len)),
        ];
        for (name, len) in attribute_lengths {
            if let Some(len) = len {
                if len != vertex_count {
                    return Err(Error::InvalidData(format!(
                        "Mesh has {} {} for {} vertices",
                        len, name, vertex_count
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
