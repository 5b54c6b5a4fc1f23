//! Rebuild flat mesh buffers at any recorded reduction level
//!
//! Assembly never touches the working graph. It replays the collapse log
//! over the original buffers, so it can be called any number of times, at
//! different vertex counts, from persisted [`SimplificationData`] alone.

use crate::engine::CollapseRecord;
use crate::geometry::{VertexId, VertexWelding};
use itertools::Itertools;
use lodcrate_core::{Error, Result, TriangleMesh};
use serde::{Deserialize, Serialize};

/// Everything needed to reconstruct a simplified mesh without rerunning
/// cost evaluation, given the original [`TriangleMesh`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplificationData {
    pub welding: VertexWelding,
    /// Graph vertices before any collapse
    pub original_vertex_count: usize,
    /// Non-degenerate triangles before any collapse
    pub original_triangle_count: usize,
    /// Collapse log, in order
    pub records: Vec<CollapseRecord>,
}

impl SimplificationData {
    /// Lowest vertex count the log can reproduce
    pub fn reached_vertex_count(&self) -> usize {
        self.records
            .last()
            .map(|r| r.resulting_vertex_count)
            .unwrap_or(self.original_vertex_count)
    }

    /// Number of records to replay to get down to `n` vertices
    pub fn collapses_for(&self, n: usize) -> Result<usize> {
        if n == 0 || n > self.original_vertex_count {
            return Err(Error::InvalidData(format!(
                "Vertex count must be in 1..={}, got {}",
                self.original_vertex_count, n
            )));
        }
        let reached = self.reached_vertex_count();
        if n < reached {
            return Err(Error::LevelUnavailable {
                requested: n,
                reached,
            });
        }
        Ok(self
            .records
            .iter()
            .take_while(|r| r.resulting_vertex_count >= n)
            .count())
    }

    /// Triangle count of the mesh assembled at `n` vertices
    pub fn triangle_count_at(&self, n: usize) -> Result<usize> {
        let replayed = self.collapses_for(n)?;
        Ok(match replayed {
            0 => self.original_triangle_count,
            k => self.records[k - 1].resulting_triangle_count,
        })
    }
}

/// Graph vertices that survive a replay prefix, and where the removed ones went
struct Replay {
    alive: Vec<bool>,
    parent: Vec<Option<VertexId>>,
    steps: usize,
}

impl Replay {
    fn new(vertex_count: usize, records: &[CollapseRecord]) -> Result<Self> {
        let mut alive = vec![true; vertex_count];
        let mut parent = vec![None; vertex_count];
        for record in records {
            let in_range = |v: VertexId| v < vertex_count;
            if !in_range(record.vertex) || !record.target.map_or(true, in_range) {
                return Err(Error::InvalidData(format!(
                    "Collapse record {:?} references a vertex outside 0..{}",
                    record, vertex_count
                )));
            }
            alive[record.vertex] = false;
            parent[record.vertex] = record.target;
        }
        Ok(Self {
            alive,
            parent,
            steps: records.len(),
        })
    }

    /// Follow collapse targets until a surviving vertex
    fn resolve(&self, mut v: VertexId) -> Option<VertexId> {
        for _ in 0..=self.steps {
            if self.alive[v] {
                return Some(v);
            }
            v = self.parent[v]?;
        }
        None
    }
}

/// Assemble `source` reduced to `n` vertices.
///
/// Surviving graph vertices are numbered densely in id order; each takes the
/// position and attributes of its representative input vertex. Submesh
/// grouping and triangle order are preserved, triangles that collapsed away
/// are omitted.
pub fn assemble_mesh(
    source: &TriangleMesh,
    data: &SimplificationData,
    n: usize,
) -> Result<TriangleMesh> {
    let welding = &data.welding;
    if welding.vertex_map.len() != source.vertex_count() {
        return Err(Error::InvalidData(format!(
            "Simplification data covers {} vertices but the mesh has {}",
            welding.vertex_map.len(),
            source.vertex_count()
        )));
    }
    if welding.representatives.len() != data.original_vertex_count {
        return Err(Error::InvalidData(format!(
            "Simplification data has {} representatives for {} vertices",
            welding.representatives.len(),
            data.original_vertex_count
        )));
    }
    if let Some(&id) = welding.vertex_map.iter().find(|&&id| id >= data.original_vertex_count) {
        return Err(Error::InvalidData(format!(
            "Vertex map references graph vertex {} outside 0..{}",
            id, data.original_vertex_count
        )));
    }
    if let Some(&index) = welding.representatives.iter().find(|&&i| i >= source.vertex_count()) {
        return Err(Error::InvalidData(format!(
            "Representative {} is outside the mesh's {} vertices",
            index,
            source.vertex_count()
        )));
    }

    let replayed = data.collapses_for(n)?;
    let replay = Replay::new(data.original_vertex_count, &data.records[..replayed])?;

    let mut dense: Vec<Option<usize>> = vec![None; data.original_vertex_count];
    let mut selection = Vec::with_capacity(n);
    for (id, &alive) in replay.alive.iter().enumerate() {
        if alive {
            dense[id] = Some(selection.len());
            selection.push(welding.representatives[id]);
        }
    }

    let mut mesh = source.select_vertices(&selection);
    for submesh in 0..source.submesh_count() {
        let mut indices = Vec::new();
        for face in source.submesh_faces(submesh) {
            let ids = face.map(|i| welding.vertex_map.get(i).copied());
            let mut corners = [0usize; 3];
            let mut complete = true;
            for (slot, id) in corners.iter_mut().zip(ids) {
                match id.and_then(|id| replay.resolve(id)).and_then(|id| dense[id]) {
                    Some(index) => *slot = index,
                    None => complete = false,
                }
            }
            if complete && corners.iter().all_unique() {
                indices.extend_from_slice(&corners);
            }
        }
        mesh.submeshes.push(indices);
    }

    Ok(mesh)
}
