//! Mesh adjacency graph used during simplification
//!
//! Vertices and triangles live in flat arenas addressed by stable indices.
//! Each vertex keeps the ids of its neighbors and incident triangles, and
//! both lists are kept in sync with the live triangle set by [`MeshGraph::collapse`],
//! which only touches the neighborhood of the collapsed vertex.

use itertools::Itertools;
use lodcrate_core::{Error, Point3f, Result, Transform3D, TriangleMesh, Vector3f};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a vertex in the graph arena
pub type VertexId = usize;

/// Index of a triangle in the graph arena
pub type TriangleId = usize;

/// A simplification vertex
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Stable arena index
    pub id: VertexId,
    pub position: Point3f,
    /// Position used for relevance sphere tests
    pub position_world: Point3f,
    /// Unique adjacent vertices, in the order adjacency was discovered
    pub neighbors: Vec<VertexId>,
    /// Live incident triangles
    pub faces: Vec<TriangleId>,
    /// True iff some incident edge is used by exactly one triangle
    pub is_border: bool,
    pub cost: f32,
    pub collapse_target: Option<VertexId>,
    pub collapsed: bool,
}

impl Vertex {
    fn new(id: VertexId, position: Point3f, position_world: Point3f) -> Self {
        Self {
            id,
            position,
            position_world,
            neighbors: Vec::new(),
            faces: Vec::new(),
            is_border: false,
            cost: 0.0,
            collapse_target: None,
            collapsed: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.collapsed
    }
}

/// A triangle of the working graph
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Current (post-collapse) vertex ids
    pub vertices: [VertexId; 3],
    /// Unit normal, zero for zero-area triangles
    pub normal: Vector3f,
    /// Stable arena index
    pub index: TriangleId,
    /// Submesh this triangle belongs to
    pub list: usize,
    pub removed: bool,
}

impl Triangle {
    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.vertices.contains(&v)
    }
}

/// Triangles of one submesh, in input order
#[derive(Debug, Clone, Default)]
pub struct TriangleList {
    pub triangles: Vec<TriangleId>,
}

/// Mapping between input vertices and graph vertices after welding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexWelding {
    /// Input vertex index -> graph vertex id
    pub vertex_map: Vec<VertexId>,
    /// Graph vertex id -> lowest input vertex index welded into it
    pub representatives: Vec<usize>,
}

/// Summary of a graph build, for logging and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub welded_vertices: usize,
    pub dropped_triangles: usize,
    pub border_vertices: usize,
}

/// The mutable adjacency graph
#[derive(Debug, Clone)]
pub struct MeshGraph {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
    lists: Vec<TriangleList>,
    live_vertices: usize,
    live_triangles: usize,
}

fn triangle_normal(p0: &Point3f, p1: &Point3f, p2: &Point3f) -> Vector3f {
    (p1 - p0)
        .cross(&(p2 - p0))
        .try_normalize(f32::MIN_POSITIVE)
        .unwrap_or_else(Vector3f::zeros)
}

/// Bit pattern of a position, with -0.0 folded onto 0.0
fn position_key(p: &Point3f) -> [u32; 3] {
    [p.x, p.y, p.z].map(|c| if c == 0.0 { 0u32 } else { c.to_bits() })
}

fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    (a.min(b), a.max(b))
}

impl MeshGraph {
    /// Build the graph from host buffers.
    ///
    /// The mesh is validated first; nothing is built for invalid input.
    /// With `weld` set, vertices with bit-identical positions become one
    /// graph vertex. Triangles that repeat a vertex (after welding) are
    /// dropped.
    pub fn build(
        mesh: &TriangleMesh,
        local_to_world: &Transform3D,
        weld: bool,
    ) -> Result<(Self, VertexWelding, BuildStats)> {
        mesh.validate()?;

        let mut stats = BuildStats::default();
        let mut vertex_map: Vec<VertexId> = Vec::new();
        vertex_map.try_reserve_exact(mesh.vertex_count())?;
        let mut representatives: Vec<usize> = Vec::new();
        let mut vertices: Vec<Vertex> = Vec::new();
        vertices.try_reserve(mesh.vertex_count())?;

        let mut by_position: HashMap<[u32; 3], VertexId> = HashMap::new();
        if weld {
            by_position.try_reserve(mesh.vertex_count())?;
        }

        for (index, position) in mesh.vertices.iter().enumerate() {
            if weld {
                if let Some(&id) = by_position.get(&position_key(position)) {
                    vertex_map.push(id);
                    stats.welded_vertices += 1;
                    continue;
                }
            }
            let id = vertices.len();
            if weld {
                by_position.insert(position_key(position), id);
            }
            vertices.push(Vertex::new(id, *position, local_to_world.transform_point(position)));
            representatives.push(index);
            vertex_map.push(id);
        }

        let mut triangles: Vec<Triangle> = Vec::new();
        triangles.try_reserve(mesh.face_count())?;
        let mut lists = Vec::with_capacity(mesh.submesh_count());

        for submesh in 0..mesh.submesh_count() {
            let mut list = TriangleList::default();
            for face in mesh.submesh_faces(submesh) {
                let ids = face.map(|i| vertex_map[i]);
                if !ids.iter().all_unique() {
                    stats.dropped_triangles += 1;
                    continue;
                }
                let index = triangles.len();
                triangles.push(Triangle {
                    vertices: ids,
                    normal: triangle_normal(
                        &vertices[ids[0]].position,
                        &vertices[ids[1]].position,
                        &vertices[ids[2]].position,
                    ),
                    index,
                    list: submesh,
                    removed: false,
                });
                list.triangles.push(index);
            }
            lists.push(list);
        }

        let mut edge_uses: HashMap<(VertexId, VertexId), u32> = HashMap::new();
        edge_uses.try_reserve(triangles.len() * 3 / 2)?;

        for triangle in &triangles {
            for &v in &triangle.vertices {
                vertices[v].faces.push(triangle.index);
            }
            for (&a, &b) in triangle.vertices.iter().tuple_combinations() {
                *edge_uses.entry(edge_key(a, b)).or_insert(0) += 1;
                if !vertices[a].neighbors.contains(&b) {
                    vertices[a].neighbors.push(b);
                }
                if !vertices[b].neighbors.contains(&a) {
                    vertices[b].neighbors.push(a);
                }
            }
        }

        for (&(a, b), &uses) in &edge_uses {
            if uses == 1 {
                vertices[a].is_border = true;
                vertices[b].is_border = true;
            }
        }
        stats.border_vertices = vertices.iter().filter(|v| v.is_border).count();

        let graph = Self {
            live_vertices: vertices.len(),
            live_triangles: triangles.len(),
            vertices,
            triangles,
            lists,
        };

        Ok((
            graph,
            VertexWelding {
                vertex_map,
                representatives,
            },
            stats,
        ))
    }

    /// Total number of graph vertices, live or collapsed
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Total number of triangles built, live or removed
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn live_vertex_count(&self) -> usize {
        self.live_vertices
    }

    pub fn live_triangle_count(&self) -> usize {
        self.live_triangles
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id]
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn lists(&self) -> &[TriangleList] {
        &self.lists
    }

    /// Live triangles of one submesh, in input order
    pub fn live_triangles_in(&self, list: usize) -> impl Iterator<Item = &Triangle> + '_ {
        self.lists
            .get(list)
            .map(|l| l.triangles.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&t| &self.triangles[t])
            .filter(|t| !t.removed)
    }

    /// Collapse `u` into `target`.
    ///
    /// Triangles containing both vertices are removed, the remaining
    /// triangles of `u` are re-pointed at `target`. A `None` target removes
    /// `u` together with any triangle still using it (only expected for
    /// isolated vertices). Adjacency, normals and border flags are updated
    /// for `target` and the former neighbors of `u`, which are returned.
    ///
    /// Collapsing a vertex that is already gone, or into a vertex that is
    /// not a live neighbor, does nothing and returns an empty list.
    pub fn collapse(&mut self, u: VertexId, target: Option<VertexId>) -> Vec<VertexId> {
        if u >= self.vertices.len() || self.vertices[u].collapsed {
            return Vec::new();
        }
        if let Some(v) = target {
            if v == u || self.vertices[v].collapsed || !self.vertices[u].neighbors.contains(&v) {
                return Vec::new();
            }
        }

        let former_neighbors = std::mem::take(&mut self.vertices[u].neighbors);
        let faces = std::mem::take(&mut self.vertices[u].faces);

        for t in faces {
            let keep = match target {
                Some(v) => !self.triangles[t].has_vertex(v),
                None => false,
            };

            if keep {
                if let Some(v) = target {
                    let triangle = &mut self.triangles[t];
                    for slot in triangle.vertices.iter_mut() {
                        if *slot == u {
                            *slot = v;
                        }
                    }
                    let [a, b, c] = triangle.vertices;
                    let normal = triangle_normal(
                        &self.vertices[a].position,
                        &self.vertices[b].position,
                        &self.vertices[c].position,
                    );
                    self.triangles[t].normal = normal;
                    self.vertices[v].faces.push(t);
                }
            } else {
                self.triangles[t].removed = true;
                self.live_triangles -= 1;
                let corners = self.triangles[t].vertices;
                for w in corners {
                    if w != u {
                        self.vertices[w].faces.retain(|&f| f != t);
                    }
                }
            }
        }

        let vertex = &mut self.vertices[u];
        vertex.collapsed = true;
        vertex.is_border = false;
        vertex.collapse_target = None;
        self.live_vertices -= 1;

        let mut affected = Vec::with_capacity(former_neighbors.len() + 1);
        if let Some(v) = target {
            affected.push(v);
        }
        affected.extend(former_neighbors.into_iter().filter(|&w| Some(w) != target));

        for &w in &affected {
            self.refresh_adjacency(w);
        }
        for &w in &affected {
            self.vertices[w].is_border = self.compute_border(w);
        }

        affected
    }

    /// Rebuild the neighbor list of `w` from its live triangles, keeping
    /// surviving neighbors in their current order and appending new ones.
    fn refresh_adjacency(&mut self, w: VertexId) {
        let mut adjacent: Vec<VertexId> = Vec::new();
        for &t in &self.vertices[w].faces {
            for &x in &self.triangles[t].vertices {
                if x != w && !adjacent.contains(&x) {
                    adjacent.push(x);
                }
            }
        }

        let neighbors = &mut self.vertices[w].neighbors;
        neighbors.retain(|n| adjacent.contains(n));
        for x in adjacent {
            if !neighbors.contains(&x) {
                neighbors.push(x);
            }
        }
    }

    fn compute_border(&self, w: VertexId) -> bool {
        let vertex = &self.vertices[w];
        vertex.neighbors.iter().any(|&n| {
            vertex
                .faces
                .iter()
                .filter(|&&t| self.triangles[t].has_vertex(n))
                .count()
                == 1
        })
    }

    /// Check that adjacency, incident triangles and border flags agree with
    /// the live triangle set.
    pub fn check_consistency(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Algorithm(msg));

        let live_vertices = self.vertices.iter().filter(|v| v.is_live()).count();
        if live_vertices != self.live_vertices {
            return fail(format!(
                "live vertex count {} does not match {}",
                self.live_vertices, live_vertices
            ));
        }
        let live_triangles = self.triangles.iter().filter(|t| !t.removed).count();
        if live_triangles != self.live_triangles {
            return fail(format!(
                "live triangle count {} does not match {}",
                self.live_triangles, live_triangles
            ));
        }

        for triangle in self.triangles.iter().filter(|t| !t.removed) {
            if !triangle.vertices.iter().all_unique() {
                return fail(format!("triangle {} is degenerate", triangle.index));
            }
            for &v in &triangle.vertices {
                if self.vertices[v].collapsed {
                    return fail(format!(
                        "triangle {} references collapsed vertex {}",
                        triangle.index, v
                    ));
                }
                if !self.vertices[v].faces.contains(&triangle.index) {
                    return fail(format!(
                        "vertex {} is missing incident triangle {}",
                        v, triangle.index
                    ));
                }
            }
        }

        for vertex in self.vertices.iter().filter(|v| v.is_live()) {
            let mut expected: Vec<VertexId> = vertex
                .faces
                .iter()
                .flat_map(|&t| self.triangles[t].vertices)
                .filter(|&x| x != vertex.id)
                .unique()
                .collect();
            let mut actual = vertex.neighbors.clone();
            expected.sort_unstable();
            actual.sort_unstable();
            if expected != actual {
                return fail(format!(
                    "vertex {} neighbors {:?} do not match triangles {:?}",
                    vertex.id, actual, expected
                ));
            }
            if vertex.faces.iter().any(|&t| self.triangles[t].removed) {
                return fail(format!("vertex {} references a removed triangle", vertex.id));
            }
            if vertex.is_border != self.compute_border(vertex.id) {
                return fail(format!("vertex {} has a stale border flag", vertex.id));
            }
        }

        Ok(())
    }
}
