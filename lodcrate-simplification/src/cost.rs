//! Per-vertex collapse cost
//!
//! The cost of collapsing `u` along the edge `(u, v)` is
//!
//! ```text
//! edge_length(u, v) * (curvature(u, v) + relevance_bias(u))
//! ```
//!
//! where the edge length is normalized by the mesh scale and the curvature
//! term measures how far the triangles around `u` bend away from the
//! triangles shared by `u` and `v`. A vertex collapses towards the neighbor
//! with the lowest pair cost.
//!
//! Evaluation only reads the graph, so the batch variant runs in parallel.

use crate::geometry::{MeshGraph, VertexId};
use crate::parallel::parallel_map;
use lodcrate_core::{RelevanceField, RelevanceSphere, Vector3f};

/// Cost of a vertex without neighbors; lower than any pair cost
pub const ISOLATED_VERTEX_COST: f32 = f32::NEG_INFINITY;

/// Curvature used for perfectly flat neighborhoods, and when curvature is disabled
pub const CURVATURE_FLOOR: f32 = 0.001;

/// Normalized edge lengths below this are treated as zero-length edges.
/// This is the smallest subnormal `f32`, so subnormal lengths still count.
pub const ZERO_EDGE_LENGTH: f32 = 1e-45;

/// Flattened cost settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostParams {
    pub use_edge_length: bool,
    pub use_curvature: bool,
    pub border_curvature: f32,
    /// Normalization constant for edge lengths
    pub mesh_scale: f32,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            use_edge_length: true,
            use_curvature: true,
            border_curvature: 0.0,
            mesh_scale: 1.0,
        }
    }
}

/// Result of evaluating one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexCost {
    pub cost: f32,
    /// Neighbor to collapse into; `None` for isolated vertices
    pub target: Option<VertexId>,
}

impl VertexCost {
    pub const ISOLATED: VertexCost = VertexCost {
        cost: ISOLATED_VERTEX_COST,
        target: None,
    };
}

/// Evaluates collapse costs against a read-only graph
#[derive(Debug, Clone)]
pub struct CostEvaluator {
    params: CostParams,
    relevance: RelevanceField,
}

impl CostEvaluator {
    pub fn new(params: CostParams, spheres: &[RelevanceSphere]) -> Self {
        Self {
            params,
            relevance: RelevanceField::new(spheres),
        }
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }

    /// Relevance bias of a vertex, from its world-space position
    pub fn bias(&self, graph: &MeshGraph, u: VertexId) -> f32 {
        if self.relevance.is_empty() {
            return 0.0;
        }
        self.relevance.bias(&graph.vertex(u).position_world)
    }

    /// Cheapest collapse of `u`. Ties keep the first neighbor in adjacency order.
    pub fn evaluate(&self, graph: &MeshGraph, u: VertexId) -> VertexCost {
        let vertex = graph.vertex(u);
        if vertex.neighbors.is_empty() {
            return VertexCost::ISOLATED;
        }

        let bias = self.bias(graph, u);
        let mut best: Option<VertexCost> = None;
        for &v in &vertex.neighbors {
            let cost = self.pair_cost(graph, u, v, bias);
            if best.map_or(true, |b| cost < b.cost) {
                best = Some(VertexCost {
                    cost,
                    target: Some(v),
                });
            }
        }
        best.unwrap_or(VertexCost::ISOLATED)
    }

    /// Cost of collapsing `u` into its neighbor `v`
    pub fn pair_cost(&self, graph: &MeshGraph, u: VertexId, v: VertexId, bias: f32) -> f32 {
        let params = &self.params;
        let vu = graph.vertex(u);
        let vv = graph.vertex(v);

        let edge_length = if params.use_edge_length {
            (vv.position - vu.position).norm() / params.mesh_scale
        } else {
            1.0
        };
        if edge_length < ZERO_EDGE_LENGTH {
            return params.border_curvature;
        }

        let sides: Vec<Vector3f> = vu
            .faces
            .iter()
            .map(|&t| graph.triangle(t))
            .filter(|t| t.has_vertex(v))
            .map(|t| t.normal)
            .collect();

        let mut curvature = CURVATURE_FLOOR;
        if params.use_curvature {
            for &t in &vu.faces {
                let normal = graph.triangle(t).normal;
                let min_curvature = sides
                    .iter()
                    .fold(1.0f32, |m, side| m.min((1.0 - normal.dot(side)) / 2.0));
                curvature = curvature.max(min_curvature);
            }
        }

        if vu.is_border && sides.len() > 1 {
            curvature = 1.0;
        }

        if params.border_curvature > 1.0 && vu.is_border {
            curvature = params.border_curvature;
        }

        curvature += bias;

        edge_length * curvature
    }

    /// Evaluate many vertices; runs on the thread pool for large inputs
    pub fn evaluate_batch(&self, graph: &MeshGraph, ids: &[VertexId]) -> Vec<VertexCost> {
        parallel_map(ids, |&u| self.evaluate(graph, u))
    }
}
