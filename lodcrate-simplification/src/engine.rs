//! Greedy collapse session
//!
//! A [`Simplifier`] owns the working graph for one mesh. It evaluates the
//! collapse cost of every vertex once (in parallel), then repeatedly
//! collapses the cheapest vertex into its preferred neighbor and
//! re-evaluates only the neighborhood the collapse touched. Every collapse
//! is logged as a [`CollapseRecord`], which is all that is needed to
//! assemble the mesh at any reached vertex count.

use crate::assembly::{assemble_mesh, SimplificationData};
use crate::cost::{CostEvaluator, CostParams, VertexCost};
use crate::geometry::{BuildStats, MeshGraph, VertexId};
use crate::parallel::compute_chunk_size;
use crate::progress::{CancellationToken, ProgressReporter, ProgressSink};
use itertools::Itertools;
use lodcrate_core::{Drawable, Error, RelevanceSphere, Result, Transform3D, TriangleMesh};
use priority_queue::PriorityQueue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Phase label of the batch cost pass
pub const PHASE_COMPUTING_COSTS: &str = "Computing collapse costs";
/// Phase label of the collapse loop
pub const PHASE_SIMPLIFYING: &str = "Simplifying mesh";
/// Item label used when the session was not given one
pub const DEFAULT_LABEL: &str = "mesh";

// ============================================================
// Configuration
// ============================================================

/// Settings of a simplification session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Scale costs by the normalized edge length
    pub use_edge_length: bool,
    /// Penalize collapses that fold the surface
    pub use_curvature: bool,
    /// Values above 1 protect border vertices with this curvature
    pub border_curvature: f32,
    /// Fraction of the original vertices to keep, in [0, 1]
    pub vertex_amount: f32,
    /// Edge length normalization; `None` uses the largest bounding box side
    pub mesh_scale: Option<f32>,
    /// Evaluated in order, the last sphere containing a vertex wins
    pub relevance_spheres: Vec<RelevanceSphere>,
    /// Merge vertices with bit-identical positions
    pub weld_vertices: bool,
    /// Collapses between progress updates
    pub progress_interval: usize,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            use_edge_length: true,
            use_curvature: true,
            border_curvature: 0.0,
            vertex_amount: 1.0,
            mesh_scale: None,
            relevance_spheres: Vec::new(),
            weld_vertices: true,
            progress_interval: 64,
        }
    }
}

impl SimplifyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_length(mut self, enabled: bool) -> Self {
        self.use_edge_length = enabled;
        self
    }

    pub fn with_curvature(mut self, enabled: bool) -> Self {
        self.use_curvature = enabled;
        self
    }

    pub fn with_border_curvature(mut self, border_curvature: f32) -> Self {
        self.border_curvature = border_curvature;
        self
    }

    pub fn with_vertex_amount(mut self, vertex_amount: f32) -> Self {
        self.vertex_amount = vertex_amount;
        self
    }

    pub fn with_mesh_scale(mut self, mesh_scale: f32) -> Self {
        self.mesh_scale = Some(mesh_scale);
        self
    }

    pub fn with_relevance_spheres(mut self, spheres: Vec<RelevanceSphere>) -> Self {
        self.relevance_spheres = spheres;
        self
    }

    /// Append a sphere; it takes precedence over the ones already added
    pub fn with_relevance_sphere(mut self, sphere: RelevanceSphere) -> Self {
        self.relevance_spheres.push(sphere);
        self
    }

    pub fn with_weld_vertices(mut self, weld: bool) -> Self {
        self.weld_vertices = weld;
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.vertex_amount) {
            return Err(Error::InvalidData(format!(
                "Vertex amount must be between 0.0 and 1.0, got {}",
                self.vertex_amount
            )));
        }
        if let Some(scale) = self.mesh_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(Error::InvalidData(format!(
                    "Mesh scale must be positive, got {}",
                    scale
                )));
            }
        }
        if !self.border_curvature.is_finite() {
            return Err(Error::InvalidData("Border curvature must be finite".to_string()));
        }
        if self.progress_interval == 0 {
            return Err(Error::InvalidData(
                "Progress interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// Session types
// ============================================================

/// One logged collapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollapseRecord {
    /// Vertex removed by the collapse
    pub vertex: VertexId,
    /// Vertex it merged into; `None` for an isolated vertex
    pub target: Option<VertexId>,
    pub resulting_vertex_count: usize,
    pub resulting_triangle_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Costs have not been evaluated
    Idle,
    Evaluating,
    Reducing,
    /// The last requested target was reached
    Done,
}

/// How a long-running call ended. Cancellation is not an error: the graph
/// and the collapse log stay valid at whatever count was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
}

/// Queue priority: lower cost first, then lower vertex id
#[derive(Debug, Clone, Copy)]
struct QueueKey {
    cost: f32,
    vertex: VertexId,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: the smallest cost has the highest priority
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

fn resolve_mesh_scale(mesh: &TriangleMesh, configured: Option<f32>) -> f32 {
    match configured {
        Some(scale) => scale,
        None => {
            let extent = mesh.max_extent();
            if extent.is_finite() && extent > 0.0 {
                extent
            } else {
                1.0
            }
        }
    }
}

// ============================================================
// Simplifier
// ============================================================

/// A simplification session over one mesh
pub struct Simplifier {
    source: TriangleMesh,
    graph: MeshGraph,
    data: SimplificationData,
    config: SimplifyConfig,
    mesh_scale: f32,
    evaluator: CostEvaluator,
    queue: PriorityQueue<VertexId, QueueKey>,
    costs_valid: bool,
    state: SessionState,
    label: String,
    stats: BuildStats,
}

impl Simplifier {
    /// Build a session; relevance spheres are tested in mesh space
    pub fn new(mesh: &TriangleMesh, config: SimplifyConfig) -> Result<Self> {
        Self::with_transform(mesh, Transform3D::identity(), config)
    }

    /// Build a session whose relevance spheres are tested against
    /// `local_to_world` applied to the mesh positions
    pub fn with_transform(
        mesh: &TriangleMesh,
        local_to_world: Transform3D,
        config: SimplifyConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (graph, welding, stats) =
            MeshGraph::build(mesh, &local_to_world, config.weld_vertices)?;

        log::debug!(
            "Built simplification graph: {} vertices ({} welded duplicates), \
             {} triangles ({} degenerate dropped), {} border vertices",
            graph.vertex_count(),
            stats.welded_vertices,
            graph.triangle_count(),
            stats.dropped_triangles,
            stats.border_vertices
        );

        let mesh_scale = resolve_mesh_scale(mesh, config.mesh_scale);
        let evaluator = CostEvaluator::new(
            Self::cost_params(&config, mesh_scale),
            &config.relevance_spheres,
        );
        let data = SimplificationData {
            welding,
            original_vertex_count: graph.vertex_count(),
            original_triangle_count: graph.triangle_count(),
            records: Vec::new(),
        };

        Ok(Self {
            source: mesh.clone(),
            graph,
            data,
            config,
            mesh_scale,
            evaluator,
            queue: PriorityQueue::new(),
            costs_valid: false,
            state: SessionState::Idle,
            label: DEFAULT_LABEL.to_string(),
            stats,
        })
    }

    /// Item label passed to progress sinks
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn cost_params(config: &SimplifyConfig, mesh_scale: f32) -> CostParams {
        CostParams {
            use_edge_length: config.use_edge_length,
            use_curvature: config.use_curvature,
            border_curvature: config.border_curvature,
            mesh_scale,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SimplifyConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mesh_scale(&self) -> f32 {
        self.mesh_scale
    }

    pub fn build_stats(&self) -> BuildStats {
        self.stats
    }

    pub fn graph(&self) -> &MeshGraph {
        &self.graph
    }

    pub fn source_mesh(&self) -> &TriangleMesh {
        &self.source
    }

    pub fn original_vertex_count(&self) -> usize {
        self.data.original_vertex_count
    }

    pub fn original_triangle_count(&self) -> usize {
        self.data.original_triangle_count
    }

    pub fn live_vertex_count(&self) -> usize {
        self.graph.live_vertex_count()
    }

    pub fn live_triangle_count(&self) -> usize {
        self.graph.live_triangle_count()
    }

    /// Vertex count `run` reduces to
    pub fn target_vertex_count(&self) -> usize {
        let original = self.original_vertex_count();
        ((original as f32 * self.config.vertex_amount).round() as usize).clamp(1, original.max(1))
    }

    pub fn set_vertex_amount(&mut self, vertex_amount: f32) -> Result<()> {
        let config = self.config.clone().with_vertex_amount(vertex_amount);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Replace the relevance spheres. Costs are re-evaluated before the
    /// next collapse; collapses already logged are kept.
    pub fn set_relevance_spheres(&mut self, spheres: Vec<RelevanceSphere>) {
        self.evaluator = CostEvaluator::new(
            Self::cost_params(&self.config, self.mesh_scale),
            &spheres,
        );
        self.config.relevance_spheres = spheres;
        self.costs_valid = false;
        self.state = SessionState::Idle;
    }

    pub fn records(&self) -> &[CollapseRecord] {
        &self.data.records
    }

    pub fn simplification_data(&self) -> &SimplificationData {
        &self.data
    }

    pub fn into_simplification_data(self) -> SimplificationData {
        self.data
    }

    /// Evaluate every live vertex and rebuild the collapse queue
    pub fn compute_costs(
        &mut self,
        token: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Outcome {
        self.state = SessionState::Evaluating;
        self.costs_valid = false;
        self.queue.clear();

        let live: Vec<VertexId> = self
            .graph
            .vertices()
            .iter()
            .filter(|v| v.is_live())
            .map(|v| v.id)
            .collect();
        let chunk_size = compute_chunk_size(live.len()).max(self.config.progress_interval);
        log::debug!(
            "Evaluating collapse costs of {} vertices in chunks of {}",
            live.len(),
            chunk_size
        );

        let mut reporter = ProgressReporter::new(progress);
        reporter.report(PHASE_COMPUTING_COSTS, &self.label, 0.0);
        let mut evaluated = 0usize;
        for ids in live.chunks(chunk_size) {
            if token.is_cancelled() {
                log::info!(
                    "Cost evaluation of '{}' cancelled after {} of {} vertices",
                    self.label,
                    evaluated,
                    live.len()
                );
                self.state = SessionState::Idle;
                return Outcome::Cancelled;
            }

            let costs = self.evaluator.evaluate_batch(&self.graph, ids);
            for (&u, cost) in ids.iter().zip(costs) {
                self.apply_cost(u, cost);
            }
            evaluated += ids.len();
            reporter.report(
                PHASE_COMPUTING_COSTS,
                &self.label,
                evaluated as f32 / live.len() as f32,
            );
        }

        self.costs_valid = true;
        // Evaluated and ready to collapse
        self.state = SessionState::Reducing;
        Outcome::Completed
    }

    fn apply_cost(&mut self, u: VertexId, cost: VertexCost) {
        let vertex = self.graph.vertex_mut(u);
        vertex.cost = cost.cost;
        vertex.collapse_target = cost.target;
        self.queue.push(
            u,
            QueueKey {
                cost: cost.cost,
                vertex: u,
            },
        );
    }

    /// Collapse vertices until `target_vertices` remain (at least one).
    ///
    /// Costs are evaluated first when they are missing or stale. Can be
    /// called again with a lower target, or after a cancellation, to
    /// continue the same session.
    pub fn reduce_to(
        &mut self,
        target_vertices: usize,
        token: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Outcome {
        let target = target_vertices.max(1);
        if !self.costs_valid && self.compute_costs(token, progress) == Outcome::Cancelled {
            return Outcome::Cancelled;
        }

        let start = self.graph.live_vertex_count();
        if start <= target {
            self.state = SessionState::Done;
            return Outcome::Completed;
        }

        self.state = SessionState::Reducing;
        log::info!(
            "Simplifying '{}' from {} to {} vertices",
            self.label,
            start,
            target
        );

        let total = (start - target) as f32;
        let interval = self.config.progress_interval;
        let mut reporter = ProgressReporter::new(progress);
        reporter.report(PHASE_SIMPLIFYING, &self.label, 0.0);
        let mut collapsed = 0usize;

        while self.graph.live_vertex_count() > target {
            if token.is_cancelled() {
                log::info!(
                    "Simplification of '{}' cancelled at {} vertices",
                    self.label,
                    self.graph.live_vertex_count()
                );
                return Outcome::Cancelled;
            }

            let (u, _) = match self.queue.pop() {
                Some(item) => item,
                None => {
                    log::warn!(
                        "Collapse queue of '{}' ran empty at {} vertices",
                        self.label,
                        self.graph.live_vertex_count()
                    );
                    break;
                }
            };

            if self.collapse_vertex(u) {
                collapsed += 1;
                if collapsed % interval == 0 {
                    reporter.report(PHASE_SIMPLIFYING, &self.label, collapsed as f32 / total);
                }
            }
        }

        reporter.report(PHASE_SIMPLIFYING, &self.label, 1.0);
        self.state = SessionState::Done;
        log::info!(
            "Simplified '{}' to {} vertices, {} triangles",
            self.label,
            self.graph.live_vertex_count(),
            self.graph.live_triangle_count()
        );
        Outcome::Completed
    }

    /// Collapse `u` into its recorded target and refresh the touched costs.
    /// Returns false if nothing was collapsed.
    fn collapse_vertex(&mut self, u: VertexId) -> bool {
        if !self.graph.vertex(u).is_live() {
            return false;
        }

        let target = self.graph.vertex(u).collapse_target;
        let affected = self.graph.collapse(u, target);
        if self.graph.vertex(u).is_live() {
            // Stale target, pick a fresh one and requeue
            log::debug!("Re-evaluating vertex {} with stale target {:?}", u, target);
            let cost = self.evaluator.evaluate(&self.graph, u);
            self.apply_cost(u, cost);
            return false;
        }

        let record = CollapseRecord {
            vertex: u,
            target,
            resulting_vertex_count: self.graph.live_vertex_count(),
            resulting_triangle_count: self.graph.live_triangle_count(),
        };
        log::trace!(
            "Collapsed {} into {:?}: {} vertices, {} triangles",
            u,
            target,
            record.resulting_vertex_count,
            record.resulting_triangle_count
        );
        self.data.records.push(record);

        let mut dirty = affected;
        if let Some(v) = target {
            dirty.extend_from_slice(&self.graph.vertex(v).neighbors);
        }
        for w in dirty.into_iter().unique() {
            if self.graph.vertex(w).is_live() {
                let cost = self.evaluator.evaluate(&self.graph, w);
                self.apply_cost(w, cost);
            }
        }
        true
    }

    /// Reduce to the configured vertex amount
    pub fn run(&mut self, token: &CancellationToken, progress: &mut dyn ProgressSink) -> Outcome {
        let target = self.target_vertex_count();
        self.reduce_to(target, token, progress)
    }

    /// Reduce all the way to one vertex so every level can be assembled
    pub fn compute_full_data(
        &mut self,
        token: &CancellationToken,
        progress: &mut dyn ProgressSink,
    ) -> Outcome {
        self.reduce_to(1, token, progress)
    }

    /// Lowest vertex count that can currently be assembled
    pub fn reached_vertex_count(&self) -> usize {
        self.data.reached_vertex_count()
    }

    pub fn triangle_count_at(&self, vertex_count: usize) -> Result<usize> {
        self.data.triangle_count_at(vertex_count)
    }

    /// Mesh with `vertex_count` vertices; the working graph is not touched
    pub fn assemble(&self, vertex_count: usize) -> Result<TriangleMesh> {
        assemble_mesh(&self.source, &self.data, vertex_count)
    }

    /// Mesh keeping `fraction` of the original vertices
    pub fn assemble_fraction(&self, fraction: f32) -> Result<TriangleMesh> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::InvalidData(format!(
                "Vertex fraction must be between 0.0 and 1.0, got {}",
                fraction
            )));
        }
        let original = self.original_vertex_count();
        let n = ((original as f32 * fraction).round() as usize).clamp(1, original);
        self.assemble(n)
    }
}
