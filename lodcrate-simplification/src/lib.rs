//! Relevance-weighted mesh simplification
//!
//! This crate reduces triangle meshes by greedy vertex collapse:
//! - Adjacency graph with incremental collapse updates
//! - Curvature and edge length collapse cost, biased by relevance spheres
//! - Parallel batch cost evaluation, sequential collapse loop
//! - Collapse log replay to assemble any reached level of detail

pub mod geometry;
pub mod cost;
pub mod engine;
pub mod assembly;
pub mod progress;
pub mod parallel;

#[cfg(test)]
mod test_meshes;

pub use geometry::*;
pub use cost::*;
pub use engine::*;
pub use assembly::*;
pub use progress::*;
pub use parallel::*;

use lodcrate_core::{Error, Result, TriangleMesh};

/// Simplify a mesh down to a number of vertices
pub trait MeshSimplifier {
    /// Simplify mesh keeping `vertex_amount` of its vertices
    /// (1.0 = unchanged, 0.0 = maximum reduction)
    fn simplify(&self, mesh: &TriangleMesh, vertex_amount: f32) -> Result<TriangleMesh>;
}

/// One-shot simplifier running a full session with fixed settings
#[derive(Debug, Clone, Default)]
pub struct RelevanceSimplifier {
    pub config: SimplifyConfig,
}

impl RelevanceSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimplifyConfig) -> Self {
        Self { config }
    }
}

impl MeshSimplifier for RelevanceSimplifier {
    fn simplify(&self, mesh: &TriangleMesh, vertex_amount: f32) -> Result<TriangleMesh> {
        let config = self.config.clone().with_vertex_amount(vertex_amount);
        let mut simplifier = Simplifier::new(mesh, config)?;
        let target = simplifier.target_vertex_count();

        match simplifier.run(&CancellationToken::new(), &mut NoProgress) {
            Outcome::Completed => simplifier.assemble(target),
            Outcome::Cancelled => Err(Error::Algorithm(
                "Simplification was cancelled".to_string(),
            )),
        }
    }
}
