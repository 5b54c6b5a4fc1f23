//! Integration tests for lodcrate-simplification
//!
//! These tests run whole sessions on procedural meshes and check the
//! properties hosts rely on: exact vertex counts at every level, replay
//! identity, collapse ordering under relevance spheres and border
//! protection, and valid partial results after cancellation.

use lodcrate_core::{Point3f, RelevanceSphere, Transform3D, TriangleMesh, Vector3f};
use lodcrate_simplification::*;
use std::collections::HashSet;

#[allow(dead_code)]
#[path = "../src/test_meshes.rs"]
mod test_meshes;

use test_meshes::{make_plane_grid, make_subdivided_cube};

fn full_session(mesh: &TriangleMesh, config: SimplifyConfig) -> Simplifier {
    let mut simplifier = Simplifier::new(mesh, config).unwrap();
    let outcome = simplifier.compute_full_data(&CancellationToken::new(), &mut NoProgress);
    assert_eq!(outcome, Outcome::Completed);
    simplifier
}

fn assert_valid_level(mesh: &TriangleMesh, vertex_count: usize) {
    assert_eq!(mesh.vertex_count(), vertex_count);
    for face in mesh.faces() {
        assert!(face.iter().all(|&i| i < vertex_count), "dangling index in {:?}", face);
        assert!(
            face[0] != face[1] && face[1] != face[2] && face[0] != face[2],
            "degenerate triangle {:?}",
            face
        );
    }
}

#[test]
fn test_each_collapse_removes_one_vertex() {
    let mesh = make_subdivided_cube(4);
    let mut simplifier = Simplifier::new(&mesh, SimplifyConfig::default()).unwrap();
    let token = CancellationToken::new();

    let mut previous_triangles = simplifier.original_triangle_count();
    for target in (1..98).rev().step_by(7) {
        simplifier.reduce_to(target, &token, &mut NoProgress);
        simplifier.graph().check_consistency().unwrap();
        assert_eq!(simplifier.live_vertex_count(), target);
        assert!(simplifier.live_triangle_count() <= previous_triangles);
        previous_triangles = simplifier.live_triangle_count();
    }

    let records = simplifier.records();
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.resulting_vertex_count, 98 - i - 1);
    }
    let mut triangles = vec![simplifier.original_triangle_count()];
    triangles.extend(records.iter().map(|r| r.resulting_triangle_count));
    assert!(triangles.windows(2).all(|w| w[1] <= w[0]));
}

#[test]
fn test_every_level_has_exact_vertex_count() {
    for mesh in [make_subdivided_cube(3), make_plane_grid(6)] {
        let simplifier = full_session(&mesh, SimplifyConfig::default());
        let original = simplifier.original_vertex_count();
        assert_eq!(simplifier.reached_vertex_count(), 1);

        for k in 1..=original {
            let level = simplifier.assemble(k).unwrap();
            assert_valid_level(&level, k);
            assert_eq!(level.face_count(), simplifier.triangle_count_at(k).unwrap());
        }
    }
}

#[test]
fn test_full_level_reproduces_input() {
    let mut mesh = make_plane_grid(5);
    let uvs = mesh.vertices.iter().map(|p| [p.x / 4.0, p.y / 4.0]).collect();
    mesh.set_uvs(uvs);
    mesh.set_colors(vec![[10, 20, 30]; mesh.vertex_count()]);
    let normals = mesh.calculate_face_normals();
    mesh.set_normals(vec![normals[0]; mesh.vertex_count()]);

    let simplifier = full_session(&mesh, SimplifyConfig::default());
    assert_eq!(simplifier.assemble(25).unwrap(), mesh);
}

#[test]
fn test_full_level_of_welded_mesh_keeps_triangles() {
    let mesh = make_subdivided_cube(2);
    let simplifier = full_session(&mesh, SimplifyConfig::default());
    assert_eq!(simplifier.original_vertex_count(), 26);

    let level = simplifier.assemble(26).unwrap();
    assert_eq!(level.face_count(), mesh.face_count());
    for (original, welded) in mesh.faces().zip(level.faces()) {
        for corner in 0..3 {
            assert_eq!(mesh.vertices[original[corner]], level.vertices[welded[corner]]);
        }
    }
}

#[test]
fn test_isolated_vertex_goes_first_even_with_negative_bias() {
    let mut mesh = make_plane_grid(4);
    let isolated = mesh.add_vertex(Point3f::new(1.5, 1.5, 5.0));
    let everywhere = RelevanceSphere::with_radius(Point3f::new(1.5, 1.5, 0.0), 20.0, -1.0);
    let config = SimplifyConfig::new().with_relevance_sphere(everywhere);

    let mut simplifier = Simplifier::new(&mesh, config).unwrap();
    simplifier.reduce_to(16, &CancellationToken::new(), &mut NoProgress);

    assert_eq!(simplifier.records().len(), 1);
    assert_eq!(simplifier.records()[0].vertex, isolated);
    assert_eq!(simplifier.records()[0].target, None);
    assert_eq!(simplifier.assemble(16).unwrap(), make_plane_grid(4));
}

#[test]
fn test_cost_floor_and_bias_compose() {
    let mesh = make_subdivided_cube(2);
    let sphere = RelevanceSphere::with_radius(Point3f::new(0.0, 0.0, 1.0), 0.8, -0.25);
    let (graph, _, _) = MeshGraph::build(&mesh, &Transform3D::identity(), true).unwrap();
    let params = CostParams {
        use_edge_length: false,
        use_curvature: false,
        border_curvature: 0.0,
        mesh_scale: 2.0,
    };
    let evaluator = CostEvaluator::new(params, &[sphere]);

    let mut biased = 0;
    for vertex in graph.vertices() {
        let bias = evaluator.bias(&graph, vertex.id);
        if bias != 0.0 {
            biased += 1;
        }
        for &v in &vertex.neighbors {
            assert_eq!(evaluator.pair_cost(&graph, vertex.id, v, bias), CURVATURE_FLOOR + bias);
        }
    }
    assert!(biased > 0);
}

fn sphere_cluster(
    simplifier: &Simplifier,
    sphere: &RelevanceSphere,
    to_world: &Transform3D,
) -> HashSet<VertexId> {
    simplifier
        .graph()
        .vertices()
        .iter()
        .filter(|v| sphere.contains(&to_world.transform_point(&v.position)))
        .map(|v| v.id)
        .collect()
}

#[test]
fn test_negative_relevance_collapses_enclosed_vertices_first() {
    let mesh = make_subdivided_cube(4);
    let sphere = RelevanceSphere::with_radius(Point3f::new(0.0, 0.0, 1.0), 0.75, -1.0);
    let config = SimplifyConfig::new().with_relevance_sphere(sphere);

    let mut simplifier = Simplifier::new(&mesh, config).unwrap();
    let inside = sphere_cluster(&simplifier, &sphere, &Transform3D::identity());
    assert_eq!(inside.len(), 9);

    simplifier.reduce_to(98 - inside.len(), &CancellationToken::new(), &mut NoProgress);
    let collapsed: HashSet<VertexId> = simplifier.records().iter().map(|r| r.vertex).collect();
    assert_eq!(collapsed, inside);

    // Without the sphere the same budget is spent elsewhere
    let plain = full_session(&mesh, SimplifyConfig::default());
    let plain_first: HashSet<VertexId> = plain.records()[..inside.len()]
        .iter()
        .map(|r| r.vertex)
        .collect();
    assert_ne!(plain_first, inside);
}

#[test]
fn test_relevance_uses_world_positions() {
    let mesh = make_subdivided_cube(4);
    let to_world = Transform3D::translation(Vector3f::new(10.0, 0.0, 0.0));
    let sphere = RelevanceSphere::with_radius(Point3f::new(10.0, 0.0, 1.0), 0.75, -1.0);
    let config = SimplifyConfig::new().with_relevance_sphere(sphere);

    let mut simplifier = Simplifier::with_transform(&mesh, to_world, config).unwrap();
    let inside = sphere_cluster(&simplifier, &sphere, &to_world);
    assert_eq!(inside.len(), 9);

    simplifier.reduce_to(98 - inside.len(), &CancellationToken::new(), &mut NoProgress);
    let collapsed: HashSet<VertexId> = simplifier.records().iter().map(|r| r.vertex).collect();
    assert_eq!(collapsed, inside);
}

#[test]
fn test_border_curvature_protects_border_loop() {
    for use_edge_length in [true, false] {
        let mesh = make_plane_grid(6);
        let config = SimplifyConfig::new()
            .with_border_curvature(1000.0)
            .with_edge_length(use_edge_length);
        let mut simplifier = Simplifier::new(&mesh, config).unwrap();
        let border: HashSet<VertexId> = simplifier
            .graph()
            .vertices()
            .iter()
            .filter(|v| v.is_border)
            .map(|v| v.id)
            .collect();
        assert_eq!(border.len(), 20);

        simplifier.reduce_to(border.len(), &CancellationToken::new(), &mut NoProgress);
        assert_eq!(simplifier.records().len(), 16);
        assert!(simplifier.records().iter().all(|r| !border.contains(&r.vertex)));
        simplifier.graph().check_consistency().unwrap();
    }
}

#[test]
fn test_cancellation_leaves_assemblable_state() {
    let mesh = make_subdivided_cube(4);
    for stop_after in [1usize, 5, 30, 80] {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let mut collapses_seen = 0usize;
        let mut sink = |phase: &str, _: &str, _: f32| {
            if phase == PHASE_SIMPLIFYING {
                collapses_seen += 1;
                if collapses_seen > stop_after {
                    trigger.cancel();
                }
            }
        };

        let config = SimplifyConfig::new().with_progress_interval(1);
        let mut simplifier = Simplifier::new(&mesh, config).unwrap();
        let outcome = simplifier.compute_full_data(&token, &mut sink);
        assert_eq!(outcome, Outcome::Cancelled);

        let reached = simplifier.live_vertex_count();
        assert!(reached < 98);
        assert_eq!(simplifier.reached_vertex_count(), reached);
        simplifier.graph().check_consistency().unwrap();

        let level = simplifier.assemble(reached).unwrap();
        assert_valid_level(&level, reached);
        assert_eq!(level.face_count(), simplifier.live_triangle_count());
        assert!(matches!(
            simplifier.assemble(reached - 1),
            Err(lodcrate_core::Error::LevelUnavailable { .. })
        ));
    }
}

#[test]
fn test_sessions_are_deterministic() {
    let mesh = make_subdivided_cube(5);
    let a = full_session(&mesh, SimplifyConfig::default());
    let b = full_session(&mesh, SimplifyConfig::default());
    assert_eq!(a.records(), b.records());
}

#[test]
fn test_submesh_groups_survive_every_level() {
    let grid = make_plane_grid(5);
    let indices: Vec<usize> = grid.faces().flatten().collect();
    let (left, right) = indices.split_at(indices.len() / 2);
    let mesh =
        TriangleMesh::from_submeshes(grid.vertices.clone(), vec![left.to_vec(), right.to_vec()]);

    let simplifier = full_session(&mesh, SimplifyConfig::default());
    for k in 1..=25 {
        let level = simplifier.assemble(k).unwrap();
        assert_eq!(level.submesh_count(), 2);
        assert_valid_level(&level, k);
    }
}

#[test]
fn test_attributes_follow_vertices() {
    let mut mesh = make_plane_grid(6);
    let uvs = mesh.vertices.iter().map(|p| [p.x, p.y]).collect();
    mesh.set_uvs(uvs);

    let simplifier = full_session(&mesh, SimplifyConfig::default());
    for k in [36, 20, 7, 1] {
        let level = simplifier.assemble(k).unwrap();
        let uvs = level.uvs.as_ref().unwrap();
        for (position, uv) in level.vertices.iter().zip(uvs) {
            assert_eq!([position.x, position.y], *uv);
        }
    }
}

#[test]
fn test_persisted_data_reassembles_identically() {
    let mesh = make_subdivided_cube(3);
    let simplifier = full_session(&mesh, SimplifyConfig::default());

    let json = serde_json::to_string(simplifier.simplification_data()).unwrap();
    let restored: SimplificationData = serde_json::from_str(&json).unwrap();
    assert_eq!(&restored, simplifier.simplification_data());

    for k in [56, 30, 4] {
        assert_eq!(
            assemble_mesh(&mesh, &restored, k).unwrap(),
            simplifier.assemble(k).unwrap()
        );
    }
}

#[test]
fn test_one_shot_simplifier() {
    let mesh = make_subdivided_cube(4);
    let sphere = RelevanceSphere::with_radius(Point3f::new(0.0, 0.0, 1.0), 0.75, 1.0);
    let config = SimplifyConfig::new().with_relevance_sphere(sphere);
    let simplifier = RelevanceSimplifier::with_config(config);
    let result = simplifier.simplify(&mesh, 0.25).unwrap();
    assert_valid_level(&result, 25);
}
