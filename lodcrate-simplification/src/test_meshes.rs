//! Small procedural meshes shared by the unit tests

use lodcrate_core::{Point3f, TriangleMesh, Vector3f};

pub fn make_single_triangle() -> TriangleMesh {
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.5, 1.0, 0.0),
        ],
        vec![[0, 1, 2]],
    )
}

pub fn make_tetrahedron() -> TriangleMesh {
    // Consistently wound: each shared edge appears in opposite directions
    TriangleMesh::from_vertices_and_faces(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.5, 1.0, 0.0),
            Point3f::new(0.5, 0.5, 1.0),
        ],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )
}

pub fn make_plane_grid(size: usize) -> TriangleMesh {
    let mut vertices = Vec::new();
    for y in 0..size {
        for x in 0..size {
            vertices.push(Point3f::new(x as f32, y as f32, 0.0));
        }
    }
    let mut faces = Vec::new();
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

/// Six rim vertices around a center vertex (index 6)
pub fn make_hexagon_fan() -> TriangleMesh {
    let mut vertices: Vec<Point3f> = (0..6)
        .map(|k| {
            let a = k as f32 * std::f32::consts::FRAC_PI_3;
            Point3f::new(a.cos(), a.sin(), 0.0)
        })
        .collect();
    vertices.push(Point3f::origin());
    let faces = (0..6).map(|k| [6, k, (k + 1) % 6]).collect();
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

/// Quad split into two triangles, each in its own submesh
pub fn make_two_submesh_quad() -> TriangleMesh {
    TriangleMesh::from_submeshes(
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(1.0, 1.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ],
        vec![vec![0, 1, 2], vec![0, 2, 3]],
    )
}

/// Closed cube over [-1, 1]^3 with each face split into `n` x `n` cells.
/// Every face has its own copy of the shared edge vertices, so the mesh only
/// closes up once duplicate positions are welded.
pub fn make_subdivided_cube(n: usize) -> TriangleMesh {
    let x = Vector3f::x();
    let y = Vector3f::y();
    let z = Vector3f::z();
    // (origin, u, v) with u x v pointing outwards
    let faces = [
        (Vector3f::new(1.0, -1.0, -1.0), y, z),
        (Vector3f::new(-1.0, -1.0, -1.0), z, y),
        (Vector3f::new(-1.0, 1.0, -1.0), z, x),
        (Vector3f::new(-1.0, -1.0, -1.0), x, z),
        (Vector3f::new(-1.0, -1.0, 1.0), x, y),
        (Vector3f::new(-1.0, -1.0, -1.0), y, x),
    ];

    let mut mesh = TriangleMesh::new();
    let mut indices = Vec::new();
    for (origin, u, v) in faces {
        let base = mesh.vertex_count();
        for j in 0..=n {
            for i in 0..=n {
                let s = 2.0 * i as f32 / n as f32;
                let t = 2.0 * j as f32 / n as f32;
                mesh.add_vertex(Point3f::from(origin + u * s + v * t));
            }
        }
        let at = |i: usize, j: usize| base + j * (n + 1) + i;
        for j in 0..n {
            for i in 0..n {
                indices.extend_from_slice(&[at(i, j), at(i + 1, j), at(i + 1, j + 1)]);
                indices.extend_from_slice(&[at(i, j), at(i + 1, j + 1), at(i, j + 1)]);
            }
        }
    }
    mesh.submeshes.push(indices);
    mesh
}
