//! Simplify a procedural mesh from the command line
//!
//! ```text
//! lodcrate-demo --shape sphere --resolution 48 --vertex-amount 0.25 \
//!     --relevance 0,1,0,0.5,0.8 --data-output sphere.lod.json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use lodcrate_core::{Point3f, RelevanceSphere, TriangleMesh};
use lodcrate_simplification::{CancellationToken, Outcome, Simplifier, SimplifyConfig};
use std::f32::consts::{PI, TAU};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shape {
    Sphere,
    Grid,
    Cube,
}

/// Relevance-weighted mesh simplification demo.
#[derive(Parser, Debug)]
#[command(name = "lodcrate-demo", version, about)]
struct Args {
    /// Procedural mesh to simplify
    #[arg(long, value_enum, default_value_t = Shape::Sphere)]
    shape: Shape,

    /// Subdivisions of the procedural mesh
    #[arg(short, long, default_value_t = 32)]
    resolution: usize,

    /// Fraction of vertices to keep
    #[arg(short = 'a', long, default_value_t = 0.5)]
    vertex_amount: f32,

    /// Curvature forced on border vertices (values above 1 protect borders)
    #[arg(long, default_value_t = 0.0)]
    border_curvature: f32,

    /// Ignore edge length in the collapse cost
    #[arg(long)]
    no_edge_length: bool,

    /// Ignore curvature in the collapse cost
    #[arg(long)]
    no_curvature: bool,

    /// Relevance sphere as `x,y,z,radius,relevance`; later spheres win
    #[arg(long = "relevance", value_name = "SPHERE", value_parser = parse_sphere)]
    spheres: Vec<RelevanceSphere>,

    /// Collapse down to a single vertex so every level is available
    #[arg(long)]
    full_data: bool,

    /// Write the collapse log and welding map as JSON
    #[arg(long, value_name = "FILE")]
    data_output: Option<PathBuf>,

    /// Write the simplified mesh as JSON
    #[arg(long, value_name = "FILE")]
    mesh_output: Option<PathBuf>,
}

fn parse_sphere(s: &str) -> std::result::Result<RelevanceSphere, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", s, e))?;
    match values[..] {
        [x, y, z, radius, relevance] => Ok(RelevanceSphere::with_radius(
            Point3f::new(x, y, z),
            radius,
            relevance,
        )),
        _ => Err(format!("expected x,y,z,radius,relevance, got '{}'", s)),
    }
}

/// UV sphere of radius 1 with a duplicated seam and collapsed poles
fn uv_sphere(resolution: usize) -> TriangleMesh {
    let stacks = resolution.max(2);
    let slices = (resolution * 2).max(3);
    let mut mesh = TriangleMesh::new();
    for i in 0..=stacks {
        let theta = PI * i as f32 / stacks as f32;
        // Exact poles so every pole copy welds into one vertex
        let ring = if i == 0 || i == stacks { 0.0 } else { theta.sin() };
        for j in 0..=slices {
            let phi = TAU * (j % slices) as f32 / slices as f32;
            mesh.add_vertex(Point3f::new(ring * phi.cos(), theta.cos(), ring * phi.sin()));
        }
    }
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * (slices + 1) + j;
            let b = a + slices + 1;
            mesh.add_face([a, b, a + 1]);
            mesh.add_face([a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Gently curved height field
fn grid(resolution: usize) -> TriangleMesh {
    let size = resolution.max(2);
    let mut mesh = TriangleMesh::new();
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * PI;
            let fy = y as f32 / (size - 1) as f32 * PI;
            mesh.add_vertex(Point3f::new(x as f32, y as f32, fx.sin() * fy.sin() * 2.0));
        }
    }
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            mesh.add_face([tl, bl, tr]);
            mesh.add_face([tr, bl, br]);
        }
    }
    mesh
}

/// Cube over [-1, 1]^3 with per-face vertices
fn cube(resolution: usize) -> TriangleMesh {
    let n = resolution.max(1);
    let sides: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, -1.0, -1.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 1.0, -1.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([-1.0, -1.0, -1.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, -1.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([-1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];
    let mut mesh = TriangleMesh::new();
    for (origin, u, v) in sides {
        let base = mesh.vertex_count();
        for j in 0..=n {
            for i in 0..=n {
                let s = 2.0 * i as f32 / n as f32;
                let t = 2.0 * j as f32 / n as f32;
                mesh.add_vertex(Point3f::new(
                    origin[0] + u[0] * s + v[0] * t,
                    origin[1] + u[1] * s + v[1] * t,
                    origin[2] + u[2] * s + v[2] * t,
                ));
            }
        }
        let at = |i: usize, j: usize| base + j * (n + 1) + i;
        for j in 0..n {
            for i in 0..n {
                mesh.add_face([at(i, j), at(i + 1, j), at(i + 1, j + 1)]);
                mesh.add_face([at(i, j), at(i + 1, j + 1), at(i, j + 1)]);
            }
        }
    }
    mesh
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mesh = match args.shape {
        Shape::Sphere => uv_sphere(args.resolution),
        Shape::Grid => grid(args.resolution),
        Shape::Cube => cube(args.resolution),
    };

    let config = SimplifyConfig::new()
        .with_vertex_amount(args.vertex_amount)
        .with_border_curvature(args.border_curvature)
        .with_edge_length(!args.no_edge_length)
        .with_curvature(!args.no_curvature)
        .with_relevance_spheres(args.spheres.clone());

    let label = format!("{:?}", args.shape).to_lowercase();
    let mut simplifier = Simplifier::new(&mesh, config)?.with_label(label);
    println!(
        "Input {}: {} vertices, {} triangles; {} vertices, {} triangles after welding",
        simplifier.label(),
        mesh.vertex_count(),
        mesh.face_count(),
        simplifier.original_vertex_count(),
        simplifier.original_triangle_count()
    );

    let token = CancellationToken::new();
    let mut progress = |phase: &str, item: &str, fraction: f32| {
        log::debug!("{} [{}] {:.0}%", phase, item, fraction * 100.0);
    };
    let outcome = if args.full_data {
        simplifier.compute_full_data(&token, &mut progress)
    } else {
        simplifier.run(&token, &mut progress)
    };
    if outcome == Outcome::Cancelled {
        bail!("simplification was cancelled");
    }

    let target = simplifier.target_vertex_count();
    let simplified = simplifier.assemble(target)?;
    println!(
        "Output: {} vertices, {} triangles ({:.1}% of the welded vertices)",
        simplified.vertex_count(),
        simplified.face_count(),
        100.0 * simplified.vertex_count() as f32 / simplifier.original_vertex_count() as f32
    );

    if args.full_data {
        let original = simplifier.original_vertex_count();
        for percent in [75, 50, 25, 10] {
            let n = (original * percent / 100).max(1);
            println!(
                "  {:>3}%: {} vertices, {} triangles",
                percent,
                n,
                simplifier.triangle_count_at(n)?
            );
        }
    }

    if let Some(path) = &args.data_output {
        write_json(path, simplifier.simplification_data())?;
    }
    if let Some(path) = &args.mesh_output {
        write_json(path, &simplified)?;
    }

    Ok(())
}
