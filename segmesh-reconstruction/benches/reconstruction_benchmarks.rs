//! Benchmarks for isosurface extraction and the per-label pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use segmesh_core::{Point3f, VoxelGrid};
use segmesh_reconstruction::{
    reconstruct, LabelSelection, MarchingCubes, MarchingCubesConfig, ReconstructionOptions,
    SphereFunction,
};

/// `n^3` grid with `labels` balls spread along the x axis
fn generate_labeled_grid(n: usize, labels: u32) -> VoxelGrid {
    let radius = n as f32 / (2.5 * labels as f32);
    let centers: Vec<Point3f> = (0..labels)
        .map(|l| {
            let x = (l as f32 + 0.5) * n as f32 / labels as f32;
            Point3f::new(x, n as f32 / 2.0, n as f32 / 2.0)
        })
        .collect();

    let mut values = Vec::with_capacity(n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let p = Point3f::new(i as f32, j as f32, k as f32);
                let label = centers
                    .iter()
                    .position(|c| (p - c).norm() <= radius)
                    .map(|l| (l + 1) as f32)
                    .unwrap_or(0.0);
                values.push(label);
            }
        }
    }
    VoxelGrid::new(n, n, n, 1.0, values).expect("valid benchmark grid")
}

fn bench_marching_cubes(c: &mut Criterion) {
    let mut group = c.benchmark_group("marching_cubes_sphere");
    let sphere = SphereFunction::new(Point3f::origin(), 10.0);

    for subdivisions in [32, 64, 128] {
        let mc = MarchingCubes::new(MarchingCubesConfig::default().with_subdivisions(subdivisions));
        group.bench_with_input(
            BenchmarkId::from_parameter(subdivisions),
            &subdivisions,
            |b, _| b.iter(|| black_box(mc.extract(&sphere).expect("extraction"))),
        );
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct_labels");
    group.sample_size(10);
    let grid = generate_labeled_grid(48, 4);
    let selection = LabelSelection::Present;

    for parallel in [false, true] {
        let options = ReconstructionOptions::default().with_parallel(parallel);
        group.bench_with_input(
            BenchmarkId::new("parallel", parallel),
            &options,
            |b, options| {
                b.iter(|| black_box(reconstruct(&grid, &selection, options).expect("reconstruct")))
            },
        );
    }

    let decimating = ReconstructionOptions::default()
        .with_decimation(true)
        .with_remesh_passes(0);
    group.bench_function("decimate_2000", |b| {
        b.iter(|| black_box(reconstruct(&grid, &selection, &decimating).expect("reconstruct")))
    });
    group.finish();
}

criterion_group!(benches, bench_marching_cubes, bench_pipeline);
criterion_main!(benches);
