//! Marching Cubes isosurface extraction
//!
//! Samples an [`ImplicitFunction`] on a regular lattice covering its bounds
//! plus a padding margin, then polygonizes every cell with the classic
//! 256-case tables. Edge crossings are refined by bisection on the implicit
//! function itself, and vertices are shared between the cells that touch
//! the same lattice edge.

use crate::implicit::{ImplicitFunction, TrilinearField};
use crate::marching_cubes_tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRIANGLE_TABLE};
use crate::parallel::{self, ParallelConfig};
use crate::partition::LabelField;
use segmesh_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for Marching Cubes algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct MarchingCubesConfig {
    /// Lattice cells along the longest side of the bounds
    pub target_subdivisions: usize,
    /// Bisection iterations per crossing edge
    pub root_solve_steps: usize,
    /// Margin around the bounds, in cells
    pub boundary_padding_factor: f32,
    /// Isosurface level; values below it are inside
    pub iso_level: f32,
    /// Evaluate lattice slabs on the rayon pool
    pub parallel: bool,
}

impl Default for MarchingCubesConfig {
    fn default() -> Self {
        Self {
            target_subdivisions: 64,
            root_solve_steps: 5,
            boundary_padding_factor: 3.0,
            iso_level: 0.0,
            parallel: true,
        }
    }
}

impl MarchingCubesConfig {
    pub fn with_subdivisions(mut self, target_subdivisions: usize) -> Self {
        self.target_subdivisions = target_subdivisions;
        self
    }

    pub fn with_root_solve_steps(mut self, root_solve_steps: usize) -> Self {
        self.root_solve_steps = root_solve_steps;
        self
    }

    pub fn with_padding(mut self, boundary_padding_factor: f32) -> Self {
        self.boundary_padding_factor = boundary_padding_factor;
        self
    }

    pub fn with_iso_level(mut self, iso_level: f32) -> Self {
        self.iso_level = iso_level;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_subdivisions == 0 {
            return Err(Error::InvalidData(
                "target_subdivisions must be positive".to_string(),
            ));
        }
        if !self.boundary_padding_factor.is_finite() || self.boundary_padding_factor < 0.0 {
            return Err(Error::InvalidData(format!(
                "boundary_padding_factor must be finite and non-negative, got {}",
                self.boundary_padding_factor
            )));
        }
        if !self.iso_level.is_finite() {
            return Err(Error::InvalidData("iso_level must be finite".to_string()));
        }
        Ok(())
    }
}

/// Regular sampling lattice: `counts` cells per axis starting at `origin`
#[derive(Debug, Clone, Copy)]
struct Lattice {
    origin: Point3f,
    cube_size: f32,
    counts: [usize; 3],
}

impl Lattice {
    /// Points per axis
    fn points(&self) -> [usize; 3] {
        [self.counts[0] + 1, self.counts[1] + 1, self.counts[2] + 1]
    }

    #[inline]
    fn point_index(&self, i: usize, j: usize, k: usize) -> usize {
        let [px, py, _] = self.points();
        i + px * (j + py * k)
    }

    #[inline]
    fn position(&self, i: usize, j: usize, k: usize) -> Point3f {
        self.origin + Vector3f::new(i as f32, j as f32, k as f32) * self.cube_size
    }
}

/// Marching Cubes implementation
#[derive(Debug, Clone, Default)]
pub struct MarchingCubes {
    config: MarchingCubesConfig,
}

impl MarchingCubes {
    /// Create a new Marching Cubes instance
    pub fn new(config: MarchingCubesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarchingCubesConfig {
        &self.config
    }

    /// Extract the iso surface of a label field sampled at `cell_size`
    pub fn extract_field(&self, field: &LabelField, cell_size: f32) -> Result<TriangleMesh> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidData(format!(
                "cell size must be positive and finite, got {}",
                cell_size
            )));
        }
        self.extract(&TrilinearField::new(field, cell_size))
    }

    /// Extract the iso surface of an implicit function.
    ///
    /// Faces wind counter-clockwise seen from outside. Returns an empty mesh
    /// when no lattice point is inside.
    pub fn extract<F>(&self, function: &F) -> Result<TriangleMesh>
    where
        F: ImplicitFunction + Sync,
    {
        self.config.validate()?;

        let lattice = self.build_lattice(function)?;
        let values = self.sample_lattice(function, &lattice);

        let iso = self.config.iso_level;
        if !values.iter().any(|&v| v < iso) {
            debug!("No lattice point inside the surface, skipping extraction");
            return Ok(TriangleMesh::new());
        }

        let mut mesh = TriangleMesh::new();
        let mut edge_vertices: HashMap<usize, usize> = HashMap::new();
        let [nx, ny, nz] = lattice.counts;

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    self.process_cell(
                        function,
                        &lattice,
                        &values,
                        [i, j, k],
                        &mut edge_vertices,
                        &mut mesh,
                    );
                }
            }
        }

        debug!(
            "Marching cubes on {}x{}x{} cells produced {} vertices, {} faces",
            nx,
            ny,
            nz,
            mesh.vertex_count(),
            mesh.face_count()
        );

        Ok(mesh)
    }

    /// Padded lattice over the function's bounds
    fn build_lattice<F: ImplicitFunction>(&self, function: &F) -> Result<Lattice> {
        let bounds = function.bounds();
        let max_dim = bounds.max_dim();

        let mut cube_size = max_dim / self.config.target_subdivisions as f32;
        if !(cube_size.is_finite() && cube_size > 0.0) {
            // Point-like bounds, e.g. a 1x1x1 grid
            cube_size = function.feature_size() / self.config.target_subdivisions as f32;
        }
        if !(cube_size.is_finite() && cube_size > 0.0) {
            return Err(Error::InvalidData(format!(
                "cannot derive a lattice from bounds {:?}",
                bounds
            )));
        }

        let padded = bounds.expanded(self.config.boundary_padding_factor * cube_size);
        let size = padded.size();
        let mut counts = [0usize; 3];
        for axis in 0..3 {
            counts[axis] = ((size[axis] / cube_size).ceil() as usize).max(1);
        }

        Ok(Lattice {
            origin: padded.min,
            cube_size,
            counts,
        })
    }

    /// Function values at every lattice point, evaluated in z-slabs
    fn sample_lattice<F>(&self, function: &F, lattice: &Lattice) -> Vec<f32>
    where
        F: ImplicitFunction + Sync,
    {
        let [px, py, pz] = lattice.points();
        let config = ParallelConfig::default().with_enabled(self.config.parallel);

        let slabs = parallel::parallel_map_range(&config, pz, |k| {
            let mut slab = Vec::with_capacity(px * py);
            for j in 0..py {
                for i in 0..px {
                    slab.push(function.value(&lattice.position(i, j, k)));
                }
            }
            slab
        });

        slabs.concat()
    }

    fn process_cell<F: ImplicitFunction>(
        &self,
        function: &F,
        lattice: &Lattice,
        values: &[f32],
        [i, j, k]: [usize; 3],
        edge_vertices: &mut HashMap<usize, usize>,
        mesh: &mut TriangleMesh,
    ) {
        let iso = self.config.iso_level;
        let corners = CORNER_OFFSETS.map(|[di, dj, dk]| [i + di, j + dj, k + dk]);
        let corner_values = corners.map(|[ci, cj, ck]| values[lattice.point_index(ci, cj, ck)]);

        let mut cube_index = 0usize;
        for (bit, &value) in corner_values.iter().enumerate() {
            if value < iso {
                cube_index |= 1 << bit;
            }
        }

        let crossed = EDGE_TABLE[cube_index];
        if crossed == 0 {
            return;
        }

        let mut cell_vertices = [usize::MAX; 12];
        for (edge, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
            if crossed & (1 << edge) == 0 {
                continue;
            }
            let (lo, hi) = if corners[a] <= corners[b] { (a, b) } else { (b, a) };
            let [li, lj, lk] = corners[lo];
            let axis = (0..3).find(|&ax| corners[lo][ax] != corners[hi][ax]).unwrap_or(0);
            let key = lattice.point_index(li, lj, lk) * 3 + axis;

            cell_vertices[edge] = *edge_vertices.entry(key).or_insert_with(|| {
                let [hi_i, hi_j, hi_k] = corners[hi];
                let position = self.solve_crossing(
                    function,
                    lattice.position(li, lj, lk),
                    corner_values[lo],
                    lattice.position(hi_i, hi_j, hi_k),
                    corner_values[hi],
                );
                mesh.add_vertex(position)
            });
        }

        for tri in TRIANGLE_TABLE[cube_index].chunks(3) {
            if tri[0] < 0 {
                break;
            }
            let v0 = cell_vertices[tri[0] as usize];
            let v1 = cell_vertices[tri[1] as usize];
            let v2 = cell_vertices[tri[2] as usize];
            // The table winds toward the inside; swap to face outward
            mesh.add_face([v0, v2, v1]);
        }
    }

    /// Locate the iso crossing between two lattice points of opposite sides
    fn solve_crossing<F: ImplicitFunction>(
        &self,
        function: &F,
        mut a: Point3f,
        mut va: f32,
        mut b: Point3f,
        mut vb: f32,
    ) -> Point3f {
        let iso = self.config.iso_level;
        let a_inside = va < iso;

        for _ in 0..self.config.root_solve_steps {
            let mid = nalgebra::center(&a, &b);
            let vm = function.value(&mid);
            if (vm < iso) == a_inside {
                a = mid;
                va = vm;
            } else {
                b = mid;
                vb = vm;
            }
        }

        let denom = vb - va;
        let t = if denom.is_finite() && denom.abs() > f32::EPSILON {
            ((iso - va) / denom).clamp(0.0, 1.0)
        } else {
            0.5
        };
        a + (b - a) * t
    }
}

/// Extract the zero iso surface of a label field with default settings
pub fn marching_cubes(field: &LabelField, cell_size: f32) -> Result<TriangleMesh> {
    MarchingCubes::default().extract_field(field, cell_size)
}
