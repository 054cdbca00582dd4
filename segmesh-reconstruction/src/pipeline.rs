//! Labeled volume to per-label mesh reconstruction pipeline
//!
//! Partition the grid, then for every selected label: materialize its
//! field, extract the iso surface, post-process it and keep it when it has
//! any faces. Labels run in parallel but results always come back in
//! ascending label order.

use crate::marching_cubes::{MarchingCubes, MarchingCubesConfig};
use crate::parallel::{self, ParallelConfig};
use crate::partition::{partition, LabelSelection, SegmentPartition};
use crate::postprocess::{MeshPostProcessor, PostProcessConfig, PostProcessReport};
use segmesh_core::{Axis, Error, LabelPalette, Result, Rgba, TriangleMesh, VoxelGrid};
use segmesh_simplification::RemeshParams;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Options for [`reconstruct`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionOptions {
    /// Marching cubes cells along the longest side of the volume
    pub target_subdivisions: usize,
    /// Bisection steps per surface crossing
    pub root_solve_steps: usize,
    /// Lattice margin around the volume, in cells
    pub boundary_padding_factor: f32,
    /// Remesh and decimate every surface
    pub decimate: bool,
    /// Remeshing passes before decimation (0 = decimate only)
    pub remesh_passes: usize,
    /// Remeshing target edge length
    pub target_edge_length: f32,
    /// Remeshing relaxation speed
    pub smoothing_speed: f32,
    /// Maximum triangles per surface when decimating
    pub target_triangle_count: usize,
    /// Axis mirrored to convert to the left-handed output convention
    pub flip_axis: Axis,
    /// Process labels in parallel
    pub parallel: bool,
    /// Dedicated pool size (None = rayon's global pool)
    pub num_threads: Option<usize>,
    /// Colors attached to multi-label results
    pub label_palette: Option<LabelPalette>,
}

impl Default for ReconstructionOptions {
    fn default() -> Self {
        Self {
            target_subdivisions: 64,
            root_solve_steps: 5,
            boundary_padding_factor: 3.0,
            decimate: false,
            remesh_passes: 20,
            target_edge_length: 5.5,
            smoothing_speed: 1.0,
            target_triangle_count: 2000,
            flip_axis: Axis::Z,
            parallel: true,
            num_threads: None,
            label_palette: None,
        }
    }
}

impl ReconstructionOptions {
    pub fn new() -> Self {
        Self::default()
    }

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

    pub fn with_decimation(mut self, decimate: bool) -> Self {
        self.decimate = decimate;
        self
    }

    pub fn with_remesh_passes(mut self, remesh_passes: usize) -> Self {
        self.remesh_passes = remesh_passes;
        self
    }

    pub fn with_target_edge_length(mut self, target_edge_length: f32) -> Self {
        self.target_edge_length = target_edge_length;
        self
    }

    pub fn with_smoothing_speed(mut self, smoothing_speed: f32) -> Self {
        self.smoothing_speed = smoothing_speed;
        self
    }

    pub fn with_target_triangle_count(mut self, target_triangle_count: usize) -> Self {
        self.target_triangle_count = target_triangle_count;
        self
    }

    pub fn with_flip_axis(mut self, flip_axis: Axis) -> Self {
        self.flip_axis = flip_axis;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_palette(mut self, palette: LabelPalette) -> Self {
        self.label_palette = Some(palette);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_subdivisions == 0 {
            return Err(Error::InvalidConfig(
                "target_subdivisions must be positive".to_string(),
            ));
        }
        if !self.boundary_padding_factor.is_finite() || self.boundary_padding_factor < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "boundary_padding_factor must be finite and non-negative, got {}",
                self.boundary_padding_factor
            )));
        }
        if !self.target_edge_length.is_finite() || self.target_edge_length <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "target_edge_length must be positive and finite, got {}",
                self.target_edge_length
            )));
        }
        if !self.smoothing_speed.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "smoothing_speed must be finite, got {}",
                self.smoothing_speed
            )));
        }
        if self.target_triangle_count == 0 {
            return Err(Error::InvalidConfig(
                "target_triangle_count must be positive".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(Error::InvalidConfig(
                "num_threads must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn marching_cubes_config(&self) -> MarchingCubesConfig {
        MarchingCubesConfig::default()
            .with_subdivisions(self.target_subdivisions)
            .with_root_solve_steps(self.root_solve_steps)
            .with_padding(self.boundary_padding_factor)
            .with_parallel(self.parallel)
    }

    pub fn post_process_config(&self) -> PostProcessConfig {
        let mut config = PostProcessConfig::default().with_flip(Some(self.flip_axis));
        if self.decimate {
            if self.remesh_passes > 0 {
                config = config.with_remesh(
                    RemeshParams::with_edge_length(self.target_edge_length)
                        .with_passes(self.remesh_passes)
                        .with_smoothing_speed(self.smoothing_speed),
                );
            }
            config = config.with_decimation(self.target_triangle_count);
        }
        config
    }

    pub fn parallel_config(&self) -> ParallelConfig {
        let config = ParallelConfig::default().with_enabled(self.parallel);
        match self.num_threads {
            Some(n) => config.with_threads(n),
            None => config,
        }
    }
}

/// One reconstructed surface
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    /// Label id, `FOREGROUND_LABEL` in single-surface mode
    pub label: u32,
    pub mesh: TriangleMesh,
    /// Voxels assigned to the label
    pub voxel_count: usize,
    /// Palette color for multi-label results
    pub color: Option<Rgba>,
    pub report: PostProcessReport,
}

/// Reusable reconstruction pipeline
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    options: ReconstructionOptions,
}

impl Reconstructor {
    pub fn new(options: ReconstructionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconstructionOptions {
        &self.options
    }

    /// Reconstruct one mesh per selected label, in ascending label order.
    ///
    /// Labels without voxels or whose surface comes out empty are omitted.
    pub fn reconstruct(
        &self,
        grid: &VoxelGrid,
        selection: &LabelSelection,
    ) -> Result<Vec<SegmentResult>> {
        self.options.validate()?;

        let start = Instant::now();
        let partition = partition(grid, selection)?;
        info!(
            "Reconstructing {} labels from {}x{}x{} grid",
            partition.len(),
            grid.width(),
            grid.height(),
            grid.depth()
        );

        let stages = Stages {
            extractor: MarchingCubes::new(self.options.marching_cubes_config()),
            post_processor: MeshPostProcessor::new(self.options.post_process_config()),
            palette: if selection.is_foreground() {
                None
            } else {
                self.options.label_palette.as_ref()
            },
        };

        let parallel = self.options.parallel_config();
        let slots: Vec<usize> = (0..partition.len()).collect();
        let outcomes = parallel.install(|| {
            parallel::parallel_map(&parallel, &slots, |&slot| {
                stages.run(&partition, slot)
            })
        })?;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(result) = outcome? {
                results.push(result);
            }
        }

        info!(
            "Reconstructed {} of {} labels in {:.3}s",
            results.len(),
            partition.len(),
            start.elapsed().as_secs_f32()
        );

        Ok(results)
    }
}

/// Per-label stages shared by all workers
struct Stages<'a> {
    extractor: MarchingCubes,
    post_processor: MeshPostProcessor,
    palette: Option<&'a LabelPalette>,
}

impl Stages<'_> {
    fn run(&self, partition: &SegmentPartition<'_>, slot: usize) -> Result<Option<SegmentResult>> {
        let label = partition.label(slot).ok_or_else(|| {
            Error::InvalidData(format!("slot {} has no label", slot))
        })?;
        let voxel_count = partition.voxel_count(slot);
        if voxel_count == 0 {
            debug!("Label {} has no voxels, omitted", label);
            return Ok(None);
        }

        let start = Instant::now();
        let mut mesh = {
            let field = partition.field(slot)?;
            self.extractor
                .extract_field(&field, partition.grid().spacing())?
        };
        let extracted_faces = mesh.face_count();
        if mesh.is_empty() {
            debug!("Label {} produced no surface, omitted", label);
            return Ok(None);
        }

        let report = self.post_processor.process(&mut mesh)?;
        if mesh.is_empty() {
            debug!("Label {} vanished during post-processing, omitted", label);
            return Ok(None);
        }

        debug!(
            "Label {}: {} voxels, {} extracted faces, {} final faces in {:.3}s",
            label,
            voxel_count,
            extracted_faces,
            mesh.face_count(),
            start.elapsed().as_secs_f32()
        );

        Ok(Some(SegmentResult {
            label,
            mesh,
            voxel_count,
            color: self.palette.map(|p| p.color_for(label)),
            report,
        }))
    }
}

/// Reconstruct one mesh per selected label of `grid`
pub fn reconstruct(
    grid: &VoxelGrid,
    selection: &LabelSelection,
    options: &ReconstructionOptions,
) -> Result<Vec<SegmentResult>> {
    Reconstructor::new(options.clone()).reconstruct(grid, selection)
}
