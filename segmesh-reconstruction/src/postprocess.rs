//! Mesh post-processing
//!
//! Turns a raw extracted surface into a render-ready mesh: handedness flip,
//! optional isotropic remeshing and quadric decimation, then vertex normals.
//! Each stage reports whether it ran.

use segmesh_core::{Axis, Error, Result, Transform3D, Transformable, TriangleMesh};
use segmesh_simplification::{EdgeCollapseSimplifier, IsotropicRemesher, RemeshParams};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Fewest faces the remesher accepts
pub const MIN_REMESH_FACES: usize = 4;

/// Why a stage left the mesh untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The mesh has no faces
    EmptyMesh,
    /// Too few faces for the stage to operate on
    TooFewFaces { faces: usize, required: usize },
    /// Already at or below the decimation target
    WithinTarget { faces: usize, target: usize },
    /// Collapses ran out above the decimation target, as on meshes made of
    /// many small closed components
    TargetUnreachable { faces: usize, target: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyMesh => write!(f, "empty mesh"),
            SkipReason::TooFewFaces { faces, required } => {
                write!(f, "{} faces, at least {} required", faces, required)
            }
            SkipReason::WithinTarget { faces, target } => {
                write!(f, "{} faces already within target {}", faces, target)
            }
            SkipReason::TargetUnreachable { faces, target } => {
                write!(f, "stopped at {} faces, above target {}", faces, target)
            }
        }
    }
}

/// What happened in one post-processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOutcome {
    Applied,
    /// The stage changed the mesh but stopped short of its goal
    Partial(SkipReason),
    Skipped(SkipReason),
    #[default]
    Disabled,
}

impl StageOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied)
    }
}

/// Per-stage outcomes of [`MeshPostProcessor::process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostProcessReport {
    pub flip: StageOutcome,
    pub remesh: StageOutcome,
    pub decimate: StageOutcome,
    pub normals: StageOutcome,
}

impl PostProcessReport {
    fn skipped_all(reason: SkipReason) -> Self {
        let skipped = StageOutcome::Skipped(reason);
        Self {
            flip: skipped,
            remesh: skipped,
            decimate: skipped,
            normals: skipped,
        }
    }
}

/// Configuration for mesh post-processing
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessConfig {
    /// Mirror one axis to switch coordinate handedness
    pub flip_handedness: bool,
    /// Axis mirrored by the flip
    pub flip_axis: Axis,
    /// Isotropic remeshing parameters (None = no remeshing)
    pub remesh: Option<RemeshParams>,
    /// Maximum triangle count (None = no decimation)
    pub decimate_to: Option<usize>,
    /// Compute area-weighted vertex normals
    pub compute_normals: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            flip_handedness: true,
            flip_axis: Axis::Z,
            remesh: None,
            decimate_to: None,
            compute_normals: true,
        }
    }
}

impl PostProcessConfig {
    /// Configuration that leaves the mesh untouched
    pub fn disabled() -> Self {
        Self {
            flip_handedness: false,
            compute_normals: false,
            ..Self::default()
        }
    }

    pub fn with_flip(mut self, axis: Option<Axis>) -> Self {
        self.flip_handedness = axis.is_some();
        if let Some(axis) = axis {
            self.flip_axis = axis;
        }
        self
    }

    pub fn with_remesh(mut self, params: RemeshParams) -> Self {
        self.remesh = Some(params);
        self
    }

    pub fn with_decimation(mut self, target_triangles: usize) -> Self {
        self.decimate_to = Some(target_triangles);
        self
    }

    pub fn with_normals(mut self, compute_normals: bool) -> Self {
        self.compute_normals = compute_normals;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(params) = &self.remesh {
            params.validate()?;
        }
        if self.decimate_to == Some(0) {
            return Err(Error::InvalidConfig(
                "decimation target must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Applies the configured post-processing stages in order
#[derive(Debug, Clone, Default)]
pub struct MeshPostProcessor {
    config: PostProcessConfig,
}

impl MeshPostProcessor {
    pub fn new(config: PostProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostProcessConfig {
        &self.config
    }

    /// Run flip, remesh, decimate and normals on `mesh` in place.
    ///
    /// Empty meshes pass through with every stage skipped. Stages that
    /// cannot operate on a small mesh are skipped and leave it unchanged.
    pub fn process(&self, mesh: &mut TriangleMesh) -> Result<PostProcessReport> {
        self.config.validate()?;

        if mesh.is_empty() {
            debug!("Post-processing skipped for empty mesh");
            return Ok(PostProcessReport::skipped_all(SkipReason::EmptyMesh));
        }
        mesh.validate_indices()?;

        let start = Instant::now();
        let faces_in = mesh.face_count();
        let report = PostProcessReport {
            flip: self.flip(mesh),
            remesh: self.remesh(mesh)?,
            decimate: self.decimate(mesh)?,
            normals: self.normals(mesh),
        };

        debug!(
            "Post-processed mesh: {} -> {} faces, {} vertices in {:.3}s",
            faces_in,
            mesh.face_count(),
            mesh.vertex_count(),
            start.elapsed().as_secs_f32()
        );

        Ok(report)
    }

    fn flip(&self, mesh: &mut TriangleMesh) -> StageOutcome {
        if !self.config.flip_handedness {
            return StageOutcome::Disabled;
        }
        mesh.transform(&Transform3D::mirror(self.config.flip_axis));
        StageOutcome::Applied
    }

    fn remesh(&self, mesh: &mut TriangleMesh) -> Result<StageOutcome> {
        let Some(params) = &self.config.remesh else {
            return Ok(StageOutcome::Disabled);
        };

        let faces = mesh.face_count();
        if faces < MIN_REMESH_FACES {
            let reason = SkipReason::TooFewFaces {
                faces,
                required: MIN_REMESH_FACES,
            };
            warn!("Remeshing skipped: {}", reason);
            return Ok(StageOutcome::Skipped(reason));
        }

        let outcome = IsotropicRemesher::new(params.clone()).remesh(mesh)?;
        debug!(
            "Remeshed {} -> {} faces ({} splits, {} collapses, {} flips)",
            outcome.original_faces,
            outcome.final_faces,
            outcome.splits,
            outcome.collapses,
            outcome.flips
        );
        *mesh = outcome.mesh;
        Ok(StageOutcome::Applied)
    }

    fn decimate(&self, mesh: &mut TriangleMesh) -> Result<StageOutcome> {
        let Some(target) = self.config.decimate_to else {
            return Ok(StageOutcome::Disabled);
        };

        let faces = mesh.face_count();
        if faces <= target {
            let reason = SkipReason::WithinTarget { faces, target };
            debug!("Decimation skipped: {}", reason);
            return Ok(StageOutcome::Skipped(reason));
        }

        let outcome = EdgeCollapseSimplifier::new().reduce_to_triangle_count(mesh, target)?;
        *mesh = outcome.mesh;
        if outcome.reached_target {
            return Ok(StageOutcome::Applied);
        }
        let reason = SkipReason::TargetUnreachable {
            faces: outcome.final_faces,
            target,
        };
        warn!("Decimation incomplete: {}", reason);
        Ok(StageOutcome::Partial(reason))
    }

    fn normals(&self, mesh: &mut TriangleMesh) -> StageOutcome {
        if !self.config.compute_normals {
            return StageOutcome::Disabled;
        }
        mesh.compute_vertex_normals();
        StageOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use segmesh_core::Point3f;

    /// Closed, outward-wound tetrahedron
    fn make_tetrahedron() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    /// Outward-wound UV sphere
    fn make_sphere(radius: f32, rings: usize, segments: usize) -> TriangleMesh {
        let mut vertices = vec![Point3f::new(0.0, 0.0, radius)];
        for r in 1..rings {
            let theta = std::f32::consts::PI * r as f32 / rings as f32;
            for s in 0..segments {
                let phi = 2.0 * std::f32::consts::PI * s as f32 / segments as f32;
                vertices.push(Point3f::new(
                    radius * theta.sin() * phi.cos(),
                    radius * theta.sin() * phi.sin(),
                    radius * theta.cos(),
                ));
            }
        }
        let south = vertices.len();
        vertices.push(Point3f::new(0.0, 0.0, -radius));

        let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
        let mut faces = Vec::new();
        for s in 0..segments {
            faces.push([0, ring(1, s), ring(1, s + 1)]);
        }
        for r in 1..rings - 1 {
            for s in 0..segments {
                let (a, b) = (ring(r, s), ring(r, s + 1));
                let (c, d) = (ring(r + 1, s), ring(r + 1, s + 1));
                faces.push([a, c, d]);
                faces.push([a, d, b]);
            }
        }
        for s in 0..segments {
            faces.push([south, ring(rings - 1, s + 1), ring(rings - 1, s)]);
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_default_config() {
        let config = PostProcessConfig::default();
        assert!(config.flip_handedness);
        assert_eq!(config.flip_axis, Axis::Z);
        assert!(config.remesh.is_none());
        assert!(config.decimate_to.is_none());
        assert!(config.compute_normals);
    }

    #[test]
    fn test_empty_mesh_skips_every_stage() {
        let mut mesh = TriangleMesh::new();
        let processor = MeshPostProcessor::new(
            PostProcessConfig::default()
                .with_remesh(RemeshParams::default())
                .with_decimation(10),
        );
        let report = processor.process(&mut mesh).unwrap();
        assert_eq!(report, PostProcessReport::skipped_all(SkipReason::EmptyMesh));
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_flip_and_normals() {
        let mut mesh = make_tetrahedron();
        let volume = mesh.signed_volume();

        let report = MeshPostProcessor::default().process(&mut mesh).unwrap();

        assert!(report.flip.is_applied());
        assert!(report.normals.is_applied());
        assert_eq!(report.remesh, StageOutcome::Disabled);
        assert_eq!(report.decimate, StageOutcome::Disabled);

        assert_eq!(mesh.vertices[3], Point3f::new(0.0, 0.0, -1.0));
        assert_relative_eq!(mesh.signed_volume(), volume, epsilon = 1e-6);

        let normals = mesh.normals.as_ref().unwrap();
        assert_eq!(normals.len(), mesh.vertex_count());
        // Apex at z = -1 after the mirror points further down
        assert!(normals[3].z < 0.0);
        for n in normals {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_disabled_config_is_identity() {
        let mut mesh = make_tetrahedron();
        let original = mesh.clone();
        let report = MeshPostProcessor::new(PostProcessConfig::disabled())
            .process(&mut mesh)
            .unwrap();
        assert_eq!(report, PostProcessReport::default());
        assert_eq!(mesh, original);
    }

    #[test]
    fn test_decimation_bound() {
        let mut mesh = make_sphere(10.0, 16, 24);
        assert!(mesh.face_count() > 600);

        let report = MeshPostProcessor::new(PostProcessConfig::default().with_decimation(300))
            .process(&mut mesh)
            .unwrap();

        assert!(report.decimate.is_applied());
        assert!(mesh.face_count() <= 300);
        assert_eq!(mesh.normals.as_ref().unwrap().len(), mesh.vertex_count());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_unreachable_decimation_target_is_partial() {
        // Twenty disjoint tetrahedra: no edge passes the link condition
        let tet = make_tetrahedron();
        let mut mesh = TriangleMesh::new();
        for c in 0..20 {
            let offset = segmesh_core::Vector3f::new(3.0 * c as f32, 0.0, 0.0);
            let base = mesh.vertex_count();
            for p in &tet.vertices {
                mesh.add_vertex(p + offset);
            }
            for f in &tet.faces {
                mesh.add_face(f.map(|v| v + base));
            }
        }

        let report = MeshPostProcessor::new(PostProcessConfig::default().with_decimation(10))
            .process(&mut mesh)
            .unwrap();

        assert_eq!(
            report.decimate,
            StageOutcome::Partial(SkipReason::TargetUnreachable {
                faces: 80,
                target: 10
            })
        );
        assert!(!report.decimate.is_applied());
        assert_eq!(mesh.face_count(), 80);
        mesh.validate_indices().unwrap();
    }

    #[test]
    fn test_decimation_within_target_is_skipped() {
        let mut mesh = make_tetrahedron();
        let report = MeshPostProcessor::new(PostProcessConfig::default().with_decimation(2000))
            .process(&mut mesh)
            .unwrap();
        assert_eq!(
            report.decimate,
            StageOutcome::Skipped(SkipReason::WithinTarget {
                faces: 4,
                target: 2000
            })
        );
        assert_eq!(mesh.face_count(), 4);
    }

    #[test]
    fn test_remesh_too_few_faces() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let report = MeshPostProcessor::new(
            PostProcessConfig::default().with_remesh(RemeshParams::default()),
        )
        .process(&mut mesh)
        .unwrap();

        assert_eq!(
            report.remesh,
            StageOutcome::Skipped(SkipReason::TooFewFaces {
                faces: 1,
                required: MIN_REMESH_FACES
            })
        );
        assert_eq!(mesh.face_count(), 1);
        // Flat triangle normals follow the mirrored winding
        let n = mesh.normals.as_ref().unwrap()[0];
        assert_relative_eq!(n.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_remesh_then_decimate() {
        let mut mesh = make_sphere(10.0, 12, 16);
        let params = RemeshParams::with_edge_length(2.0).with_passes(3);
        let report = MeshPostProcessor::new(
            PostProcessConfig::default()
                .with_remesh(params)
                .with_decimation(200),
        )
        .process(&mut mesh)
        .unwrap();

        assert!(report.remesh.is_applied());
        assert!(mesh.face_count() <= 200);
        assert!(mesh.signed_volume() > 0.0);
        mesh.validate_indices().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let mut mesh = make_tetrahedron();
        let zero_target = MeshPostProcessor::new(PostProcessConfig::default().with_decimation(0));
        assert!(matches!(
            zero_target.process(&mut mesh),
            Err(Error::InvalidConfig(_))
        ));

        let bad_remesh = MeshPostProcessor::new(
            PostProcessConfig::default().with_remesh(RemeshParams::with_edge_length(-1.0)),
        );
        assert!(bad_remesh.process(&mut mesh).is_err());
    }

    #[test]
    fn test_flip_axis() {
        let mut mesh = make_tetrahedron();
        MeshPostProcessor::new(PostProcessConfig::default().with_flip(Some(Axis::X)))
            .process(&mut mesh)
            .unwrap();
        assert_eq!(mesh.vertices[1], Point3f::new(-1.0, 0.0, 0.0));
        assert!(mesh.signed_volume() > 0.0);
    }
}
