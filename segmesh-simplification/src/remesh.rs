//! Isotropic remeshing
//!
//! Incremental remeshing toward a uniform target edge length `L`. Each pass:
//! 1. splits edges longer than `4/3 L`
//! 2. collapses edges shorter than `4/5 L`
//! 3. flips edges to pull vertex valences toward 6 (4 on boundaries)
//! 4. relaxes vertices tangentially toward their neighbor centroid
//! 5. projects vertices back onto the input surface

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use segmesh_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Parameters for isotropic remeshing
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshParams {
    /// Desired edge length
    pub target_edge_length: f32,
    /// Number of split/collapse/flip/smooth/project passes
    pub passes: usize,
    /// Fraction of the tangential relaxation step applied, clamped to `[0, 1]`
    pub smoothing_speed: f32,
    /// Reject operations that would turn a face over
    pub prevent_normal_flips: bool,
    /// Keep vertices on the input surface after every pass
    pub project_to_input: bool,
}

impl Default for RemeshParams {
    fn default() -> Self {
        Self {
            target_edge_length: 5.5,
            passes: 20,
            smoothing_speed: 1.0,
            prevent_normal_flips: true,
            project_to_input: true,
        }
    }
}

impl RemeshParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_length(target_edge_length: f32) -> Self {
        Self {
            target_edge_length,
            ..Self::default()
        }
    }

    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_smoothing_speed(mut self, speed: f32) -> Self {
        self.smoothing_speed = speed;
        self
    }

    pub fn with_normal_flip_guard(mut self, enabled: bool) -> Self {
        self.prevent_normal_flips = enabled;
        self
    }

    pub fn with_projection(mut self, enabled: bool) -> Self {
        self.project_to_input = enabled;
        self
    }

    /// Edges longer than this are split
    pub fn max_edge_length(&self) -> f32 {
        self.target_edge_length * 4.0 / 3.0
    }

    /// Edges shorter than this are collapsed
    pub fn min_edge_length(&self) -> f32 {
        self.target_edge_length * 4.0 / 5.0
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_edge_length.is_finite() || self.target_edge_length <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "target edge length must be positive, got {}",
                self.target_edge_length
            )));
        }
        if self.passes == 0 {
            return Err(Error::InvalidConfig(
                "remeshing needs at least one pass".to_string(),
            ));
        }
        if !self.smoothing_speed.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "smoothing speed must be finite, got {}",
                self.smoothing_speed
            )));
        }
        Ok(())
    }
}

/// Result of a remeshing run
#[derive(Debug, Clone)]
pub struct RemeshOutcome {
    pub mesh: TriangleMesh,
    pub original_faces: usize,
    pub final_faces: usize,
    pub splits: usize,
    pub collapses: usize,
    pub flips: usize,
}

/// Split/collapse/flip/relax remesher with back-projection
#[derive(Debug, Clone, Default)]
pub struct IsotropicRemesher {
    params: RemeshParams,
}

impl IsotropicRemesher {
    pub fn new(params: RemeshParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RemeshParams {
        &self.params
    }

    /// Remesh `mesh`, projecting onto the surface of `mesh` itself.
    ///
    /// Needs at least four faces. The result carries no normals.
    pub fn remesh(&self, mesh: &TriangleMesh) -> Result<RemeshOutcome> {
        self.params.validate()?;
        mesh.validate_indices()?;
        if mesh.face_count() < 4 {
            return Err(Error::InvalidData(format!(
                "remeshing needs at least 4 faces, got {}",
                mesh.face_count()
            )));
        }

        let params = &self.params;
        let high = params.max_edge_length();
        let low = params.min_edge_length();
        let speed = params.smoothing_speed.clamp(0.0, 1.0);
        let guard = params.prevent_normal_flips;

        debug!(
            "Remeshing mesh: {} faces, {} vertices, target length: {:.3}, {} passes",
            mesh.face_count(),
            mesh.vertex_count(),
            params.target_edge_length,
            params.passes
        );

        let target = if params.project_to_input {
            Some(ProjectionTarget::new(mesh))
        } else {
            None
        };
        let mut state = RemeshState::from_mesh(mesh);

        let (mut splits, mut collapses, mut flips) = (0, 0, 0);
        for pass in 0..params.passes {
            let s = state.split_long_edges(high);
            let c = state.collapse_short_edges(low, high, guard);
            let f = state.equalize_valences(guard);
            state.relax_tangentially(speed, guard);
            if let Some(target) = &target {
                state.project(target);
            }
            splits += s;
            collapses += c;
            flips += f;
            debug!(
                "Pass {}: {} splits, {} collapses, {} flips",
                pass + 1,
                s,
                c,
                f
            );
        }

        let result = state.into_mesh();
        Ok(RemeshOutcome {
            original_faces: mesh.face_count(),
            final_faces: result.face_count(),
            mesh: result,
            splits,
            collapses,
            flips,
        })
    }
}

// ============================================================
// Working mesh
// ============================================================

/// Indexed mesh with alive flags and vertex-to-face adjacency
struct RemeshState {
    positions: Vec<Point3f>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    vertex_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
}

impl RemeshState {
    fn from_mesh(mesh: &TriangleMesh) -> Self {
        let mut state = RemeshState {
            positions: mesh.vertices.clone(),
            faces: Vec::with_capacity(mesh.face_count()),
            face_alive: Vec::with_capacity(mesh.face_count()),
            vertex_alive: vec![true; mesh.vertex_count()],
            vertex_faces: vec![Vec::new(); mesh.vertex_count()],
        };
        for face in &mesh.faces {
            if face[0] != face[1] && face[1] != face[2] && face[0] != face[2] {
                state.push_face(*face);
            }
        }
        state
    }

    fn push_face(&mut self, face: [usize; 3]) {
        let fi = self.faces.len();
        self.faces.push(face);
        self.face_alive.push(true);
        for &v in &face {
            self.vertex_faces[v].push(fi);
        }
    }

    fn kill_face(&mut self, fi: usize) {
        self.face_alive[fi] = false;
        let face = self.faces[fi];
        for &v in &face {
            self.vertex_faces[v].retain(|&f| f != fi);
        }
    }

    fn add_vertex(&mut self, p: Point3f) -> usize {
        self.positions.push(p);
        self.vertex_alive.push(true);
        self.vertex_faces.push(Vec::new());
        self.positions.len() - 1
    }

    /// Alive faces containing both `a` and `b`
    fn edge_faces(&self, a: usize, b: usize) -> Vec<usize> {
        self.vertex_faces[a]
            .iter()
            .copied()
            .filter(|&fi| self.faces[fi].contains(&b))
            .collect()
    }

    fn neighbors(&self, v: usize) -> BTreeSet<usize> {
        self.vertex_faces[v]
            .iter()
            .flat_map(|&fi| self.faces[fi])
            .filter(|&n| n != v)
            .collect()
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.neighbors(v)
            .into_iter()
            .any(|n| self.edge_faces(v, n).len() != 2)
    }

    fn valence_target(&self, v: usize) -> i64 {
        if self.is_boundary_vertex(v) {
            4
        } else {
            6
        }
    }

    /// Unique edges of alive faces in ascending key order
    fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = BTreeSet::new();
        for (fi, face) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            for e in 0..3 {
                edges.insert(sorted_edge(face[e], face[(e + 1) % 3]));
            }
        }
        edges.into_iter().collect()
    }

    fn edge_length_sq(&self, a: usize, b: usize) -> f32 {
        (self.positions[a] - self.positions[b]).norm_squared()
    }

    fn face_cross(&self, face: &[usize; 3]) -> Vector3f {
        face_cross(
            &self.positions[face[0]],
            &self.positions[face[1]],
            &self.positions[face[2]],
        )
    }

    // ---- split ----

    fn split_long_edges(&mut self, max_length: f32) -> usize {
        let max_sq = max_length * max_length;
        let mut candidates: Vec<(usize, usize, f32)> = self
            .edges()
            .into_iter()
            .map(|(a, b)| (a, b, self.edge_length_sq(a, b)))
            .filter(|&(_, _, l)| l > max_sq)
            .collect();
        // Longest first; the stable sort keeps key order among ties
        candidates.sort_by(|x, y| y.2.total_cmp(&x.2));

        let mut splits = 0;
        for (a, b, _) in candidates {
            if self.edge_length_sq(a, b) <= max_sq {
                continue;
            }
            if self.split_edge(a, b) {
                splits += 1;
            }
        }
        splits
    }

    /// Insert the midpoint of `(a, b)` and split every face on the edge in two,
    /// keeping each face's winding.
    fn split_edge(&mut self, a: usize, b: usize) -> bool {
        let adjacent = self.edge_faces(a, b);
        if adjacent.is_empty() {
            return false;
        }

        let mid = self.add_vertex(nalgebra::center(&self.positions[a], &self.positions[b]));
        for fi in adjacent {
            let Some((p, q, c)) = oriented_edge(&self.faces[fi], a, b) else {
                continue;
            };
            self.kill_face(fi);
            self.push_face([p, mid, c]);
            self.push_face([mid, q, c]);
        }
        true
    }

    // ---- collapse ----

    fn collapse_short_edges(&mut self, min_length: f32, max_length: f32, guard: bool) -> usize {
        let min_sq = min_length * min_length;
        let max_sq = max_length * max_length;
        let mut candidates: Vec<(usize, usize, f32)> = self
            .edges()
            .into_iter()
            .map(|(a, b)| (a, b, self.edge_length_sq(a, b)))
            .filter(|&(_, _, l)| l < min_sq)
            .collect();
        candidates.sort_by(|x, y| x.2.total_cmp(&y.2));

        let mut collapses = 0;
        for (a, b, _) in candidates {
            if !self.vertex_alive[a] || !self.vertex_alive[b] {
                continue;
            }
            if self.edge_length_sq(a, b) >= min_sq {
                continue;
            }
            let midpoint = nalgebra::center(&self.positions[a], &self.positions[b]);
            if self.can_collapse(a, b, &midpoint, max_sq, guard) {
                self.collapse_edge(a, b, midpoint);
                collapses += 1;
            }
        }
        collapses
    }

    fn can_collapse(&self, a: usize, b: usize, target: &Point3f, max_sq: f32, guard: bool) -> bool {
        let adjacent = self.edge_faces(a, b);
        if adjacent.len() != 2 {
            return false;
        }
        if self.is_boundary_vertex(a) || self.is_boundary_vertex(b) {
            return false;
        }

        // Link condition, and no apex left with two coincident faces
        let na = self.neighbors(a);
        let nb = self.neighbors(b);
        let common: Vec<usize> = na.intersection(&nb).copied().collect();
        if common.len() != 2 || common.iter().any(|&c| self.neighbors(c).len() <= 3) {
            return false;
        }

        // No new edge longer than the split threshold
        if na
            .iter()
            .chain(nb.iter())
            .filter(|&&n| n != a && n != b)
            .any(|&n| (self.positions[n] - target).norm_squared() > max_sq)
        {
            return false;
        }

        !guard || !self.moves_flip_faces(&[a, b], target)
    }

    /// Whether moving every vertex in `moved` to `target` turns over or
    /// flattens a surviving face around them.
    fn moves_flip_faces(&self, moved: &[usize], target: &Point3f) -> bool {
        for &v in moved {
            for &fi in &self.vertex_faces[v] {
                let face = self.faces[fi];
                if moved.iter().filter(|&&m| face.contains(&m)).count() > 1 {
                    continue;
                }
                let old = self.face_cross(&face);
                let old_area2 = old.norm_squared();
                if old_area2 <= f32::MIN_POSITIVE {
                    continue;
                }
                let p = face.map(|u| if u == v { *target } else { self.positions[u] });
                let new = face_cross(&p[0], &p[1], &p[2]);
                if new.norm_squared() <= f32::EPSILON * old_area2 || old.dot(&new) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    /// Merge `b` into `a` at `target`
    fn collapse_edge(&mut self, a: usize, b: usize, target: Point3f) {
        self.positions[a] = target;
        let b_faces = self.vertex_faces[b].clone();
        for fi in b_faces {
            if self.faces[fi].contains(&a) {
                self.kill_face(fi);
            } else {
                for v in self.faces[fi].iter_mut() {
                    if *v == b {
                        *v = a;
                    }
                }
                self.vertex_faces[a].push(fi);
            }
        }
        self.vertex_faces[b].clear();
        self.vertex_alive[b] = false;
    }

    // ---- flip ----

    fn equalize_valences(&mut self, guard: bool) -> usize {
        let mut flips = 0;
        for (a, b) in self.edges() {
            let adjacent = self.edge_faces(a, b);
            if adjacent.len() != 2 {
                continue;
            }
            let (f1, f2) = (adjacent[0], adjacent[1]);
            let Some((p, q, c)) = oriented_edge(&self.faces[f1], a, b) else {
                continue;
            };
            // The second face must run the edge the other way
            let Some((q2, p2, d)) = oriented_edge(&self.faces[f2], a, b) else {
                continue;
            };
            if q2 != q || p2 != p || c == d {
                continue;
            }
            if !self.edge_faces(c, d).is_empty() {
                continue;
            }

            let val = |v: usize| self.neighbors(v).len() as i64;
            let (vp, vq, vc, vd) = (val(p), val(q), val(c), val(d));
            if vp <= 3 || vq <= 3 {
                continue;
            }
            let (tp, tq, tc, td) = (
                self.valence_target(p),
                self.valence_target(q),
                self.valence_target(c),
                self.valence_target(d),
            );
            let before = (vp - tp).abs() + (vq - tq).abs() + (vc - tc).abs() + (vd - td).abs();
            let after = (vp - 1 - tp).abs()
                + (vq - 1 - tq).abs()
                + (vc + 1 - tc).abs()
                + (vd + 1 - td).abs();
            if after >= before {
                continue;
            }

            let new1 = [c, p, d];
            let new2 = [c, d, q];
            if guard && !self.flip_keeps_orientation(f1, f2, &new1, &new2) {
                continue;
            }

            self.kill_face(f1);
            self.kill_face(f2);
            self.push_face(new1);
            self.push_face(new2);
            flips += 1;
        }
        flips
    }

    fn flip_keeps_orientation(
        &self,
        f1: usize,
        f2: usize,
        new1: &[usize; 3],
        new2: &[usize; 3],
    ) -> bool {
        let reference = self.face_cross(&self.faces[f1]) + self.face_cross(&self.faces[f2]);
        let n1 = self.face_cross(new1);
        let n2 = self.face_cross(new2);
        let tiny = f32::EPSILON * reference.norm_squared();
        n1.norm_squared() > tiny
            && n2.norm_squared() > tiny
            && n1.dot(&reference) > 0.0
            && n2.dot(&reference) > 0.0
            && n1.dot(&n2) > 0.0
    }

    // ---- relax ----

    fn relax_tangentially(&mut self, speed: f32, guard: bool) {
        if speed == 0.0 {
            return;
        }
        for v in 0..self.positions.len() {
            if !self.vertex_alive[v] || self.vertex_faces[v].is_empty() {
                continue;
            }
            if self.is_boundary_vertex(v) {
                continue;
            }

            let neighbors = self.neighbors(v);
            let centroid = neighbors
                .iter()
                .fold(Vector3f::zeros(), |acc, &n| acc + self.positions[n].coords)
                / neighbors.len() as f32;

            let normal = self.vertex_faces[v]
                .iter()
                .fold(Vector3f::zeros(), |acc, &fi| acc + self.face_cross(&self.faces[fi]));
            let Some(normal) = normal.try_normalize(f32::EPSILON) else {
                continue;
            };

            let delta = centroid - self.positions[v].coords;
            let tangential = delta - normal * normal.dot(&delta);
            let target = self.positions[v] + tangential * speed;

            if guard && self.moves_flip_faces(&[v], &target) {
                continue;
            }
            self.positions[v] = target;
        }
    }

    // ---- project ----

    fn project(&mut self, target: &ProjectionTarget) {
        for v in 0..self.positions.len() {
            if !self.vertex_alive[v] || self.vertex_faces[v].is_empty() {
                continue;
            }
            if let Some(p) = target.closest_point(&self.positions[v]) {
                self.positions[v] = p;
            }
        }
    }

    /// Compact alive faces and their vertices into a mesh
    fn into_mesh(self) -> TriangleMesh {
        let mut remap: HashMap<usize, usize> = HashMap::new();
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for (fi, face) in self.faces.iter().enumerate() {
            if !self.face_alive[fi] {
                continue;
            }
            let mapped = face.map(|v| {
                *remap.entry(v).or_insert_with(|| {
                    vertices.push(self.positions[v]);
                    vertices.len() - 1
                })
            });
            faces.push(mapped);
        }

        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }
}

#[inline]
fn sorted_edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[inline]
fn face_cross(a: &Point3f, b: &Point3f, c: &Point3f) -> Vector3f {
    (b - a).cross(&(c - a))
}

/// Rotate `face` so it reads `(p, q, c)` with `{p, q} == {a, b}` in winding order
fn oriented_edge(face: &[usize; 3], a: usize, b: usize) -> Option<(usize, usize, usize)> {
    (0..3).find_map(|i| {
        let (p, q, c) = (face[i], face[(i + 1) % 3], face[(i + 2) % 3]);
        ((p == a && q == b) || (p == b && q == a)).then_some((p, q, c))
    })
}

// ============================================================
// Back-projection onto the input surface
// ============================================================

/// Input triangle indexed by its bounding box
#[derive(Debug, Clone)]
struct SurfaceTriangle {
    corners: [Point3f; 3],
}

impl SurfaceTriangle {
    fn closest_point(&self, p: &Point3f) -> Point3f {
        closest_point_on_triangle(p, &self.corners[0], &self.corners[1], &self.corners[2])
    }
}

impl RTreeObject for SurfaceTriangle {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        let [a, b, c] = self.corners;
        AABB::from_corners(
            [a.x.min(b.x).min(c.x), a.y.min(b.y).min(c.y), a.z.min(b.z).min(c.z)],
            [a.x.max(b.x).max(c.x), a.y.max(b.y).max(c.y), a.z.max(b.z).max(c.z)],
        )
    }
}

impl PointDistance for SurfaceTriangle {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let p = Point3f::from(*point);
        (self.closest_point(&p) - p).norm_squared()
    }
}

/// R*-tree over the faces of the mesh being remeshed
struct ProjectionTarget {
    tree: RTree<SurfaceTriangle>,
}

impl ProjectionTarget {
    fn new(mesh: &TriangleMesh) -> Self {
        let triangles = mesh
            .faces
            .iter()
            .map(|f| SurfaceTriangle {
                corners: f.map(|v| mesh.vertices[v]),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(triangles),
        }
    }

    fn closest_point(&self, p: &Point3f) -> Option<Point3f> {
        self.tree
            .nearest_neighbor(&[p.x, p.y, p.z])
            .map(|t| t.closest_point(p))
    }
}

/// Closest point on triangle `(a, b, c)` to `p` (Ericson, Real-Time
/// Collision Detection, 5.1.5).
pub fn closest_point_on_triangle(p: &Point3f, a: &Point3f, b: &Point3f, c: &Point3f) -> Point3f {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() <= f32::MIN_POSITIVE {
        // Degenerate triangle
        return *a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Outward-wound axis-aligned box with two triangles per side
    fn make_box(size: f32) -> TriangleMesh {
        let s = size;
        let vertices = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(s, 0.0, 0.0),
            Point3f::new(s, s, 0.0),
            Point3f::new(0.0, s, 0.0),
            Point3f::new(0.0, 0.0, s),
            Point3f::new(s, 0.0, s),
            Point3f::new(s, s, s),
            Point3f::new(0.0, s, s),
        ];
        let faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    fn edge_lengths(mesh: &TriangleMesh) -> Vec<f32> {
        mesh.faces
            .iter()
            .flat_map(|f| {
                (0..3).map(move |e| (mesh.vertices[f[e]] - mesh.vertices[f[(e + 1) % 3]]).norm())
            })
            .collect()
    }

    #[test]
    fn test_params_defaults_and_thresholds() {
        let params = RemeshParams::default();
        assert_eq!(params.target_edge_length, 5.5);
        assert_eq!(params.passes, 20);
        assert_eq!(params.smoothing_speed, 1.0);
        assert_relative_eq!(params.max_edge_length(), 5.5 * 4.0 / 3.0);
        assert_relative_eq!(params.min_edge_length(), 5.5 * 0.8);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            RemeshParams::with_edge_length(0.0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(RemeshParams::new().with_passes(0).validate().is_err());
        assert!(RemeshParams::new()
            .with_smoothing_speed(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_too_small_mesh_is_rejected() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let remesher = IsotropicRemesher::default();
        assert!(matches!(remesher.remesh(&mesh), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_refines_box_toward_target_length() {
        let mesh = make_box(4.0);
        let remesher = IsotropicRemesher::new(RemeshParams::with_edge_length(1.0).with_passes(5));
        let outcome = remesher.remesh(&mesh).unwrap();

        assert!(outcome.splits > 0);
        assert!(outcome.final_faces > 12);
        assert!(outcome.mesh.validate_indices().is_ok());

        let lengths = edge_lengths(&outcome.mesh);
        let max = lengths.iter().copied().fold(0.0, f32::max);
        assert!(max < 4.0, "longest edge {} should shrink", max);

        // Still a closed, outward box; relaxation may only shave the corners
        let volume = outcome.mesh.signed_volume();
        assert!(volume > 48.0 && volume < 64.01, "volume {}", volume);
    }

    #[test]
    fn test_vertices_stay_on_input_surface() {
        let mesh = make_box(4.0);
        let remesher = IsotropicRemesher::new(RemeshParams::with_edge_length(1.5).with_passes(3));
        let outcome = remesher.remesh(&mesh).unwrap();

        for p in &outcome.mesh.vertices {
            let on_face = [p.x, p.y, p.z]
                .iter()
                .any(|&c| c.abs() < 1e-3 || (c - 4.0).abs() < 1e-3);
            assert!(on_face, "vertex {:?} left the box surface", p);
        }
    }

    #[test]
    fn test_coarsens_dense_mesh() {
        // Refine first, then remesh at a larger length
        let dense = IsotropicRemesher::new(RemeshParams::with_edge_length(0.5).with_passes(4))
            .remesh(&make_box(4.0))
            .unwrap()
            .mesh;
        let outcome = IsotropicRemesher::new(RemeshParams::with_edge_length(2.0).with_passes(4))
            .remesh(&dense)
            .unwrap();
        assert!(outcome.collapses > 0);
        assert!(outcome.final_faces < dense.face_count());
    }

    #[test]
    fn test_deterministic() {
        let mesh = make_box(3.0);
        let remesher = IsotropicRemesher::new(RemeshParams::with_edge_length(0.8).with_passes(3));
        let a = remesher.remesh(&mesh).unwrap();
        let b = remesher.remesh(&mesh).unwrap();
        assert_eq!(a.mesh, b.mesh);
    }

    #[test]
    fn test_split_edge_preserves_winding() {
        let mesh = make_box(1.0);
        let mut state = RemeshState::from_mesh(&mesh);
        assert!(state.split_edge(0, 2));
        let out = state.into_mesh();
        assert_eq!(out.face_count(), 14);
        assert_relative_eq!(out.signed_volume(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_closest_point_on_triangle() {
        let a = Point3f::new(0.0, 0.0, 0.0);
        let b = Point3f::new(1.0, 0.0, 0.0);
        let c = Point3f::new(0.0, 1.0, 0.0);

        let inside = closest_point_on_triangle(&Point3f::new(0.2, 0.2, 1.0), &a, &b, &c);
        assert_relative_eq!(inside, Point3f::new(0.2, 0.2, 0.0), epsilon = 1e-6);

        let vertex = closest_point_on_triangle(&Point3f::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_eq!(vertex, a);

        let edge = closest_point_on_triangle(&Point3f::new(0.5, -1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(edge, Point3f::new(0.5, 0.0, 0.0), epsilon = 1e-6);
    }
}
