//! Quadric-driven edge collapse
//!
//! Triangles are loaded into a directed-edge connectivity ([`CollapseMesh`])
//! so the one-ring of a vertex, the link condition and the fold test are all
//! local walks. Candidate edges sit in a priority queue keyed by their
//! quadric error and are re-costed lazily when popped.

use crate::quadric_error::Quadric;
use priority_queue::PriorityQueue;
use segmesh_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Marker for a missing link, triangle or vertex slot
const NONE: usize = usize::MAX;

/// Relative cost drift tolerated before a popped candidate is re-queued
const STALE_COST_TOLERANCE: f64 = 1e-9;

/// Directed edge `tail -> head` inside triangle `tri`
#[derive(Debug, Clone, Copy)]
struct Link {
    head: usize,
    mate: usize,
    next: usize,
    prev: usize,
    tri: usize,
}

/// Triangle connectivity that supports in-place vertex merges
struct CollapseMesh {
    links: Vec<Link>,
    /// Some outgoing link per vertex, NONE once the vertex is gone
    vertex_link: Vec<usize>,
    /// First link of each triangle, NONE once the triangle is gone
    tri_link: Vec<usize>,
    live_tris: usize,
    points: Vec<Point3f>,
    normals: Option<Vec<Vector3f>>,
    quadrics: Vec<Quadric>,
    merged: Vec<bool>,
}

impl CollapseMesh {
    fn build(mesh: &TriangleMesh) -> Self {
        let vertex_total = mesh.vertices.len();
        let tri_total = mesh.faces.len();

        let mut links = Vec::with_capacity(tri_total * 3);
        let mut vertex_link = vec![NONE; vertex_total];
        let mut tri_link = Vec::with_capacity(tri_total);

        for (t, corners) in mesh.faces.iter().enumerate() {
            let first = links.len();
            for (k, &tail) in corners.iter().enumerate() {
                let succ = (k + 1) % 3;
                links.push(Link {
                    head: corners[succ],
                    mate: NONE,
                    next: first + succ,
                    prev: first + (k + 2) % 3,
                    tri: t,
                });
                if vertex_link[tail] == NONE {
                    vertex_link[tail] = first + k;
                }
            }
            tri_link.push(first);
        }

        // Only the first directed copy of an edge is pairable; later
        // non-manifold copies behave like border links.
        let mut by_ends: HashMap<(usize, usize), usize> = HashMap::with_capacity(links.len());
        for (l, link) in links.iter().enumerate() {
            by_ends.entry((links[link.prev].head, link.head)).or_insert(l);
        }
        for l in 0..links.len() {
            if links[l].mate != NONE {
                continue;
            }
            let ends = (links[links[l].prev].head, links[l].head);
            if by_ends.get(&ends) != Some(&l) {
                continue;
            }
            if let Some(&m) = by_ends.get(&(ends.1, ends.0)) {
                if links[m].mate == NONE {
                    links[l].mate = m;
                    links[m].mate = l;
                }
            }
        }

        let mut quadrics = vec![Quadric::default(); vertex_total];
        for corners in &mesh.faces {
            let q = Quadric::from_triangle(
                &mesh.vertices[corners[0]],
                &mesh.vertices[corners[1]],
                &mesh.vertices[corners[2]],
            );
            for &v in corners {
                quadrics[v] += q;
            }
        }

        Self {
            links,
            vertex_link,
            tri_link,
            live_tris: tri_total,
            points: mesh.vertices.clone(),
            normals: mesh.normals.clone(),
            quadrics,
            merged: vec![false; vertex_total],
        }
    }

    #[inline]
    fn tail(&self, l: usize) -> usize {
        self.links[self.links[l].prev].head
    }

    #[inline]
    fn is_live(&self, l: usize) -> bool {
        l != NONE && self.links[l].tri != NONE
    }

    fn corners(&self, t: usize) -> Option<[usize; 3]> {
        let l = self.tri_link[t];
        (l != NONE).then(|| {
            let link = self.links[l];
            [self.tail(l), link.head, self.links[link.next].head]
        })
    }

    /// Outgoing links of `v`, swept one way and then the other when the fan
    /// is open.
    fn fan(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_link[v];
        if start == NONE {
            return Vec::new();
        }
        let cap = self.links.len();

        let mut out = vec![start];
        let mut l = start;
        loop {
            let m = self.links[self.links[l].prev].mate;
            if m == NONE {
                break;
            }
            if m == start || out.len() > cap {
                return out;
            }
            out.push(m);
            l = m;
        }

        let m = self.links[start].mate;
        if m != NONE {
            let mut l = self.links[m].next;
            while l != start && out.len() <= cap {
                out.push(l);
                let m = self.links[l].mate;
                if m == NONE {
                    break;
                }
                l = self.links[m].next;
            }
        }
        out
    }

    /// Vertices sharing a triangle with `v`
    fn ring(&self, v: usize) -> HashSet<usize> {
        let mut ring: HashSet<usize> = self
            .fan(v)
            .into_iter()
            .flat_map(|l| [self.links[l].head, self.tail(self.links[l].prev)])
            .collect();
        ring.remove(&v);
        ring
    }

    fn tris_around(&self, v: usize) -> Vec<usize> {
        self.fan(v)
            .into_iter()
            .map(|l| self.links[l].tri)
            .filter(|&t| t != NONE)
            .collect()
    }

    fn on_border(&self, v: usize) -> bool {
        self.fan(v).into_iter().any(|l| {
            self.links[l].mate == NONE || self.links[self.links[l].prev].mate == NONE
        })
    }

    fn link_between(&self, from: usize, to: usize) -> Option<usize> {
        self.fan(from)
            .into_iter()
            .find(|&l| self.links[l].head == to)
    }

    /// Link condition for merging `a` and `b`: the shared one-ring must be
    /// exactly the apices of the triangles on the edge, and no interior apex
    /// may drop below valence three.
    fn can_merge(&self, a: usize, b: usize) -> bool {
        let Some(l) = self.link_between(a, b) else {
            return false;
        };
        let border = self.links[l].mate == NONE;
        let ring_b = self.ring(b);
        let shared: Vec<usize> = self
            .ring(a)
            .into_iter()
            .filter(|v| ring_b.contains(v))
            .collect();

        shared.len() == if border { 1 } else { 2 }
            && (border || shared.iter().all(|&apex| self.ring(apex).len() > 3))
    }

    /// Combined quadric optimum for the edge and its error
    fn merge_target(&self, a: usize, b: usize) -> (Point3f, f64) {
        (self.quadrics[a] + self.quadrics[b]).collapse_target(&self.points[a], &self.points[b])
    }

    /// True when moving `a` and `b` to `to` would turn over or flatten a
    /// triangle that outlives the merge.
    fn folds(&self, a: usize, b: usize, to: &Point3f) -> bool {
        let mut tris = self.tris_around(a);
        tris.extend(self.tris_around(b));

        tris.into_iter()
            .filter_map(|t| self.corners(t))
            .filter(|c| !(c.contains(&a) && c.contains(&b)))
            .any(|c| {
                let before = c.map(|v| self.points[v]);
                let after = c.map(|v| if v == a || v == b { *to } else { self.points[v] });
                let n_before = (before[1] - before[0]).cross(&(before[2] - before[0]));
                let n_after = (after[1] - after[0]).cross(&(after[2] - after[0]));
                let area2 = n_before.norm_squared();
                area2 > f32::MIN_POSITIVE
                    && (n_after.norm_squared() <= f32::EPSILON * area2
                        || n_before.dot(&n_after) <= 0.0)
            })
    }

    fn scan_outgoing(&self, v: usize) -> usize {
        (0..self.links.len())
            .find(|&l| self.links[l].tri != NONE && self.tail(l) == v)
            .unwrap_or(NONE)
    }

    /// Drop the triangle owning `l`, stitching the mates of its other two
    /// links together.
    fn retire_tri(&mut self, l: usize, next_mate: usize, prev_mate: usize) {
        if next_mate != NONE {
            self.links[next_mate].mate = prev_mate;
        }
        if prev_mate != NONE {
            self.links[prev_mate].mate = next_mate;
        }
        let Link { next, prev, tri, .. } = self.links[l];
        for k in [l, next, prev] {
            self.links[k].tri = NONE;
        }
        self.tri_link[tri] = NONE;
        self.live_tris -= 1;
    }

    /// Point `v` at a live outgoing link if its current one died
    fn reanchor(&mut self, v: usize, preferred: usize) {
        let current = self.vertex_link[v];
        if current == NONE || self.links[current].tri != NONE {
            return;
        }
        self.vertex_link[v] = if self.is_live(preferred) {
            preferred
        } else {
            self.scan_outgoing(v)
        };
    }

    /// Fold `b` into `a`, placing the survivor at `to`
    fn merge(&mut self, a: usize, b: usize, to: Point3f) -> bool {
        let Some(l) = self.link_between(a, b) else {
            return false;
        };
        let Link { mate: back, next, prev, .. } = self.links[l];
        let (next_mate, prev_mate) = (self.links[next].mate, self.links[prev].mate);
        let apex = self.links[next].head;

        let far = (back != NONE).then(|| {
            let Link { next: bn, prev: bp, .. } = self.links[back];
            (self.links[bn].mate, self.links[bp].mate, self.links[bn].head)
        });

        let b_fan = self.fan(b);

        self.retire_tri(l, next_mate, prev_mate);
        if let Some((bn_mate, bp_mate, _)) = far {
            self.retire_tri(back, bn_mate, bp_mate);
        }

        for &out in &b_fan {
            let into = self.links[out].prev;
            self.links[into].head = a;
            let m = self.links[out].mate;
            if self.is_live(m) {
                self.links[m].head = a;
            }
        }

        self.reanchor(a, prev_mate);
        self.reanchor(apex, next_mate);
        if let Some((bn_mate, _, far_apex)) = far {
            if far_apex != apex {
                self.reanchor(far_apex, bn_mate);
            }
        }

        self.vertex_link[b] = NONE;
        self.merged[b] = true;
        self.points[a] = to;
        let qb = self.quadrics[b];
        self.quadrics[a] += qb;
        if let Some(normals) = self.normals.as_mut() {
            if let Some(n) = (normals[a] + normals[b]).try_normalize(f32::EPSILON) {
                normals[a] = n;
            }
        }
        true
    }

    fn to_mesh(&self) -> TriangleMesh {
        let mut remap = vec![NONE; self.points.len()];
        let mut points = Vec::new();
        let mut normals = self.normals.as_ref().map(|_| Vec::new());

        for v in 0..self.points.len() {
            if self.merged[v] || self.vertex_link[v] == NONE {
                continue;
            }
            remap[v] = points.len();
            points.push(self.points[v]);
            if let (Some(out), Some(src)) = (normals.as_mut(), self.normals.as_ref()) {
                out.push(src[v]);
            }
        }

        let faces: Vec<[usize; 3]> = (0..self.tri_link.len())
            .filter_map(|t| self.corners(t))
            .map(|c| c.map(|v| remap[v]))
            .filter(|c| !c.contains(&NONE) && c[0] != c[1] && c[1] != c[2] && c[2] != c[0])
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(points, faces);
        if let Some(normals) = normals {
            mesh.set_normals(normals);
        }
        mesh.remove_unreferenced_vertices();
        mesh
    }
}

/// Queued edge with the cost it had when pushed
#[derive(Debug, Clone)]
struct Candidate {
    a: usize,
    b: usize,
    cost: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-queue pops the cheapest edge
        other.cost.total_cmp(&self.cost)
    }
}

/// Guards one sweep runs with
#[derive(Debug, Clone, Copy)]
struct Guards {
    max_error: Option<f64>,
    keep_border: bool,
    border_penalty: f64,
    no_folds: bool,
}

/// Insertion-ordered candidates; the sequence id breaks cost ties
struct CandidateQueue {
    heap: PriorityQueue<usize, Candidate>,
    seq: usize,
}

impl CandidateQueue {
    fn new() -> Self {
        Self {
            heap: PriorityQueue::new(),
            seq: 0,
        }
    }

    fn push(&mut self, a: usize, b: usize, cost: f64) {
        self.heap.push(self.seq, Candidate { a, b, cost });
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop().map(|(_, c)| c)
    }
}

/// Result of reducing a mesh toward a triangle budget
#[derive(Debug, Clone)]
pub struct ReductionOutcome {
    pub mesh: TriangleMesh,
    pub original_faces: usize,
    pub final_faces: usize,
    pub collapses: usize,
    /// Whether the final face count is within the requested budget
    pub reached_target: bool,
}

impl fmt::Display for ReductionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reduction: {} -> {} triangles ({} collapses)",
            self.original_faces, self.final_faces, self.collapses
        )
    }
}

/// Quadric error decimation by repeated edge collapse.
///
/// Border edges are either frozen or charged `boundary_weight` on top of
/// their quadric error. Collapses that would fold a surviving triangle are
/// skipped unless `prevent_normal_flips` is off.
#[derive(Debug, Clone)]
pub struct EdgeCollapseSimplifier {
    /// Stop once the cheapest collapse costs more than this
    pub error_threshold: Option<f64>,
    pub preserve_boundary: bool,
    pub boundary_weight: f64,
    pub prevent_normal_flips: bool,
}

impl Default for EdgeCollapseSimplifier {
    fn default() -> Self {
        Self {
            error_threshold: None,
            preserve_boundary: true,
            boundary_weight: 100.0,
            prevent_normal_flips: true,
        }
    }
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_threshold(mut self, threshold: Option<f64>) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Freeze border edges, or let them collapse at `weight` extra cost
    pub fn with_boundary(mut self, preserve: bool, weight: f64) -> Self {
        self.preserve_boundary = preserve;
        self.boundary_weight = weight;
        self
    }

    pub fn with_normal_flip_guard(mut self, enabled: bool) -> Self {
        self.prevent_normal_flips = enabled;
        self
    }

    fn guards(&self) -> Guards {
        Guards {
            max_error: self.error_threshold,
            keep_border: self.preserve_boundary,
            border_penalty: self.boundary_weight,
            no_folds: self.prevent_normal_flips,
        }
    }

    fn cost(mesh: &CollapseMesh, guards: &Guards, a: usize, b: usize) -> Option<f64> {
        let border = mesh.on_border(a) || mesh.on_border(b);
        if border && guards.keep_border {
            return None;
        }
        let (_, error) = mesh.merge_target(a, b);
        Some(if border { error + guards.border_penalty } else { error })
    }

    fn queue_fan(mesh: &CollapseMesh, guards: &Guards, v: usize, queue: &mut CandidateQueue) {
        for l in mesh.fan(v) {
            if !mesh.is_live(l) {
                continue;
            }
            let w = mesh.links[l].head;
            if let Some(cost) = Self::cost(mesh, guards, v, w) {
                queue.push(v, w, cost);
            }
        }
    }

    /// Merge cheapest-first until at most `budget` triangles remain or no
    /// candidate is left; returns the number of merges.
    fn sweep(mesh: &mut CollapseMesh, budget: usize, guards: &Guards) -> usize {
        let mut queue = CandidateQueue::new();
        let mut seen = HashSet::new();
        for v in 0..mesh.points.len() {
            if mesh.merged[v] || mesh.vertex_link[v] == NONE {
                continue;
            }
            for l in mesh.fan(v) {
                if !mesh.is_live(l) {
                    continue;
                }
                let w = mesh.links[l].head;
                if seen.insert((v.min(w), v.max(w))) {
                    if let Some(cost) = Self::cost(mesh, guards, v, w) {
                        queue.push(v, w, cost);
                    }
                }
            }
        }

        let mut merges = 0;
        while mesh.live_tris > budget {
            let Some(Candidate { a, b, cost: queued }) = queue.pop() else {
                break;
            };
            let alive = |v: usize| !mesh.merged[v] && mesh.vertex_link[v] != NONE;
            if !alive(a) || !alive(b) || mesh.link_between(a, b).is_none() {
                continue;
            }

            let Some(cost) = Self::cost(mesh, guards, a, b) else {
                continue;
            };
            let scale = cost.abs().max(queued.abs()).max(1.0);
            if (cost - queued).abs() > STALE_COST_TOLERANCE * scale {
                queue.push(a, b, cost);
                continue;
            }
            if guards.max_error.is_some_and(|max| cost > max) {
                break;
            }
            if !mesh.can_merge(a, b) {
                continue;
            }

            let (to, _) = mesh.merge_target(a, b);
            if guards.no_folds && mesh.folds(a, b, &to) {
                continue;
            }
            if mesh.merge(a, b, to) {
                merges += 1;
                Self::queue_fan(mesh, guards, a, &mut queue);
            }
        }
        merges
    }

    /// Reduce a mesh to at most `target_faces` triangles.
    ///
    /// Meshes already within budget (including the empty mesh) come back
    /// unchanged. If the guarded sweep stalls above budget, a second sweep
    /// runs with the border and fold guards lifted.
    pub fn reduce_to_triangle_count(
        &self,
        mesh: &TriangleMesh,
        target_faces: usize,
    ) -> Result<ReductionOutcome> {
        if target_faces == 0 {
            return Err(Error::InvalidData(
                "Target triangle count must be positive".to_string(),
            ));
        }
        mesh.validate_indices()?;

        let original_faces = mesh.face_count();
        if original_faces <= target_faces {
            return Ok(ReductionOutcome {
                mesh: mesh.clone(),
                original_faces,
                final_faces: original_faces,
                collapses: 0,
                reached_target: true,
            });
        }

        info!(
            "Reducing {} triangles to at most {}",
            original_faces, target_faces
        );

        let mut work = CollapseMesh::build(mesh);
        let guards = self.guards();
        let mut collapses = Self::sweep(&mut work, target_faces, &guards);

        if work.live_tris > target_faces {
            debug!(
                "Guarded sweep stalled at {} triangles (target {}), retrying without guards",
                work.live_tris, target_faces
            );
            let relaxed = Guards {
                max_error: None,
                keep_border: false,
                no_folds: false,
                ..guards
            };
            collapses += Self::sweep(&mut work, target_faces, &relaxed);
        }

        let reduced = work.to_mesh();
        let final_faces = reduced.face_count();
        let reached_target = final_faces <= target_faces;
        if !reached_target {
            warn!(
                "Could not reduce mesh to {} triangles, stopped at {}",
                target_faces, final_faces
            );
        }

        let outcome = ReductionOutcome {
            mesh: reduced,
            original_faces,
            final_faces,
            collapses,
            reached_target,
        };
        info!("{}", outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn tetrahedron() -> TriangleMesh {
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

    /// `n` by `n` vertex sheet in the z = 0 plane
    fn sheet(n: usize) -> TriangleMesh {
        let vertices = (0..n * n)
            .map(|i| Point3f::new((i % n) as f32, (i / n) as f32, 0.0))
            .collect();
        let mut faces = Vec::new();
        for row in 0..n - 1 {
            for col in 0..n - 1 {
                let lo = row * n + col;
                let hi = lo + n;
                faces.push([lo, hi, lo + 1]);
                faces.push([lo + 1, hi, hi + 1]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    /// Closed, outward-wound UV sphere of unit radius
    fn globe(rings: usize, segments: usize) -> TriangleMesh {
        use std::f32::consts::PI;
        let mut vertices = vec![Point3f::new(0.0, 0.0, 1.0)];
        for r in 1..rings {
            let theta = PI * r as f32 / rings as f32;
            vertices.extend((0..segments).map(|s| {
                let phi = 2.0 * PI * s as f32 / segments as f32;
                Point3f::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
            }));
        }
        let south = vertices.len();
        vertices.push(Point3f::new(0.0, 0.0, -1.0));

        let at = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
        let mut faces = Vec::new();
        for s in 0..segments {
            faces.push([0, at(1, s), at(1, s + 1)]);
            faces.push([south, at(rings - 1, s + 1), at(rings - 1, s)]);
        }
        for r in 1..rings - 1 {
            for s in 0..segments {
                faces.push([at(r, s), at(r + 1, s), at(r + 1, s + 1)]);
                faces.push([at(r, s), at(r + 1, s + 1), at(r, s + 1)]);
            }
        }
        TriangleMesh::from_vertices_and_faces(vertices, faces)
    }

    #[test]
    fn test_builders() {
        let s = EdgeCollapseSimplifier::new();
        assert!(s.preserve_boundary && s.prevent_normal_flips);
        assert!(s.error_threshold.is_none());

        let s = s
            .with_error_threshold(Some(0.01))
            .with_boundary(false, 50.0)
            .with_normal_flip_guard(false);
        assert_eq!(s.error_threshold, Some(0.01));
        assert!(!s.preserve_boundary);
        assert!(!s.prevent_normal_flips);
        assert_eq!(s.boundary_weight, 50.0);
    }

    #[test]
    fn test_closed_mesh_links_are_all_paired() {
        let m = CollapseMesh::build(&tetrahedron());
        assert_eq!(m.links.len(), 12);
        assert_eq!(m.live_tris, 4);
        assert!(m.links.iter().all(|l| l.mate != NONE));
        for v in 0..4 {
            assert_eq!(m.ring(v).len(), 3);
            assert_eq!(m.tris_around(v).len(), 3);
            assert!(!m.on_border(v));
        }
    }

    #[test]
    fn test_lone_triangle_is_all_border() {
        let m = CollapseMesh::build(&triangle());
        assert!(m.links.iter().all(|l| l.mate == NONE));
        assert!((0..3).all(|v| m.on_border(v)));
        assert_eq!(m.ring(0).len(), 2);
    }

    #[test]
    fn test_sheet_interior_vertex_has_full_fan() {
        let m = CollapseMesh::build(&sheet(3));
        // Center of a 3x3 sheet touches six triangles
        assert_eq!(m.tris_around(4).len(), 6);
        assert_eq!(m.ring(4).len(), 6);
        assert!(!m.on_border(4));
        assert!(m.on_border(0));
    }

    #[test]
    fn test_tetrahedron_edges_fail_link_condition() {
        let m = CollapseMesh::build(&tetrahedron());
        assert!(!m.can_merge(0, 1));
        assert!(!m.can_merge(1, 2));
    }

    #[test]
    fn test_fold_detection() {
        let m = CollapseMesh::build(&sheet(3));
        assert!(m.folds(4, 5, &Point3f::new(1.5, 3.0, 0.0)));
        assert!(!m.folds(4, 5, &Point3f::new(1.5, 1.0, 0.0)));
    }

    #[test]
    fn test_merge_keeps_connectivity_consistent() {
        let mut m = CollapseMesh::build(&globe(6, 8));
        let before = m.live_tris;
        let b = *m.ring(0).iter().min().unwrap();
        assert!(m.can_merge(0, b));

        let (to, _) = m.merge_target(0, b);
        assert!(m.merge(0, b, to));
        assert_eq!(m.live_tris, before - 2);
        assert!(m.merged[b]);

        for (l, link) in m.links.iter().enumerate() {
            if link.tri != NONE && link.mate != NONE {
                assert_eq!(m.links[link.mate].mate, l);
                assert_eq!(m.links[link.mate].head, m.tail(l));
            }
        }
        assert_eq!(m.to_mesh().face_count(), before - 2);
    }

    /// Guarded sweep alone, without the relaxed fallback
    fn guarded(s: &EdgeCollapseSimplifier, mesh: &TriangleMesh, budget: usize) -> TriangleMesh {
        let mut work = CollapseMesh::build(mesh);
        EdgeCollapseSimplifier::sweep(&mut work, budget, &s.guards());
        work.to_mesh()
    }

    #[test]
    fn test_argument_checks() {
        let s = EdgeCollapseSimplifier::new();
        let mut broken = triangle();
        broken.faces.push([0, 1, 7]);
        assert!(matches!(
            s.reduce_to_triangle_count(&broken, 1),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            s.reduce_to_triangle_count(&triangle(), 0),
            Err(Error::InvalidData(_))
        ));

        let empty = s.reduce_to_triangle_count(&TriangleMesh::new(), 10).unwrap();
        assert!(empty.mesh.is_empty());
        assert!(empty.reached_target);
    }

    #[test]
    fn test_guarded_sweep_shrinks_sheet() {
        let mesh = sheet(6);
        assert_eq!(mesh.face_count(), 50);
        let result = guarded(&EdgeCollapseSimplifier::new(), &mesh, 25);
        assert!(result.face_count() > 0 && result.face_count() < 50);

        let s = EdgeCollapseSimplifier::new().with_boundary(false, 0.0);
        assert_eq!(guarded(&s, &tetrahedron(), 2).face_count(), 4);
    }

    #[test]
    fn test_sheet_border_survives() {
        let mesh = sheet(6);
        let key = |p: &Point3f| ((p.x * 100.0).round() as i32, (p.y * 100.0).round() as i32);
        let border: HashSet<_> = mesh
            .vertices
            .iter()
            .filter(|p| p.x == 0.0 || p.y == 0.0 || p.x == 5.0 || p.y == 5.0)
            .map(key)
            .collect();

        let result = guarded(&EdgeCollapseSimplifier::new(), &mesh, 25);
        let kept: HashSet<_> = result.vertices.iter().map(key).collect();
        let ratio = border.intersection(&kept).count() as f32 / border.len() as f32;
        assert!(ratio > 0.9, "only {:.0}% of the border kept", ratio * 100.0);
    }

    #[test]
    fn test_tight_error_threshold_stops_early() {
        let s = EdgeCollapseSimplifier::new()
            .with_error_threshold(Some(1e-4))
            .with_boundary(false, 0.0);
        assert!(guarded(&s, &sheet(6), 0).face_count() > 0);
    }

    #[test]
    fn test_sphere_reaches_budget() {
        let mesh = globe(16, 24);
        assert!(mesh.face_count() > 600);

        let outcome = EdgeCollapseSimplifier::new()
            .reduce_to_triangle_count(&mesh, 200)
            .unwrap();
        assert!(outcome.reached_target);
        assert!(outcome.final_faces <= 200);
        assert_eq!(outcome.final_faces, outcome.mesh.face_count());
        outcome.mesh.validate_indices().unwrap();
        assert!(outcome.mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_within_budget_is_untouched() {
        let mesh = globe(6, 8);
        let outcome = EdgeCollapseSimplifier::new()
            .reduce_to_triangle_count(&mesh, mesh.face_count())
            .unwrap();
        assert_eq!(outcome.mesh, mesh);
        assert_eq!(outcome.collapses, 0);
    }

    #[test]
    fn test_reduction_is_deterministic() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = globe(12, 16);
        let a = s.reduce_to_triangle_count(&mesh, 100).unwrap();
        let b = s.reduce_to_triangle_count(&mesh, 100).unwrap();
        assert_eq!(a.mesh, b.mesh);
    }

    #[test]
    fn test_normals_are_carried_through() {
        let mut mesh = sheet(5);
        mesh.set_normals(vec![Vector3f::z(); mesh.vertex_count()]);

        let result = EdgeCollapseSimplifier::new()
            .reduce_to_triangle_count(&mesh, 22)
            .unwrap()
            .mesh;
        let normals = result.normals.as_ref().unwrap();
        assert_eq!(normals.len(), result.vertex_count());
        assert!(normals.iter().all(|n| n.z > 0.9));
    }
}
