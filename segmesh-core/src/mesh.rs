//! Indexed triangle meshes

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// Normal assigned to vertices that touch no face with area
pub const FALLBACK_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];

/// Indexed triangle mesh with optional per-vertex normals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Unit normal per face in winding order; zero for degenerate faces
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                face_cross(&self.vertices, face)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Compute area-weighted vertex normals and store them on the mesh.
    ///
    /// Faces are accumulated in index order, so the result is reproducible.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3f::zeros(); self.vertices.len()];

        for face in &self.faces {
            // Unnormalized cross product is twice the area times the unit normal
            let n = face_cross(&self.vertices, face);
            for &v in face {
                accum[v] += n;
            }
        }

        let fallback = Vector3f::from(FALLBACK_NORMAL);
        let normals = accum
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or(fallback))
            .collect();

        self.normals = Some(normals);
    }

    /// Set vertex normals
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Reverse the winding of every face
    pub fn reverse_winding(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Check that every face references existing, distinct vertices
    pub fn validate_indices(&self) -> Result<()> {
        let n = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            if face.iter().any(|&v| v >= n) {
                return Err(Error::InvalidData(format!(
                    "face {} references vertex out of range ({:?}, {} vertices)",
                    fi, face, n
                )));
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != n {
                return Err(Error::InvalidData(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    n
                )));
            }
        }
        Ok(())
    }

    /// Drop vertices no face references and re-index the faces
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut referenced = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &v in face {
                referenced[v] = true;
            }
        }
        if referenced.iter().all(|&r| r) {
            return;
        }

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut vertices = Vec::new();
        let mut normals = self.normals.as_ref().map(|_| Vec::new());

        for (old, &keep) in referenced.iter().enumerate() {
            if keep {
                remap[old] = vertices.len();
                vertices.push(self.vertices[old]);
                if let (Some(out), Some(src)) = (normals.as_mut(), self.normals.as_ref()) {
                    out.push(src[old]);
                }
            }
        }

        for face in &mut self.faces {
            for v in face.iter_mut() {
                *v = remap[*v];
            }
        }
        self.vertices = vertices;
        self.normals = normals;
    }

    /// Signed enclosed volume; positive when a closed mesh is wound outward
    pub fn signed_volume(&self) -> f32 {
        self.faces
            .iter()
            .map(|f| {
                let a = self.vertices[f[0]].coords;
                let b = self.vertices[f[1]].coords;
                let c = self.vertices[f[2]].coords;
                a.dot(&b.cross(&c))
            })
            .sum::<f32>()
            / 6.0
    }

    /// Total surface area
    pub fn surface_area(&self) -> f32 {
        self.faces
            .iter()
            .map(|f| face_cross(&self.vertices, f).norm() * 0.5)
            .sum()
    }

    /// Vertex positions as `[x, y, z, x, y, z, ...]`
    pub fn positions_flat(&self) -> Vec<f32> {
        let packed: Vec<[f32; 3]> = self.vertices.iter().map(|p| [p.x, p.y, p.z]).collect();
        bytemuck::cast_slice(&packed).to_vec()
    }

    /// Face indices as `[a, b, c, a, b, c, ...]`
    pub fn indices_flat(&self) -> Vec<u32> {
        self.faces
            .iter()
            .flat_map(|f| f.iter().map(|&v| v as u32))
            .collect()
    }

    /// Vertex normals as `[x, y, z, ...]`, empty when normals are unset
    pub fn normals_flat(&self) -> Vec<f32> {
        match &self.normals {
            Some(normals) => {
                let packed: Vec<[f32; 3]> = normals.iter().map(|n| [n.x, n.y, n.z]).collect();
                bytemuck::cast_slice(&packed).to_vec()
            }
            None => Vec::new(),
        }
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn face_cross(vertices: &[Point3f], face: &[usize; 3]) -> Vector3f {
    let v0 = vertices[face[0]];
    let v1 = vertices[face[1]];
    let v2 = vertices[face[2]];
    (v1 - v0).cross(&(v2 - v0))
}
