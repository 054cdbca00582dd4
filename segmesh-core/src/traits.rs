//! Core traits for segmesh

use crate::{bounds::Aabb, mesh::*, point::*, transform::Transform3D, voxel_grid::VoxelGrid};

/// Trait for drawable/renderable objects
pub trait Drawable {
    /// Get the bounding box of the object, `None` when it has no extent
    fn bounding_box(&self) -> Option<Aabb>;

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        self.bounding_box()
            .map(|bb| bb.center())
            .unwrap_or_else(Point3f::origin)
    }
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Apply a transformation to the object
    fn transform(&mut self, transform: &Transform3D);
}

impl Drawable for TriangleMesh {
    fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }
}

impl Drawable for VoxelGrid {
    fn bounding_box(&self) -> Option<Aabb> {
        Some(self.bounds())
    }
}

impl Transformable for TriangleMesh {
    /// Transforms vertices and normals; orientation-reversing transforms
    /// also reverse the winding so faces keep pointing outward.
    fn transform(&mut self, transform: &Transform3D) {
        for v in &mut self.vertices {
            *v = transform.transform_point(v);
        }
        if let Some(normals) = &mut self.normals {
            for n in normals.iter_mut() {
                *n = transform.transform_normal(n);
            }
        }
        if transform.reverses_orientation() {
            self.reverse_winding();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

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

    #[test]
    fn test_mesh_bounding_box() {
        let mesh = make_tetrahedron();
        let bb = mesh.bounding_box().unwrap();
        assert_eq!(bb.max, Point3f::new(1.0, 1.0, 1.0));
        assert_eq!(mesh.center(), Point3f::new(0.5, 0.5, 0.5));
        assert!(TriangleMesh::new().bounding_box().is_none());
    }

    #[test]
    fn test_mirror_keeps_outward_orientation() {
        let mut mesh = make_tetrahedron();
        mesh.compute_vertex_normals();
        let before = mesh.signed_volume();

        mesh.transform(&Transform3D::mirror(Axis::Z));

        assert_relative_eq!(mesh.signed_volume(), before, epsilon = 1e-6);
        assert_eq!(mesh.vertices[3], Point3f::new(0.0, 0.0, -1.0));
        let n3 = mesh.normals.as_ref().unwrap()[3];
        assert!(n3.z < 0.0);
    }
}
