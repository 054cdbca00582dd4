//! Affine transforms for output frame conversion

use crate::point::Axis;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Homogeneous 4x4 transform applied to mesh vertices and normals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Per-axis scale about the origin
    pub fn scaling(factors: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&factors),
        }
    }

    /// Reflection through the plane orthogonal to `axis`; switches the
    /// handedness of the frame.
    pub fn mirror(axis: Axis) -> Self {
        let mut factors = Vector3::repeat(1.0);
        factors[axis.index()] = -1.0;
        Self::scaling(factors)
    }

    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        Point3::from_homogeneous(self.matrix * point.to_homogeneous()).unwrap_or(*point)
    }

    /// Maps a normal by the inverse transpose and renormalizes it
    pub fn transform_normal(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        let linear = self.linear();
        let mapped = linear
            .try_inverse()
            .map_or(linear * normal, |inv| inv.transpose() * normal);
        mapped.try_normalize(f32::EPSILON).unwrap_or(*normal)
    }

    fn linear(&self) -> Matrix3<f32> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Whether outward-wound triangles come out wound inward
    pub fn reverses_orientation(&self) -> bool {
        self.linear().determinant() < 0.0
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mirror_z() {
        let t = Transform3D::mirror(Axis::Z);
        assert_eq!(
            t.transform_point(&Point3::new(1.0, 2.0, 3.0)),
            Point3::new(1.0, 2.0, -3.0)
        );
        assert!(t.reverses_orientation());
        assert!(!Transform3D::identity().reverses_orientation());
    }

    #[test]
    fn test_normals_use_inverse_transpose() {
        let t = Transform3D::scaling(Vector3::new(2.0, 1.0, 1.0));
        let n = t.transform_normal(&Vector3::new(1.0, 1.0, 0.0).normalize());
        // Stretching x tilts the normal toward y
        assert!(n.y > n.x);
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);

        let flipped = Transform3D::mirror(Axis::Y).transform_normal(&Vector3::y());
        assert_relative_eq!(flipped, -Vector3::y());
        assert!(!t.reverses_orientation());
    }
}
