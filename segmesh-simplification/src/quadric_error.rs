//! Quadric error metric
//!
//! A quadric is the 4x4 symmetric matrix `Σ p pᵀ` over a set of planes
//! `p = (a, b, c, d)`; `vᵀ Q v` is the sum of squared distances from the
//! homogeneous point `v` to those planes.

use nalgebra::{Matrix4, Vector4};
use segmesh_core::{Point3f, Vector3f};
use std::ops::{Add, AddAssign, Mul};

/// Determinant below which the 3x3 block is treated as singular
const SINGULAR_EPSILON: f64 = 1e-10;

/// Accumulated plane-distance quadric of a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadric {
    matrix: Matrix4<f64>,
}

impl Default for Quadric {
    fn default() -> Self {
        Self {
            matrix: Matrix4::zeros(),
        }
    }
}

impl Quadric {
    /// Quadric of the plane `ax + by + cz + d = 0` with unit normal `(a, b, c)`
    pub fn from_plane(plane: Vector4<f64>) -> Self {
        Self {
            matrix: plane * plane.transpose(),
        }
    }

    /// Quadric of the plane through a triangle; zero for degenerate triangles
    pub fn from_triangle(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Self {
        match triangle_plane(v0, v1, v2) {
            Some(plane) => Self::from_plane(plane),
            None => Self::default(),
        }
    }

    /// Sum of squared plane distances at `p`
    pub fn evaluate(&self, p: &Point3f) -> f64 {
        let v = Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0);
        (v.transpose() * self.matrix * v)[0].max(0.0)
    }

    /// Point minimizing the error, `None` when the system is singular
    pub fn optimal_point(&self) -> Option<Point3f> {
        let a = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if a.determinant().abs() < SINGULAR_EPSILON {
            return None;
        }
        let b = self.matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let p = -a.try_inverse()? * b;
        if !p.iter().all(|x| x.is_finite()) {
            return None;
        }
        Some(Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32))
    }

    /// Optimal placement and its cost for merging two endpoints.
    ///
    /// Falls back to the edge midpoint when the combined quadric is singular.
    pub fn collapse_target(&self, a: &Point3f, b: &Point3f) -> (Point3f, f64) {
        let position = self
            .optimal_point()
            .unwrap_or_else(|| nalgebra::center(a, b));
        (position, self.evaluate(&position))
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(self, rhs: Quadric) -> Quadric {
        Quadric {
            matrix: self.matrix + rhs.matrix,
        }
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, rhs: Quadric) {
        self.matrix += rhs.matrix;
    }
}

impl Mul<f64> for Quadric {
    type Output = Quadric;

    fn mul(self, weight: f64) -> Quadric {
        Quadric {
            matrix: self.matrix * weight,
        }
    }
}

/// Plane `(n, -n·v0)` through a triangle, `None` when it has no area
pub fn triangle_plane(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Option<Vector4<f64>> {
    let n: Vector3f = (v1 - v0).cross(&(v2 - v0));
    let n = n.try_normalize(f32::EPSILON)?;
    let d = -n.dot(&v0.coords);
    Some(Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_quadric() {
        let q = Quadric::default();
        assert_eq!(q.evaluate(&Point3f::new(1.0, 2.0, 3.0)), 0.0);
        assert!(q.optimal_point().is_none());
    }

    #[test]
    fn test_plane_distance() {
        // z = 0
        let q = Quadric::from_plane(Vector4::new(0.0, 0.0, 1.0, 0.0));
        assert_relative_eq!(q.evaluate(&Point3f::new(4.0, -1.0, 0.0)), 0.0);
        assert_relative_eq!(q.evaluate(&Point3f::new(0.0, 0.0, 2.0)), 4.0);
    }

    #[test]
    fn test_triangle_quadric_matches_plane() {
        let q = Quadric::from_triangle(
            &Point3f::new(0.0, 0.0, 1.0),
            &Point3f::new(1.0, 0.0, 1.0),
            &Point3f::new(0.0, 1.0, 1.0),
        );
        assert_relative_eq!(q.evaluate(&Point3f::new(5.0, 5.0, 1.0)), 0.0, epsilon = 1e-9);
        assert_relative_eq!(q.evaluate(&Point3f::new(0.0, 0.0, 4.0)), 9.0, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_triangle() {
        let p = Point3f::new(1.0, 1.0, 1.0);
        assert!(triangle_plane(&p, &p, &Point3f::origin()).is_none());
        assert_eq!(Quadric::from_triangle(&p, &p, &p), Quadric::default());
    }

    #[test]
    fn test_corner_of_three_planes() {
        let q = Quadric::from_plane(Vector4::new(1.0, 0.0, 0.0, -1.0))
            + Quadric::from_plane(Vector4::new(0.0, 1.0, 0.0, -2.0))
            + Quadric::from_plane(Vector4::new(0.0, 0.0, 1.0, -3.0));
        let p = q.optimal_point().unwrap();
        assert_relative_eq!(p, Point3f::new(1.0, 2.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(q.evaluate(&p), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collapse_target_falls_back_to_midpoint() {
        let q = Quadric::from_plane(Vector4::new(0.0, 0.0, 1.0, 0.0));
        let a = Point3f::new(0.0, 0.0, 0.0);
        let b = Point3f::new(2.0, 0.0, 0.0);
        let (pos, cost) = q.collapse_target(&a, &b);
        assert_eq!(pos, Point3f::new(1.0, 0.0, 0.0));
        assert_eq!(cost, 0.0);
    }
}
