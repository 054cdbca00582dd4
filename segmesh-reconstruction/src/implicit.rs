//! Implicit functions sampled by the isosurface extractor
//!
//! Negative values are inside, values at or above the iso level are outside.

use crate::partition::LabelField;
use segmesh_core::{Aabb, Point3f, Vector3f};

/// Value reported for points beyond a sampled lattice
pub const OUTSIDE_VALUE: f32 = f32::MAX;

/// A scalar function over 3D space with a finite region of interest
pub trait ImplicitFunction {
    /// Evaluate the function at `p`
    fn value(&self, p: &Point3f) -> f32;

    /// Region that contains every inside point
    fn bounds(&self) -> Aabb;

    /// Characteristic length used when the bounds have no extent
    fn feature_size(&self) -> f32 {
        1.0
    }
}

/// Trilinear interpolant of a [`LabelField`] on a regular lattice
#[derive(Debug, Clone, Copy)]
pub struct TrilinearField<'a> {
    field: &'a LabelField,
    origin: Point3f,
    cell_size: f32,
}

impl<'a> TrilinearField<'a> {
    /// Lattice point `(i, j, k)` at `(i, j, k) * cell_size`
    pub fn new(field: &'a LabelField, cell_size: f32) -> Self {
        Self::with_origin(field, Point3f::origin(), cell_size)
    }

    pub fn with_origin(field: &'a LabelField, origin: Point3f, cell_size: f32) -> Self {
        Self {
            field,
            origin,
            cell_size,
        }
    }

    pub fn field(&self) -> &'a LabelField {
        self.field
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Continuous lattice coordinate of `p`, `None` beyond the lattice
    fn lattice_coords(&self, p: &Point3f) -> Option<Vector3f> {
        let local = (p - self.origin) / self.cell_size;
        let dims = self.field.dimensions();
        for axis in 0..3 {
            let c = local[axis];
            if !c.is_finite() || c < 0.0 || c > (dims[axis] - 1) as f32 {
                return None;
            }
        }
        Some(local)
    }
}

/// Lower lattice index and fractional offset along one axis
#[inline]
fn split_axis(c: f32, len: usize) -> (usize, usize, f32) {
    if len < 2 {
        return (0, 0, 0.0);
    }
    let lo = (c.floor() as usize).min(len - 2);
    (lo, lo + 1, c - lo as f32)
}

impl ImplicitFunction for TrilinearField<'_> {
    fn value(&self, p: &Point3f) -> f32 {
        let Some(local) = self.lattice_coords(p) else {
            return OUTSIDE_VALUE;
        };
        let [w, h, d] = self.field.dimensions();
        let (i0, i1, tx) = split_axis(local.x, w);
        let (j0, j1, ty) = split_axis(local.y, h);
        let (k0, k1, tz) = split_axis(local.z, d);

        let values = self.field.values();
        let at = |i, j, k| values[self.field.index(i, j, k)];
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let c00 = lerp(at(i0, j0, k0), at(i1, j0, k0), tx);
        let c10 = lerp(at(i0, j1, k0), at(i1, j1, k0), tx);
        let c01 = lerp(at(i0, j0, k1), at(i1, j0, k1), tx);
        let c11 = lerp(at(i0, j1, k1), at(i1, j1, k1), tx);

        lerp(lerp(c00, c10, ty), lerp(c01, c11, ty), tz)
    }

    fn bounds(&self) -> Aabb {
        let [w, h, d] = self.field.dimensions();
        let extent = Vector3f::new((w - 1) as f32, (h - 1) as f32, (d - 1) as f32) * self.cell_size;
        Aabb::new(self.origin, self.origin + extent)
    }

    fn feature_size(&self) -> f32 {
        self.cell_size
    }
}

/// Signed distance to a sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereFunction {
    pub center: Point3f,
    pub radius: f32,
}

impl SphereFunction {
    pub fn new(center: Point3f, radius: f32) -> Self {
        Self { center, radius }
    }
}

impl ImplicitFunction for SphereFunction {
    fn value(&self, p: &Point3f) -> f32 {
        (p - self.center).norm() - self.radius
    }

    fn bounds(&self) -> Aabb {
        let r = Vector3f::repeat(self.radius.abs());
        Aabb::new(self.center - r, self.center + r)
    }

    fn feature_size(&self) -> f32 {
        self.radius.abs().max(f32::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{partition, LabelSelection};
    use approx::assert_relative_eq;
    use segmesh_core::VoxelGrid;

    fn single_voxel_field() -> LabelField {
        let mut values = vec![0.0; 27];
        values[13] = 2.0;
        let grid = VoxelGrid::new(3, 3, 3, 1.0, values).unwrap();
        partition(&grid, &LabelSelection::Foreground)
            .unwrap()
            .field(0)
            .unwrap()
    }

    #[test]
    fn test_lattice_values() {
        let field = single_voxel_field();
        let f = TrilinearField::new(&field, 1.0);
        assert_eq!(f.value(&Point3f::new(1.0, 1.0, 1.0)), -2.0);
        assert_eq!(f.value(&Point3f::new(0.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_trilinear_interpolation() {
        let field = single_voxel_field();
        let f = TrilinearField::new(&field, 1.0);
        assert_relative_eq!(f.value(&Point3f::new(1.5, 1.0, 1.0)), -1.0);
        assert_relative_eq!(f.value(&Point3f::new(1.5, 1.5, 1.5)), -0.25);
        assert_relative_eq!(f.value(&Point3f::new(2.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_cell_size_and_origin() {
        let field = single_voxel_field();
        let f = TrilinearField::with_origin(&field, Point3f::new(10.0, 0.0, 0.0), 2.0);
        assert_eq!(f.value(&Point3f::new(12.0, 2.0, 2.0)), -2.0);

        let bounds = f.bounds();
        assert_eq!(bounds.min, Point3f::new(10.0, 0.0, 0.0));
        assert_eq!(bounds.max, Point3f::new(14.0, 4.0, 4.0));
        assert_eq!(f.feature_size(), 2.0);
    }

    #[test]
    fn test_outside_lattice() {
        let field = single_voxel_field();
        let f = TrilinearField::new(&field, 1.0);
        assert_eq!(f.value(&Point3f::new(-0.1, 1.0, 1.0)), OUTSIDE_VALUE);
        assert_eq!(f.value(&Point3f::new(1.0, 2.5, 1.0)), OUTSIDE_VALUE);
        assert_eq!(f.value(&Point3f::new(f32::NAN, 1.0, 1.0)), OUTSIDE_VALUE);
    }

    #[test]
    fn test_flat_axis() {
        let grid = VoxelGrid::new(2, 1, 1, 1.0, vec![1.0, 0.0]).unwrap();
        let field = partition(&grid, &LabelSelection::Foreground)
            .unwrap()
            .field(0)
            .unwrap();
        let f = TrilinearField::new(&field, 1.0);
        assert_relative_eq!(f.value(&Point3f::new(0.25, 0.0, 0.0)), -0.75);
        assert_eq!(f.value(&Point3f::new(0.25, 0.1, 0.0)), OUTSIDE_VALUE);
    }

    #[test]
    fn test_sphere_function() {
        let s = SphereFunction::new(Point3f::new(1.0, 0.0, 0.0), 2.0);
        assert_relative_eq!(s.value(&Point3f::new(1.0, 0.0, 0.0)), -2.0);
        assert_relative_eq!(s.value(&Point3f::new(3.0, 0.0, 0.0)), 0.0);
        assert_eq!(s.bounds().min, Point3f::new(-1.0, -2.0, -2.0));
    }
}
