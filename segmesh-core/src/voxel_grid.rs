//! Labeled voxel volumes

use crate::bounds::Aabb;
use crate::error::{Error, Result};
use crate::point::*;
use ndarray::{Array3, ArrayView3};
use std::collections::BTreeSet;

/// A dense scalar volume with isotropic voxel spacing.
///
/// Values are stored flat with `i` (width) varying fastest, then `j`
/// (height), then `k` (depth). They may be integer label ids encoded as
/// floats or continuous intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    width: usize,
    height: usize,
    depth: usize,
    spacing: f32,
    values: Vec<f32>,
}

impl VoxelGrid {
    /// Create a grid from a flat buffer, validating its shape.
    pub fn new(
        width: usize,
        height: usize,
        depth: usize,
        spacing: f32,
        values: Vec<f32>,
    ) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(Error::InvalidGrid(format!(
                "dimensions must be positive, got {}x{}x{}",
                width, height, depth
            )));
        }
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(Error::InvalidGrid(format!(
                "spacing must be positive and finite, got {}",
                spacing
            )));
        }

        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(depth))
            .ok_or_else(|| {
                Error::InvalidGrid(format!(
                    "voxel count overflows for {}x{}x{}",
                    width, height, depth
                ))
            })?;

        if values.len() != expected {
            return Err(Error::InvalidGrid(format!(
                "buffer holds {} values, {}x{}x{} grid needs {}",
                values.len(),
                width,
                height,
                depth,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            depth,
            spacing,
            values,
        })
    }

    /// Create a grid from an `(depth, height, width)` ordered array.
    pub fn from_array(array: Array3<f32>, spacing: f32) -> Result<Self> {
        let (depth, height, width) = array.dim();
        let values: Vec<f32> = array.iter().copied().collect();
        Self::new(width, height, depth, spacing, values)
    }

    /// Borrow the values as an `(depth, height, width)` array view.
    pub fn as_array(&self) -> Result<ArrayView3<'_, f32>> {
        ArrayView3::from_shape((self.depth, self.height, self.width), &self.values)
            .map_err(|e| Error::InvalidGrid(e.to_string()))
    }

    /// Flat index of voxel `(i, j, k)`
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.width * (j + self.height * k)
    }

    /// Value at `(i, j, k)`, `None` out of bounds
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        if i < self.width && j < self.height && k < self.depth {
            Some(self.values[self.index(i, j, k)])
        } else {
            None
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// `[width, height, depth]`
    pub fn dimensions(&self) -> [usize; 3] {
        [self.width, self.height, self.depth]
    }

    pub fn voxel_count(&self) -> usize {
        self.values.len()
    }

    /// Physical voxel size
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Physical size of the volume along each axis
    pub fn extent(&self) -> Vector3f {
        Vector3f::new(
            self.width as f32 * self.spacing,
            self.height as f32 * self.spacing,
            self.depth as f32 * self.spacing,
        )
    }

    /// Box spanned by the voxel centers, with voxel `(0,0,0)` at the origin
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Point3f::origin(),
            Point3f::new(
                (self.width - 1) as f32 * self.spacing,
                (self.height - 1) as f32 * self.spacing,
                (self.depth - 1) as f32 * self.spacing,
            ),
        )
    }

    /// Sorted positive integer labels present in the grid.
    ///
    /// Only values that are exactly a whole number `L >= 1` count.
    pub fn distinct_labels(&self) -> Vec<u32> {
        let mut labels = BTreeSet::new();
        for &p in &self.values {
            if let Some(label) = label_of(p) {
                labels.insert(label);
            }
        }
        labels.into_iter().collect()
    }
}

/// Label id of a voxel value: a whole number `>= 1`, otherwise `None`
#[inline]
pub fn label_of(value: f32) -> Option<u32> {
    if !value.is_finite() || value != value.round() {
        return None;
    }
    if value >= 1.0 && value <= u32::MAX as f32 {
        Some(value as u32)
    } else {
        None
    }
}
