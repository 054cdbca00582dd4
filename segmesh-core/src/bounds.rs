//! Axis-aligned bounding boxes

use crate::point::*;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3f,
    pub max: Point3f,
}

impl Aabb {
    /// Create a box from its corners
    pub fn new(min: Point3f, max: Point3f) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, `None` for an empty slice
    pub fn from_points(points: &[Point3f]) -> Option<Self> {
        let first = *points.first()?;
        let mut min = first;
        let mut max = first;

        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some(Self { min, max })
    }

    /// Edge lengths along each axis
    pub fn size(&self) -> Vector3f {
        self.max - self.min
    }

    /// Largest edge length
    pub fn max_dim(&self) -> f32 {
        self.size().max()
    }

    pub fn center(&self) -> Point3f {
        nalgebra::center(&self.min, &self.max)
    }

    /// Grow the box by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vector3f::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    pub fn contains(&self, p: &Point3f) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}
