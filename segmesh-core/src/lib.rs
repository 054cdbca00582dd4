//! Core data structures and traits for segmesh
//! 
//! This crate provides the fundamental types shared by the reconstruction
//! pipeline: labeled voxel grids, triangle meshes, bounding boxes,
//! transforms, label palettes and the common error type.

pub mod point;
pub mod bounds;
pub mod voxel_grid;
pub mod mesh;
pub mod palette;
pub mod traits;
pub mod transform;
pub mod error;

pub use point::*;
pub use bounds::*;
pub use voxel_grid::*;
pub use mesh::*;
pub use palette::*;
pub use traits::*;
pub use transform::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix3, Matrix4};

// Type aliases for easier imports
pub type Point = Point3f;
pub type Mesh = TriangleMesh;
