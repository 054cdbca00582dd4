//! Mesh simplification and remeshing algorithms
//! 
//! This crate provides the mesh clean-up stages of the reconstruction
//! pipeline:
//! - Quadric error metrics
//! - Edge collapse decimation to a triangle budget
//! - Isotropic remeshing with back-projection

pub mod quadric_error;
pub mod edge_collapse;
pub mod remesh;

pub use quadric_error::*;
pub use edge_collapse::*;
pub use remesh::*;
