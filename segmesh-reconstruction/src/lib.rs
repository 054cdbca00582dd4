//! # segmesh Reconstruction
//!
//! Surface reconstruction from labeled voxel volumes.
//!
//! This crate partitions a labeled grid into per-label scalar fields,
//! extracts their iso surfaces with marching cubes and post-processes the
//! meshes (handedness flip, remeshing, decimation and normals).

pub mod partition;
pub mod implicit;
pub mod marching_cubes;
mod marching_cubes_tables;
pub mod postprocess;
pub mod pipeline;
pub mod parallel;

// Re-export commonly used items
pub use partition::*;
pub use implicit::*;
pub use marching_cubes::*;
pub use postprocess::*;
pub use pipeline::*;
pub use parallel::{parallel_map, ParallelConfig};
