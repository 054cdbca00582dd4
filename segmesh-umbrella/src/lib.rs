//! # segmesh
//!
//! Surface meshes from labeled voxel volumes.
//!
//! This is the umbrella crate that provides convenient access to all segmesh
//! functionality. You can use this crate to get everything in one place, or
//! use individual crates for more granular control over dependencies.
//!
//! ## Features
//!
//! - **Core**: Voxel grids, triangle meshes, transforms and label palettes
//! - **Simplification**: Quadric decimation and isotropic remeshing
//! - **Reconstruction**: Label partitioning, marching cubes and the
//!   per-label reconstruction pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use segmesh::prelude::*;
//!
//! // A 4x4x4 volume with a single labeled voxel
//! let mut values = vec![0.0; 64];
//! values[2 + 4 * (2 + 4 * 2)] = 1.0;
//! let grid = VoxelGrid::new(4, 4, 4, 1.0, values).unwrap();
//!
//! let options = ReconstructionOptions::default().with_subdivisions(8);
//! let segments = reconstruct(&grid, &LabelSelection::Present, &options).unwrap();
//!
//! assert_eq!(segments.len(), 1);
//! assert_eq!(segments[0].label, 1);
//! assert!(segments[0].mesh.normals.is_some());
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables simplification and reconstruction
//! - `simplification`: Mesh decimation and remeshing
//! - `reconstruction`: Volume to mesh reconstruction (implies `simplification`)
//! - `all`: Enables all features

// Re-export core functionality
pub use segmesh_core::*;

// Re-export sub-crates
#[cfg(feature = "simplification")]
pub use segmesh_simplification as simplification;

#[cfg(feature = "reconstruction")]
pub use segmesh_reconstruction as reconstruction;

/// Convenient imports for common use cases
pub mod prelude {
    pub use segmesh_core::*;

    #[cfg(feature = "simplification")]
    pub use segmesh_simplification::*;

    #[cfg(feature = "reconstruction")]
    pub use segmesh_reconstruction::*;
}
