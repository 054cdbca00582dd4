//! Label colors and color volumes for rendering collaborators
//!
//! Besides per-label mesh colors, a palette turns a whole [`VoxelGrid`] into
//! an RGBA voxel buffer in the grid's own layout, ready for upload as a 3D
//! texture.

use crate::voxel_grid::{label_of, VoxelGrid};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A linear RGBA color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Rgba = Rgba::rgb(0.0, 0.0, 0.0);
    pub const RED: Rgba = Rgba::rgb(1.0, 0.0, 0.0);
    pub const BLUE: Rgba = Rgba::rgb(0.0, 0.0, 1.0);
    pub const YELLOW: Rgba = Rgba::rgb(1.0, 0.92, 0.016);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Opaque gray for a raw intensity; clamped to `[0, 255]` and
    /// truncated to a byte level first
    pub fn gray(intensity: f32) -> Self {
        let level = intensity.clamp(0.0, 255.0).trunc() / 255.0;
        Self::rgb(level, level, level)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0.0
    }

    /// 8-bit channels, rounded
    pub fn to_rgba8(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Mapping from label id to display color.
///
/// Label 0 is background and unknown labels are transparent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelPalette {
    colors: BTreeMap<u32, Rgba>,
}

impl LabelPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eight liver segments plus the gallbladder as label 9
    pub fn liver_segments() -> Self {
        [
            (1, Rgba::YELLOW),
            (2, Rgba::BLUE),
            (3, Rgba::BLACK),
            (4, Rgba::RED),
            (5, Rgba::rgb(0.6, 0.3, 0.0)),
            (6, Rgba::rgb(1.0, 0.75, 0.8)),
            (7, Rgba::rgb(1.0, 0.5, 0.0)),
            (8, Rgba::rgb(0.5, 0.0, 0.5)),
            (9, Rgba::rgb(0.53, 0.81, 0.98)),
        ]
        .into_iter()
        .collect()
    }

    /// Assign a color to a label, returning the previous one
    pub fn insert(&mut self, label: u32, color: Rgba) -> Option<Rgba> {
        self.colors.insert(label, color)
    }

    pub fn get(&self, label: u32) -> Option<Rgba> {
        self.colors.get(&label).copied()
    }

    /// Color for a label; transparent for background and unknown labels
    pub fn color_for(&self, label: u32) -> Rgba {
        if label == 0 {
            return Rgba::TRANSPARENT;
        }
        self.get(label).unwrap_or(Rgba::TRANSPARENT)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// One color per voxel, in the grid's `i + width * (j + height * k)`
    /// order. Background, fractional values and labels missing from the
    /// palette are transparent.
    pub fn colorize(&self, grid: &VoxelGrid) -> Vec<Rgba> {
        grid.values()
            .iter()
            .map(|&p| label_of(p).map_or(Rgba::TRANSPARENT, |label| self.color_for(label)))
            .collect()
    }

    /// Labels in ascending order with their colors
    pub fn iter(&self) -> impl Iterator<Item = (u32, Rgba)> + '_ {
        self.colors.iter().map(|(&l, &c)| (l, c))
    }
}

impl FromIterator<(u32, Rgba)> for LabelPalette {
    fn from_iter<I: IntoIterator<Item = (u32, Rgba)>>(iter: I) -> Self {
        Self {
            colors: iter.into_iter().collect(),
        }
    }
}

/// Grayscale color volume: positive voxels become opaque gray at their
/// intensity, everything else transparent. Same layout as [`LabelPalette::colorize`].
pub fn grayscale(grid: &VoxelGrid) -> Vec<Rgba> {
    grid.values()
        .iter()
        .map(|&p| if p > 0.0 { Rgba::gray(p) } else { Rgba::TRANSPARENT })
        .collect()
}

/// Pack colors into tightly interleaved RGBA8 texels
pub fn to_rgba8_texels(colors: &[Rgba]) -> Vec<u8> {
    colors.iter().flat_map(Rgba::to_rgba8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_grid(values: Vec<f32>) -> VoxelGrid {
        VoxelGrid::new(values.len(), 1, 1, 1.0, values).unwrap()
    }

    #[test]
    fn test_liver_palette() {
        let palette = LabelPalette::liver_segments();
        assert_eq!(palette.len(), 9);
        assert_eq!(palette.color_for(2), Rgba::BLUE);
        assert_eq!(palette.color_for(5), Rgba::rgb(0.6, 0.3, 0.0));
        assert_eq!(palette.color_for(9), Rgba::rgb(0.53, 0.81, 0.98));
    }

    #[test]
    fn test_background_and_unknown_are_transparent() {
        let mut palette = LabelPalette::liver_segments();
        palette.insert(0, Rgba::RED);
        assert!(palette.color_for(0).is_transparent());
        assert!(palette.color_for(42).is_transparent());
    }

    #[test]
    fn test_iteration_is_ordered() {
        let palette: LabelPalette = [(7, Rgba::RED), (2, Rgba::BLUE)].into_iter().collect();
        let labels: Vec<u32> = palette.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec![2, 7]);
    }

    #[test]
    fn test_colorize_labels() {
        let grid = row_grid(vec![0.0, 1.0, 4.0, 9.0, 12.0, 2.5, -3.0, f32::NAN]);
        let colors = LabelPalette::liver_segments().colorize(&grid);

        assert_eq!(colors.len(), grid.voxel_count());
        assert_eq!(colors[0], Rgba::TRANSPARENT);
        assert_eq!(colors[1], Rgba::YELLOW);
        assert_eq!(colors[2], Rgba::RED);
        assert_eq!(colors[3], Rgba::rgb(0.53, 0.81, 0.98));
        // Unknown, fractional, negative and NaN values
        assert!(colors[4..].iter().all(Rgba::is_transparent));
    }

    #[test]
    fn test_colorize_follows_grid_layout() {
        let mut values = vec![0.0; 2 * 3 * 4];
        let grid = VoxelGrid::new(2, 3, 4, 1.0, values.clone()).unwrap();
        let idx = grid.index(1, 2, 3);
        values[idx] = 2.0;
        let grid = VoxelGrid::new(2, 3, 4, 1.0, values).unwrap();

        let colors = LabelPalette::liver_segments().colorize(&grid);
        assert_eq!(colors[idx], Rgba::BLUE);
        assert_eq!(colors.iter().filter(|c| !c.is_transparent()).count(), 1);
    }

    #[test]
    fn test_grayscale_volume() {
        let grid = row_grid(vec![0.0, 255.0, 51.7, 400.0, -5.0]);
        let colors = grayscale(&grid);

        assert!(colors[0].is_transparent());
        assert_eq!(colors[1], Rgba::rgb(1.0, 1.0, 1.0));
        assert_eq!(colors[2].to_rgba8(), [51, 51, 51, 255]);
        assert_eq!(colors[3], Rgba::rgb(1.0, 1.0, 1.0));
        assert!(colors[4].is_transparent());
    }

    #[test]
    fn test_rgba8_texels() {
        let texels = to_rgba8_texels(&[Rgba::RED, Rgba::TRANSPARENT]);
        assert_eq!(texels, vec![255, 0, 0, 255, 0, 0, 0, 0]);
    }
}
